use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::config::WebhookConfig;
use crate::core::state::{ExportRecord, IMAGE_DATA_PREFIX};

/// Substring in a non-2xx body that marks a test webhook nobody is listening on.
pub const INACTIVE_TEST_MARKER: &str = "is not registered";

const MAX_SEGMENT_REWRITES: usize = 8;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebhookMode {
    #[default]
    Test,
    Production,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Cannot send: {0}")]
    Validation(String),
    #[error("Invalid webhook URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("The test webhook is not listening. Start the workflow in test mode or switch to production mode.")]
    InactiveTestListener,
    #[error("Webhook responded with HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Network error: {0}")]
    Transport(String),
}

impl DispatchError {
    /// True when the attempt was refused before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, DispatchError::Validation(_) | DispatchError::InvalidUrl { .. })
    }
}

fn is_absolute_http(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn local_to_proxy(url: &str, settings: &WebhookConfig) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let is_local = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
    if !is_local || parsed.port() != Some(settings.local_port) {
        return None;
    }

    let mut proxied = format!("{}{}", settings.proxy_prefix.trim_end_matches('/'), parsed.path());
    if let Some(query) = parsed.query() {
        proxied.push('?');
        proxied.push_str(query);
    }
    Some(proxied)
}

/// Rewrites a user-entered endpoint: production segment swap, local port to
/// proxy path, bare fragments under the proxy prefix.
pub fn normalize_url(raw: &str, mode: WebhookMode, settings: &WebhookConfig) -> String {
    let mut url = raw.trim().to_string();

    if mode == WebhookMode::Production {
        url = rewrite_test_segment(url, settings);
    }

    if let Some(proxied) = local_to_proxy(&url, settings) {
        debug!("webhook: local endpoint {} routed through {}", url, proxied);
        return proxied;
    }

    if !is_absolute_http(&url) && !url.starts_with(&settings.proxy_prefix) {
        let separator = if url.starts_with('/') { "" } else { "/" };
        url = format!("{}{}{}", settings.proxy_prefix, separator, url);
        // A bare "webhook-test/..." fragment only gains its leading slash here.
        if mode == WebhookMode::Production {
            url = rewrite_test_segment(url, settings);
        }
    }

    url
}

fn rewrite_test_segment(mut url: String, settings: &WebhookConfig) -> String {
    if settings.test_segment.is_empty() || settings.production_segment.contains(&settings.test_segment) {
        return url;
    }
    for _ in 0..MAX_SEGMENT_REWRITES {
        if !url.contains(&settings.test_segment) {
            break;
        }
        url = url.replace(&settings.test_segment, &settings.production_segment);
    }
    url
}

/// Maps a proxy path onto the local proxy target with the prefix stripped.
pub fn resolve_proxy(url: &str, settings: &WebhookConfig) -> Result<Url, DispatchError> {
    let absolute = match url.strip_prefix(&settings.proxy_prefix) {
        Some(rest) if !is_absolute_http(url) => {
            let rest = if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{}", rest)
            };
            format!("{}{}", settings.proxy_target.trim_end_matches('/'), rest)
        }
        _ => url.to_string(),
    };

    Url::parse(&absolute).map_err(|e| DispatchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSourceKind {
    /// Value carried in the export record itself.
    Record,
    /// Value held by the running session (current profile or request).
    Session,
    /// Value read back from storage.
    Persisted,
}

/// First non-empty candidate, in the order given.
pub fn resolve_image(candidates: &[(ImageSourceKind, Option<&str>)]) -> Option<(ImageSourceKind, String)> {
    candidates.iter().find_map(|(kind, value)| match value {
        Some(v) if !v.is_empty() => Some((*kind, v.to_string())),
        _ => None,
    })
}

/// Images to fall back on when the export record lacks them.
#[derive(Debug, Clone, Default)]
pub struct FallbackImages {
    pub session_logo: Option<String>,
    pub persisted_logo: Option<String>,
    pub session_hero: Option<String>,
    pub persisted_hero: Option<String>,
}

fn require_image(label: &str, resolved: Option<(ImageSourceKind, String)>) -> Result<String, DispatchError> {
    match resolved {
        Some((kind, value)) if value.starts_with(IMAGE_DATA_PREFIX) => {
            debug!("webhook: {} resolved from {:?} ({} bytes)", label, kind, value.len());
            Ok(value)
        }
        Some((kind, _)) => Err(DispatchError::Validation(format!(
            "{} from {:?} is not an image data URI",
            label, kind
        ))),
        None => Err(DispatchError::Validation(format!("{} is missing", label))),
    }
}

/// The outgoing payload: the export record with both images resolved and checked.
pub fn prepare_payload(record: &ExportRecord, fallbacks: &FallbackImages) -> Result<ExportRecord, DispatchError> {
    let logo = resolve_image(&[
        (ImageSourceKind::Record, record.brand.logo_base64.as_deref()),
        (ImageSourceKind::Session, fallbacks.session_logo.as_deref()),
        (ImageSourceKind::Persisted, fallbacks.persisted_logo.as_deref()),
    ]);
    let hero = resolve_image(&[
        (ImageSourceKind::Record, record.request.hero_image_base64.as_deref()),
        (ImageSourceKind::Session, fallbacks.session_hero.as_deref()),
        (ImageSourceKind::Persisted, fallbacks.persisted_hero.as_deref()),
    ]);

    let logo = require_image("logo", logo)?;
    let hero = require_image("hero image", hero)?;

    let mut payload = record.clone();
    payload.brand.logo_base64 = Some(logo);
    payload.request.hero_image_base64 = Some(hero);
    Ok(payload)
}

/// Body of a failed response; an unreadable body is logged and treated as empty.
fn error_body<E: std::fmt::Display>(read: Result<String, E>) -> String {
    match read {
        Ok(text) => text,
        Err(e) => {
            warn!("webhook: failed to read response body: {}", e);
            String::new()
        }
    }
}

pub struct Dispatcher {
    client: reqwest::Client,
    settings: WebhookConfig,
}

impl Dispatcher {
    pub fn new(settings: WebhookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn endpoint(&self, raw_url: &str, mode: WebhookMode) -> Result<Url, DispatchError> {
        let normalized = normalize_url(raw_url, mode, &self.settings);
        resolve_proxy(&normalized, &self.settings)
    }

    /// One POST, no retry. Images are checked before anything touches the network.
    pub async fn dispatch(
        &self,
        record: &ExportRecord,
        fallbacks: &FallbackImages,
        raw_url: &str,
        mode: WebhookMode,
    ) -> Result<(), DispatchError> {
        let payload = prepare_payload(record, fallbacks)?;
        let url = self.endpoint(raw_url, mode)?;
        let body = serde_json::to_string(&payload)
            .map_err(|e| DispatchError::Validation(format!("payload could not be serialized: {}", e)))?;

        info!("webhook: POST {} ({} bytes, {:?} mode)", url, body.len(), mode);

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            info!("webhook: delivered ({})", status);
            return Ok(());
        }

        let text = error_body(resp.text().await);
        warn!("webhook: HTTP {} - {}", status, text);
        if text.contains(INACTIVE_TEST_MARKER) {
            return Err(DispatchError::InactiveTestListener);
        }
        Err(DispatchError::Http {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Sending,
    Success,
    Error(String),
}

/// idle -> sending -> {success | error}; editing the URL goes back to idle.
#[derive(Debug, Default)]
pub struct DispatchTracker {
    state: DispatchState,
}

impl DispatchTracker {
    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    /// Returns false while an attempt is already in flight.
    pub fn begin(&mut self) -> bool {
        if self.state == DispatchState::Sending {
            return false;
        }
        self.state = DispatchState::Sending;
        true
    }

    pub fn finish(&mut self, outcome: &Result<(), DispatchError>) {
        self.state = match outcome {
            Ok(()) => DispatchState::Success,
            Err(e) => DispatchState::Error(e.to_string()),
        };
    }

    pub fn reset(&mut self) {
        self.state = DispatchState::Idle;
    }
}
