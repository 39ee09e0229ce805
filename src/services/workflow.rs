use anyhow::{anyhow, Result};
use chrono::Utc;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::io::KeyValueStore;
use crate::core::state::{BrandProfile, ContentRequest, GeneratedContent, ValidationError};
use crate::core::wizard::{Screen, Wizard, WizardEvent};
use crate::services::dispatch::{DispatchError, DispatchState, DispatchTracker, Dispatcher, FallbackImages, WebhookMode};
use crate::services::export::write_export;
use crate::services::profile_store::ProfileStore;
use crate::services::prompt::assemble;

/// One run of the wizard: the saved profile plus whatever the current pass produced.
pub struct WizardSession {
    config: Config,
    store: ProfileStore,
    dispatcher: Dispatcher,
    profile: BrandProfile,
    wizard: Wizard,
    last_request: Option<ContentRequest>,
    profile_draft: Option<BrandProfile>,
    request_draft: Option<ContentRequest>,
    result: Option<GeneratedContent>,
    webhook_url: String,
    dispatch: DispatchTracker,
}

impl WizardSession {
    pub async fn open(config: Config, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let store = ProfileStore::new(storage);
        let profile = store.load().await;
        let webhook_url = store.webhook_url().await.unwrap_or_default();
        let wizard = Wizard::new(profile.is_usable());

        if profile.is_usable() {
            info!("Loaded brand profile '{}'", profile.brand_name);
        }

        Ok(Self {
            dispatcher: Dispatcher::new(config.webhook.clone()),
            config,
            store,
            profile,
            wizard,
            last_request: None,
            profile_draft: None,
            request_draft: None,
            result: None,
            webhook_url,
            dispatch: DispatchTracker::default(),
        })
    }

    pub fn screen(&self) -> Screen {
        self.wizard.screen()
    }

    pub fn has_saved_profile(&self) -> bool {
        self.wizard.has_saved_profile()
    }

    pub fn profile(&self) -> &BrandProfile {
        &self.profile
    }

    pub fn result(&self) -> Option<&GeneratedContent> {
        self.result.as_ref()
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub fn default_webhook_mode(&self) -> WebhookMode {
        self.config.webhook.mode
    }

    pub fn dispatch_state(&self) -> &DispatchState {
        self.dispatch.state()
    }

    pub fn start(&mut self) -> Screen {
        self.wizard.apply(WizardEvent::Start)
    }

    pub fn go_to_content(&mut self) -> Screen {
        self.wizard.apply(WizardEvent::GoToContent)
    }

    pub fn cancel_profile(&mut self) -> Screen {
        self.profile_draft = None;
        self.wizard.apply(WizardEvent::CancelProfile)
    }

    pub fn edit_profile(&mut self) -> Screen {
        self.wizard.apply(WizardEvent::EditProfile)
    }

    /// A rejected profile is kept as the draft so the form can be reopened with it.
    pub async fn save_profile(&mut self, profile: BrandProfile) -> Result<Screen> {
        if let Err(e) = profile.validate() {
            self.profile_draft = Some(profile);
            return Err(e.into());
        }
        if let Err(e) = self.store.save(&profile).await {
            self.profile_draft = Some(profile);
            return Err(e);
        }
        info!("Saved brand profile '{}'", profile.brand_name);
        self.profile = profile;
        self.profile_draft = None;
        Ok(self.wizard.apply(WizardEvent::ProfileSaved))
    }

    /// Starting point for the profile form: the last rejected edit, or the saved profile.
    pub fn draft_profile(&self) -> BrandProfile {
        self.profile_draft.clone().unwrap_or_else(|| self.profile.clone())
    }

    pub async fn remember_hero(&self, data_uri: &str) -> Result<()> {
        self.store.save_last_hero(data_uri).await
    }

    pub async fn last_hero(&self) -> Option<String> {
        self.store.last_hero().await
    }

    /// Starting point for the request form: the last rejected request, the
    /// previous request, or defaults with the last-used hero image.
    pub async fn draft_request(&self) -> ContentRequest {
        let mut request = self
            .request_draft
            .clone()
            .or_else(|| self.last_request.clone())
            .unwrap_or_default();
        if request.hero_image_base64.is_none() {
            request.hero_image_base64 = self.last_hero().await;
        }
        request
    }

    /// Replaces any earlier result. Nothing is produced when validation fails,
    /// and the rejected request becomes the form's draft.
    pub fn generate(&mut self, request: ContentRequest) -> Result<&GeneratedContent, ValidationError> {
        if self.wizard.screen() != Screen::EditingRequest {
            return Err(ValidationError::NotOnRequestForm);
        }
        if let Err(e) = request.validate() {
            self.request_draft = Some(request);
            return Err(e);
        }
        let content = assemble(&self.profile, &request, Utc::now());
        self.request_draft = None;
        self.last_request = Some(request);
        self.wizard.apply(WizardEvent::Generated);
        let content: &GeneratedContent = self.result.insert(content);
        Ok(content)
    }

    /// Leaving the result screen discards the result.
    pub fn back(&mut self) -> Screen {
        self.result = None;
        self.dispatch.reset();
        self.wizard.apply(WizardEvent::Back)
    }

    pub async fn set_webhook_url(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if url == self.webhook_url {
            return Ok(());
        }
        self.store.save_webhook_url(url).await?;
        self.webhook_url = url.to_string();
        self.dispatch.reset();
        Ok(())
    }

    pub async fn dispatch(&mut self, mode: WebhookMode) -> Result<(), DispatchError> {
        let record = match &self.result {
            Some(result) => result.final_json.clone(),
            None => return Err(DispatchError::Validation("nothing has been generated yet".to_string())),
        };
        if self.webhook_url.is_empty() {
            return Err(DispatchError::Validation("webhook URL is empty".to_string()));
        }
        if !self.dispatch.begin() {
            return Err(DispatchError::Validation("a dispatch is already in progress".to_string()));
        }

        let fallbacks = FallbackImages {
            session_logo: self.profile.logo_base64.clone(),
            persisted_logo: self.store.load().await.logo_base64,
            session_hero: self
                .last_request
                .as_ref()
                .and_then(|r| r.hero_image_base64.clone()),
            persisted_hero: self.store.last_hero().await,
        };

        let outcome = self
            .dispatcher
            .dispatch(&record, &fallbacks, &self.webhook_url, mode)
            .await;
        self.dispatch.finish(&outcome);
        outcome
    }

    pub async fn export(&self) -> Result<PathBuf> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| anyhow!("Nothing has been generated yet"))?;
        write_export(Path::new(&self.config.output_folder), &result.final_json, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::{MemoryStore, BRAND_KEY};

    const LOGO: &str = "data:image/png;base64,AA==";
    const HERO: &str = "data:image/jpeg;base64,BB==";

    fn acme() -> BrandProfile {
        BrandProfile {
            brand_name: "Acme".to_string(),
            logo_base64: Some(LOGO.to_string()),
            ..Default::default()
        }
    }

    fn request(keywords: &str, hero: Option<&str>) -> ContentRequest {
        ContentRequest {
            keywords: keywords.to_string(),
            hero_image_base64: hero.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_session_starts_at_welcome() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        assert_eq!(session.screen(), Screen::Welcome);
        assert_eq!(session.go_to_content(), Screen::Welcome);
        assert_eq!(session.start(), Screen::EditingProfile);
        Ok(())
    }

    #[tokio::test]
    async fn test_usable_saved_profile_skips_to_request() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        storage.set(BRAND_KEY, &serde_json::to_string(&acme())?).await?;

        let session = WizardSession::open(Config::default(), storage).await?;
        assert_eq!(session.screen(), Screen::EditingRequest);
        assert_eq!(session.profile(), &acme());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_profile_requires_logo_and_name() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        let mut session = WizardSession::open(Config::default(), storage.clone()).await?;
        session.start();

        let err = session
            .save_profile(BrandProfile {
                brand_name: "Acme".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<ValidationError>(), Some(&ValidationError::MissingLogo));
        assert_eq!(session.screen(), Screen::EditingProfile);
        assert_eq!(storage.get(BRAND_KEY).await?, None);

        assert_eq!(session.save_profile(acme()).await?, Screen::EditingRequest);
        assert!(storage.get(BRAND_KEY).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_refusals() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        session.start();
        session.save_profile(acme()).await?;

        let err = session.generate(request("tax", None)).unwrap_err();
        assert_eq!(err, ValidationError::MissingHeroImage);
        assert!(session.result().is_none());

        let err = session.generate(request(" , ,, ", Some(HERO))).unwrap_err();
        assert_eq!(err, ValidationError::MissingKeywords);
        assert!(session.result().is_none());
        assert_eq!(session.screen(), Screen::EditingRequest);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_request_is_kept_as_draft() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        session.start();
        session.save_profile(acme()).await?;

        let mut rejected = request(" , ", Some(HERO));
        rejected.pillar = "Fiscal".to_string();
        rejected.event_date = Some("2025-04-15".to_string());
        assert_eq!(
            session.generate(rejected.clone()).unwrap_err(),
            ValidationError::MissingKeywords
        );
        assert_eq!(session.draft_request().await, rejected);

        // Fixing the keywords clears the draft
        session.generate(request("tax", Some(HERO)))?;
        session.back();
        assert_eq!(session.draft_request().await.keywords, "tax");
        assert_eq!(session.draft_request().await.pillar, "General");
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_profile_is_kept_as_draft() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        session.start();

        let edited = BrandProfile {
            brand_name: "Acme".to_string(),
            what_i_do: "Taxes for freelancers".to_string(),
            realism_range: 80,
            ..Default::default()
        };
        assert!(session.save_profile(edited.clone()).await.is_err());
        assert_eq!(session.draft_profile(), edited);
        assert_eq!(session.profile(), &BrandProfile::default());

        // Cancelling drops the rejected edit
        session.cancel_profile();
        assert_eq!(session.draft_profile(), BrandProfile::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_only_from_request_form() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        assert_eq!(session.screen(), Screen::Welcome);
        assert_eq!(
            session.generate(request("tax", Some(HERO))).unwrap_err(),
            ValidationError::NotOnRequestForm
        );
        assert!(session.result().is_none());
        assert_eq!(session.screen(), Screen::Welcome);

        session.start();
        session.save_profile(acme()).await?;
        session.generate(request("tax", Some(HERO)))?;
        // Already on the result screen
        assert_eq!(
            session.generate(request("other", Some(HERO))).unwrap_err(),
            ValidationError::NotOnRequestForm
        );
        assert!(session.result().is_some_and(|r| r.prompt_text.contains("TOPIC: tax.")));
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_then_back_discards_result() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        session.start();
        session.save_profile(acme()).await?;

        let content = session.generate(request("tax, filing", Some(HERO)))?;
        assert!(content.prompt_text.contains("TOPIC: tax, filing."));
        assert_eq!(session.screen(), Screen::ShowingResult);

        assert_eq!(session.back(), Screen::EditingRequest);
        assert!(session.result().is_none());

        // The form comes back pre-filled with the previous request
        let draft = session.draft_request().await;
        assert_eq!(draft.keywords, "tax, filing");
        Ok(())
    }

    #[tokio::test]
    async fn test_draft_request_uses_last_hero() -> Result<()> {
        let session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        assert_eq!(session.draft_request().await.hero_image_base64, None);

        session.remember_hero(HERO).await?;
        assert_eq!(session.draft_request().await.hero_image_base64.as_deref(), Some(HERO));
        Ok(())
    }

    #[tokio::test]
    async fn test_dispatch_without_result_or_url_is_refused() -> Result<()> {
        let mut session = WizardSession::open(Config::default(), Arc::new(MemoryStore::new())).await?;
        let err = session.dispatch(WebhookMode::Test).await.unwrap_err();
        assert!(err.is_validation());

        session.start();
        session.save_profile(acme()).await?;
        session.generate(request("tax", Some(HERO)))?;
        let err = session.dispatch(WebhookMode::Test).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(session.dispatch_state(), &DispatchState::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_webhook_url_edit_resets_dispatch_state() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        let mut session = WizardSession::open(Config::default(), storage.clone()).await?;
        session.start();
        session.save_profile(acme()).await?;
        session.generate(request("tax", Some(HERO)))?;

        // Nothing listens on this port, so the attempt ends in a transport error
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        session.set_webhook_url(&format!("http://{}/webhook/abc", addr)).await?;
        assert!(session.dispatch(WebhookMode::Production).await.is_err());
        assert!(matches!(session.dispatch_state(), DispatchState::Error(_)));

        session.set_webhook_url("https://n8n.example.com/webhook/other").await?;
        assert_eq!(session.dispatch_state(), &DispatchState::Idle);

        let reopened = WizardSession::open(Config::default(), storage).await?;
        assert_eq!(reopened.webhook_url(), "https://n8n.example.com/webhook/other");
        Ok(())
    }

    #[tokio::test]
    async fn test_export_writes_record() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config = Config {
            output_folder: temp_dir.path().to_string_lossy().to_string(),
            ..Config::default()
        };
        let mut session = WizardSession::open(config, Arc::new(MemoryStore::new())).await?;
        assert!(session.export().await.is_err());

        session.start();
        session.save_profile(acme()).await?;
        session.generate(request("tax", Some(HERO)))?;
        let path = session.export().await?;

        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        assert_eq!(value["brand"]["name"], "Acme");
        assert_eq!(value["request"]["heroImageBase64"], HERO);
        Ok(())
    }
}
