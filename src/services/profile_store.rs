use anyhow::{Context, Result};
use log::{debug, warn};
use std::sync::Arc;

use crate::core::io::{KeyValueStore, BRAND_KEY, LAST_HERO_KEY, WEBHOOK_URL_KEY};
use crate::core::state::BrandProfile;

/// Typed access to the three persisted records.
#[derive(Clone)]
pub struct ProfileStore {
    storage: Arc<dyn KeyValueStore>,
}

impl ProfileStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Never fails: an absent, unreadable or malformed record yields the default profile.
    pub async fn load(&self) -> BrandProfile {
        let raw = match self.storage.get(BRAND_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored brand profile, using defaults");
                return BrandProfile::default();
            }
            Err(e) => {
                warn!("Failed to read stored brand profile: {:#}", e);
                return BrandProfile::default();
            }
        };

        match serde_json::from_str::<BrandProfile>(&raw) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Discarding malformed brand profile: {}", e);
                BrandProfile::default()
            }
        }
    }

    pub async fn save(&self, profile: &BrandProfile) -> Result<()> {
        let json = serde_json::to_string(profile).context("Failed to serialize brand profile")?;
        self.storage
            .set(BRAND_KEY, &json)
            .await
            .context("Failed to save brand profile")
    }

    pub async fn last_hero(&self) -> Option<String> {
        match self.storage.get(LAST_HERO_KEY).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read last hero image: {:#}", e);
                None
            }
        }
    }

    pub async fn save_last_hero(&self, data_uri: &str) -> Result<()> {
        self.storage
            .set(LAST_HERO_KEY, data_uri)
            .await
            .context("Failed to save last hero image")
    }

    pub async fn webhook_url(&self) -> Option<String> {
        match self.storage.get(WEBHOOK_URL_KEY).await {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!("Failed to read webhook URL: {:#}", e);
                None
            }
        }
    }

    pub async fn save_webhook_url(&self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return self.storage.remove(WEBHOOK_URL_KEY).await;
        }
        self.storage
            .set(WEBHOOK_URL_KEY, url.trim())
            .await
            .context("Failed to save webhook URL")
    }
}
