use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowercase wire-named choice lists used by the profile and request forms.
macro_rules! choice_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(Tone {
    Professional => "professional",
    Friendly => "friendly",
    Witty => "witty",
    Empathetic => "empathetic",
    Authoritative => "authoritative",
    Bold => "bold",
});

choice_enum!(Goal {
    Awareness => "awareness",
    Conversion => "conversion",
    Engagement => "engagement",
    Loyalty => "loyalty",
});

choice_enum!(VisualStyle {
    Minimalist => "minimalist",
    Colorful => "colorful",
    Corporate => "corporate",
    Artistic => "artistic",
    Futuristic => "futuristic",
});

choice_enum!(Platform {
    Instagram => "instagram",
    Facebook => "facebook",
    Tiktok => "tiktok",
    Linkedin => "linkedin",
});

choice_enum!(Format {
    Post => "post",
    Reel => "reel",
    Story => "story",
    Carousel => "carousel",
});

choice_enum!(Intent {
    Informar => "informar",
    Vender => "vender",
    Invitar => "invitar",
    Felicitar => "felicitar",
    Entretener => "entretener",
});

choice_enum!(Cta {
    Dm => "dm",
    Whatsapp => "whatsapp",
    Seguir => "seguir",
    Agendar => "agendar",
    Descargar => "descargar",
});

choice_enum!(Length {
    Short => "short",
    Medium => "medium",
    Long => "long",
});

choice_enum!(SalesLevel {
    Soft => "soft",
    Hard => "hard",
    None => "none",
});

choice_enum!(Mode {
    Instant => "instant",
    Planning => "planning",
});

pub const PLATFORM_TAGS: &[&str] = &["Instagram", "LinkedIn", "Twitter/X", "TikTok", "Facebook", "Blog"];
pub const PILLARS: &[&str] = &["General", "Fiscal", "Automatización", "IA", "Marca", "Comunidad"];

pub const IMAGE_DATA_PREFIX: &str = "data:image/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Upload the brand logo (required)")]
    MissingLogo,
    #[error("Brand name is missing")]
    MissingBrandName,
    #[error("Upload the hero image")]
    MissingHeroImage,
    #[error("Enter at least one keyword")]
    MissingKeywords,
    #[error("Image is larger than the {limit} byte limit ({size} bytes)")]
    ImageTooLarge { size: u64, limit: u64 },
    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),
    #[error("Open the content form before generating")]
    NotOnRequestForm,
}

/// Reads any stored number and pins it to 0..=100.
fn clamp_realism<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(50);
    }
    Ok(value.round().clamp(0.0, 100.0) as u8)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrandProfile {
    pub brand_name: String,
    #[serde(rename = "whatIDo")]
    pub what_i_do: String,
    pub services: Vec<String>,
    pub audience: String,
    pub tone: Tone,
    pub forbidden_words: String,
    pub writing_style: String,
    pub main_goal: Goal,
    pub visual_style: VisualStyle,
    #[serde(deserialize_with = "clamp_realism")]
    pub realism_range: u8,
    pub no_text_in_images: bool,
    pub logo_base64: Option<String>,
    pub platforms: Vec<String>,
}

impl Default for BrandProfile {
    fn default() -> Self {
        Self {
            brand_name: String::new(),
            what_i_do: String::new(),
            services: vec![String::new(), String::new(), String::new()],
            audience: String::new(),
            tone: Tone::Professional,
            forbidden_words: String::new(),
            writing_style: String::new(),
            main_goal: Goal::Awareness,
            visual_style: VisualStyle::Minimalist,
            realism_range: 50,
            no_text_in_images: true,
            logo_base64: None,
            platforms: Vec::new(),
        }
    }
}

impl BrandProfile {
    /// Usable once both a name and a logo are present.
    pub fn is_usable(&self) -> bool {
        !self.brand_name.is_empty() && self.logo_base64.as_deref().is_some_and(|l| !l.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.logo_base64.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingLogo);
        }
        if self.brand_name.is_empty() {
            return Err(ValidationError::MissingBrandName);
        }
        Ok(())
    }

    pub fn set_realism(&mut self, value: i64) {
        self.realism_range = value.clamp(0, 100) as u8;
    }

    /// Adds the tag if absent, removes it if present.
    pub fn toggle_platform(&mut self, tag: &str) {
        if let Some(pos) = self.platforms.iter().position(|p| p == tag) {
            self.platforms.remove(pos);
        } else {
            self.platforms.push(tag.to_string());
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub mode: Mode,
    pub platform: Platform,
    pub format: Format,
    pub pillar: String,
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    pub intent: Intent,
    pub cta: Cta,
    pub length: Length,
    pub sales_level: SalesLevel,
    pub hero_image_base64: Option<String>,
}

impl Default for ContentRequest {
    fn default() -> Self {
        Self {
            mode: Mode::Instant,
            platform: Platform::Instagram,
            format: Format::Post,
            pillar: "General".to_string(),
            keywords: String::new(),
            event_date: None,
            intent: Intent::Informar,
            cta: Cta::Dm,
            length: Length::Medium,
            sales_level: SalesLevel::Soft,
            hero_image_base64: None,
        }
    }
}

impl ContentRequest {
    /// The event date, if one was actually entered.
    pub fn event_date(&self) -> Option<&str> {
        self.event_date.as_deref().filter(|d| !d.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hero_image_base64.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingHeroImage);
        }
        if crate::services::prompt::normalize_keywords(&self.keywords).is_empty() {
            return Err(ValidationError::MissingKeywords);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportBrand {
    pub name: String,
    pub one_liner: String,
    pub audience: String,
    pub tone: Tone,
    pub goal_default: Goal,
    pub visual_style: VisualStyle,
    pub no_text_in_images: bool,
    pub logo_base64: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub mode: Mode,
    pub platform: Platform,
    pub format: Format,
    pub pillar: String,
    pub keywords: Vec<String>,
    pub intent: Intent,
    pub cta: Cta,
    pub hero_image_base64: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportPrompts {
    pub text: String,
    pub image_or_video: String,
}

/// The record that is downloaded or relayed to the webhook.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportRecord {
    pub version: String,
    pub brand: ExportBrand,
    pub request: ExportRequest,
    pub prompts: ExportPrompts,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationMetadata {
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(rename = "prompt_text")]
    pub prompt_text: String,
    #[serde(rename = "prompt_image")]
    pub prompt_image: String,
    pub metadata: GenerationMetadata,
    pub final_json: ExportRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_not_usable() {
        let profile = BrandProfile::default();
        assert!(!profile.is_usable());
        assert_eq!(profile.validate(), Err(ValidationError::MissingLogo));
        assert_eq!(profile.services.len(), 3);
        assert_eq!(profile.realism_range, 50);
        assert!(profile.no_text_in_images);
    }

    #[test]
    fn test_profile_validation_order() {
        let mut profile = BrandProfile {
            logo_base64: Some("data:image/png;base64,AA==".to_string()),
            ..Default::default()
        };
        assert_eq!(profile.validate(), Err(ValidationError::MissingBrandName));
        assert!(!profile.is_usable());

        profile.brand_name = "Acme".to_string();
        assert_eq!(profile.validate(), Ok(()));
        assert!(profile.is_usable());

        profile.logo_base64 = Some(String::new());
        assert_eq!(profile.validate(), Err(ValidationError::MissingLogo));
    }

    #[test]
    fn test_profile_wire_names() {
        let profile = BrandProfile {
            brand_name: "Acme".to_string(),
            what_i_do: "Taxes".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["brandName"], "Acme");
        assert_eq!(json["whatIDo"], "Taxes");
        assert_eq!(json["tone"], "professional");
        assert_eq!(json["mainGoal"], "awareness");
        assert_eq!(json["realismRange"], 50);
        assert_eq!(json["noTextInImages"], true);
        assert!(json["logoBase64"].is_null());
    }

    #[test]
    fn test_partial_profile_record_fills_defaults() {
        let json = r#"{"brandName": "Acme", "tone": "witty"}"#;
        let profile: BrandProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.brand_name, "Acme");
        assert_eq!(profile.tone, Tone::Witty);
        assert_eq!(profile.visual_style, VisualStyle::Minimalist);
        assert_eq!(profile.services.len(), 3);
    }

    #[test]
    fn test_toggle_platform_and_realism_clamp() {
        let mut profile = BrandProfile::default();
        profile.toggle_platform("Instagram");
        profile.toggle_platform("Blog");
        assert_eq!(profile.platforms, vec!["Instagram", "Blog"]);
        profile.toggle_platform("Instagram");
        assert_eq!(profile.platforms, vec!["Blog"]);

        profile.set_realism(250);
        assert_eq!(profile.realism_range, 100);
        profile.set_realism(-3);
        assert_eq!(profile.realism_range, 0);
    }

    #[test]
    fn test_out_of_range_realism_is_clamped_on_load() {
        let json = r#"{"brandName": "Acme", "logoBase64": "data:image/png;base64,AA==", "realismRange": 150}"#;
        let profile: BrandProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.realism_range, 100);
        assert!(profile.is_usable());

        let json = r#"{"brandName": "Acme", "logoBase64": "data:image/png;base64,AA==", "realismRange": 300}"#;
        let profile: BrandProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.realism_range, 100);
        assert_eq!(profile.brand_name, "Acme");
        assert!(profile.is_usable());

        let profile: BrandProfile = serde_json::from_str(r#"{"realismRange": -12}"#).unwrap();
        assert_eq!(profile.realism_range, 0);
        let profile: BrandProfile = serde_json::from_str(r#"{"realismRange": 72.6}"#).unwrap();
        assert_eq!(profile.realism_range, 73);
    }

    #[test]
    fn test_request_validation() {
        let mut request = ContentRequest {
            keywords: "tax".to_string(),
            ..Default::default()
        };
        assert_eq!(request.validate(), Err(ValidationError::MissingHeroImage));

        request.hero_image_base64 = Some("data:image/png;base64,AA==".to_string());
        assert_eq!(request.validate(), Ok(()));

        request.keywords = " , ,,  ".to_string();
        assert_eq!(request.validate(), Err(ValidationError::MissingKeywords));
    }

    #[test]
    fn test_event_date_empty_counts_as_absent() {
        let mut request = ContentRequest::default();
        assert_eq!(request.event_date(), None);
        request.event_date = Some(String::new());
        assert_eq!(request.event_date(), None);
        request.event_date = Some("2025-04-15".to_string());
        assert_eq!(request.event_date(), Some("2025-04-15"));
    }

    #[test]
    fn test_choice_enum_display() {
        assert_eq!(SalesLevel::None.to_string(), "none");
        assert_eq!(Cta::Whatsapp.as_str(), "whatsapp");
        assert_eq!(Tone::ALL.len(), 6);
        assert_eq!(Intent::ALL.len(), 5);
        let parsed: Platform = serde_json::from_str("\"tiktok\"").unwrap();
        assert_eq!(parsed, Platform::Tiktok);
    }
}
