use chrono::{DateTime, Utc};

use crate::core::state::{
    BrandProfile, ContentRequest, ExportBrand, ExportPrompts, ExportRecord, ExportRequest,
    GeneratedContent, GenerationMetadata,
};

pub const EXPORT_VERSION: &str = "1.0";
const SUBJECT_FALLBACK: &str = "Brand Image";

/// Splits on commas, trims, drops empties. Order and duplicates are kept.
pub fn normalize_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn build_text_prompt(profile: &BrandProfile, request: &ContentRequest, keywords: &[String]) -> String {
    let event_line = match request.event_date() {
        Some(date) => format!("Mention the event on: {}.", date),
        None => String::new(),
    };

    format!(
        r#"ROLE: Act as {name}, a brand that does "{what}".
TONE: {tone}.
STYLE: {style}.
FORBIDDEN WORDS: {forbidden}.

TASK: Write a {length} {format} for {platform}.
TOPIC: {topic}.
GOAL: {intent} (Sales Level: {sales}).
CTA: {cta}.

CONTEXT:
My audience is {audience}.
{event_line}"#,
        name = profile.brand_name,
        what = profile.what_i_do,
        tone = profile.tone,
        style = profile.writing_style,
        forbidden = profile.forbidden_words,
        length = request.length,
        format = request.format,
        platform = request.platform,
        topic = keywords.join(", "),
        intent = request.intent,
        sales = request.sales_level,
        cta = request.cta,
        audience = profile.audience,
        event_line = event_line,
    )
    .trim()
    .to_string()
}

pub fn build_image_prompt(profile: &BrandProfile, request: &ContentRequest, keywords: &[String]) -> String {
    let subject = keywords.first().map(String::as_str).unwrap_or(SUBJECT_FALLBACK);
    let no_text_line = if profile.no_text_in_images {
        "IMPORTANT: No text in the image."
    } else {
        ""
    };

    format!(
        "Subject: {subject}.\n\
         Style: {style}, Realism Level: {realism}/100.\n\
         {no_text_line}\n\
         Format: {format}.\n\
         Hero Image: [User Provided Image]",
        subject = subject,
        style = profile.visual_style,
        realism = profile.realism_range,
        no_text_line = no_text_line,
        format = request.format,
    )
    .trim()
    .to_string()
}

pub fn build_export_record(
    profile: &BrandProfile,
    request: &ContentRequest,
    keywords: Vec<String>,
    text_prompt: &str,
    image_prompt: &str,
) -> ExportRecord {
    ExportRecord {
        version: EXPORT_VERSION.to_string(),
        brand: ExportBrand {
            name: profile.brand_name.clone(),
            one_liner: profile.what_i_do.clone(),
            audience: profile.audience.clone(),
            tone: profile.tone,
            goal_default: profile.main_goal,
            visual_style: profile.visual_style,
            no_text_in_images: profile.no_text_in_images,
            logo_base64: profile.logo_base64.clone(),
        },
        request: ExportRequest {
            mode: request.mode,
            platform: request.platform,
            format: request.format,
            pillar: request.pillar.clone(),
            keywords,
            intent: request.intent,
            cta: request.cta,
            hero_image_base64: request.hero_image_base64.clone(),
        },
        prompts: ExportPrompts {
            text: text_prompt.to_string(),
            image_or_video: image_prompt.to_string(),
        },
    }
}

/// Builds both prompts and the export record. Inputs are assumed validated.
pub fn assemble(profile: &BrandProfile, request: &ContentRequest, now: DateTime<Utc>) -> GeneratedContent {
    let keywords = normalize_keywords(&request.keywords);
    let prompt_text = build_text_prompt(profile, request, &keywords);
    let prompt_image = build_image_prompt(profile, request, &keywords);
    let final_json = build_export_record(profile, request, keywords, &prompt_text, &prompt_image);

    GeneratedContent {
        prompt_text,
        prompt_image,
        metadata: GenerationMetadata { timestamp: now },
        final_json,
    }
}
