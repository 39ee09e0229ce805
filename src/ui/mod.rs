use anyhow::Result;
use inquire::{Confirm, CustomType, InquireError, MultiSelect, Select, Text};
use std::path::Path;

use crate::core::state::{
    BrandProfile, ContentRequest, Cta, Format, Goal, Intent, Length, Mode, Platform, SalesLevel, Tone,
    ValidationError, VisualStyle, PILLARS, PLATFORM_TAGS,
};
use crate::core::wizard::Screen;
use crate::services::dispatch::{DispatchError, WebhookMode};
use crate::services::workflow::WizardSession;
use crate::utils::image::ImageLoader;

const MENU_NEW_PROFILE: &str = "Set up a new brand profile";
const MENU_CONTENT: &str = "Create content with the saved profile";
const MENU_QUIT: &str = "Quit";

const RESULT_EXPORT: &str = "Download JSON";
const RESULT_SEND: &str = "Send to webhook";
const RESULT_BACK: &str = "Back";

/// How a screen that returned an error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// Esc on a prompt.
    Cancelled,
    /// Ctrl-C on a prompt.
    Interrupted,
    /// The terminal itself is unusable.
    Fatal,
    /// Anything else: report it and show the screen again.
    Recoverable,
}

fn classify(e: &anyhow::Error) -> Failure {
    match e.downcast_ref::<InquireError>() {
        Some(InquireError::OperationCanceled) => Failure::Cancelled,
        Some(InquireError::OperationInterrupted) => Failure::Interrupted,
        Some(InquireError::NotTTY) | Some(InquireError::IO(_)) => Failure::Fatal,
        _ => Failure::Recoverable,
    }
}

/// Where Esc leads from each screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelAction {
    Quit,
    LeaveProfile,
    Stay,
    LeaveResult,
}

fn on_cancel(screen: Screen) -> CancelAction {
    match screen {
        Screen::Welcome => CancelAction::Quit,
        Screen::EditingProfile => CancelAction::LeaveProfile,
        Screen::EditingRequest => CancelAction::Stay,
        Screen::ShowingResult => CancelAction::LeaveResult,
    }
}

/// Drives the session until the user quits, one terminal screen per wizard state.
pub async fn run(session: &mut WizardSession, images: &dyn ImageLoader) -> Result<()> {
    loop {
        let screen = session.screen();
        let step = match screen {
            Screen::Welcome => welcome(session),
            Screen::EditingProfile => edit_profile(session, images).await,
            Screen::EditingRequest => edit_request(session, images).await,
            Screen::ShowingResult => show_result(session).await,
        };
        let e = match step {
            Ok(true) => continue,
            Ok(false) => return Ok(()),
            Err(e) => e,
        };
        match classify(&e) {
            Failure::Interrupted => return Ok(()),
            Failure::Fatal => return Err(e),
            Failure::Recoverable => println!("  ! {:#}", e),
            Failure::Cancelled => match on_cancel(screen) {
                CancelAction::Quit => return Ok(()),
                CancelAction::LeaveProfile => {
                    session.cancel_profile();
                }
                CancelAction::Stay => println!("  (Ctrl-C quits)"),
                CancelAction::LeaveResult => {
                    session.back();
                }
            },
        }
    }
}

fn welcome(session: &mut WizardSession) -> Result<bool> {
    println!("\nAI Content Creator: define your brand once, generate prompts on demand.");

    let mut options = vec![MENU_NEW_PROFILE];
    if session.has_saved_profile() {
        options.push(MENU_CONTENT);
    }
    options.push(MENU_QUIT);

    match Select::new("What would you like to do?", options).prompt()? {
        MENU_NEW_PROFILE => {
            session.start();
        }
        MENU_CONTENT => {
            session.go_to_content();
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn pick<T: Copy + PartialEq + std::fmt::Display>(prompt: &str, all: &[T], current: T) -> Result<T> {
    let cursor = all.iter().position(|v| *v == current).unwrap_or(0);
    Ok(Select::new(prompt, all.to_vec()).with_starting_cursor(cursor).prompt()?)
}

fn text(prompt: &str, current: &str) -> Result<String> {
    Ok(Text::new(prompt).with_initial_value(current).prompt()?)
}

/// Asks for an image path; an empty answer keeps `current`.
async fn ask_image(prompt: &str, current: Option<String>, images: &dyn ImageLoader) -> Result<Option<String>> {
    loop {
        let help = if current.is_some() {
            "Leave empty to keep the current image"
        } else {
            "Path to a png, jpg, gif, webp, svg or bmp file"
        };
        let path = Text::new(prompt).with_help_message(help).prompt()?;
        let path = path.trim();
        if path.is_empty() {
            return Ok(current);
        }
        match images.load(Path::new(path)).await {
            Ok(uri) => return Ok(Some(uri)),
            Err(e) => println!("  ! {}", e),
        }
    }
}

async fn edit_profile(session: &mut WizardSession, images: &dyn ImageLoader) -> Result<bool> {
    println!("\n== Brand base configuration ==");
    let mut profile: BrandProfile = session.draft_profile();

    profile.brand_name = text("Brand name:", &profile.brand_name)?;
    profile.logo_base64 = ask_image("Logo image file:", profile.logo_base64.take(), images).await?;
    profile.what_i_do = text("What does the brand do (one line)?", &profile.what_i_do)?;

    let mut services = Vec::with_capacity(profile.services.len());
    for (i, service) in profile.services.iter().enumerate() {
        services.push(text(&format!("Service {}:", i + 1), service)?);
    }
    profile.services = services;

    profile.audience = text("Target audience:", &profile.audience)?;
    profile.tone = pick("Tone:", Tone::ALL, profile.tone)?;
    profile.main_goal = pick("Main goal:", Goal::ALL, profile.main_goal)?;
    profile.visual_style = pick("Visual style:", VisualStyle::ALL, profile.visual_style)?;

    let realism = CustomType::<i64>::new("Realism level (0-100):")
        .with_default(profile.realism_range as i64)
        .prompt()?;
    profile.set_realism(realism);

    profile.no_text_in_images = Confirm::new("No text in images?")
        .with_default(profile.no_text_in_images)
        .prompt()?;

    let selected: Vec<usize> = PLATFORM_TAGS
        .iter()
        .enumerate()
        .filter(|(_, tag)| profile.platforms.iter().any(|p| p == *tag))
        .map(|(i, _)| i)
        .collect();
    let chosen = MultiSelect::new("Active platforms:", PLATFORM_TAGS.to_vec())
        .with_default(&selected)
        .prompt()?;
    for tag in PLATFORM_TAGS {
        let active = profile.platforms.iter().any(|p| p == tag);
        if active != chosen.contains(tag) {
            profile.toggle_platform(tag);
        }
    }

    profile.forbidden_words = text("Forbidden words:", &profile.forbidden_words)?;
    profile.writing_style = text("Writing style:", &profile.writing_style)?;

    if !Confirm::new("Save this brand base?").with_default(true).prompt()? {
        session.cancel_profile();
        return Ok(true);
    }

    // On failure the form stays open, pre-filled with the rejected edit
    if let Err(e) = session.save_profile(profile).await {
        match e.downcast_ref::<ValidationError>() {
            Some(validation) => println!("  ! {}", validation),
            None => println!("  ! Could not save the brand base: {:#}", e),
        }
    }
    Ok(true)
}

async fn edit_request(session: &mut WizardSession, images: &dyn ImageLoader) -> Result<bool> {
    println!("\n== New content for {} ==", session.profile().brand_name);
    if Confirm::new("Edit the brand base first?").with_default(false).prompt()? {
        session.edit_profile();
        return Ok(true);
    }

    let mut request: ContentRequest = session.draft_request().await;

    request.mode = pick("Mode:", Mode::ALL, request.mode)?;
    let pillar_cursor = PILLARS.iter().position(|p| *p == request.pillar).unwrap_or(0);
    request.pillar = Select::new("Content pillar:", PILLARS.to_vec())
        .with_starting_cursor(pillar_cursor)
        .prompt()?
        .to_string();
    request.platform = pick("Platform:", Platform::ALL, request.platform)?;
    request.format = pick("Format:", Format::ALL, request.format)?;
    request.keywords = Text::new("Keywords (comma separated):")
        .with_initial_value(&request.keywords)
        .with_placeholder("e.g. taxes, annual, tips")
        .prompt()?;
    request.intent = pick("Intent:", Intent::ALL, request.intent)?;
    request.cta = pick("Call to action:", Cta::ALL, request.cta)?;
    request.length = pick("Length:", Length::ALL, request.length)?;
    request.sales_level = pick("Sales intensity:", SalesLevel::ALL, request.sales_level)?;

    let date = text("Event date (optional, YYYY-MM-DD):", request.event_date.as_deref().unwrap_or(""))?;
    request.event_date = Some(date.trim().to_string()).filter(|d| !d.is_empty());

    let previous_hero = request.hero_image_base64.clone();
    request.hero_image_base64 = ask_image("Hero image file:", request.hero_image_base64.take(), images).await?;
    if let Some(hero) = request.hero_image_base64.as_deref() {
        if previous_hero.as_deref() != Some(hero) {
            if let Err(e) = session.remember_hero(hero).await {
                println!("  ! Could not remember the hero image: {:#}", e);
            }
        }
    }

    if let Err(e) = session.generate(request) {
        println!("  ! {}", e);
    }
    Ok(true)
}

async fn show_result(session: &mut WizardSession) -> Result<bool> {
    let Some(result) = session.result() else {
        session.back();
        return Ok(true);
    };

    println!("\n== System prompt ==\n{}", result.prompt_text);
    println!("\n== Image prompt ==\n{}", result.prompt_image);
    println!(
        "\n== Export record ==\n{}",
        serde_json::to_string_pretty(&result.final_json)?
    );

    let options = vec![RESULT_EXPORT, RESULT_SEND, RESULT_BACK, MENU_QUIT];
    match Select::new("Next step:", options).prompt()? {
        RESULT_EXPORT => {
            match session.export().await {
                Ok(path) => println!("Saved {}", path.display()),
                Err(e) => println!("  ! Export failed: {:#}", e),
            }
        }
        RESULT_SEND => send(session).await?,
        RESULT_BACK => {
            session.back();
        }
        _ => return Ok(false),
    }
    Ok(true)
}

async fn send(session: &mut WizardSession) -> Result<()> {
    let url = Text::new("Webhook URL:")
        .with_initial_value(session.webhook_url())
        .prompt()?;
    if let Err(e) = session.set_webhook_url(&url).await {
        println!("  ! Not sent. Could not save the webhook URL: {:#}", e);
        return Ok(());
    }

    let modes = vec![WebhookMode::Test, WebhookMode::Production];
    let cursor = if session.default_webhook_mode() == WebhookMode::Production { 1 } else { 0 };
    let labels = vec!["test", "production"];
    let mode = modes[Select::new("Webhook mode:", labels).with_starting_cursor(cursor).raw_prompt()?.index];

    println!("Sending...");
    match session.dispatch(mode).await {
        Ok(()) => println!("Sent."),
        Err(e @ DispatchError::Validation(_)) | Err(e @ DispatchError::InvalidUrl { .. }) => {
            println!("  ! Not sent. {}", e)
        }
        Err(e) => println!("  ! Send failed. {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_errors_are_classified() {
        assert_eq!(classify(&InquireError::OperationCanceled.into()), Failure::Cancelled);
        assert_eq!(classify(&InquireError::OperationInterrupted.into()), Failure::Interrupted);
        assert_eq!(classify(&InquireError::NotTTY.into()), Failure::Fatal);
    }

    #[test]
    fn test_session_errors_are_recoverable() {
        let export = anyhow::anyhow!("Permission denied").context("Failed to write export");
        assert_eq!(classify(&export), Failure::Recoverable);
        assert_eq!(classify(&ValidationError::MissingLogo.into()), Failure::Recoverable);
    }

    #[test]
    fn test_cancel_steps_back_one_screen() {
        assert_eq!(on_cancel(Screen::Welcome), CancelAction::Quit);
        assert_eq!(on_cancel(Screen::EditingProfile), CancelAction::LeaveProfile);
        assert_eq!(on_cancel(Screen::EditingRequest), CancelAction::Stay);
        assert_eq!(on_cancel(Screen::ShowingResult), CancelAction::LeaveResult);
    }
}
