use anyhow::Result;
use std::sync::Arc;

use brandprompt::core::config::Config;
use brandprompt::core::io::FileStore;
use brandprompt::services::workflow::WizardSession;
use brandprompt::ui;
use brandprompt::utils::image::FileImageLoader;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load config (defaults when config.yml is absent)
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Err(e);
        }
    };

    config.ensure_directories()?;

    // 2. Open the persisted profile; a usable one skips straight to content creation
    let storage = Arc::new(FileStore::new(&config.storage_folder));
    let images = FileImageLoader::new(config.max_image_bytes);
    let mut session = WizardSession::open(config, storage).await?;

    // 3. Run the wizard
    ui::run(&mut session, &images).await?;

    Ok(())
}
