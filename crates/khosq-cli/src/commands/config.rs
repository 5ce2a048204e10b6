//! Show the resolved configuration.

use anyhow::Result;

use crate::app::App;
use khosq_core::Settings;

pub fn run(app: &App, path_only: bool) -> Result<()> {
    if path_only {
        println!("{}", Settings::path().display());
        return Ok(());
    }

    // API keys are redacted; everything else prints as stored
    let mut settings = app.settings.clone();
    for key in [
        &mut settings.providers.gemini.api_key,
        &mut settings.providers.elevenlabs.api_key,
        &mut settings.providers.openai.api_key,
        &mut settings.providers.wav_am.api_key,
        &mut settings.providers.hispeech.api_key,
    ] {
        if !key.is_empty() {
            *key = "********".to_string();
        }
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
