//! CLI error display with actionable hints.

use khosq_core::{CoreError, ProviderError};

/// Display an anyhow error, with hints when the cause is a known
/// pipeline error.
pub fn display_anyhow_error(err: &anyhow::Error) {
    if let Some(core_err) = err.downcast_ref::<CoreError>() {
        display_core_error(core_err);
        return;
    }

    eprintln!("Error: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }
}

fn display_core_error(err: &CoreError) {
    match err {
        CoreError::Provider(ProviderError::MissingApiKey { provider }) => {
            eprintln!("Error: No API key configured for {provider}");
            eprintln!();
            eprintln!("Hint: Set the key in the settings file (khosq config --path)");
            eprintln!("      or export the provider's environment variable, e.g.:");
            eprintln!("        export GEMINI_API_KEY=...");
        }

        CoreError::Provider(ProviderError::RateLimited { provider, .. }) => {
            eprintln!("Error: Rate limit exceeded for {provider}");
            eprintln!();
            eprintln!("Hint: Wait a few minutes, lower the provider's rpm_limit in the");
            eprintln!("      settings, or submit with a different --provider.");
        }

        CoreError::Provider(ProviderError::NotFound(name)) => {
            eprintln!("Error: Unknown provider '{name}'");
            eprintln!();
            eprintln!("Hint: Available providers: gemini, elevenlabs, openai, wav-am, hispeech");
        }

        CoreError::Media(media_err) => {
            eprintln!("Error: {media_err}");
            eprintln!();
            eprintln!("Hint: Make sure ffmpeg and ffprobe are installed and the file");
            eprintln!("      is a playable audio or video container.");
        }

        CoreError::Validation(msg) => {
            eprintln!("Error: {msg}");
        }

        CoreError::NotFound(msg) => {
            eprintln!("Error: {msg}");
            eprintln!();
            eprintln!("Hint: List known jobs with: khosq jobs");
        }

        other => {
            eprintln!("Error: {other}");
        }
    }
}
