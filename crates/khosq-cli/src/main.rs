mod app;
mod args;
mod commands;
mod error;

use clap::Parser;

#[tokio::main]
async fn main() {
    // API keys may live in a .env next to the service
    dotenvy::dotenv().ok();

    if let Err(err) = run().await {
        error::display_anyhow_error(&err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = args::Cli::parse();

    let settings = match &cli.config {
        Some(path) => khosq_core::Settings::load_from(path),
        None => khosq_core::Settings::load(),
    };
    khosq_core::logging::init(&settings.logging);

    let app = app::App::init(settings).await?;

    match cli.command {
        args::Commands::Submit(submit_args) => commands::submit::run(&app, submit_args).await,
        args::Commands::Status { job_id } => commands::status::run(&app, &job_id).await,
        args::Commands::Progress { job_id } => commands::progress::run(&app, &job_id).await,
        args::Commands::Result { job_id, output } => {
            commands::result::run(&app, &job_id, output.as_deref()).await
        }
        args::Commands::Jobs { status, limit } => {
            commands::jobs::run(&app, status.as_deref(), limit).await
        }
        args::Commands::Retry { job_id } => commands::retry::run(&app, &job_id).await,
        args::Commands::Cancel { job_id } => commands::cancel::run(&app, &job_id).await,
        args::Commands::Delete { job_id } => commands::delete::run(&app, &job_id).await,
        args::Commands::Worker => commands::worker::run(&app).await,
        args::Commands::Janitor => commands::janitor::run(&app).await,
        args::Commands::Config { path } => commands::config::run(&app, path),
    }
}
