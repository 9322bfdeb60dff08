use clap::Parser;
use cli::Args;
use logging::setup_logging;
use tracing::info;
use yumsync_config::Config;
use yumsync_mirror::{Mirror, SyncSummary};

mod cli;
mod logging;

async fn run(args: &Args) -> miette::Result<SyncSummary> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let mirror = Mirror::new(config)?;
    let summary = mirror.sync_all(args.seed, args.repo.as_deref()).await;
    info!(
        "Run complete: {} synced, {} partial, {} failed",
        summary.synced, summary.partial, summary.failed
    );
    Ok(summary)
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let args = Args::parse();
    setup_logging(&args);

    match run(&args).await {
        Ok(summary) => {
            if summary.has_failures() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err:?}");
            std::process::exit(1);
        }
    }
}
