mod cmd;

use clap::Parser;
use drivefs_core::config::{DriveConfig, ResolutionErrorPolicy};
use drivefs_core::DriveFileSystem;

#[derive(Parser)]
#[command(name = "drivefs", about = "Path-based filesystem over Google Drive")]
struct Cli {
    /// Output as JSON instead of human-readable tables
    #[arg(long, global = true)]
    json: bool,

    /// Drive API key
    #[arg(long, env = "DRIVEFS_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Application name sent as the User-Agent
    #[arg(long, env = "DRIVEFS_APP_NAME", default_value = "drivefs", global = true)]
    app_name: String,

    /// What to do when a path lookup hits a remote error (not-found | propagate)
    #[arg(long, default_value_t = ResolutionErrorPolicy::NotFound, global = true)]
    resolution_errors: ResolutionErrorPolicy,

    /// Entries requested per listing page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    #[command(subcommand)]
    command: cmd::fs::FsCommands,
}

impl Cli {
    fn connect(&self) -> anyhow::Result<DriveFileSystem> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let mut builder = DriveConfig::builder(api_key, &self.app_name)?
            .resolution_errors(self.resolution_errors);
        if let Some(n) = self.page_size {
            builder = builder.page_size(n);
        }
        Ok(DriveFileSystem::from_config(builder.build())?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fs = cli.connect()?;
    cmd::fs::run(&fs, cli.command, cli.json).await
}
