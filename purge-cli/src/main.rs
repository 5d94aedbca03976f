mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "purge")]
#[command(
    about = "Delete every top-level folder in a bucket that holds a deletion marker",
    long_about = None
)]
struct Cli {
    /// JSON file with endpoint, credentials and bucket
    #[arg(short, long, env = "PURGE_CONFIG", default_value = purge_core::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Scan and write the backup file, but delete nothing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "purge_cli=info,purge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    commands::purge::execute(cli.config, cli.dry_run).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_defaults_to_working_directory() {
        let cli = Cli::try_parse_from(["purge"]).unwrap();

        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn accepts_config_path_and_dry_run() {
        let cli = Cli::try_parse_from(["purge", "--config", "/etc/purge.json", "--dry-run"]).unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/purge.json"));
        assert!(cli.dry_run);
    }
}
