//! cf-bgd: zero-downtime blue-green deploys with smoke tests.
//!
//! # Usage
//!
//! ```text
//! cf-bgd APP_NAME [--smoke-test TEST_SCRIPT] [-f MANIFEST]
//! ```
//!
//! Settings are read from `bgd.toml` in the working directory (or
//! `--config`); flags override the file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use bgd_core::BgdConfig;
use bgd_core::config::parse_duration;
use bgd_deploy::{DeployConfig, DeployOutcome, DeployRequest, Deployer};
use bgd_manifest::ManifestReader;

mod cf;

use cf::CfCli;

#[derive(Parser)]
#[command(
    name = "cf-bgd",
    about = "Zero-downtime deploys with smoke tests",
    version
)]
struct Cli {
    /// Name of the app to deploy.
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
    app_name: String,

    /// Script run against the new version's temporary route; exit 0 passes.
    #[arg(long, value_name = "TEST_SCRIPT")]
    smoke_test: Option<PathBuf>,

    /// Path to the manifest (file or directory). Defaults to ./manifest.yml.
    #[arg(short = 'f', value_name = "MANIFEST")]
    manifest: Option<PathBuf>,

    /// Kill the smoke test after this long, e.g. "90s" or "5m".
    #[arg(long, value_name = "DURATION")]
    smoke_test_timeout: Option<String>,

    /// Configuration file (default: ./bgd.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = BgdConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let deploy_config = deploy_config(&cli, &config)?;

    let request = DeployRequest {
        app_name: cli.app_name,
        manifest_path: cli.manifest.clone(),
        smoke_test: cli.smoke_test,
    };
    let manifest = ManifestReader::new(cli.manifest);
    let mut deployer = Deployer::new(CfCli::new(&config.platform.cf_binary), deploy_config);

    match deployer.deploy(&request, &manifest).await? {
        DeployOutcome::Promoted { app_name, routes } => {
            info!(app = %app_name, routes = routes.len(), "deploy complete");
            Ok(())
        }
        DeployOutcome::Failed { staged_as, reason } => {
            anyhow::bail!("{reason}; new version kept as {staged_as}, live app unchanged")
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,bgd=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Merge command-line overrides into the file configuration.
fn deploy_config(cli: &Cli, config: &BgdConfig) -> anyhow::Result<DeployConfig> {
    let smoke_test_timeout = match &cli.smoke_test_timeout {
        Some(raw) => Some(
            parse_duration(raw).with_context(|| format!("invalid --smoke-test-timeout: {raw}"))?,
        ),
        None => config.smoke_test_timeout()?,
    };
    Ok(DeployConfig {
        version: env!("CARGO_PKG_VERSION").to_string(),
        manifest_policy: config.manifest.on_error,
        smoke_test_timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_plugin_style_arguments() {
        let cli = Cli::parse_from([
            "cf-bgd",
            "app",
            "--smoke-test",
            "./smoke.sh",
            "-f",
            "deploy/manifest.yml",
        ]);
        assert_eq!(cli.app_name, "app");
        assert_eq!(cli.smoke_test, Some(PathBuf::from("./smoke.sh")));
        assert_eq!(cli.manifest, Some(PathBuf::from("deploy/manifest.yml")));
        assert!(!cli.json_logs);
    }

    #[test]
    fn app_name_is_required() {
        assert!(Cli::try_parse_from(["cf-bgd"]).is_err());
        assert!(Cli::try_parse_from(["cf-bgd", ""]).is_err());
    }

    #[test]
    fn flag_timeout_overrides_file() {
        let mut config = BgdConfig::default();
        config.smoke_test.timeout = Some("5m".to_string());

        let cli = Cli::parse_from(["cf-bgd", "app", "--smoke-test-timeout", "30s"]);
        let deploy = deploy_config(&cli, &config).unwrap();
        assert_eq!(deploy.smoke_test_timeout, Some(Duration::from_secs(30)));

        let cli = Cli::parse_from(["cf-bgd", "app"]);
        let deploy = deploy_config(&cli, &config).unwrap();
        assert_eq!(deploy.smoke_test_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let cli = Cli::parse_from(["cf-bgd", "app", "--smoke-test-timeout", "soon"]);
        assert!(deploy_config(&cli, &BgdConfig::default()).is_err());
    }
}
