use anyhow::Context;
use tracing::info;
use xc_app::cli;
use xc_app::config_loader;
use xc_app::probe::Probe;
use xc_app::secrets;

/// Config file read when `XC_CONFIG` is unset
const DEFAULT_CONFIG_PATH: &str = "xc.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    xc_app::tracing_setup::init(tracing::Level::INFO);

    let Some(args) = cli::probe_args() else {
        eprintln!("{}", cli::USAGE);
        std::process::exit(2);
    };

    let config = match std::env::var("XC_CONFIG") {
        Ok(path) => config_loader::load_config(&path).with_context(|| format!("failed to load config from {path}"))?,
        Err(_) if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => config_loader::load_or_default(DEFAULT_CONFIG_PATH),
        Err(_) => config_loader::load_env_config().context("invalid XC_ environment overrides")?,
    };

    let secrets = match &config.secrets_path {
        Some(path) => Some(secrets::load_secrets_file(path).with_context(|| format!("failed to load secrets from {path}"))?),
        None => None,
    };

    info!(exchange = %args.exchange, endpoint = %args.endpoint, "Probing");

    let probe = Probe::new(config, secrets);
    let body = probe.run(&args).await?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}
