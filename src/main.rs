use std::env;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tx_verifier::{
    fixture::ExpectationRecord,
    node::NodeClient,
    settings::Settings,
    verifier,
};

const SETTINGS_PATH: &str = "Settings.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tx_verifier=info")),
        )
        .try_init();

    let settings = Settings::from_toml(SETTINGS_PATH)
        .with_context(|| format!("Failed to load settings from {SETTINGS_PATH}"))?;
    info!("Loaded configuration: {:?}", settings);

    // First positional argument overrides the configured fixture path.
    let fixture_path = env::args()
        .nth(1)
        .unwrap_or_else(|| settings.fixture.path.clone());

    let expected = ExpectationRecord::from_file(&fixture_path)?;
    info!(
        txid = %expected.txid,
        block_height = expected.block_height,
        "Loaded fixture from {fixture_path}"
    );

    let client = NodeClient::new(&settings.node)?;
    let report = verifier::verify(&client, &expected).await?;

    for result in &report.results {
        match &result.outcome {
            Ok(()) => info!(check = %result.check, "passed"),
            Err(failure) => error!(check = %result.check, "failed: {failure}"),
        }
    }

    if !report.is_success() {
        error!("{report}");
        std::process::exit(1);
    }

    info!(txid = %report.txid, "All checks passed");
    Ok(())
}
