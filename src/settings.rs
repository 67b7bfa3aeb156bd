use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

const DEFAULT_NODE_URL: &str = "http://127.0.0.1:18443";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FIXTURE_PATH: &str = "../out.txt";

/// Configuration for the verifier.
/// Values come from an optional TOML file, overridden by `VERIFIER__*` environment variables.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Settings {
    pub node: NodeSettings,
    pub fixture: FixtureSettings,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub wallet: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FixtureSettings {
    pub path: String,
}

impl NodeSettings {
    /// RPC endpoint, scoped to `wallet` when one is configured.
    pub fn endpoint(&self) -> String {
        let base = self.url.trim_end_matches('/');
        match &self.wallet {
            Some(wallet) => format!("{base}/wallet/{wallet}"),
            None => base.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for NodeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"***")
            .field("wallet", &self.wallet)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file. A missing file is not an error,
    ///   as long as the environment supplies the required credentials.
    pub fn from_toml(path: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("VERIFIER").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("node.url", DEFAULT_NODE_URL)?
            .set_default("node.timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("fixture.path", DEFAULT_FIXTURE_PATH)
    }
}
