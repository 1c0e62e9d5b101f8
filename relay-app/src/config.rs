//! relaybot configuration loader.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct RelaybotConfig {
    pub assistant: AssistantConfig,
    pub identity: IdentityConfig,
    pub discuss: DiscussConfig,
    #[serde(default)]
    pub livechat: LivechatConfig,
    pub bus: BusConfig,
    #[serde(default)]
    pub bindings: BindingsConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// Master switch for assistant replies across every conversation kind.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    /// Global default assistant id; livechat channels may override it.
    #[serde(default)]
    pub assistant_id: String,
    /// Alternate backend API root (proxies, test servers).
    #[serde(default)]
    pub base_url: Option<String>,
}

/// The synthetic bot participant, provisioned host-side at install time.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub bot_user: String,
    pub bot_partner: String,
    pub bot_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscussConfig {
    #[serde(default = "default_shared_channel_model")]
    pub shared_channel_model: String,
    /// The well-known public assistant channel.
    pub shared_channel_id: String,
}

fn default_shared_channel_model() -> String {
    "discuss.channel".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LivechatConfig {
    #[serde(default)]
    pub channels: HashMap<String, LivechatChannelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LivechatChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Per-channel assistant id; blank falls back to the global default.
    #[serde(default)]
    pub assistant_id: String,
    /// The channel rule carries an assistant-enabled chatbot script.
    #[serde(default)]
    pub chatbot_rule: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Host endpoint that stores a message posted as a given user.
    pub post_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8090".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindingsConfig {
    #[serde(default = "default_bindings_db_path")]
    pub db_path: PathBuf,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            db_path: default_bindings_db_path(),
        }
    }
}

fn default_bindings_db_path() -> PathBuf {
    default_data_dir().join("bindings.sqlite3")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_secs() -> u64 {
    10
}

fn default_backoff_step_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_run_timeout_secs() -> u64 {
    120
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_secs: default_initial_backoff_secs(),
            backoff_step_secs: default_backoff_step_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

impl RelaybotConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;

        let mut cfg: RelaybotConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELAYBOT_API_KEY") {
            if !v.trim().is_empty() {
                self.assistant.api_key = v;
            }
        } else if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            if !v.trim().is_empty() {
                self.assistant.api_key = v;
            }
        }
        if let Ok(v) = std::env::var("RELAYBOT_ASSISTANT_ID") {
            if !v.trim().is_empty() {
                self.assistant.assistant_id = v;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.assistant.enabled {
            if self.assistant.api_key.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "assistant.api_key is required when assistant.enabled = true"
                ));
            }
            if self.assistant.assistant_id.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "assistant.assistant_id is required when assistant.enabled = true"
                ));
            }
        }
        if self.identity.bot_user.trim().is_empty()
            || self.identity.bot_partner.trim().is_empty()
            || self.identity.bot_name.trim().is_empty()
        {
            return Err(anyhow::anyhow!(
                "identity.bot_user, identity.bot_partner and identity.bot_name are required"
            ));
        }
        if self.discuss.shared_channel_id.trim().is_empty() {
            return Err(anyhow::anyhow!("discuss.shared_channel_id is required"));
        }
        if self.bus.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "bus.listen_addr must be a socket address, got {:?}",
                self.bus.listen_addr
            ));
        }
        if self.responder.max_attempts == 0 {
            return Err(anyhow::anyhow!("responder.max_attempts must be > 0"));
        }
        if self.responder.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("responder.poll_interval_secs must be > 0"));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".relaybot").join("config.toml")
}

pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".relaybot").join("data")
}
