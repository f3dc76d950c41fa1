//! Configuration management for MailBridge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Discord gateway intent: direct messages
pub const INTENT_DIRECT_MESSAGES: u32 = 1 << 12;

/// Discord gateway intent: message content
pub const INTENT_MESSAGE_CONTENT: u32 = 1 << 15;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Web listener settings
    #[serde(default)]
    pub web: WebConfig,

    /// Discord chat settings
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Gmail settings
    #[serde(default)]
    pub gmail: GmailConfig,

    /// Completion service settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Reply formatting settings
    #[serde(default)]
    pub bot: BotConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Also write logs to `<data_dir>/logs`
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            log_to_file: false,
        }
    }
}

/// Web listener settings (OAuth start/callback and health check)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl WebConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Discord settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token (prefer `bot_token_env` over storing it in the file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Environment variable containing the bot token
    #[serde(default = "default_discord_token_env")]
    pub bot_token_env: String,

    /// REST API base URL
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,

    /// Gateway WebSocket URL
    #[serde(default = "default_discord_gateway_url")]
    pub gateway_url: String,

    /// Gateway intents bitmask
    #[serde(default = "default_discord_intents")]
    pub intents: u32,

    /// User ids allowed to issue commands (empty = everyone)
    #[serde(default)]
    pub allow_from: Vec<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_token_env: default_discord_token_env(),
            api_base: default_discord_api_base(),
            gateway_url: default_discord_gateway_url(),
            intents: default_discord_intents(),
            allow_from: vec![],
        }
    }
}

impl DiscordConfig {
    /// Resolve the bot token from config or environment
    pub fn resolve_token(&self) -> Result<String> {
        self.bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(&self.bot_token_env).ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config(format!("{} is required", self.bot_token_env)))
    }
}

/// Gmail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Path to the Google OAuth client secrets JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Redirect URI registered for the OAuth client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Directory for stored credentials and OAuth state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_dir: Option<PathBuf>,

    /// OAuth scopes to request
    #[serde(default = "default_gmail_scopes")]
    pub scopes: Vec<String>,

    /// How long an OAuth state stays valid (seconds)
    #[serde(default = "default_state_ttl")]
    pub state_ttl_secs: u64,

    /// Gmail REST API base URL
    #[serde(default = "default_gmail_api_base")]
    pub api_base: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            redirect_uri: None,
            token_dir: None,
            scopes: default_gmail_scopes(),
            state_ttl_secs: default_state_ttl(),
            api_base: default_gmail_api_base(),
        }
    }
}

/// Completion service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Environment variable containing the API key
    #[serde(default = "default_ai_key_env")]
    pub api_key_env: String,

    /// Model name
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Max tokens per completion
    #[serde(default = "default_ai_max_tokens")]
    pub max_tokens: u32,

    /// Messages API base URL
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_ai_key_env(),
            model: default_ai_model(),
            max_tokens: default_ai_max_tokens(),
            base_url: default_ai_base_url(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

/// Reply formatting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Soft character budget per outbound chat message
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: usize,

    /// `max_results` used when a listing request names no count
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            chunk_limit: default_chunk_limit(),
            default_max_results: default_max_results(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    get_data_dir()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_discord_token_env() -> String {
    "DISCORD_BOT_TOKEN".to_string()
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_discord_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_discord_intents() -> u32 {
    INTENT_DIRECT_MESSAGES | INTENT_MESSAGE_CONTENT
}

fn default_gmail_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/gmail.modify".to_string()]
}

fn default_state_ttl() -> u64 {
    10 * 60
}

fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_ai_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_ai_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_ai_max_tokens() -> u32 {
    1024
}

fn default_ai_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_ai_timeout() -> u64 {
    30
}

fn default_chunk_limit() -> usize {
    1900
}

fn default_max_results() -> u32 {
    crate::models::DEFAULT_MAX_RESULTS
}

/// Get the data directory (XDG: ~/.local/share/mailbridge)
fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join(crate::APP_NAME)
}

/// Get the config directory (XDG: ~/.config/mailbridge)
fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(crate::APP_NAME)
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        get_config_dir().join("config.toml")
    }

    /// Load configuration from the default path, then apply env overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific path, then apply env overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Loaded configuration from {:?}", path);
            config
        } else {
            info!("No config file found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply the deployment environment variables on top of file values
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup("GMAIL_CREDENTIALS_PATH") {
            self.gmail.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(uri) = lookup("GMAIL_REDIRECT_URI") {
            self.gmail.redirect_uri = Some(uri);
        }
        if let Some(dir) = lookup("GMAIL_TOKEN_DIR") {
            self.gmail.token_dir = Some(PathBuf::from(dir));
        }
        if let Some(host) = lookup("MAILBRIDGE_HOST") {
            self.web.host = host;
        }
        if let Some(port) = lookup("MAILBRIDGE_PORT") {
            match port.parse() {
                Ok(port) => self.web.port = port,
                Err(_) => debug!("Ignoring non-numeric MAILBRIDGE_PORT {:?}", port),
            }
        }
    }

    /// Check values that would make the bridge misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.bot.chunk_limit == 0 {
            return Err(Error::InvalidConfig {
                field: "bot.chunk_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.bot.default_max_results == 0 {
            return Err(Error::InvalidConfig {
                field: "bot.default_max_results".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.web.port == 0 {
            return Err(Error::InvalidConfig {
                field: "web.port".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Directory holding stored credentials and OAuth state
    pub fn token_dir(&self) -> PathBuf {
        self.gmail
            .token_dir
            .clone()
            .unwrap_or_else(|| self.general.data_dir.join("tokens"))
    }

    /// Directory for log files
    pub fn log_dir(&self) -> PathBuf {
        self.general.data_dir.join("logs")
    }
}
