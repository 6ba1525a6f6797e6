//! Bot configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file,
//! then `REFUND_BOT_*` environment variables.
//!
//! ```toml
//! max_conversation_turns = 10
//! customer_data_file = "data/customer_data.json"
//! conversations_dir = "logs/conversations"
//! graph_file = "graphs/custom.yaml"
//! debug_mode = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChatError, ChatResult};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "refund-bot.toml";

const ENV_PREFIX: &str = "REFUND_BOT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// User messages allowed before the conversation must be reset
    pub max_conversation_turns: u32,
    pub customer_data_file: PathBuf,
    /// Where exported conversations are written
    pub conversations_dir: PathBuf,
    /// YAML graph to use instead of the bundled refund graph
    pub graph_file: Option<PathBuf>,
    pub debug_mode: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_conversation_turns: 10,
            customer_data_file: PathBuf::from("data/customer_data.json"),
            conversations_dir: PathBuf::from("logs/conversations"),
            graph_file: None,
            debug_mode: true,
        }
    }
}

impl BotConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `refund-bot.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> ChatResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ChatResult<Self> {
        debug!("Loading configuration from {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ChatResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from `REFUND_BOT_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override fields from any variable source.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());

        if let Some(turns) = var("MAX_CONVERSATION_TURNS").and_then(|v| v.trim().parse().ok()) {
            self.max_conversation_turns = turns;
        }
        if let Some(file) = var("CUSTOMER_DATA_FILE") {
            self.customer_data_file = PathBuf::from(file);
        }
        if let Some(dir) = var("CONVERSATIONS_DIR") {
            self.conversations_dir = PathBuf::from(dir);
        }
        if let Some(graph) = var("GRAPH_FILE") {
            self.graph_file = Some(PathBuf::from(graph));
        }
        if let Some(debug_mode) = var("DEBUG_MODE") {
            self.debug_mode = debug_mode.trim().eq_ignore_ascii_case("true");
        }
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.max_conversation_turns == 0 {
            return Err(ChatError::Config(
                "max_conversation_turns must be at least 1".to_string(),
            ));
        }
        if self.customer_data_file.as_os_str().is_empty() {
            return Err(ChatError::Config("customer_data_file cannot be empty".to_string()));
        }
        if self.conversations_dir.as_os_str().is_empty() {
            return Err(ChatError::Config("conversations_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Create the customer data and conversation directories.
    pub fn ensure_directories(&self) -> ChatResult<()> {
        if let Some(parent) = self.customer_data_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::create_dir_all(&self.conversations_dir)?;
        Ok(())
    }
}
