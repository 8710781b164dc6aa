use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use passage_protocol::check_command;
use serde::Deserialize;

use crate::action::HttpMethod;
use crate::action::StderrMode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/passage/passage.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    #[serde(default, rename = "listener")]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ListenerConfig {
    pub path: PathBuf,
    #[serde(default = "default_listener_mode")]
    pub mode: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RuleConfig {
    pub command: String,
    #[serde(default)]
    pub uids: Option<Vec<u32>>,
    #[serde(default)]
    pub gids: Option<Vec<u32>>,
    #[serde(default)]
    pub cgroup_prefix: Option<String>,
    #[serde(flatten)]
    pub action: ActionConfig,
}

/// The action half of a `[[rule]]` table, selected by its `action` key.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    FadeChildren {
        address: String,
        #[serde(default)]
        tag: Option<String>,
    },
    FlushHttpCache {
        address: String,
        #[serde(default)]
        tag: Option<String>,
    },
    ExecPipe {
        argv: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        stderr: StderrMode,
        #[serde(default)]
        append_args: bool,
    },
    HttpRequest {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default)]
        query: BTreeMap<String, String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        forward_body: bool,
    },
}

fn default_listener_mode() -> u32 {
    0o666
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.listeners.is_empty() {
            bail!("No listeners configured");
        }
        for rule in &self.rules {
            check_command(&rule.command)
                .with_context(|| format!("rule for command {:?}", rule.command))?;
        }
        Ok(())
    }
}
