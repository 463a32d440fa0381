use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Identifiers of the agent and knowledge base this bot fronts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub region: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub knowledge_base_id: Option<String>,
    pub data_source_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub signing_secret: String,
    pub port: u16,
    pub bot_name: String,
    pub agent_api_url: String,
    pub agent_api_token: Option<String>,
    pub agent: AgentSettings,
    pub dedupe_window: Duration,
    pub signature_max_skew: Duration,
    pub agent_timeout: Duration,
    pub max_in_flight_handlers: usize,
    /// Zero disables following a sync job to completion.
    pub sync_monitor: Duration,
}

impl Config {
    /// Reads configuration from the process environment, after loading `.env`
    /// if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let env = Env(vars);
        Ok(Self {
            bot_token: env.required("SLACK_BOT_TOKEN")?,
            signing_secret: env.required("SLACK_SIGNING_SECRET")?,
            port: env.parsed("PORT", 8083)?,
            bot_name: env
                .optional("BOT_NAME")
                .unwrap_or_else(|| "ragbot".to_string()),
            agent_api_url: env.required("AGENT_API_URL")?,
            agent_api_token: env.optional("AGENT_API_TOKEN"),
            agent: AgentSettings {
                region: env.required("AWS_BEDROCK_REGION")?,
                agent_id: env.required("AWS_BEDROCK_AGENT_ID")?,
                agent_alias_id: env.required("AWS_BEDROCK_AGENT_ALIAS_ID")?,
                knowledge_base_id: env.optional("AWS_BEDROCK_KNOWLEDGE_BASE_ID"),
                data_source_id: env.optional("AWS_BEDROCK_DATA_SOURCE_ID"),
            },
            dedupe_window: Duration::from_secs(env.parsed("DEDUPE_WINDOW_SECS", 30)?),
            signature_max_skew: Duration::from_secs(env.parsed("SIGNATURE_MAX_SKEW_SECS", 300)?),
            agent_timeout: Duration::from_secs(env.parsed("AGENT_TIMEOUT_SECS", 60)?),
            max_in_flight_handlers: env.parsed("MAX_IN_FLIGHT_HANDLERS", 64)?,
            sync_monitor: Duration::from_secs(60 * env.parsed::<u64>("SYNC_MONITOR_MINUTES", 0)?),
        })
    }
}

struct Env(HashMap<String, String>);

impl Env {
    fn optional(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value }),
        }
    }
}
