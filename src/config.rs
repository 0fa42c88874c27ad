//! Service configuration from environment variables

use crate::llm::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use std::path::PathBuf;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub prompts_dir: PathBuf,
    pub db_path: PathBuf,
    pub port: u16,
    /// Extra attempts after a retryable failure; 0 disables the retry wrapper
    pub max_retries: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty("TECH_ROUTER_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".tech-router").join("tech-router.db")
            },
            PathBuf::from,
        );

        Self {
            api_key: non_empty("TECH_ROUTER_API_KEY").or_else(|| non_empty("DEEPSEEK_API_KEY")),
            endpoint: non_empty("TECH_ROUTER_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: non_empty("TECH_ROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompts_dir: non_empty("TECH_ROUTER_PROMPTS_DIR")
                .map_or_else(|| PathBuf::from("AgentTechs"), PathBuf::from),
            db_path,
            port: non_empty("TECH_ROUTER_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            max_retries: non_empty("TECH_ROUTER_MAX_RETRIES")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
        }
    }
}
