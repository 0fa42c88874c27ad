//! System prompt loading for the routing agent and the specialists
//!
//! Loading fails soft: a missing or unreadable file yields a fixed fallback
//! prompt so a turn can always proceed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File name of the routing agent's instructions inside the prompts directory
pub const ROUTING_PROMPT_FILE: &str = "RoutingAgent.txt";

pub const ROUTING_FALLBACK_PROMPT: &str =
    "System: You are a helpful routing assistant. Error loading specific instructions.";

/// Fallback used when a specialist prompt cannot be loaded
pub fn technical_fallback_prompt(technology: &str) -> String {
    format!(
        "System: Error loading specific instructions for {technology}. Provide general troubleshooting steps based on the technology name only."
    )
}

/// Source of system prompts
#[async_trait]
pub trait PromptLoader: Send + Sync {
    async fn routing_prompt(&self) -> String;

    /// Loaded fresh on every call; callers must not assume caching
    async fn technical_prompt(&self, technology: &str) -> String;
}

/// Loads prompts from `<dir>/RoutingAgent.txt` and `<dir>/<Technology>.txt`
#[derive(Debug, Clone)]
pub struct FilePromptLoader {
    dir: PathBuf,
}

impl FilePromptLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the prompt for `technology`, if the name is usable as a file stem
    fn technical_path(&self, technology: &str) -> Option<PathBuf> {
        if !is_safe_file_stem(technology) {
            return None;
        }
        Some(self.dir.join(format!("{technology}.txt")))
    }
}

/// Reject names that could escape the prompts directory
fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && name.trim() == name
}

async fn read_prompt(path: &Path) -> std::io::Result<String> {
    tokio::fs::read_to_string(path).await
}

#[async_trait]
impl PromptLoader for FilePromptLoader {
    async fn routing_prompt(&self) -> String {
        let path = self.dir.join(ROUTING_PROMPT_FILE);
        match read_prompt(&path).await {
            Ok(prompt) => {
                tracing::info!(path = %path.display(), chars = prompt.len(), "Loaded routing prompt");
                prompt
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load routing prompt");
                ROUTING_FALLBACK_PROMPT.to_string()
            }
        }
    }

    async fn technical_prompt(&self, technology: &str) -> String {
        let Some(path) = self.technical_path(technology) else {
            tracing::warn!(technology, "Rejected technology name as prompt file stem");
            return technical_fallback_prompt(technology);
        };

        match read_prompt(&path).await {
            Ok(prompt) => {
                tracing::info!(technology, path = %path.display(), "Loaded technical prompt");
                prompt
            }
            Err(e) => {
                tracing::error!(
                    technology,
                    path = %path.display(),
                    error = %e,
                    "Failed to load technical prompt"
                );
                technical_fallback_prompt(technology)
            }
        }
    }
}
