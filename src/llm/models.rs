//! Centralized model definitions
//!
//! User-facing model ids are stable; the wire name is what the provider
//! expects in the request body.

use serde::Serialize;

/// Model definition with metadata
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelDef {
    /// User-facing model ID
    pub id: &'static str,
    /// Name sent to the provider
    pub wire_name: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

/// All supported models
const ALL_MODELS: &[ModelDef] = &[
    ModelDef {
        id: "deepseek-reasoner",
        wire_name: "deepseek-reasoner",
        description: "DeepSeek reasoning model (default)",
    },
    ModelDef {
        id: "deepseek-chat",
        wire_name: "deepseek-chat",
        description: "DeepSeek general chat model",
    },
];

pub const DEFAULT_MODEL: &str = "deepseek-reasoner";

pub fn all_models() -> &'static [ModelDef] {
    ALL_MODELS
}

pub fn find_model(id: &str) -> Option<&'static ModelDef> {
    ALL_MODELS.iter().find(|m| m.id == id)
}

/// Wire name for a model id; unknown ids are passed through verbatim
pub fn wire_name(id: &str) -> &str {
    find_model(id).map_or(id, |m| m.wire_name)
}
