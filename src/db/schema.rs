//! Database schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY,
    id TEXT,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    is_greeting BOOLEAN NOT NULL DEFAULT 0,
    is_error BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Key of the generation settings blob in `kv`
pub const SETTINGS_KEY: &str = "settings";

/// Key of the conversation state blob in `kv`
pub const STATE_KEY: &str = "state";
