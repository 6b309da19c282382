use anyhow::Result;
use std::path::Path;
use uuid::Uuid;

/// Create a directory and its parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Generate an opaque id with an entity-kind prefix (`t_`, `ts_`, ...).
/// The prefix is a debugging aid; nothing depends on it.
pub fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

/// Current time as an RFC 3339 UTC string, the storage format for all
/// timestamps.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
