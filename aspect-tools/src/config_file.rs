//! Pipeline tunables stored as JSON.
//!
//! Missing fields take their default values, so a file only needs the settings it
//! changes.

use std::path::Path;

use aspect::AspectConfig;

/// Save to a pretty-printed JSON file
pub fn save_config(config: &AspectConfig, path: &Path) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Load from JSON and reject out-of-range values
pub fn load_config(path: &Path) -> Result<AspectConfig, std::io::Error> {
    let json = std::fs::read_to_string(path)?;
    let config: AspectConfig = serde_json::from_str(&json)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    config
        .validate()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    Ok(config)
}
