//! Local persistence for eventdeck
//!
//! Everything lives under `~/.eventdeck/` (override with `$EVENTDECK_HOME`):
//! the session credential file, config.toml, and logs. JSON writes go
//! through a tmp-file rename so a crash never leaves a half-written file.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn eventdeck_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("EVENTDECK_HOME") {
        return Ok(PathBuf::from(path));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("No home directory"))?;
    Ok(home.join(".eventdeck"))
}

/// Path of the persisted session credential file (bearer token + identity)
pub fn session_path() -> Result<PathBuf> {
    Ok(eventdeck_dir()?.join("session.json"))
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    let file = std::fs::File::create(&tmp_path)?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    std::fs::rename(tmp_path, path)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn remove_file(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}
