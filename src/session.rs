//! Per-session record of the last completed job, the analog of the browser's
//! session store: only the server timestamp and source type, used to resume
//! audio playback after a restart.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::api::SourceType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub timestamp: Option<String>,
    pub source_type: Option<SourceType>,
}

impl Session {
    /// Directory: ~/.local/share/voice-qa/
    fn dir() -> PathBuf {
        let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("voice-qa");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("session.json")
    }

    /// Load from disk, returning an empty session if missing.
    pub fn load() -> Self {
        match fs::read_to_string(Self::path()) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = Self::dir();
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(), data)?;
        Ok(())
    }

    /// Remove the stored session, if any.
    pub fn wipe() {
        let _ = fs::remove_file(Self::path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trips_through_json() {
        let s = Session {
            timestamp: Some("20240101_120000".into()),
            source_type: Some(SourceType::Upload),
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timestamp.as_deref(), Some("20240101_120000"));
        assert_eq!(back.source_type, Some(SourceType::Upload));
    }

    #[test]
    fn source_type_serializes_lowercase() {
        let json = serde_json::to_string(&SourceType::Recording).unwrap();
        assert_eq!(json, "\"recording\"");
    }
}
