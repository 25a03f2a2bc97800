use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default TTS voice id used by the server when none is supplied.
pub const DEFAULT_VOICE: &str = "v_8eelc901";

const SERVER_ENV: &str = "VOICE_QA_SERVER";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hybrid AI pipeline server.
    pub server_url: String,
    /// TTS voice id sent with recording submissions.
    pub voice: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            voice: DEFAULT_VOICE.into(),
        }
    }
}

impl Config {
    /// Directory: ~/.config/voice-qa/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("voice-qa");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if the file is missing or invalid.
    /// `VOICE_QA_SERVER` overrides the stored server URL.
    pub fn load() -> Self {
        let path = Self::path();
        let mut config: Self = match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(_) => Self::default(),
        };
        if let Ok(url) = std::env::var(SERVER_ENV) {
            if !url.trim().is_empty() {
                config.server_url = url;
            }
        }
        config
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = Self::dir();
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(), data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_server() {
        let c = Config::default();
        assert_eq!(c.server_url, "http://127.0.0.1:5000");
        assert_eq!(c.voice, DEFAULT_VOICE);
    }

    #[test]
    fn config_round_trips_through_json() {
        let c = Config {
            server_url: "http://qa.example:8080".into(),
            voice: "v_custom".into(),
        };
        let json = serde_json::to_string(&c).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server_url, c.server_url);
        assert_eq!(back.voice, c.voice);
    }
}
