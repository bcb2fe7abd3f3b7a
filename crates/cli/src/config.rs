use fretseq_core::PlaybackSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Where recordings live when neither the config nor the command line says.
pub const DEFAULT_SAMPLE_DIR: &str = "samples/guitar";

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub sample_dir: Option<PathBuf>,
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fretseq").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => Self::default(),
        }
    }

    /// Unreadable files fall back to defaults; out-of-range values are
    /// pulled back onto the option lists.
    pub fn parse(contents: &str) -> Self {
        let config: Self = match toml::from_str(contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring malformed config: {e}");
                Self::default()
            }
        };
        Self {
            playback: config.playback.sanitized(),
            ..config
        }
    }

    pub fn sample_dir(&self) -> PathBuf {
        self.sample_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SAMPLE_DIR))
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        match toml::to_string_pretty(self) {
            Ok(contents) => match fs::write(&path, contents) {
                Ok(()) => log::info!("saved settings to {}", path.display()),
                Err(e) => log::warn!("could not write {}: {e}", path.display()),
            },
            Err(e) => log::warn!("could not serialize config: {e}"),
        }
    }
}
