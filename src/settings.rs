use crate::controller::REFRESH_INTERVAL;
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default)]
    pub view: ViewSettings,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub endpoint: String,
    pub refresh_ms: u64,
    pub timeout_ms: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            refresh_ms: REFRESH_INTERVAL.as_millis() as u64,
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct WorldSettings {
    pub url: Option<String>,   // URL or local path to a TopoJSON world
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewSettings {
    pub frame_time: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self { frame_time: 0.033 }
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!("ignoring malformed {}: {e}", path.display());
                Self::default()
            }),
            Err(e) => {
                warn!("could not read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netglobe")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.source.refresh_ms, 2500);
        assert_eq!(settings.source.endpoint, "http://localhost:5000");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let file = write("[source]\nendpoint = \"http://10.0.0.5:9000\"\n\n[world]\nurl = \"/tmp/world.json\"\n");
        let settings = Settings::load_from(file.path());
        assert_eq!(settings.source.endpoint, "http://10.0.0.5:9000");
        assert_eq!(settings.source.refresh_ms, 2500);
        assert_eq!(settings.world.url.as_deref(), Some("/tmp/world.json"));
        assert_eq!(settings.view, ViewSettings::default());
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let file = write("[source\nendpoint = ");
        assert_eq!(Settings::load_from(file.path()), Settings::default());
    }
}
