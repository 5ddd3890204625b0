use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fit_mode::FitMode;
use crate::profile::DeviceProfile;
use crate::request::Selection;

/// Defaults read from a JSON file. Anything given on the command line wins.
///
/// ```json
/// { "output_dir": "converted", "profile": "player", "fit": "cover", "gain_db": 3.0 }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub ffmpeg: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub profile: Option<DeviceProfile>,
    pub fit: Option<String>,
    pub gain_db: Option<f64>,
    pub overwrite: Option<bool>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: PathBuf::from(path),
            source,
        })?;
        Settings::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }

    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Settings::load(p),
            None => Ok(Settings::default()),
        }
    }

    /// Fills every option the command line left out from these settings,
    /// then from the built-in defaults.
    pub fn merge(&self, cli: CommandLine) -> Selection {
        Selection {
            files: cli.files.into_iter().map(PathBuf::from).collect(),
            kind: cli.kind,
            output_dir: cli.output.map(PathBuf::from).or_else(|| self.output_dir.clone()),
            gain_db: cli.gain.or(self.gain_db).unwrap_or(0.0),
            profile: cli.profile
                .or_else(|| self.profile.map(|p| p.to_string()))
                .unwrap_or_else(|| DeviceProfile::default().to_string()),
            width: cli.width,
            height: cli.height,
            fit: cli.fit
                .or_else(|| self.fit.clone())
                .unwrap_or_else(|| FitMode::default().to_string()),
            overwrite: cli.overwrite || self.overwrite.unwrap_or(false),
        }
    }

    /// Engine path from the command line, else from the settings file.
    pub fn ffmpeg_path(&self, cli: Option<&str>) -> Option<PathBuf> {
        cli.map(PathBuf::from).or_else(|| self.ffmpeg.clone())
    }
}

/// Conversion options as typed on the command line, unset ones left `None`.
#[derive(Clone, Debug, Default)]
pub struct CommandLine {
    pub kind: String,
    pub files: Vec<String>,
    pub output: Option<String>,
    pub gain: Option<f64>,
    pub profile: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<String>,
    pub overwrite: bool,
}
