// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

mod audio;
mod error;
mod input;

pub use self::audio::{Audio, ChannelMode, RetriggerPolicy};
pub use self::error::ConfigError;
pub use self::input::{Input, Source};

/// Name of the sound directory looked up beside the executable.
const DEFAULT_SOUNDS_DIR: &str = "wav";

/// Prefix for environment overrides, e.g. CLACKBOARD_AUDIO__DEVICE=mock.
const ENV_PREFIX: &str = "CLACKBOARD";

/// The top level soundboard configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Soundboard {
    /// Directory holding the `<kk>-<e>.wav` files.
    sounds: Option<PathBuf>,

    /// Audio output configuration.
    #[serde(default)]
    audio: Audio,

    /// Key event input configuration.
    #[serde(default)]
    input: Input,

    /// Directory of the config file, used to resolve relative paths.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Soundboard {
    /// Loads the configuration from the given YAML file, with environment overrides
    /// layered on top. Without a file, only the environment and defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Soundboard, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let mut soundboard: Soundboard = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        soundboard.base_dir = path.and_then(Path::parent).map(Path::to_path_buf);
        Ok(soundboard)
    }

    /// Returns the sound directory. Relative paths resolve against the config file;
    /// without one, `wav/` next to the executable is used.
    pub fn sounds_dir(&self) -> Result<PathBuf, ConfigError> {
        match (&self.sounds, &self.base_dir) {
            (Some(sounds), Some(base)) if sounds.is_relative() => Ok(base.join(sounds)),
            (Some(sounds), _) => Ok(sounds.clone()),
            (None, _) => default_sounds_dir(),
        }
    }

    /// Overrides the sound directory. The path is used as given.
    pub fn set_sounds(&mut self, sounds: PathBuf) {
        self.sounds = Some(if sounds.is_relative() {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(sounds),
                Err(_) => sounds,
            }
        } else {
            sounds
        });
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the audio configuration for modification.
    pub fn audio_mut(&mut self) -> &mut Audio {
        &mut self.audio
    }

    /// Returns the input configuration.
    pub fn input(&self) -> &Input {
        &self.input
    }
}

/// Returns `wav/` in the directory holding the running executable.
pub fn default_sounds_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe()?;
    match exe.parent() {
        Some(dir) => Ok(dir.join(DEFAULT_SOUNDS_DIR)),
        None => Err(ConfigError::Invalid(format!(
            "executable {} has no parent directory",
            exe.display()
        ))),
    }
}
