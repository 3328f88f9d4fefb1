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

/// Why the soundboard configuration couldn't be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file or environment couldn't be read or didn't match the schema.
    #[error("unable to load config: {0}")]
    Load(#[from] config::ConfigError),

    /// A path needed to locate the sound directory couldn't be resolved.
    #[error("unable to resolve path: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
