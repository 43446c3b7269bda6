// Copyright (C) 2021  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

//! INI configuration loading.
//!
//! Mirrors the original `progdn::Config` constructor: three required,
//! top-level keys, no sections. Unknown keys are tolerated since we only
//! ever look the three known ones up.

use std::path::Path;

use thiserror::Error;

use crate::address::{Endpoint, EndpointParseError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Ini {
        path: String,
        #[source]
        source: ini::Error,
    },

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid value for 'listen': {0}")]
    Listen(#[from] EndpointParseError),

    #[error("invalid value for '{key}': {value:?} is not an integer")]
    NotAnInteger { key: &'static str, value: String },
}

/// Immutable, fully-validated configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint the acceptor binds and listens on.
    pub listen: Endpoint,
    /// fwmark applied to every backend socket via `SO_MARK`.
    pub mark: i32,
    /// Routing table id. Loaded and validated but never applied directly;
    /// see DESIGN.md for the rationale preserved from the original source.
    pub table: i32,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path_str = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let ini = ini::Ini::load_from_str(&contents).map_err(|source| ConfigError::Ini {
            path: path_str.clone(),
            source,
        })?;
        let section = ini.general_section();

        let listen = section
            .get("listen")
            .ok_or(ConfigError::MissingKey("listen"))?
            .parse::<Endpoint>()?;
        let mark = Self::parse_int(section, "mark")?;
        let table = Self::parse_int(section, "table")?;

        Ok(Self {
            listen,
            mark,
            table,
        })
    }

    fn parse_int(section: &ini::Properties, key: &'static str) -> Result<i32, ConfigError> {
        let value = section.get(key).ok_or(ConfigError::MissingKey(key))?;
        value
            .trim()
            .parse::<i32>()
            .map_err(|_| ConfigError::NotAnInteger {
                key,
                value: value.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_conf(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("BUG: cannot create temp file");
        file.write_all(contents.as_bytes())
            .expect("BUG: cannot write temp file");
        file
    }

    #[test]
    fn loads_valid_config() {
        let file = write_conf("listen = 0.0.0.0:2201\nmark = 42\ntable = 100\n");
        let config = Config::load(file.path()).expect("BUG: config should load");
        assert_eq!(config.listen.to_string(), "0.0.0.0:2201");
        assert_eq!(config.mark, 42);
        assert_eq!(config.table, 100);
    }

    #[test]
    fn tolerates_unknown_keys() {
        let file = write_conf("listen = 0.0.0.0:2201\nmark = 42\ntable = 100\nfoo = bar\n");
        assert!(Config::load(file.path()).is_ok());
    }

    #[test]
    fn rejects_missing_key() {
        let file = write_conf("listen = 0.0.0.0:2201\nmark = 42\n");
        match Config::load(file.path()) {
            Err(ConfigError::MissingKey("table")) => (),
            other => panic!("BUG: expected MissingKey(\"table\"), got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_integer_mark() {
        let file = write_conf("listen = 0.0.0.0:2201\nmark = nope\ntable = 1\n");
        assert!(Config::load(file.path()).is_err());
    }
}
