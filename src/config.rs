//! Layered application configuration.
//!
//! Three TOML files are read from one directory, later files winning:
//!
//! | File | Purpose |
//! |---|---|
//! | `config.toml` | shared defaults, committed |
//! | `config.<mode>.toml` | per-[`Mode`] overrides (`dev`, `prod`, `test`) |
//! | `local.toml` | machine-local overrides, not committed |
//!
//! Any of them may be absent. Merging is shallow: a later file that defines
//! `[auth]` replaces the whole `auth` table of an earlier one.
//!
//! ## Keys keel reads itself
//!
//! | Key | Default | Used for |
//! |---|---|---|
//! | `secret` | required when asked for | application secret |
//! | `baseUri` | `/` | prefix stripped before routing |
//! | `listen` | `127.0.0.1:3000` | [`Server::from_config`](crate::Server::from_config) |
//! | `auth.uriSignIn` | none (→ `401`) | redirect target for the `auth` guard |
//! | `database` | none | exposed as a raw table |
//!
//! `base_uri` and `auth.uri_sign_in` are accepted as aliases. When both
//! spellings are present the camelCase one wins.
//!
//! ## Environment
//!
//! `KEEL_MODE` selects the mode for [`Mode::from_env`].

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use toml::{Table, Value};
use tracing::{debug, warn};

use crate::error::Error;

/// Which per-mode override file to load.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Development,
    Production,
    Testing,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "dev",
            Self::Production  => "prod",
            Self::Testing     => "test",
        }
    }

    /// Reads `KEEL_MODE`. Unset means development; an unknown value is
    /// logged and also means development.
    pub fn from_env() -> Self {
        match std::env::var("KEEL_MODE") {
            Ok(raw) => raw.parse().unwrap_or_else(|()| {
                warn!(value = %raw, "unknown KEEL_MODE, using dev");
                Self::Development
            }),
            Err(_) => Self::Development,
        }
    }
}

impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            "test" | "testing"    => Ok(Self::Testing),
            _                     => Err(()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged configuration values.
#[derive(Clone, Debug, Default)]
pub struct Config {
    values: Table,
}

impl Config {
    /// Loads and merges the layer files in `dir` for `mode`.
    pub fn load(dir: impl AsRef<Path>, mode: Mode) -> Result<Self, Error> {
        let dir = dir.as_ref();
        let files = [
            "config.toml".to_owned(),
            format!("config.{mode}.toml"),
            "local.toml".to_owned(),
        ];
        let mut layers = Vec::with_capacity(files.len());
        for name in &files {
            if let Some(layer) = read_layer(&dir.join(name))? {
                layers.push(layer);
            }
        }
        Ok(Self::from_layers(layers))
    }

    /// Parses a single TOML document.
    pub fn parse(source: &str) -> Result<Self, Error> {
        let values = toml::from_str(source).map_err(|source| Error::ConfigParse {
            path: "<inline>".into(),
            source,
        })?;
        Ok(Self { values })
    }

    /// Merges `layers` in order; a later layer replaces top-level keys.
    pub fn from_layers(layers: impl IntoIterator<Item = Table>) -> Self {
        let mut values = Table::new();
        for layer in layers {
            values.extend(layer);
        }
        Self { values }
    }

    /// Looks up a dotted key such as `auth.uriSignIn`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Deserializes the value at `key`. `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.get(key)
            .map(|value| {
                value.clone().try_into().map_err(|source| Error::InvalidConfig {
                    key: key.to_owned(),
                    source,
                })
            })
            .transpose()
    }

    pub fn secret(&self) -> Result<&str, Error> {
        self.get_str("secret")
            .ok_or_else(|| Error::MissingConfig("secret".to_owned()))
    }

    pub fn base_uri(&self) -> &str {
        self.first_str(&["baseUri", "base_uri"]).unwrap_or("/")
    }

    pub fn sign_in_uri(&self) -> Option<&str> {
        self.first_str(&["auth.uriSignIn", "auth.uri_sign_in"])
    }

    /// The `[database]` table, untouched. Connecting is up to the application.
    pub fn database(&self) -> Option<&Table> {
        self.get("database")?.as_table()
    }

    pub fn listen(&self) -> Result<SocketAddr, Error> {
        self.get_as("listen").map(|addr| addr.unwrap_or_else(default_listen))
    }

    fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get_str(key))
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn read_layer(path: &Path) -> Result<Option<Table>, Error> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config layer absent");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let table = toml::from_str(&source).map_err(|source| Error::ConfigParse {
        path: path.to_owned(),
        source,
    })?;
    debug!(path = %path.display(), "config layer loaded");
    Ok(Some(table))
}
