//! Unified error type.

use std::path::PathBuf;

/// The error type returned by keel's fallible operations.
///
/// Application-level outcomes (404, 401, redirects) are expressed as
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// bootstrap mistakes (bad routes, unknown middleware names, broken config)
/// and infrastructure failures such as binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("middleware `{0}` is not registered")]
    UnregisteredMiddleware(String),

    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// No route matched. [`Application`](crate::Application) recovers from
    /// this locally by serving its not-found handler.
    #[error("no route matches `{0}`")]
    RouteNotFound(String),

    #[error("config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config key `{0}` is missing")]
    MissingConfig(String),

    #[error("config key `{key}`: {source}")]
    InvalidConfig {
        key: String,
        #[source]
        source: toml::de::Error,
    },
}
