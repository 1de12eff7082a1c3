use crate::config::checker::IssueCollector;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable '{0}' referenced by configuration is not set")]
    MissingEnvVariable(String),

    #[error("invalid value for '{field}': expected {expected}, got '{value}'")]
    InvalidValue {
        field: String,
        expected: String,
        value: String,
    },

    #[error("unknown {kind} config '{name}' referenced by '{referenced_by}'")]
    UnknownReference {
        kind: String,
        name: String,
        referenced_by: String,
    },

    #[error("configuration check failed with {} error(s)", .0.errors.len())]
    Issues(IssueCollector),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
