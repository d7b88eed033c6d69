use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No source directory selected")]
    MissingSource,

    #[error("No matching files found after filtering")]
    NothingToDigest,

    #[error("A digest run is already in progress")]
    RunInProgress,

    #[error("Cannot access source '{path}': {reason}")]
    SourceAccess { path: PathBuf, reason: String },

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory Creation Error: Path '{path}', Error: {source}")]
    DirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WalkDir Error: {0}")]
    WalkDir(String),

    #[error("Snapshot Error: {0}")]
    Snapshot(String),

    #[error("Pattern Error: {0}")]
    Pattern(String),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Data Loading Error: {0}")]
    DataLoading(String),

    /// A run that ended in an `Error` event, re-raised by a caller.
    #[error("{message}")]
    RunFailed { kind: ErrorKind, message: String },
}

/// Coarse failure class carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Io,
    Empty,
    Argument,
    Busy,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_)
            | AppError::TomlParse(_)
            | AppError::MissingSource
            | AppError::DataLoading(_) => ErrorKind::Config,
            AppError::Json(_)
            | AppError::Io(_)
            | AppError::SourceAccess { .. }
            | AppError::FileRead { .. }
            | AppError::FileWrite { .. }
            | AppError::DirCreation { .. }
            | AppError::WalkDir(_)
            | AppError::Snapshot(_) => ErrorKind::Io,
            AppError::NothingToDigest => ErrorKind::Empty,
            AppError::Pattern(_) | AppError::InvalidArgument(_) => ErrorKind::Argument,
            AppError::RunInProgress => ErrorKind::Busy,
            AppError::RunFailed { kind, .. } => *kind,
        }
    }
}

impl From<walkdir::Error> for AppError {
    fn from(err: walkdir::Error) -> Self {
        AppError::WalkDir(err.to_string())
    }
}

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Pattern(err.to_string())
    }
}

impl From<serde_yml::Error> for AppError {
    fn from(err: serde_yml::Error) -> Self {
        AppError::DataLoading(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_report_their_kind() {
        assert_eq!(AppError::MissingSource.kind(), ErrorKind::Config);
        assert_eq!(AppError::NothingToDigest.kind(), ErrorKind::Empty);
        assert_eq!(AppError::RunInProgress.kind(), ErrorKind::Busy);
        assert_eq!(
            AppError::Snapshot("bad json".to_string()).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            AppError::Pattern("(".to_string()).kind(),
            ErrorKind::Argument
        );
        let failed = AppError::RunFailed {
            kind: ErrorKind::Empty,
            message: "nothing".to_string(),
        };
        assert_eq!(failed.kind(), ErrorKind::Empty);
        assert_eq!(failed.to_string(), "nothing");
    }

    #[test]
    fn kinds_serialize_in_snake_case() {
        assert_eq!(serde_json::to_string(&ErrorKind::Io).unwrap(), "\"io\"");
    }
}
