use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The user-facing input a [`ValidationError`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Files,
    Kind,
    Gain,
    Width,
    Height,
    Fit,
    Profile,
    OutputDir,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Files => "files",
            Field::Kind => "kind",
            Field::Gain => "gain",
            Field::Width => "width",
            Field::Height => "height",
            Field::Fit => "fit",
            Field::Profile => "profile",
            Field::OutputDir => "output",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid {field}: {msg}")]
pub struct ValidationError {
    pub field: Field,
    pub msg: String,
}

impl ValidationError {
    pub fn for_field(field: Field, msg: &str) -> Self {
        ValidationError {
            field,
            msg: String::from(msg),
        }
    }

    pub fn for_file(path: &Path, msg: &str) -> Self {
        ValidationError {
            field: Field::Files,
            msg: format!("{:?} {}", path, msg),
        }
    }
}

/// Failure of a single engine run.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The engine could not be started at all. No later request can succeed
    /// either, so this aborts the batch.
    #[error("unable to start {program:?}: {source}")]
    Invocation {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}", describe_exit(.code, .stderr))]
    Execution { code: Option<i32>, stderr: String },
    #[error("{path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cancelled")]
    Cancelled,
}

impl TranscodeError {
    pub fn filesystem(path: &Path, source: io::Error) -> Self {
        TranscodeError::Filesystem {
            path: PathBuf::from(path),
            source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TranscodeError::Invocation { .. })
    }
}

fn describe_exit(code: &Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("ffmpeg exited with {}", code),
        None => String::from("ffmpeg was terminated by a signal"),
    };
    match stderr.trim() {
        "" => status,
        snippet => format!("{}: {}", status, snippet),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum RunnerError {
    #[error("a batch is already running")]
    AlreadyRunning,
}
