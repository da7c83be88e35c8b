use thiserror::Error;

use crate::path::Path;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to compile source {0}: no compiler registered for its extension")]
    UnsupportedSource(Path),

    #[error("Path {0:?} contains a line break, which a ninja script cannot express")]
    InvalidPath(Path),

    #[error("Unsupported platform: no {what} for target {target}")]
    UnsupportedPlatform { what: &'static str, target: String },

    #[error("Configuring sub-project {project} failed with status {code}{}", diagnostic(.stderr))]
    SubprojectFailed {
        project: String,
        code: i64,
        /// What the sub-invocation wrote to stderr.
        stderr: String,
    },

    #[error("Configuration version {found} is not supported (expected {expected})")]
    ConfigVersion { found: u32, expected: u32 },

    #[error("Configuration file is not UTF-8")]
    ConfigEncoding(#[source] std::string::FromUtf8Error),

    #[error("Invalid configuration file")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Unable to encode configuration")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

fn diagnostic(stderr: &str) -> String {
    match stderr.trim_end() {
        "" => String::new(),
        text => format!(":\n{text}"),
    }
}

impl Error {
    /// The process exit status this error should end the generator with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SubprojectFailed { code, .. } => {
                i32::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1)
            }
            _ => 1,
        }
    }
}
