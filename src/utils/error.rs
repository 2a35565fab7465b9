use thiserror::Error;

/// Faults of the serial link to the actuator.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("serial device {device} unavailable: {reason}")]
    Unavailable { device: String, reason: String },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no serial connection established")]
    NotConnected,
}

/// Faults while reading the token hash file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("token file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read token file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SphincterError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Token file error: {0}")]
    TokenFile(#[from] LoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP server error: {message}")]
    Server { message: String },
}

impl SphincterError {
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SphincterError::Link(_) => {
                "Check that the actuator is plugged in and the device path and permissions are correct"
            }
            SphincterError::TokenFile(_) => {
                "Create the token file with the token issuance tool or point --hashfile at it"
            }
            SphincterError::Io(_) => "Check file permissions and available disk space",
            SphincterError::Config { .. }
            | SphincterError::InvalidConfigValue { .. }
            | SphincterError::MissingConfig { .. } => {
                "Fix the configuration file or command line arguments"
            }
            SphincterError::Http(_) => "Check that the hook endpoint is reachable",
            SphincterError::Server { .. } => "Make sure the bind address is free and valid",
        }
    }

    /// Process exit code used by the daemon binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            SphincterError::Config { .. }
            | SphincterError::InvalidConfigValue { .. }
            | SphincterError::MissingConfig { .. } => 2,
            SphincterError::Link(_) | SphincterError::TokenFile(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SphincterError>;
