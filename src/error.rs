use thiserror::Error;

#[derive(Error, Debug)]
pub enum StgError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Device error: {0}")]
    Device(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StgError {
    /// Caller-supplied data broke a precondition; nothing reached the device
    pub fn is_validation(&self) -> bool {
        matches!(self, StgError::Validation(_))
    }

    /// Failure reported by the device driver itself
    pub fn is_device(&self) -> bool {
        matches!(self, StgError::Device(_))
    }

    /// Failure to find or open the device
    pub fn is_resource(&self) -> bool {
        matches!(self, StgError::DeviceNotFound(_) | StgError::Connection(_))
    }
}

impl From<std::io::Error> for StgError {
    fn from(source: std::io::Error) -> Self {
        StgError::Io {
            source,
            context: "I/O failure".to_string(),
        }
    }
}
