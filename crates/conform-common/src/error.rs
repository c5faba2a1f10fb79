use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConformError {
    #[error("metric already registered: {0}")]
    DuplicateRegistration(String),
    #[error("register collector for {name}: {source}")]
    Registration {
        name: String,
        #[source]
        source: Box<ConformError>,
    },
    #[error("metrics listener failure: {0}")]
    ListenerFailure(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConformError {
    /// Wrap a registration failure with the name of the offending instrument.
    pub fn for_collector(name: &str, source: ConformError) -> Self {
        Self::Registration {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConformError>;
