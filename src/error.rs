/// Terminal failure of a single submitted request.
///
/// This is what a [`ResultHandle`](crate::handle::ResultHandle) carries when it
/// did not resolve with a payload. It is `Clone` so a handle can be read any
/// number of times after resolution.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request rejected: dispatcher has been shut down")]
    Rejected,

    #[error("request rejected: dispatch queue is full")]
    Overloaded,

    #[error("request cancelled before completion")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API returned HTTP {code}")]
    HttpStatus { code: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Failures worth resubmitting: connection-level errors, throttling and
    /// server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::HttpStatus { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Malformed(e.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    EnvVar(#[from] EnvVarError),

    #[error("no API key was provided")]
    MissingApiKey,

    #[error("could not start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("cannot request more than {max} players at once (got {got})")]
    TooManyPlayers { max: usize, got: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum EnvVarSource {
    #[error(transparent)]
    Missing(#[from] std::env::VarError),

    #[error("invalid value {value:?}: {reason}")]
    Invalid { value: String, reason: String },
}

#[derive(thiserror::Error, Debug)]
#[error("{source} ({var})")]
pub struct EnvVarError {
    var: String,
    #[source]
    source: EnvVarSource,
}

impl EnvVarError {
    pub fn new(var: &str, source: impl Into<EnvVarSource>) -> Self {
        Self {
            var: var.into(),
            source: source.into(),
        }
    }

    pub fn invalid(var: &str, value: &str, reason: impl ToString) -> Self {
        Self::new(
            var,
            EnvVarSource::Invalid {
                value: value.into(),
                reason: reason.to_string(),
            },
        )
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}
