use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid YouTube URL or video ID: {0}")]
    InvalidUrl(String),

    #[error("no captions available for video {0}")]
    CaptionsUnavailable(String),

    #[error("video not found: {0}")]
    VideoNotFound(String),

    #[error("{service} request failed{}: {message}", status_suffix(.status))]
    Transport {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("could not parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("report input is missing required field: {0}")]
    MissingField(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl Error {
    pub fn transport(service: &'static str, message: impl Into<String>) -> Self {
        Error::Transport {
            service,
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(service: &'static str, status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Error::Transport {
            service,
            status: Some(status.as_u16()),
            message: body.into(),
        }
    }

    pub fn parse(what: &'static str, reason: impl Into<String>) -> Self {
        Error::Parse {
            what,
            reason: reason.into(),
        }
    }

    /// A service answered, but not with anything usable: a consent page
    /// instead of a watch page, truncated XML, undecodable JSON. Classified as
    /// transport so it is retried like a dropped connection.
    pub fn malformed(service: &'static str, reason: impl std::fmt::Display) -> Self {
        Error::Transport {
            service,
            status: None,
            message: format!("malformed response: {reason}"),
        }
    }

    /// Wrap a reqwest failure for the named service. Body decoding errors are
    /// reported as malformed responses.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Error::malformed(service, err);
        }
        Error::Transport {
            service,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Transport failures worth another attempt: connection problems,
    /// timeouts, rate limiting and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { status: None, .. } => true,
            Error::Transport { status: Some(code), .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
