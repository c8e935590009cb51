/// Errors from calls to the remote admission API.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The remote API answered with a non-2xx status.
    #[error("{operation} failed ({status}): {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },
    /// No response was received (connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// An endpoint suffix did not form a valid URL against the base.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    /// A success response could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// The message to show a user, without operation or status decoration.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Http(_) => "Unable to reach the admission service".into(),
            Self::Url(_) | Self::Decode(_) => "Unexpected response from the admission service".into(),
        }
    }

    /// HTTP status reported by the remote API, if it answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
