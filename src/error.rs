use serde::Deserialize;
use thiserror::Error;

/// Errors produced while talking to the marketplace API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, see [`ApiError::from_response_body`].
        message: String,
    },
    /// The response body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// An endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// The call needs a signed-in user and there is none.
    #[error("You need to sign in to continue")]
    Unauthenticated,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Builds a [`ApiError::Status`] from a failed response.
    ///
    /// The message is the body's `message`, else its `error`, else a generic line with
    /// the status code.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let message = parsed
            .and_then(|body| {
                body.message
                    .filter(|m| !m.trim().is_empty())
                    .or(body.error.filter(|e| !e.trim().is_empty()))
            })
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        ApiError::Status { status, message }
    }

    /// The text to put in front of the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Request(_) => {
                "Unable to reach the server. Please check your connection and try again."
                    .to_string()
            }
            ApiError::Decode(_) | ApiError::Url(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            ApiError::Unauthenticated => self.to_string(),
        }
    }

    /// Whether the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status: 401, .. } | ApiError::Unauthenticated
        )
    }

    /// The HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
