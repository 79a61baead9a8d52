use reqwest::StatusCode;
use thiserror::Error;

/// Error outputs from `ReplayKit`.
#[derive(Debug, Error)]
pub enum ReplayKitError {
    /// The server rejected the credential presented with the request. For
    /// authenticated calls this is the end state after the transport's
    /// single refresh-retry already ran.
    #[error("unauthorized: {detail}")]
    Unauthorized {
        /// Server-provided detail message, or a generic fallback.
        detail: String,
    },
    /// The server answered with a failure status other than 401.
    #[error("api_error ({status}): {detail}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Server-provided detail message, or a generic fallback.
        detail: String,
    },
    /// Transport-level failure before a response was received.
    #[error("network_error ({url}): {error}")]
    Network {
        /// The URL the request was sent to.
        url: String,
        /// Description of the underlying transport failure.
        error: String,
    },
    /// Unexpected error decoding a response body.
    #[error("serialization_error: {error}")]
    Serialization {
        /// Description of the decode failure.
        error: String,
    },
    /// The presented input is not valid for the requested operation.
    #[error("invalid_input ({attribute}): {reason}")]
    InvalidInput {
        /// Name of the offending input.
        attribute: String,
        /// Why the input was rejected.
        reason: String,
    },
}

impl ReplayKitError {
    /// Message suitable for a store's user-facing error slot.
    ///
    /// Server-provided detail text is preferred; transport and decode
    /// failures fall back to their full rendering.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { detail } | Self::Api { detail, .. } => detail.clone(),
            Self::Network { .. } | Self::Serialization { .. } | Self::InvalidInput { .. } => {
                self.to_string()
            }
        }
    }
}

/// Extracts the server's `detail` field from an error body, falling back to
/// a status-derived message.
pub(crate) fn detail_from_body(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| format!("request failed with status {status}"))
}
