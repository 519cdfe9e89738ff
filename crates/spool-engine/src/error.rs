//! Error types for remote HTTP operations.

use thiserror::Error;

/// Result alias for remote operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures raised while talking to the engine, the poster provider or a
/// descriptor host.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request could not be sent or the connection failed.
    #[error("remote request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Remote answered with a non-success status.
    #[error("remote returned an error status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Response body did not match the expected shape.
    #[error("remote response could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Request payload could not be encoded.
    #[error("request payload could not be encoded")]
    Encode {
        /// Operation identifier.
        operation: &'static str,
        /// Serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// A URL could not be built or parsed.
    #[error("invalid remote url")]
    InvalidUrl {
        /// Offending input.
        value: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    Client {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Response body exceeded the configured limit.
    #[error("remote response exceeded the size limit")]
    TooLarge {
        /// URL used for the request.
        url: String,
        /// Limit in bytes.
        limit: u64,
    },
}

impl EngineError {
    /// Operation identifier, when the failure is tied to one.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Encode { operation, .. } => Some(*operation),
            Self::InvalidUrl { .. } | Self::Client { .. } | Self::TooLarge { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_constant_and_carry_context() {
        let err = EngineError::Status {
            operation: "torrents.get",
            url: "http://engine/torrents".into(),
            status: 502,
        };
        assert_eq!(err.to_string(), "remote returned an error status");
        assert_eq!(err.operation(), Some("torrents.get"));

        let too_large = EngineError::TooLarge {
            url: "http://tracker/x.torrent".into(),
            limit: 10,
        };
        assert_eq!(too_large.operation(), None);
    }
}
