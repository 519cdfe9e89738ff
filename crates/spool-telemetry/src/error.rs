//! Error types for telemetry operations.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// Log format string was not recognised.
    #[error("unknown log format")]
    UnknownFormat {
        /// Offending input.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;

    #[test]
    fn subscriber_install_error_exposes_source() {
        let first = tracing_subscriber::registry().try_init();
        let second = tracing_subscriber::registry().try_init();
        let Some(source) = first.err().or_else(|| second.err()) else {
            return;
        };
        let err = TelemetryError::SubscriberInstall { source };
        assert_eq!(err.to_string(), "failed to install tracing subscriber");
        assert!(err.source().is_some());
    }
}
