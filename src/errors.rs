//! Workflow-boundary error taxonomy.
//!
//! Internals propagate `anyhow` errors with context; these variants exist so
//! the CLI and the run log can tell a misconfiguration from an upstream
//! failure from a lock conflict. Malformed annotation or date text is never
//! an error at all: parsers recover with empty values and a warning token.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChessTrackError {
    /// Required configuration is missing or unusable. Fatal for the run.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream API kept failing after the retry ceiling.
    #[error("network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// Another sync/rebuild run already holds the run lock.
    #[error("another run is already in progress")]
    LockContention,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_display() {
        let e = ChessTrackError::Network {
            status: Some(429),
            message: "rate limited".to_string(),
        };
        assert_eq!(e.to_string(), "network error (HTTP 429): rate limited");

        let e = ChessTrackError::Network {
            status: None,
            message: "timed out".to_string(),
        };
        assert_eq!(e.to_string(), "network error: timed out");
    }
}
