//! Error types for Attune.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttuneError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Delivery gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl AttuneError {
    pub fn code(&self) -> i32 {
        match self {
            AttuneError::InvalidRequest(_) => -32602,
            AttuneError::Store(_) => -32002,
            AttuneError::GatewayUnavailable(_) => -32003,
            AttuneError::Session(_) => -32004,
        }
    }

    /// Whether a caller may reasonably try the same operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AttuneError::GatewayUnavailable(_) | AttuneError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            AttuneError::InvalidRequest(String::new()),
            AttuneError::Store(String::new()),
            AttuneError::GatewayUnavailable(String::new()),
            AttuneError::Session(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_gateway_failure_is_transient() {
        assert!(AttuneError::GatewayUnavailable("timeout".into()).is_transient());
        assert!(!AttuneError::InvalidRequest("title".into()).is_transient());
    }
}
