use thiserror::Error;

/// Failures surfaced by the outbound client. Messages are safe to show users.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status() {
        let err = ApiError::Http {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed (502): bad gateway");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn timeout_is_detected() {
        let err = ApiError::Timeout("slow".to_string());
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
    }
}
