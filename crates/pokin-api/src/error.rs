use thiserror::Error;

/// Failure of a backend call. Cloneable so a reply can be fanned out to the
/// view and the notice line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never produced an HTTP response (connection, TLS, body read).
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx status or `success: false` in the envelope.
    #[error("{message} (status {status})")]
    Business { status: u16, message: String },

    /// A 2xx response whose body is not the expected envelope or data shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ApiError::Business {
            status: 404,
            message: "Pohon kinerja tidak ditemukan".to_string(),
        };
        assert_eq!(err.to_string(), "Pohon kinerja tidak ditemukan (status 404)");
        assert!(!err.is_transport());
        assert!(ApiError::Transport("refused".into()).is_transport());
    }
}
