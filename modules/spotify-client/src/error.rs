use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpotifyError>;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Network error: {0}")]
    Network(String),

    /// 401 from the Web API. The bearer token expired or was revoked, so
    /// every further call with it fails the same way.
    #[error("Unauthorized (token expired or invalid): {0}")]
    Unauthorized(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SpotifyError {
    /// Error for a non-success HTTP status and its response body.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => SpotifyError::Unauthorized(message),
            _ => SpotifyError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for SpotifyError {
    fn from(err: reqwest::Error) -> Self {
        SpotifyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SpotifyError {
    fn from(err: serde_json::Error) -> Self {
        SpotifyError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_token_is_unauthorized() {
        let err = SpotifyError::from_status(401, "The access token expired".into());
        assert!(matches!(err, SpotifyError::Unauthorized(ref m) if m == "The access token expired"));
        assert_eq!(
            err.to_string(),
            "Unauthorized (token expired or invalid): The access token expired"
        );
    }

    #[test]
    fn other_statuses_stay_api_errors() {
        let err = SpotifyError::from_status(429, "rate limited".into());
        assert!(matches!(err, SpotifyError::Api { status: 429, .. }));
    }
}
