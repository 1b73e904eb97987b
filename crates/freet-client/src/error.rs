use reqwest::StatusCode;
use thiserror::Error;

use freet_types::api::ErrorBody;

/// A failed call. Non-2xx replies are mapped by status; the message is the
/// server's `error` field when it sent one.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("server returned {status}: {message}")]
    Server { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };

        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest(message),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge(message),
            status => Self::Server { status, message },
        }
    }

    /// HTTP status of the reply, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::Conflict(_) => Some(StatusCode::CONFLICT),
            Self::PayloadTooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            Self::Server { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_message_is_kept() {
        let err = ClientError::from_response(
            StatusCode::CONFLICT,
            r#"{"error":"You have already upvoted this freet."}"#,
        );
        assert!(matches!(&err, ClientError::Conflict(m) if m == "You have already upvoted this freet."));
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.to_string(), "You have already upvoted this freet.");
    }

    #[test]
    fn each_status_has_its_variant() {
        let body = r#"{"error":"x"}"#;
        assert!(matches!(ClientError::from_response(StatusCode::BAD_REQUEST, body), ClientError::BadRequest(_)));
        assert!(matches!(ClientError::from_response(StatusCode::UNAUTHORIZED, body), ClientError::Unauthorized(_)));
        assert!(matches!(ClientError::from_response(StatusCode::FORBIDDEN, body), ClientError::Forbidden(_)));
        assert!(matches!(ClientError::from_response(StatusCode::NOT_FOUND, body), ClientError::NotFound(_)));
        assert!(matches!(
            ClientError::from_response(StatusCode::PAYLOAD_TOO_LARGE, body),
            ClientError::PayloadTooLarge(_)
        ));
        assert!(matches!(
            ClientError::from_response(StatusCode::INTERNAL_SERVER_ERROR, body),
            ClientError::Server { status: StatusCode::INTERNAL_SERVER_ERROR, .. }
        ));
    }

    #[test]
    fn non_json_bodies_fall_back() {
        let err = ClientError::from_response(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.to_string(), "server returned 502 Bad Gateway: upstream down");

        let err = ClientError::from_response(StatusCode::NOT_FOUND, "");
        assert!(matches!(&err, ClientError::NotFound(m) if m == "Not Found"));
    }
}
