use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Name already used {0}")]
    NameAlreadyUsed(String),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Text must not be empty")]
    EmptyText,

    #[error("Text is {len} characters long, the maximum is {max}")]
    TextTooLong { len: usize, max: usize },
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::NameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::EmptyText => StatusCode::BAD_REQUEST,
            Error::TextTooLong { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "error": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "error": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound(what) => json!({
                "error": format!("{what} not found"),
                "type": "not-found",
                "what": what,
            }),
            Error::InvalidRequest(msg) => json!({
                "error": msg,
                "type": "invalid-request",
            }),
            Error::NameAlreadyUsed(n) => json!({
                "error": "name already used",
                "type": "conflict-name",
                "name": n,
            }),
            Error::NullByteInString(s) => json!({
                "error": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::EmptyText => json!({
                "error": "text must not be empty",
                "type": "empty-text",
            }),
            Error::TextTooLong { len, max } => json!({
                "error": "text is too long",
                "type": "text-too-long",
                "len": len,
                "max": max,
            }),
        })
        .expect("serializing error contents")
    }

    /// Parse an error response. The backend mostly answers `{"error": msg}`
    /// without a `type`, in which case the status code decides the variant.
    pub fn parse(status: http::StatusCode, body: &[u8]) -> anyhow::Result<Error> {
        use http::StatusCode;
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = String::from(
            data.get("error")
                .and_then(|msg| msg.as_str())
                .unwrap_or(""),
        );
        let kind = match data.get("type") {
            None => None,
            Some(t) => Some(
                t.as_str()
                    .ok_or_else(|| anyhow!("error type is not a string"))?,
            ),
        };
        Ok(match kind {
            Some("unknown") => Error::Unknown(message),
            Some("permission-denied") => Error::PermissionDenied,
            Some("not-found") => Error::NotFound(String::from(
                data.get("what")
                    .and_then(|w| w.as_str())
                    .ok_or_else(|| anyhow!("error is a not-found without a subject"))?,
            )),
            Some("invalid-request") => Error::InvalidRequest(message),
            Some("conflict-name") => Error::NameAlreadyUsed(String::from(
                data.get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| anyhow!("error is a name conflict without a name"))?,
            )),
            Some("null-byte") => Error::NullByteInString(String::from(
                data.get("string")
                    .and_then(|s| s.as_str())
                    .ok_or_else(|| anyhow!("error is a null-byte-in-string without a string"))?,
            )),
            Some("empty-text") => Error::EmptyText,
            Some("text-too-long") => {
                let field = |name: &str| {
                    data.get(name)
                        .and_then(|v| v.as_u64())
                        .map(|v| v as usize)
                        .ok_or_else(|| anyhow!("error is a text-too-long without {name}"))
                };
                Error::TextTooLong {
                    len: field("len")?,
                    max: field("max")?,
                }
            }
            Some(_) => return Err(anyhow!("error contents has unknown type")),
            None => match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied,
                StatusCode::NOT_FOUND => Error::NotFound(message),
                StatusCode::CONFLICT => Error::NameAlreadyUsed(message),
                s if s.is_client_error() => Error::InvalidRequest(message),
                _ => Error::Unknown(message),
            },
        })
    }
}
