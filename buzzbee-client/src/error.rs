use crate::api::Error as ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend answered, and said no
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never got a proper answer
    #[error(transparent)]
    Transport(#[from] anyhow::Error),

    /// The backend answered something that does not fit the record types
    #[error("malformed response from backend: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Error {
    pub fn permission_denied() -> Error {
        Error::Api(ApiError::PermissionDenied)
    }

    pub fn not_found(what: impl Into<String>) -> Error {
        Error::Api(ApiError::NotFound(what.into()))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::Api(ApiError::PermissionDenied))
    }
}
