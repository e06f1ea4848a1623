use warp::reject::Reject;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired, please refresh")]
    TokenExpired,
    #[error("refresh token expired, please log in again")]
    RefreshExpired,
    #[error("invalid token")]
    TokenInvalid,
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("user not found")]
    NotFound,
    #[error("an account with that username already exists")]
    UsernameAlreadyTaken,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("error during database operation")]
    DatabaseError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to sign token")]
    Signing {
        #[from]
        source: jsonwebtoken::errors::Error,
    },
    #[error("failed to hash password")]
    Hashing {
        #[from]
        source: argon2::Error,
    },
    #[error("failed to collect metrics")]
    Metrics {
        #[from]
        source: prometheus::Error,
    },
    #[error("background task failed")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl Reject for AuthError {}

/// Failures reported by a [`UserDirectory`](crate::UserDirectory) implementation.
#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,
    #[error("username already taken")]
    UsernameTaken,
    #[error("storage backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => AuthError::NotFound,
            DirectoryError::UsernameTaken => AuthError::UsernameAlreadyTaken,
            DirectoryError::Backend(source) => AuthError::DatabaseError { source },
        }
    }
}
