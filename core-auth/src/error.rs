use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing credential field: {0}")]
    MissingField(String),

    #[error("Invalid credential field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Token unavailable for {principal}: {reason}")]
    TokenUnavailable { principal: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AuthError>;
