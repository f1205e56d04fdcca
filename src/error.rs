use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaffleError>;

#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("lottery upstream error: {0}")]
    Upstream(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unsupported reservation schema: {0}")]
    UnsupportedSchema(String),
    #[error("'{0}' is not a valid two-digit number")]
    InvalidNumber(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("email build error: {0}")]
    Email(#[from] lettre::error::Error),
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
}
