use thiserror::Error;

#[derive(Error, Debug)]
pub enum TargetsError {
    #[error("receiver {0:?} has an invalid name")]
    InvalidName(String),

    #[error("receiver {0:?} has no webhook/chat/incident/email configs")]
    Empty(String),

    #[error("duplicate receiver name {0:?}")]
    Duplicate(String),
}

pub type Result<T> = std::result::Result<T, TargetsError>;
