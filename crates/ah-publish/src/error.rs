use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("invalid target url: {0}")]
    InvalidUrl(String),

    #[error("target url rejected by SSRF guard: {0}")]
    SsrfRejected(String),

    #[error("store error: {0}")]
    Store(#[from] ah_store::StoreError),
}

pub type Result<T> = std::result::Result<T, PublishError>;
