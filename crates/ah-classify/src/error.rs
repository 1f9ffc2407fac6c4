use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("l2 cache error: {0}")]
    L2Cache(String),

    #[error("llm request error: {0}")]
    Llm(String),

    #[error("llm request timed out")]
    LlmTimeout,
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
