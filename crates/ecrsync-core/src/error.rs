use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid image tag mutability: {0}")]
    InvalidTagMutability(String),
}
