/// Unified error type for the Flowkit compiler and its front ends.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Structural error: {message}")]
    Structural { message: String },

    #[error("Validation error in '{block}': {message}")]
    Validation { block: String, message: String },

    #[error("Document error: {message}")]
    Document { message: String },

    #[error("Registry error: {message}")]
    Registry { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
