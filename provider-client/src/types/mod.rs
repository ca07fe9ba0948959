//! Types used in Batch API requests and responses.
mod batches;
mod common;
mod files;

pub use batches::*;
pub use common::*;
pub use files::*;

impl From<derive_builder::UninitializedFieldError> for crate::error::OpenAIError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        crate::error::OpenAIError::InvalidArgument(value.to_string())
    }
}
