use crate::{reply::Reply, store::StoreError, upload::UploadError};
use serde::Serialize;
use thiserror::Error;

/// Every way a request can fail. Converting into a [`Reply`] is the single
/// place where failures become HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("No images found")]
    NoImages,

    #[error("Could not read images: {0}")]
    Storage(#[from] StoreError),

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::NoImages | Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Upload(_) | Self::Storage(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    detail: String,
}

impl From<ApiError> for Reply {
    fn from(value: ApiError) -> Self {
        Reply::json(
            value.status(),
            &ErrorDetail {
                detail: value.to_string(),
            },
        )
    }
}
