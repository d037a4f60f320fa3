//! Upload intake: pulling the file part out of a multipart body and saving it
//! under a fresh name.

use crate::store::{ImageStore, StoreError};
use bytes::Bytes;
use futures::{executor::block_on, stream::once};
use multer::{Multipart, parse_boundary};
use std::io::{self, Read};
use thiserror::Error;
use uuid::Uuid;

pub const IMAGE_EXTENSION: &str = "jpg";

/// Form field expected to carry the file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("expected a multipart/form-data body")]
    NotMultipart,

    #[error("no file part in request")]
    MissingFile,

    #[error(transparent)]
    Multipart(#[from] multer::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn generate_filename() -> String {
    format!("{}.{IMAGE_EXTENSION}", Uuid::new_v4())
}

/// Reads the whole request body and returns the bytes of its file part.
///
/// The part named [`FILE_FIELD`] wins; otherwise the first part that carries a
/// file name is used.
pub fn read_file_part(
    content_type: Option<&str>,
    body: &mut dyn Read,
) -> Result<Vec<u8>, UploadError> {
    let boundary = content_type
        .and_then(|content_type| parse_boundary(content_type).ok())
        .ok_or(UploadError::NotMultipart)?;

    let mut buffer = vec![];
    body.read_to_end(&mut buffer)?;

    let stream = once(async move { Ok::<_, io::Error>(Bytes::from(buffer)) });

    block_on(find_file_part(Multipart::new(stream, boundary)))
}

async fn find_file_part(mut multipart: Multipart<'_>) -> Result<Vec<u8>, UploadError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?.to_vec());
        }

        if fallback.is_none() && field.file_name().is_some() {
            fallback = Some(field.bytes().await?.to_vec());
        }
    }

    fallback.ok_or(UploadError::MissingFile)
}

/// Saves `contents` under a newly generated name and returns that name.
pub fn save(store: &dyn ImageStore, contents: &[u8]) -> Result<String, UploadError> {
    let filename = generate_filename();
    store.create(&filename, contents)?;

    Ok(filename)
}

#[cfg(test)]
pub(crate) fn multipart_body(
    boundary: &str,
    field: &str,
    filename: Option<&str>,
    contents: &[u8],
) -> Vec<u8> {
    let disposition = match filename {
        Some(filename) => format!(r#"form-data; name="{field}"; filename="{filename}""#),
        None => format!(r#"form-data; name="{field}""#),
    };

    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: {disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    body
}
