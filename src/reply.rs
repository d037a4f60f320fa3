use anyhow::{Error, Result};
use serde::Serialize;
use std::io::{Cursor, Read};
use tiny_http::{Header, Response, ResponseBox, StatusCode};
use tracing::error;

/// A handler's answer, independent of the connection it will be written to.
pub struct Reply {
    pub status: u16,
    pub content_type: String,
    body: Box<dyn Read + Send>,
    length: Option<usize>,
}

impl Reply {
    pub fn new<T: Into<String>>(status: u16, content_type: T, body: Box<dyn Read + Send>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body,
            length: None,
        }
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let data = serde_json::to_vec(value).unwrap_or_else(|error| {
            error!(%error, "Could not serialize response body");
            b"{}".to_vec()
        });

        let length = data.len();
        Self::new(status, "application/json", Box::new(Cursor::new(data)))
            .with_length(length as u64)
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = usize::try_from(length).ok();
        self
    }

    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.length.unwrap_or_default());
        self.body.read_to_end(&mut bytes)?;

        Ok(bytes)
    }

    pub fn into_response(self) -> Result<ResponseBox> {
        let header = Header::from_bytes("content-type", self.content_type)
            .map_err(|_| Error::msg("Could not create header"))?;

        Ok(Response::new(
            StatusCode(self.status),
            vec![header],
            self.body,
            self.length,
            None,
        ))
    }
}
