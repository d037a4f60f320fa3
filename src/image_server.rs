use crate::{
    config::Config,
    error::ApiError,
    reply::Reply,
    store::{ImageStore, pick_random},
    upload::{read_file_part, save},
};
use anyhow::{Error, Result};
use rand::rng;
use serde::Serialize;
use std::{io::Read, thread};
use tiny_http::{Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Upload,
    Show,
}

impl Route {
    fn parse(url: &str) -> Option<Self> {
        match url.split('?').next().unwrap_or_default().trim_matches('/') {
            "upload" => Some(Self::Upload),
            "show" => Some(Self::Show),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
}

pub struct ImageServer<S> {
    config: Config,
    store: S,
}

impl<S: ImageStore> ImageServer<S> {
    pub fn new(config: Config, store: S) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn start(&self) -> Result<()> {
        let server = Server::http(self.config.address())
            .map_err(|error| Error::msg(format!("Could not create server: {error}")))?;

        self.serve(&server);

        Ok(())
    }

    /// Handles requests from `server` on the configured number of worker
    /// threads until the server stops yielding requests.
    pub fn serve(&self, server: &Server) {
        info!(
            address = ?server.server_addr().to_ip(),
            images_dir = %self.config.images_dir.display(),
            workers = self.config.workers,
            "Random Image Server started",
        );

        thread::scope(|scope| {
            for _ in 0..self.config.workers {
                scope.spawn(|| {
                    for request in server.incoming_requests() {
                        self.respond(request);
                    }
                });
            }
        });
    }

    fn respond(&self, mut request: Request) {
        let method = request.method().clone();
        let url = request.url().to_string();
        let content_type = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Content-Type"))
            .map(|header| header.value.as_str().to_string());

        let reply = self.handle(&method, &url, content_type.as_deref(), request.as_reader());
        let status = reply.status;

        let response = reply.into_response().unwrap_or_else(|error| {
            error!(%error, "Could not build response");
            Response::empty(500).boxed()
        });

        if let Err(error) = request.respond(response) {
            warn!(%method, %url, %error, "Could not send response");
            return;
        }

        debug!(%method, %url, status, "Request handled");
    }

    /// Routes one request and turns any failure into its error reply.
    pub fn handle(
        &self,
        method: &Method,
        url: &str,
        content_type: Option<&str>,
        body: &mut dyn Read,
    ) -> Reply {
        let result = match (Route::parse(url), method) {
            (Some(Route::Upload), Method::Post) => self.upload(content_type, body),
            (Some(Route::Show), Method::Get) => self.show(),
            (Some(_), _) => Err(ApiError::MethodNotAllowed),
            (None, _) => Err(ApiError::NotFound),
        };

        result.unwrap_or_else(|error| {
            if error.status() >= 500 {
                error!(%method, %url, %error, "Error while processing request");
            } else {
                debug!(%method, %url, %error, "Request rejected");
            }

            error.into()
        })
    }

    fn upload(&self, content_type: Option<&str>, body: &mut dyn Read) -> Result<Reply, ApiError> {
        let contents = read_file_part(content_type, body)?;
        let filename = save(&self.store, &contents)?;

        info!(%filename, size = contents.len(), "Stored upload");

        Ok(Reply::json(200, &UploadResponse { filename }))
    }

    fn show(&self) -> Result<Reply, ApiError> {
        let names = self.store.list()?;
        let name = pick_random(&names, &mut rng()).ok_or(ApiError::NoImages)?;
        let image = self.store.open(name)?;

        debug!(name = %image.name, size = image.size, "Serving image");

        Ok(image.into_reply())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::MemoryStore, upload::multipart_body};
    use serde_json::Value;
    use std::io::{Cursor, empty};

    const CONTENT_TYPE: &str = "multipart/form-data; boundary=b0undary";
    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01";

    fn server() -> ImageServer<MemoryStore> {
        ImageServer::new(Config::default(), MemoryStore::new())
    }

    fn json(reply: Reply) -> Value {
        assert_eq!(reply.content_type, "application/json");
        serde_json::from_slice(&reply.into_bytes().unwrap()).unwrap()
    }

    fn upload(server: &ImageServer<MemoryStore>, contents: &[u8]) -> Reply {
        let body = multipart_body("b0undary", "file", Some("holiday.png"), contents);
        server.handle(&Method::Post, "/upload/", Some(CONTENT_TYPE), &mut Cursor::new(body))
    }

    #[test]
    fn routes() {
        assert_eq!(Route::parse("/upload/"), Some(Route::Upload));
        assert_eq!(Route::parse("/upload"), Some(Route::Upload));
        assert_eq!(Route::parse("/show/?t=123"), Some(Route::Show));
        assert_eq!(Route::parse("/favicon.ico"), None);
        assert_eq!(Route::parse("/"), None);
    }

    #[test]
    fn upload_then_show() {
        let server = server();

        let reply = upload(&server, JPEG);
        assert_eq!(reply.status, 200);

        let value = json(reply);
        let filename = value["filename"].as_str().unwrap();
        assert!(filename.ends_with(".jpg"));
        assert_eq!(server.store().get(filename).unwrap(), JPEG);

        let reply = server.handle(&Method::Get, "/show/", None, &mut empty());
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "image/jpeg");
        assert_eq!(reply.into_bytes().unwrap(), JPEG);
    }

    #[test]
    fn show_with_empty_store_is_not_found() {
        let reply = server().handle(&Method::Get, "/show/", None, &mut empty());

        assert_eq!(reply.status, 404);
        assert_eq!(json(reply)["detail"], "No images found");
    }

    #[test]
    fn show_returns_one_of_the_stored_images() {
        let server = server();
        server.store().create("a.jpg", b"a").unwrap();
        server.store().create("b.jpg", b"b").unwrap();

        for _ in 0..20 {
            let reply = server.handle(&Method::Get, "/show/", None, &mut empty());
            let bytes = reply.into_bytes().unwrap();
            assert!(bytes == b"a" || bytes == b"b");
        }
    }

    #[test]
    fn identical_uploads_are_both_kept() {
        let server = server();

        let first = json(upload(&server, JPEG));
        let second = json(upload(&server, JPEG));

        assert_ne!(first["filename"], second["filename"]);
        assert_eq!(server.store().len(), 2);
    }

    #[test]
    fn malformed_upload_is_server_error() {
        let server = server();
        let reply = server.handle(
            &Method::Post,
            "/upload/",
            Some("application/octet-stream"),
            &mut Cursor::new(JPEG.to_vec()),
        );

        assert_eq!(reply.status, 500);
        assert!(
            json(reply)["detail"]
                .as_str()
                .unwrap()
                .starts_with("Upload failed: ")
        );
        assert!(server.store().is_empty());
    }

    #[test]
    fn wrong_method_and_unknown_path() {
        let server = server();

        let reply = server.handle(&Method::Get, "/upload/", None, &mut empty());
        assert_eq!(reply.status, 405);

        let reply = server.handle(&Method::Post, "/show/", None, &mut empty());
        assert_eq!(reply.status, 405);

        let reply = server.handle(&Method::Get, "/favicon.ico", None, &mut empty());
        assert_eq!(reply.status, 404);
        assert_eq!(json(reply)["detail"], "Not Found");
    }
}
