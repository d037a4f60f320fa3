use crate::reply::Reply;
use mime_guess::{Mime, from_path};
use std::io::Read;

/// An image opened from a store, ready to be streamed back to a client.
pub struct StoredImage {
    pub name: String,
    pub mime: Mime,
    pub size: u64,
    contents: Box<dyn Read + Send>,
}

impl StoredImage {
    pub fn new<T: Into<String>>(name: T, size: u64, contents: Box<dyn Read + Send>) -> Self {
        let name = name.into();
        let mime = from_path(&name).first_or_octet_stream();

        Self {
            name,
            mime,
            size,
            contents,
        }
    }

    pub fn into_reply(self) -> Reply {
        Reply::new(200, self.mime.essence_str(), self.contents).with_length(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, empty};

    #[test]
    fn infers_mime_from_extension() {
        let image = StoredImage::new("cat.jpg", 3, Box::new(Cursor::new(vec![1u8, 2, 3])));
        assert_eq!(image.mime.essence_str(), "image/jpeg");

        let image = StoredImage::new("cat.png", 0, Box::new(empty()));
        assert_eq!(image.mime.essence_str(), "image/png");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        let image = StoredImage::new("blob", 0, Box::new(empty()));
        assert_eq!(image.mime.essence_str(), "application/octet-stream");
    }

    #[test]
    fn reply_carries_bytes_and_length() {
        let contents = Box::new(Cursor::new(b"\xff\xd8\xff\xe0".to_vec()));
        let image = StoredImage::new("a.jpg", 4, contents);
        let reply = image.into_reply();

        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "image/jpeg");
        assert_eq!(reply.length(), Some(4));
        assert_eq!(reply.into_bytes().unwrap(), b"\xff\xd8\xff\xe0");
    }
}
