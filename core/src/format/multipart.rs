//! `multipart/form-data` encoder.
//!
//! Each leaf of the flattened value becomes one part named by its dotted
//! path. Binary leaves become file parts whose MIME type is sniffed from the
//! leading magic byte. A fresh boundary is generated per encoder, so one
//! encoder should serve exactly one request.

use serde::Serialize;
use uuid::Uuid;

use super::plain::TextEncoding;
use super::tree::{self, Leaf};
use crate::error::EncodeError;

const FORMAT: &str = "multipart/form-data";

/// MIME type inferred from the first byte of a binary payload.
pub fn mime_type(data: &[u8]) -> &'static str {
    match data.first() {
        Some(0xFF) => "image/jpeg",
        Some(0x89) => "image/png",
        Some(0x47) => "image/gif",
        Some(0x49) | Some(0x4D) => "image/tiff",
        Some(0x25) => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
    encoding: TextEncoding,
}

impl MultipartEncoder {
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            boundary: format!("Boundary-{}", Uuid::new_v4()),
            encoding,
        }
    }

    /// Uses a fixed boundary instead of a random one.
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        let pairs = tree::flatten(tree::to_node(value)?, FORMAT, &|key| key.to_string())?;

        let mut body = Vec::new();
        for (name, leaf) in pairs {
            match leaf {
                Leaf::Text(text) => self.text_part(&mut body, &name, &text)?,
                Leaf::Bytes(data) => self.file_part(&mut body, &name, &data)?,
            }
        }
        body.extend(self.encoding.encode(&format!("--{}--\r\n", self.boundary))?);
        Ok(body)
    }

    fn text_part(&self, body: &mut Vec<u8>, name: &str, text: &str) -> Result<(), EncodeError> {
        let name = quoted(name);
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n",
            self.boundary
        );
        body.extend(self.encoding.encode(&head)?);
        body.extend(self.encoding.encode(text)?);
        body.extend_from_slice(b"\r\n");
        Ok(())
    }

    fn file_part(&self, body: &mut Vec<u8>, name: &str, data: &[u8]) -> Result<(), EncodeError> {
        let name = quoted(name);
        let mime = mime_type(data);
        let extension = mime.rsplit('/').next().unwrap_or("bin");
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.{extension}\"\r\nContent-Type: {mime}\r\n\r\n",
            self.boundary
        );
        body.extend(self.encoding.encode(&head)?);
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// Escapes a `Content-Disposition` parameter value the way browsers do:
/// `"`, CR and LF become percent escapes so the value stays one quoted
/// string on one line.
fn quoted(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}
