//! Profile picture hosting.
//!
//! Uploaded files are turned into a `data:` URI and handed to a
//! [`MediaUploader`], which returns the URL stored on the user record.

pub mod cloudinary;

pub use cloudinary::CloudinaryUploader;

use base64ct::{Base64, Encoding};
use std::{future::Future, pin::Pin};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("file is empty")]
    Empty,
    #[error("unsupported media type: {0}")]
    UnsupportedType(String),
    #[error("invalid media configuration: {0}")]
    Config(String),
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl MediaError {
    /// True when the caller sent something unusable, as opposed to the host failing.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Empty | Self::UnsupportedType(_))
    }
}

pub type MediaFuture<'a> = Pin<Box<dyn Future<Output = Result<String, MediaError>> + Send + 'a>>;

pub trait MediaUploader: Send + Sync {
    /// Store the image behind `data_uri` and return its public URL.
    fn upload<'a>(&'a self, data_uri: &'a str) -> MediaFuture<'a>;
}

/// Keeps the data URI itself as the picture URL. Used when no image host is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineMediaUploader;

impl MediaUploader for InlineMediaUploader {
    fn upload<'a>(&'a self, data_uri: &'a str) -> MediaFuture<'a> {
        Box::pin(async move { Ok(data_uri.to_string()) })
    }
}

/// Resolve the image MIME type from the part's content type, falling back to
/// the file extension.
///
/// # Errors
/// Returns [`MediaError::UnsupportedType`] for anything that is not an image.
pub fn image_mime(content_type: Option<&str>, file_name: Option<&str>) -> Result<String, MediaError> {
    let declared = content_type
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_lowercase())
        .filter(|value| !value.is_empty() && value != "application/octet-stream");

    let mime = match declared {
        Some(mime) => mime,
        None => mime_from_extension(file_name.unwrap_or_default())
            .ok_or_else(|| MediaError::UnsupportedType(file_name.unwrap_or("unknown").to_string()))?
            .to_string(),
    };

    if mime.starts_with("image/") {
        Ok(mime)
    } else {
        Err(MediaError::UnsupportedType(mime))
    }
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

/// Encode bytes as `data:<mime>;base64,<payload>`.
///
/// # Errors
/// Returns [`MediaError::Empty`] for an empty file.
pub fn data_uri(mime: &str, bytes: &[u8]) -> Result<String, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    Ok(format!("data:{mime};base64,{}", Base64::encode_string(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_encodes_standard_base64() -> anyhow::Result<()> {
        assert_eq!(data_uri("image/png", b"hi!")?, "data:image/png;base64,aGkh");
        assert!(matches!(data_uri("image/png", b""), Err(MediaError::Empty)));
        Ok(())
    }

    #[test]
    fn mime_prefers_declared_content_type() -> anyhow::Result<()> {
        assert_eq!(image_mime(Some("image/jpeg"), Some("a.png"))?, "image/jpeg");
        assert_eq!(
            image_mime(Some("IMAGE/PNG; charset=binary"), None)?,
            "image/png"
        );
        Ok(())
    }

    #[test]
    fn mime_falls_back_to_extension() -> anyhow::Result<()> {
        assert_eq!(image_mime(None, Some("me.JPG"))?, "image/jpeg");
        assert_eq!(
            image_mime(Some("application/octet-stream"), Some("me.webp"))?,
            "image/webp"
        );
        Ok(())
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(matches!(
            image_mime(Some("text/plain"), Some("notes.txt")),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(matches!(
            image_mime(None, Some("archive")),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(MediaError::Empty.is_client_error());
    }

    #[tokio::test]
    async fn inline_uploader_returns_data_uri() -> anyhow::Result<()> {
        let uri = data_uri("image/gif", b"GIF89a")?;
        assert_eq!(InlineMediaUploader.upload(&uri).await?, uri);
        Ok(())
    }
}
