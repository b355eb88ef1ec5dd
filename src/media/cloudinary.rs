//! Signed uploads to Cloudinary.
//!
//! Configured from a `cloudinary://<api_key>:<api_secret>@<cloud_name>` URL.
//! Each upload is signed with SHA-256 over the sorted request parameters plus
//! the API secret.

use super::{MediaError, MediaFuture, MediaUploader};
use crate::APP_USER_AGENT;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, info_span, Instrument};
use url::Url;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadErrorBody>,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryUploader {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    upload_url: String,
}

impl CloudinaryUploader {
    /// Build an uploader from a `cloudinary://` URL.
    ///
    /// # Errors
    /// Returns [`MediaError::Config`] if the URL is malformed or incomplete.
    pub fn from_url(cloudinary_url: &str) -> Result<Self, MediaError> {
        let parsed = Url::parse(cloudinary_url)
            .map_err(|err| MediaError::Config(format!("invalid cloudinary url: {err}")))?;
        if parsed.scheme() != "cloudinary" {
            return Err(MediaError::Config(format!(
                "expected cloudinary:// scheme, got {}://",
                parsed.scheme()
            )));
        }

        let cloud_name = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| MediaError::Config("missing cloud name".to_string()))?
            .to_string();
        let api_key = parsed.username().to_string();
        if api_key.is_empty() {
            return Err(MediaError::Config("missing api key".to_string()));
        }
        let api_secret = parsed
            .password()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| MediaError::Config("missing api secret".to_string()))?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            upload_url: format!("{API_BASE}/{cloud_name}/image/upload"),
            cloud_name,
            api_key,
            api_secret: SecretString::from(api_secret.to_string()),
        })
    }

    /// Point uploads at a different endpoint.
    #[must_use]
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self
    }

    #[must_use]
    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    fn signature(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, self.api_secret.expose_secret())
    }
}

/// `sha256(k1=v1&k2=v2...<secret>)` as lowercase hex, keys sorted.
fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{:x}", Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

fn unix_now() -> String {
    time::OffsetDateTime::now_utc().unix_timestamp().to_string()
}

impl MediaUploader for CloudinaryUploader {
    fn upload<'a>(&'a self, data_uri: &'a str) -> MediaFuture<'a> {
        let span = info_span!("media.upload", cloud = %self.cloud_name);
        Box::pin(
            async move {
                let timestamp = unix_now();
                let signature = self.signature(&[("timestamp", timestamp.as_str())]);

                let form = [
                    ("file", data_uri),
                    ("api_key", self.api_key.as_str()),
                    ("timestamp", timestamp.as_str()),
                    ("signature_algorithm", "sha256"),
                    ("signature", signature.as_str()),
                ];

                let response = self
                    .client
                    .post(&self.upload_url)
                    .form(&form)
                    .send()
                    .await?;
                let status = response.status();
                let body: UploadResponse = response.json().await?;

                if !status.is_success() {
                    let message = body
                        .error
                        .map_or_else(|| "unknown error".to_string(), |err| err.message);
                    error!("Cloudinary upload failed: {status} {message}");
                    return Err(MediaError::Rejected {
                        status: status.as_u16(),
                        message,
                    });
                }

                let url = body.secure_url.ok_or_else(|| MediaError::Rejected {
                    status: status.as_u16(),
                    message: "response did not include secure_url".to_string(),
                })?;
                debug!("uploaded profile picture to {url}");
                Ok(url)
            }
            .instrument(span),
        )
    }
}
