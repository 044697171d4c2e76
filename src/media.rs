//! Image hosting for profile pictures.
//!
//! Only the URL returned by the host is stored; image bytes never touch the
//! database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::directory;
use crate::error::CareError;
use crate::models::{Account, ProfileUpdate};
use crate::session::Session;

/// Uploads larger than this are refused before contacting the host.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Image is empty")]
    Empty,
    #[error("Image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("Cannot reach image host at {0}")]
    Connection(String),
    #[error("Image host HTTP error: {0}")]
    HttpClient(String),
    #[error("Image host rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Image host response had no URL")]
    MissingUrl,
}

impl From<MediaError> for CareError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Empty | MediaError::TooLarge { .. } | MediaError::UnsupportedType(_) => {
                CareError::InvalidInput(err.to_string())
            }
            other => CareError::Upstream(other.to_string()),
        }
    }
}

/// MIME type from the file extension. Only common web image formats.
pub fn image_mime_type(file_name: &str) -> Result<&'static str, MediaError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(MediaError::UnsupportedType(file_name.to_string())),
    }
}

fn validate_image(bytes: &[u8], file_name: &str) -> Result<&'static str, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            limit: MAX_IMAGE_BYTES,
        });
    }
    image_mime_type(file_name)
}

/// Stores an image somewhere reachable and returns its public URL.
pub trait ImageHost: Send + Sync {
    fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, MediaError>;
}

// ═══════════════════════════════════════════════════════════
// HTTP image host
// ═══════════════════════════════════════════════════════════

/// Unsigned-preset upload to a hosted image CDN.
pub struct HttpImageHost {
    endpoint: String,
    upload_preset: String,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl HttpImageHost {
    pub fn new(endpoint: &str, upload_preset: &str, timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::HttpClient(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            upload_preset: upload_preset.to_string(),
            client,
        })
    }

    /// Upload endpoint for a named cloud.
    pub fn cloud_endpoint(cloud_name: &str) -> String {
        format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload")
    }
}

impl ImageHost for HttpImageHost {
    fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, MediaError> {
        let mime = validate_image(bytes, file_name)?;
        let data_uri = format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );
        let form = [
            ("file", data_uri.as_str()),
            ("upload_preset", self.upload_preset.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    MediaError::Connection(self.endpoint.clone())
                } else {
                    MediaError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Image upload rejected");
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = response
            .json()
            .map_err(|e| MediaError::HttpClient(e.to_string()))?;
        let url = parsed.secure_url.or(parsed.url).ok_or(MediaError::MissingUrl)?;
        tracing::info!(size = bytes.len(), "Image uploaded");
        Ok(url)
    }
}

// ═══════════════════════════════════════════════════════════
// In-memory host
// ═══════════════════════════════════════════════════════════

/// Keeps uploads in memory and hands out `memory://` URLs. Used when no
/// image host is configured and in tests.
#[derive(Default)]
pub struct MemoryImageHost {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.images
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
    }
}

impl ImageHost for MemoryImageHost {
    fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, MediaError> {
        validate_image(bytes, file_name)?;
        let url = format!("memory://images/{}/{file_name}", Uuid::new_v4());
        self.images
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.clone(), bytes.to_vec());
        Ok(url)
    }
}

// ═══════════════════════════════════════════════════════════
// Profile image
// ═══════════════════════════════════════════════════════════

/// Upload a new profile picture for the caller's own account and store
/// the returned URL.
pub fn upload_profile_image(
    conn: &Connection,
    session: &Session,
    host: &dyn ImageHost,
    account_id: &Uuid,
    bytes: &[u8],
    file_name: &str,
) -> Result<Account, CareError> {
    if &session.account_id != account_id {
        return Err(CareError::PermissionDenied(
            "only the account owner can change the profile image".into(),
        ));
    }
    let url = host.upload(bytes, file_name)?;
    directory::update_profile(
        conn,
        session,
        account_id,
        ProfileUpdate {
            profile_image: Some(url),
            ..Default::default()
        },
    )
}
