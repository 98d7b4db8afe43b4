pub mod mock;
pub mod noop;
pub mod r2;

use uuid::Uuid;

/// Largest accepted logo or poster upload.
pub const MAX_MEDIA_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_LOGO_URL: &str = "https://example.com/default-logo.png";
pub const DEFAULT_POSTER_URL: &str = "https://example.com/default-poster.png";

/// Abstraction over blob storage (R2 / S3-compatible).
#[async_trait::async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload bytes to the given key. Returns the key on success.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> anyhow::Result<String>;

    /// Download bytes by key. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// What an uploaded image is used for; decides its key prefix and fallback URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Logo,
    Poster,
}

impl MediaKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Logo => "logos",
            Self::Poster => "posters",
        }
    }

    /// The kind whose directory `key` is stored under.
    pub fn from_key(key: &str) -> Option<Self> {
        [Self::Logo, Self::Poster].into_iter().find(|kind| {
            key.strip_prefix(kind.prefix())
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub const fn default_url(self) -> &'static str {
        match self {
            Self::Logo => DEFAULT_LOGO_URL,
            Self::Poster => DEFAULT_POSTER_URL,
        }
    }
}

/// Map an accepted image content type to its file extension.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Accept or reject an upload before storing it; returns the file extension.
///
/// # Errors
///
/// Returns a client-facing message for unsupported types and empty or
/// oversized bodies.
pub fn check_image(content_type: &str, len: usize) -> Result<&'static str, String> {
    let ext = image_extension(content_type).ok_or_else(|| {
        "image must be PNG, JPEG, WebP or GIF".to_string()
    })?;
    if len == 0 {
        return Err("image is empty".to_string());
    }
    if len > MAX_MEDIA_BYTES {
        return Err(format!(
            "image exceeds {} MB",
            MAX_MEDIA_BYTES / (1024 * 1024)
        ));
    }
    Ok(ext)
}

/// An image stored by [`upload_media`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub key: String,
    pub url: String,
}

/// Check and upload an image, returning its key and public URL.
///
/// Key format: `{kind}s/{uuid}.{ext}`; the URL is `{public_base}/{key}`.
///
/// # Errors
///
/// Returns an error if the content type is not an accepted image type, the
/// body is empty or larger than [`MAX_MEDIA_BYTES`], or the storage call
/// fails.
pub async fn upload_media(
    storage: &dyn StorageClient,
    public_base: &str,
    kind: MediaKind,
    content_type: &str,
    body: Vec<u8>,
) -> anyhow::Result<StoredMedia> {
    let ext = check_image(content_type, body.len()).map_err(|e| anyhow::anyhow!(e))?;
    let key = format!("{}/{}.{ext}", kind.prefix(), Uuid::new_v4());
    let key = storage.put(&key, body, content_type).await?;
    let url = format!("{}/{key}", public_base.trim_end_matches('/'));
    Ok(StoredMedia { key, url })
}
