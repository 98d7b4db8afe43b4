//! The Cloudflare R2 bucket that holds club logos and event posters.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::Config;

use super::{MediaKind, StorageClient};

/// Logo and poster keys embed a fresh UUID, so their bytes never change.
const MEDIA_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
const OTHER_CACHE_CONTROL: &str = "no-cache";

/// Where media lives and how to reach it.
#[derive(Clone)]
pub struct MediaBucket {
    pub bucket: String,
    pub endpoint_url: String,
    access_key_id: String,
    secret_access_key: String,
}

impl std::fmt::Debug for MediaBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBucket")
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl MediaBucket {
    /// # Errors
    ///
    /// Returns one error naming every missing `R2_*` setting.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let bucket = present(&config.r2_bucket_name);
        let endpoint_url = config.r2_endpoint_url();
        let access_key_id = present(&config.r2_access_key_id);
        let secret_access_key = present(&config.r2_secret_access_key);

        match (bucket, endpoint_url, access_key_id, secret_access_key) {
            (Some(bucket), Some(endpoint_url), Some(access_key_id), Some(secret_access_key)) => {
                Ok(Self {
                    bucket,
                    endpoint_url,
                    access_key_id,
                    secret_access_key,
                })
            }
            (bucket, endpoint_url, access_key_id, secret_access_key) => {
                let missing: Vec<&str> = [
                    (bucket.is_none(), "R2_BUCKET_NAME"),
                    (endpoint_url.is_none(), "R2_ENDPOINT or R2_ACCOUNT_ID"),
                    (access_key_id.is_none(), "R2_ACCESS_KEY_ID"),
                    (secret_access_key.is_none(), "R2_SECRET_ACCESS_KEY"),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                anyhow::bail!("media storage is missing {}", missing.join(", "))
            }
        }
    }
}

/// Cache policy for an object written under `key`.
pub fn cache_control_for(key: &str) -> &'static str {
    if MediaKind::from_key(key).is_some() {
        MEDIA_CACHE_CONTROL
    } else {
        OTHER_CACHE_CONTROL
    }
}

/// Media storage on R2 through its S3-compatible API.
pub struct R2StorageClient {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for R2StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2StorageClient")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl R2StorageClient {
    /// # Errors
    ///
    /// Returns an error if any R2 setting is missing.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::connect(MediaBucket::from_config(config)?))
    }

    pub fn connect(media: MediaBucket) -> Self {
        let credentials = Credentials::new(
            media.access_key_id,
            media.secret_access_key,
            None,
            None,
            "campus-media",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .region(Region::new("auto"))
            .endpoint_url(media.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version_latest()
            .build();
        tracing::info!(bucket = %media.bucket, "media storage on R2");
        Self {
            client: Client::from_conf(s3_config),
            bucket: media.bucket,
        }
    }
}

#[async_trait::async_trait]
impl StorageClient for R2StorageClient {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .cache_control(cache_control_for(key))
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Some(output.body.collect().await?.to_vec()))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        tracing::debug!(key, "deleted media object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn media_config() -> Config {
        Config {
            r2_bucket_name: Some("campus-media".to_string()),
            r2_access_key_id: Some("AKID".to_string()),
            r2_secret_access_key: Some("r2-secret".to_string()),
            r2_account_id: Some("campus".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn bucket_endpoint_comes_from_account_id() {
        let media = MediaBucket::from_config(&media_config()).unwrap();
        assert_eq!(media.bucket, "campus-media");
        assert_eq!(media.endpoint_url, "https://campus.r2.cloudflarestorage.com");
    }

    #[test]
    fn explicit_endpoint_wins() {
        let cfg = Config {
            r2_endpoint: Some("https://r2.campus.test".to_string()),
            ..media_config()
        };
        assert_eq!(
            MediaBucket::from_config(&cfg).unwrap().endpoint_url,
            "https://r2.campus.test"
        );
    }

    #[test]
    fn every_missing_setting_is_named_at_once() {
        let err = MediaBucket::from_config(&Config::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "media storage is missing R2_BUCKET_NAME, R2_ENDPOINT or R2_ACCOUNT_ID, \
             R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY"
        );
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let cfg = Config {
            r2_secret_access_key: Some("  ".to_string()),
            ..media_config()
        };
        let err = MediaBucket::from_config(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "media storage is missing R2_SECRET_ACCESS_KEY");
    }

    #[test]
    fn debug_hides_credentials() {
        let media = MediaBucket::from_config(&media_config()).unwrap();
        let shown = format!("{media:?}");
        assert!(shown.contains("campus-media"));
        assert!(!shown.contains("AKID"));
        assert!(!shown.contains("r2-secret"));
    }

    #[test]
    fn logos_and_posters_are_cached_forever() {
        assert_eq!(cache_control_for("logos/0b7c.png"), MEDIA_CACHE_CONTROL);
        assert_eq!(cache_control_for("posters/0b7c.jpg"), MEDIA_CACHE_CONTROL);
        assert_eq!(cache_control_for("logosx/0b7c.png"), OTHER_CACHE_CONTROL);
        assert_eq!(cache_control_for("exports/list.csv"), OTHER_CACHE_CONTROL);
    }

    #[test]
    fn client_builds_offline_from_config() {
        let client = R2StorageClient::new(&media_config()).unwrap();
        assert!(format!("{client:?}").contains("campus-media"));
    }
}
