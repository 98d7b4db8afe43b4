use super::StorageClient;

/// No-op storage client for when R2 is not configured.
/// Writes are logged and discarded; reads always return `None`.
pub struct NoOpStorageClient;

#[async_trait::async_trait]
impl StorageClient for NoOpStorageClient {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> anyhow::Result<String> {
        tracing::debug!(key, bytes = body.len(), "media storage disabled; discarding upload");
        Ok(key.to_string())
    }

    async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
