use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::StorageClient;

struct Object {
    body: Vec<u8>,
    content_type: String,
}

/// In-memory storage client for tests.
/// Tracks `put` and `delete` call counts for assertions and can be switched
/// into a failing mode.
#[derive(Default)]
pub struct InMemoryStorageClient {
    data: Mutex<HashMap<String, Object>>,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_puts: AtomicBool,
}

impl InMemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail.
    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::Relaxed);
    }

    pub fn put_count(&self) -> usize {
        self.put_calls.load(Ordering::Relaxed)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::Relaxed)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects().get(key).map(|o| o.content_type.clone())
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, HashMap<String, Object>> {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_puts.load(Ordering::Relaxed) {
            anyhow::bail!("simulated storage failure for {key}");
        }
        self.objects().insert(
            key.to_string(),
            Object {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.objects().get(key).map(|o| o.body.clone()))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        self.objects().remove(key);
        Ok(())
    }
}
