use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{EmailClient, EmailMessage};

/// Email client used when no email API is configured. Messages are logged
/// and dropped.
pub struct NoOpEmailClient;

#[async_trait::async_trait]
impl EmailClient for NoOpEmailClient {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        tracing::debug!(to = %message.to, subject = %message.subject, "email delivery disabled; dropping message");
        Ok(())
    }
}

/// In-memory email client for tests. Records every successful send and can
/// be told to fail for specific recipients. With a delay set, it also
/// records the peak number of sends in flight at once.
#[derive(Default)]
pub struct RecordingEmailClient {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<HashSet<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingEmailClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every send for `delay` before completing it.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Make every send to `address` fail.
    pub fn fail_for(&self, address: &str) {
        self.failing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.to == address)
            .collect()
    }

    fn record(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let fails = self
            .failing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&message.to);
        if fails {
            anyhow::bail!("simulated delivery failure to {}", message.to);
        }
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl EmailClient for RecordingEmailClient {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.record(message);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
