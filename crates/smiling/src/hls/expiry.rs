use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use tokio::time::Instant;

use crate::DownloadError;

/// Access grant for one rendition: where the master playlist lives and how
/// long the grant stays valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryWindow {
    pub content_url: String,
    pub create_time: DateTime<FixedOffset>,
    pub expire_time: DateTime<FixedOffset>,
}

impl ExpiryWindow {
    /// Lifetime left at `now`, or `None` once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let left = self.expire_time.with_timezone(&Utc) - now;
        left.to_std().ok().filter(|d| !d.is_zero())
    }
}

/// Single cooperative deadline shared by every fetch of one download.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn from_window(window: &ExpiryWindow) -> Result<Self, DownloadError> {
        Self::from_window_at(window, Utc::now())
    }

    pub fn from_window_at(window: &ExpiryWindow, now: DateTime<Utc>) -> Result<Self, DownloadError> {
        window.remaining_at(now).map(Self::after).ok_or_else(|| {
            DownloadError::Timeout(format!(
                "access window expired at {}",
                window.expire_time.to_rfc3339()
            ))
        })
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Runs `fut` to completion or drops it, and everything it owns, when the deadline passes.
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T, DownloadError>
    where
        F: Future<Output = Result<T, DownloadError>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout(format!(
                "{what} did not finish within {:?}",
                self.budget
            ))),
        }
    }
}
