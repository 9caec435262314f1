use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DownloadError;

/// Seconds of audio fetched for a reduced-fidelity download.
pub const PREVIEW_BUDGET_SECS: u64 = 120;

/// Which slice of the rendition to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Every segment
    Best,
    /// Only the leading preview
    #[default]
    Worst,
}

impl Quality {
    /// Number of leading segments to fetch; `None` means all of them.
    pub fn segment_limit(self, target_duration: Option<u64>) -> Result<Option<usize>, DownloadError> {
        match self {
            Quality::Best => Ok(None),
            Quality::Worst => {
                let target = target_duration.filter(|d| *d > 0).ok_or_else(|| {
                    DownloadError::Manifest(
                        "preview download needs #EXT-X-TARGETDURATION".to_string(),
                    )
                })?;
                Ok(Some(PREVIEW_BUDGET_SECS.div_ceil(target) as usize))
            }
        }
    }

    /// The leading part of `segments` this quality fetches.
    pub fn select<T>(self, segments: &[T], target_duration: Option<u64>) -> Result<&[T], DownloadError> {
        let stop = self
            .segment_limit(target_duration)?
            .map_or(segments.len(), |limit| limit.min(segments.len()));
        Ok(&segments[..stop])
    }

    /// Prefix that keeps preview files apart from full downloads.
    pub fn file_prefix(self) -> &'static str {
        match self {
            Quality::Best => "",
            Quality::Worst => "_",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::Worst => f.write_str("worst"),
        }
    }
}
