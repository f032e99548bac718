//! Transfer records as returned by `torrent-get`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Transfer state as reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum TransferStatus {
    /// Paused.
    Stopped,
    /// Waiting to verify local data.
    QueuedToVerify,
    /// Verifying local data.
    Verifying,
    /// Waiting for a download slot.
    QueuedToDownload,
    /// Downloading.
    Downloading,
    /// Waiting for a seed slot.
    QueuedToSeed,
    /// Seeding.
    Seeding,
}

impl TryFrom<i64> for TransferStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Stopped),
            1 => Ok(Self::QueuedToVerify),
            2 => Ok(Self::Verifying),
            3 => Ok(Self::QueuedToDownload),
            4 => Ok(Self::Downloading),
            5 => Ok(Self::QueuedToSeed),
            6 => Ok(Self::Seeding),
            other => Err(format!("unknown transfer status {}", other)),
        }
    }
}

/// One tracker of a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Tracker {
    /// Announce URL.
    #[serde(default)]
    pub announce: String,
    /// Scrape URL.
    #[serde(default)]
    pub scrape: String,
}

impl Tracker {
    /// Whether either URL contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.announce.contains(needle) || self.scrape.contains(needle)
    }
}

/// A transfer snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Daemon-assigned id.
    pub id: i64,
    /// All wanted data downloaded and the seeding goal reached.
    pub is_finished: bool,
    /// Current state.
    pub status: TransferStatus,
    /// Bytes still to download.
    pub left_until_done: u64,
    /// Completion time; the daemon reports 0 for "never completed".
    #[serde(rename = "doneDate", deserialize_with = "completion_time")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Uploaded / downloaded. Infinite when something was uploaded but nothing
    /// downloaded, 0 when neither.
    #[serde(deserialize_with = "share_ratio")]
    pub upload_ratio: f64,
    /// Torrent is flagged private.
    pub is_private: bool,
    /// Trackers.
    #[serde(default)]
    pub trackers: Vec<Tracker>,
}

fn completion_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = i64::deserialize(deserializer)?;
    if seconds <= 0 {
        return Ok(None);
    }
    Ok(DateTime::from_timestamp(seconds, 0))
}

/// Sentinel the daemon sends for an upload over an empty download.
const RATIO_INFINITE: f64 = -2.0;

fn share_ratio<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let ratio = f64::deserialize(deserializer)?;
    if ratio == RATIO_INFINITE {
        Ok(f64::INFINITY)
    } else if ratio < 0.0 {
        // -1: nothing uploaded or downloaded
        Ok(0.0)
    } else {
        Ok(ratio)
    }
}

/// Arguments of a `torrent-get` response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TorrentGetArguments {
    #[serde(default)]
    pub torrents: Vec<Transfer>,
}

/// Fields requested by `torrent-get`.
pub(crate) const TRANSFER_FIELDS: &[&str] = &[
    "id",
    "isFinished",
    "status",
    "leftUntilDone",
    "doneDate",
    "uploadRatio",
    "isPrivate",
    "trackers",
];
