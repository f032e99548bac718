//! Transfer activity: does the daemon still need the tunnel?
//!
//! Two signals feed the state decision:
//!
//! - active downloads: a transfer is downloading, queued to download, or stopped
//!   with data still missing;
//! - seeding obligations: recently completed transfers on private trackers that
//!   have not reached a 1.0 ratio yet, plus transfers that never completed. These
//!   are force-started, and the fact that any were started keeps the tunnel up.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::TrackersConfig;
use crate::finding::Finding;
use crate::rpc::{RpcResult, Transfer, TransferClient, TransferStatus};
use crate::telemetry::{AuditEvent, AuditLogger};

/// Completed transfers younger than this still owe seeding.
pub const SEEDING_WINDOW_DAYS: i64 = 10;

/// Ratio at which a transfer has paid back what it downloaded.
pub const TARGET_RATIO: f64 = 1.0;

/// Transfer counts by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// All transfers.
    pub total: usize,
    /// Finished transfers (seeding goal reached).
    pub finished: usize,
    /// Downloading or queued to download.
    pub downloading: usize,
    /// Seeding or queued to seed.
    pub seeding: usize,
    /// Stopped with data still missing.
    pub stalled: usize,
    /// Stopped and complete.
    pub stopped: usize,
}

impl TransferStats {
    /// Classify a transfer list.
    pub fn from_transfers(transfers: &[Transfer]) -> Self {
        let mut stats = Self {
            total: transfers.len(),
            ..Default::default()
        };
        for transfer in transfers {
            if transfer.is_finished {
                stats.finished += 1;
                continue;
            }
            match transfer.status {
                TransferStatus::Downloading | TransferStatus::QueuedToDownload => stats.downloading += 1,
                TransferStatus::Seeding | TransferStatus::QueuedToSeed => stats.seeding += 1,
                TransferStatus::Stopped if transfer.left_until_done > 0 => stats.stalled += 1,
                TransferStatus::Stopped => stats.stopped += 1,
                TransferStatus::QueuedToVerify | TransferStatus::Verifying => {}
            }
        }
        stats
    }

    /// Whether any transfer still has data to fetch.
    pub fn needs_download(&self) -> bool {
        self.downloading + self.stalled > 0
    }
}

/// IDs of transfers that should be force-started, deduplicated in list order.
///
/// A transfer that never completed is always a candidate. A completed one is a
/// candidate when its ratio is below [`TARGET_RATIO`], it completed within
/// [`SEEDING_WINDOW_DAYS`] of `now`, and it is either flagged private or uses a
/// tracker whose announce or scrape URL contains one of `private_trackers`.
pub fn resume_candidates(transfers: &[Transfer], now: DateTime<Utc>, private_trackers: &[String]) -> Vec<i64> {
    let window = Duration::days(SEEDING_WINDOW_DAYS);
    let mut ids: Vec<i64> = Vec::new();

    for transfer in transfers {
        let eligible = match transfer.completed_at {
            None => true,
            Some(completed) => {
                transfer.upload_ratio < TARGET_RATIO
                    && now.signed_duration_since(completed) < window
                    && (transfer.is_private
                        || transfer
                            .trackers
                            .iter()
                            .any(|t| private_trackers.iter().any(|needle| t.mentions(needle))))
            }
        };
        if eligible && !ids.contains(&transfer.id) {
            ids.push(transfer.id);
        }
    }
    ids
}

/// The activity half of the state decision.
pub trait ActivitySignal {
    /// Whether any transfer still needs to download.
    fn has_active_downloads(&self) -> Finding;

    /// Force-start transfers that owe seeding; true if any were started.
    fn resume_if_seeding_needed(&self) -> Finding;
}

/// Activity signal backed by the daemon's RPC interface.
pub struct ActivityEvaluator<'a> {
    client: &'a dyn TransferClient,
    clock: &'a dyn Clock,
    trackers: &'a TrackersConfig,
    audit: &'a AuditLogger,
    dry_run: bool,
}

impl<'a> ActivityEvaluator<'a> {
    /// Create an evaluator.
    pub fn new(
        client: &'a dyn TransferClient,
        clock: &'a dyn Clock,
        trackers: &'a TrackersConfig,
        audit: &'a AuditLogger,
    ) -> Self {
        Self {
            client,
            clock,
            trackers,
            audit,
            dry_run: false,
        }
    }

    /// Report resume candidates without starting them.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Current transfer statistics.
    pub fn stats(&self) -> RpcResult<TransferStats> {
        let transfers = self.client.list_transfers()?;
        Ok(TransferStats::from_transfers(&transfers))
    }
}

impl ActivitySignal for ActivityEvaluator<'_> {
    fn has_active_downloads(&self) -> Finding {
        match self.stats() {
            Ok(stats) => {
                debug!(
                    "Transfers: {} total, {} finished, {} downloading, {} seeding, {} stalled, {} stopped",
                    stats.total, stats.finished, stats.downloading, stats.seeding, stats.stalled, stats.stopped
                );
                Finding::verified(stats.needs_download())
            }
            Err(e) => {
                warn!("Cannot read transfer statistics: {}", e);
                Finding::failed(e.to_string())
            }
        }
    }

    fn resume_if_seeding_needed(&self) -> Finding {
        let transfers = match self.client.list_transfers() {
            Ok(transfers) => transfers,
            Err(e) => {
                warn!("Cannot list transfers: {}", e);
                return Finding::failed(e.to_string());
            }
        };

        let ids = resume_candidates(&transfers, self.clock.now().with_timezone(&Utc), &self.trackers.private);
        if ids.is_empty() {
            return Finding::verified(false);
        }

        if self.dry_run {
            info!("Would start {} transfer(s): {:?}", ids.len(), ids);
            return Finding::verified(true);
        }

        match self.client.start_now(&ids) {
            Ok(()) => {
                info!("Started {} transfer(s) that still owe seeding: {:?}", ids.len(), ids);
                self.audit.log(AuditEvent::TransfersResumed { ids });
                Finding::verified(true)
            }
            Err(e) => {
                warn!("Failed to start transfers {:?}: {}", ids, e);
                Finding::failed(e.to_string())
            }
        }
    }
}
