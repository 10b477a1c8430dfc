use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::OracleError;
use crate::rpc::ReceiptOracle;
use crate::types::{ReplayPolicy, VerificationOutcome, VerificationRecord};

use super::clock::{Clock, SystemClock};
use super::table::{wait_for_settlement, Claim, FlightGuard, RecordTable};

/// Tunables of a [`VerificationCache`]
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl_seconds: u64,
    pub policy: ReplayPolicy,
    pub capacity: usize,
    pub receipt_timeout: Duration,
}

impl CacheSettings {
    pub fn new(cache: &CacheConfig, receipt_timeout: Duration) -> Self {
        Self {
            ttl_seconds: cache.ttl_seconds,
            policy: cache.policy,
            capacity: cache.capacity,
            receipt_timeout,
        }
    }
}

/// Counters for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered with a replay conflict.
    pub conflicts: u64,
    /// Requests answered from a live record under the serve policy.
    pub cache_hits: u64,
    /// Oracle lookups that produced a recorded verdict.
    pub fresh_lookups: u64,
    /// Oracle lookups that failed or timed out.
    pub oracle_failures: u64,
    /// New hashes refused because the table was full of live records.
    pub refused_full: u64,
}

/// Verification cache with replay detection.
///
/// Owns the record table; each hash is looked up on-chain at most once per
/// TTL window. Concurrent first requests for the same hash share a single
/// oracle call.
pub struct VerificationCache<O> {
    oracle: O,
    table: RecordTable,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    stats: Mutex<CacheStats>,
}

impl<O: ReceiptOracle> VerificationCache<O> {
    pub fn new(oracle: O, settings: CacheSettings) -> Self {
        Self::with_clock(oracle, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(oracle: O, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            oracle,
            table: RecordTable::new(settings.capacity),
            clock,
            settings,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Verify a transaction hash.
    ///
    /// 1. Empty hash → `InvalidInput`
    /// 2. Live record → `Conflict` (or `Cached` under the serve policy)
    /// 3. Lookup already in flight → wait and share its result
    /// 4. Table full of live records → `Saturated`, without an oracle call
    /// 5. Otherwise query the oracle under the receipt timeout and record
    ///    the verdict on success
    pub async fn verify(&self, hash: &str) -> VerificationOutcome {
        if hash.is_empty() {
            return VerificationOutcome::InvalidInput;
        }

        loop {
            let now = self.clock.now();

            match self.table.claim(hash, now, self.settings.ttl_seconds) {
                Claim::Live(record) => return self.answer_live(&record, now),
                Claim::Wait(rx) => {
                    debug!("Lookup for {} already in flight, waiting", hash);

                    match wait_for_settlement(rx).await {
                        Some(Ok(record)) => return self.answer_live(&record, self.clock.now()),
                        Some(Err(e)) => return VerificationOutcome::Failed(e),
                        None => continue,
                    }
                }
                Claim::Owner(flight) => return self.lookup(hash, flight).await,
                Claim::Full => {
                    self.stats.lock().refused_full += 1;
                    return VerificationOutcome::Saturated;
                }
            }
        }
    }

    /// Query the oracle as the single owner of this hash's lookup
    async fn lookup(&self, hash: &str, flight: FlightGuard<'_>) -> VerificationOutcome {
        let timeout = self.settings.receipt_timeout;

        let result = match tokio::time::timeout(timeout, self.oracle.await_receipt(hash)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(timeout)),
        };

        match result {
            Ok(receipt) => {
                let record = VerificationRecord::new(hash, self.clock.now(), receipt);
                flight.settle(Ok(record));
                self.stats.lock().fresh_lookups += 1;

                info!(
                    "✓ Verified {} on-chain: success={}, block={}",
                    hash, receipt.success, receipt.block_number
                );

                VerificationOutcome::Fresh {
                    verified: receipt.success,
                    block_number: receipt.block_number,
                }
            }
            Err(e) => {
                warn!("Verification failed for {}: {}", hash, e);
                flight.settle(Err(e.clone()));
                self.stats.lock().oracle_failures += 1;

                VerificationOutcome::Failed(e)
            }
        }
    }

    fn answer_live(&self, record: &VerificationRecord, now: i64) -> VerificationOutcome {
        match self.settings.policy {
            ReplayPolicy::Reject => {
                warn!(
                    "Replay detected for {} (first used at {})",
                    record.hash, record.recorded_at
                );
                self.stats.lock().conflicts += 1;

                VerificationOutcome::Conflict {
                    verified: record.verified,
                    used_at: record.recorded_at,
                }
            }
            ReplayPolicy::Serve => {
                debug!("Serving cached verdict for {}", record.hash);
                self.stats.lock().cache_hits += 1;

                VerificationOutcome::Cached {
                    verified: record.verified,
                    expires_in: record.expires_in(now, self.settings.ttl_seconds),
                }
            }
        }
    }

    /// Drop expired records; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.table
            .purge_expired(self.clock.now(), self.settings.ttl_seconds)
    }

    pub fn record(&self, hash: &str) -> Option<VerificationRecord> {
        self.table.peek(hash)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.table.in_flight()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}
