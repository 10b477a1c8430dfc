//! Record table with per-hash in-flight markers.
//!
//! Every read-check-then-write on a hash happens under one short, non-async
//! critical section. A caller that finds neither a live record nor an
//! in-flight lookup registers itself as the single owner of the lookup;
//! later callers for the same hash subscribe to the owner's settlement
//! instead of querying the chain again.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::types::VerificationRecord;

/// What the owner of a lookup hands to everyone waiting on it.
pub type Settlement = Result<VerificationRecord, OracleError>;

type SettlementRx = watch::Receiver<Option<Settlement>>;

/// Result of claiming a hash for verification
pub enum Claim<'a> {
    /// A live record already exists.
    Live(VerificationRecord),
    /// Another caller owns the lookup; wait for its settlement.
    Wait(SettlementRx),
    /// The caller owns the lookup and must settle it.
    Owner(FlightGuard<'a>),
    /// Every slot holds a live record or an in-flight lookup.
    Full,
}

struct Flight {
    id: u64,
    tx: watch::Sender<Option<Settlement>>,
}

struct TableInner {
    records: HashMap<String, VerificationRecord>,
    in_flight: HashMap<String, Flight>,
}

impl TableInner {
    fn purge_expired(&mut self, now: i64, ttl_seconds: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now, ttl_seconds));
        before - self.records.len()
    }

    /// Records plus pending lookups, each of which may become a record.
    fn occupied(&self) -> usize {
        self.records.len() + self.in_flight.len()
    }
}

pub struct RecordTable {
    inner: Mutex<TableInner>,
    capacity: usize,
    next_flight: AtomicU64,
}

impl RecordTable {
    /// Create a table; a capacity of 0 leaves it unbounded.
    ///
    /// A bounded table never evicts a live record. Once it is full, expired
    /// records are purged, and if none can go the claim is refused.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                records: HashMap::new(),
                in_flight: HashMap::new(),
            }),
            capacity,
            next_flight: AtomicU64::new(0),
        }
    }

    /// Atomically decide between a live record, an in-flight lookup, or a new
    /// lookup owned by the caller. Expired records are dropped on the way.
    pub fn claim(&self, hash: &str, now: i64, ttl_seconds: u64) -> Claim<'_> {
        let mut inner = self.inner.lock();

        if let Some(record) = inner.records.get(hash) {
            if record.is_live(now, ttl_seconds) {
                return Claim::Live(record.clone());
            }
            debug!("Record for {} expired, evicting", hash);
            inner.records.remove(hash);
        }

        if let Some(flight) = inner.in_flight.get(hash) {
            return Claim::Wait(flight.tx.subscribe());
        }

        if self.capacity > 0 && inner.occupied() >= self.capacity {
            let purged = inner.purge_expired(now, ttl_seconds);
            if inner.occupied() >= self.capacity {
                warn!(
                    "Record table full ({} live, {} in flight), refusing {}",
                    inner.records.len(),
                    inner.in_flight.len(),
                    hash
                );
                return Claim::Full;
            }
            debug!("Record table at capacity, purged {} expired records", purged);
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = watch::channel(None);
        inner.in_flight.insert(hash.to_string(), Flight { id, tx });

        Claim::Owner(FlightGuard {
            table: self,
            hash: hash.to_string(),
            id,
            settled: false,
        })
    }

    pub fn peek(&self, hash: &str) -> Option<VerificationRecord> {
        self.inner.lock().records.get(hash).cloned()
    }

    /// Drop every record that is no longer live.
    pub fn purge_expired(&self, now: i64, ttl_seconds: u64) -> usize {
        self.inner.lock().purge_expired(now, ttl_seconds)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Remove this flight's marker if it is still the registered one.
    fn release(&self, hash: &str, id: u64, record: Option<VerificationRecord>) -> Option<Flight> {
        let mut inner = self.inner.lock();

        if let Some(record) = record {
            inner.records.insert(hash.to_string(), record);
        }

        let owned = inner.in_flight.get(hash).is_some_and(|flight| flight.id == id);
        if owned {
            inner.in_flight.remove(hash)
        } else {
            None
        }
    }
}

/// Ownership of one in-flight lookup.
///
/// Dropping the guard without settling (the owning request was cancelled)
/// removes the marker and closes the channel, so waiters start over.
pub struct FlightGuard<'a> {
    table: &'a RecordTable,
    hash: String,
    id: u64,
    settled: bool,
}

impl FlightGuard<'_> {
    /// Record the outcome (successes only) and wake every waiter.
    pub fn settle(mut self, settlement: Settlement) {
        let record = settlement.as_ref().ok().cloned();

        if let Some(flight) = self.table.release(&self.hash, self.id, record) {
            flight.tx.send_replace(Some(settlement));
        }
        self.settled = true;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Lookup for {} abandoned before settling", self.hash);
            self.table.release(&self.hash, self.id, None);
        }
    }
}

/// Wait for the owner of a lookup to settle it.
///
/// Returns `None` when the owner went away without settling.
pub async fn wait_for_settlement(mut rx: SettlementRx) -> Option<Settlement> {
    rx.wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|settled| settled.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Receipt;

    const TTL: u64 = 60;

    fn record(hash: &str, at: i64) -> VerificationRecord {
        VerificationRecord::new(hash, at, Receipt::new(true, 1))
    }

    fn own<'a>(table: &'a RecordTable, hash: &str, now: i64) -> FlightGuard<'a> {
        match table.claim(hash, now, TTL) {
            Claim::Owner(guard) => guard,
            _ => panic!("expected to own the lookup for {hash}"),
        }
    }

    #[test]
    fn test_first_claim_owns_second_waits() {
        let table = RecordTable::new(0);
        let _guard = own(&table, "0x01", 0);

        assert!(matches!(table.claim("0x01", 0, TTL), Claim::Wait(_)));
        assert!(matches!(table.claim("0x02", 0, TTL), Claim::Owner(_)));
        assert_eq!(table.in_flight(), 1);
    }

    #[test]
    fn test_settled_success_becomes_live_record() {
        let table = RecordTable::new(0);
        own(&table, "0x01", 100).settle(Ok(record("0x01", 100)));

        assert_eq!(table.in_flight(), 0);
        assert_eq!(table.len(), 1);
        match table.claim("0x01", 120, TTL) {
            Claim::Live(found) => assert_eq!(found.recorded_at, 100),
            _ => panic!("expected live record"),
        };
    }

    #[test]
    fn test_settled_failure_writes_nothing() {
        let table = RecordTable::new(0);
        own(&table, "0x01", 0).settle(Err(OracleError::rpc("down")));

        assert!(table.is_empty());
        assert_eq!(table.in_flight(), 0);
        assert!(matches!(table.claim("0x01", 0, TTL), Claim::Owner(_)));
    }

    #[test]
    fn test_expired_record_is_evicted_on_claim() {
        let table = RecordTable::new(0);
        own(&table, "0x01", 0).settle(Ok(record("0x01", 0)));

        assert!(matches!(table.claim("0x01", TTL as i64, TTL), Claim::Owner(_)));
        assert!(table.peek("0x01").is_none());
    }

    #[test]
    fn test_abandoned_guard_releases_marker() {
        let table = RecordTable::new(0);
        let guard = own(&table, "0x01", 0);
        let rx = match table.claim("0x01", 0, TTL) {
            Claim::Wait(rx) => rx,
            _ => panic!("expected to wait"),
        };
        drop(guard);

        assert_eq!(table.in_flight(), 0);
        assert!(rx.has_changed().is_err());
    }

    #[test]
    fn test_full_table_never_evicts_live_records() {
        let table = RecordTable::new(2);
        own(&table, "0x01", 0).settle(Ok(record("0x01", 0)));
        own(&table, "0x02", 0).settle(Ok(record("0x02", 0)));

        assert!(matches!(table.claim("0x03", 10, TTL), Claim::Full));
        assert_eq!(table.len(), 2);
        assert_eq!(table.in_flight(), 0);
        assert!(matches!(table.claim("0x01", 10, TTL), Claim::Live(_)));
        assert!(matches!(table.claim("0x02", 10, TTL), Claim::Live(_)));
    }

    #[test]
    fn test_full_table_purges_expired_before_refusing() {
        let table = RecordTable::new(2);
        own(&table, "0x01", 0).settle(Ok(record("0x01", 0)));
        own(&table, "0x02", 30).settle(Ok(record("0x02", 30)));

        own(&table, "0x03", TTL as i64).settle(Ok(record("0x03", TTL as i64)));

        assert!(table.peek("0x01").is_none());
        assert!(table.peek("0x02").is_some());
        assert!(table.peek("0x03").is_some());
        assert!(matches!(table.claim("0x04", TTL as i64, TTL), Claim::Full));
    }

    #[test]
    fn test_in_flight_lookups_count_toward_capacity() {
        let table = RecordTable::new(1);
        let guard = own(&table, "0x01", 0);

        assert!(matches!(table.claim("0x02", 0, TTL), Claim::Full));
        assert!(matches!(table.claim("0x01", 0, TTL), Claim::Wait(_)));

        drop(guard);
        assert!(matches!(table.claim("0x02", 0, TTL), Claim::Owner(_)));
    }

    #[test]
    fn test_purge_expired_keeps_live_records() {
        let table = RecordTable::new(0);
        own(&table, "0x01", 0).settle(Ok(record("0x01", 0)));
        own(&table, "0x02", 50).settle(Ok(record("0x02", 50)));

        assert_eq!(table.purge_expired(70, TTL), 1);
        assert!(table.peek("0x01").is_none());
        assert!(table.peek("0x02").is_some());
    }

    #[tokio::test]
    async fn test_waiter_receives_settlement() {
        let table = RecordTable::new(0);
        let guard = own(&table, "0x01", 0);
        let rx = match table.claim("0x01", 0, TTL) {
            Claim::Wait(rx) => rx,
            _ => panic!("expected to wait"),
        };

        guard.settle(Ok(record("0x01", 0)));

        let settled = wait_for_settlement(rx).await;
        assert_eq!(settled, Some(Ok(record("0x01", 0))));
    }
}
