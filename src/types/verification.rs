use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// How a live record answers a repeated request for the same hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Any live record is a replay and is rejected with its stored verdict.
    Reject,
    /// A live record is served back as a cache hit.
    Serve,
}

impl ReplayPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ReplayPolicy::Reject => "reject",
            ReplayPolicy::Serve => "serve",
        }
    }
}

/// Receipt returned by the chain once a transaction is mined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub success: bool,
    pub block_number: u64,
}

impl Receipt {
    pub fn new(success: bool, block_number: u64) -> Self {
        Self {
            success,
            block_number,
        }
    }
}

/// Verdict recorded for one transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub hash: String,
    /// Epoch seconds at which the verdict was recorded
    pub recorded_at: i64,
    pub verified: bool,
    pub block_number: u64,
}

impl VerificationRecord {
    pub fn new(hash: impl Into<String>, recorded_at: i64, receipt: Receipt) -> Self {
        Self {
            hash: hash.into(),
            recorded_at,
            verified: receipt.success,
            block_number: receipt.block_number,
        }
    }

    pub fn age_seconds(&self, now: i64) -> i64 {
        now.saturating_sub(self.recorded_at)
    }

    /// A record blocks replays while `now - recorded_at < ttl`.
    pub fn is_live(&self, now: i64, ttl_seconds: u64) -> bool {
        self.age_seconds(now) < ttl_seconds as i64
    }

    pub fn expires_in(&self, now: i64, ttl_seconds: u64) -> u64 {
        (ttl_seconds as i64)
            .saturating_sub(self.age_seconds(now))
            .max(0) as u64
    }
}

/// Result of a single `verify` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Verdict obtained from a fresh on-chain lookup and recorded.
    Fresh { verified: bool, block_number: u64 },
    /// A live record already exists for this hash.
    Conflict { verified: bool, used_at: i64 },
    /// A live record served back under [`ReplayPolicy::Serve`].
    Cached { verified: bool, expires_in: u64 },
    /// The receipt lookup failed; nothing was recorded.
    Failed(OracleError),
    /// The request carried no hash.
    InvalidInput,
    /// The record table is full of live records; nothing was looked up.
    Saturated,
}

impl VerificationOutcome {
    pub fn verified(&self) -> Option<bool> {
        match self {
            VerificationOutcome::Fresh { verified, .. }
            | VerificationOutcome::Conflict { verified, .. }
            | VerificationOutcome::Cached { verified, .. } => Some(*verified),
            VerificationOutcome::Failed(_)
            | VerificationOutcome::InvalidInput
            | VerificationOutcome::Saturated => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, VerificationOutcome::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn test_record_liveness_boundary() {
        let record = VerificationRecord::new(HASH, 1_000, Receipt::new(true, 42));
        assert!(record.is_live(1_000, 60));
        assert!(record.is_live(1_059, 60));
        assert!(!record.is_live(1_060, 60));
        assert!(!record.is_live(5_000, 60));
    }

    #[test]
    fn test_record_expires_in() {
        let record = VerificationRecord::new(HASH, 1_000, Receipt::new(false, 7));
        assert_eq!(record.expires_in(1_000, 3600), 3600);
        assert_eq!(record.expires_in(1_600, 3600), 3000);
        assert_eq!(record.expires_in(9_999, 3600), 0);
        assert!(!record.verified);
        assert_eq!(record.block_number, 7);
    }

    #[test]
    fn test_outcome_verdicts() {
        let fresh = VerificationOutcome::Fresh {
            verified: true,
            block_number: 1,
        };
        assert_eq!(fresh.verified(), Some(true));
        assert!(!fresh.is_conflict());
        assert_eq!(VerificationOutcome::InvalidInput.verified(), None);
        assert!(VerificationOutcome::Conflict {
            verified: false,
            used_at: 10
        }
        .is_conflict());
    }

    #[test]
    fn test_policy_serde() {
        let policy: ReplayPolicy = serde_json::from_str("\"serve\"").unwrap();
        assert_eq!(policy, ReplayPolicy::Serve);
        assert_eq!(ReplayPolicy::Reject.name(), "reject");
    }
}
