pub mod api;
pub mod config;
pub mod error;
pub mod rpc;
pub mod service;
pub mod types;
pub mod verification;

// Re-exports
pub use api::{create_router, ApiState};
pub use config::{Config, Network};
pub use error::{OracleError, Result, TxGuardError};
pub use rpc::{JsonRpcReceiptOracle, ReceiptOracle};
pub use service::VerificationService;
pub use types::{Receipt, ReplayPolicy, VerificationOutcome, VerificationRecord};
pub use verification::{CacheSettings, VerificationCache};
