pub mod verification;

// Re-export commonly used types
pub use verification::{Receipt, ReplayPolicy, VerificationOutcome, VerificationRecord};
