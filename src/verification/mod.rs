mod clock;
mod engine;
mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CacheSettings, CacheStats, VerificationCache};
pub use table::RecordTable;
