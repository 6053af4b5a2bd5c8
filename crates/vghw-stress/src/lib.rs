pub mod engine;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod sweep;

pub use engine::driver::ACTIVE_DRIVERS;
pub use engine::fleet::Fleet;
pub use engine::reporter::{Counters, Reporter, Snapshot};
pub use error::StressError;
