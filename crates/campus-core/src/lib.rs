pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CampusConfig;
pub use error::{CampusError, Result};
pub use types::*;
