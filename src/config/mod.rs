//! Configuration: environment-driven settings plus the constants
//! (limits, TTLs, cache prefixes) shared across layers.

mod constants;
mod settings;

pub use constants::*;
pub use settings::Config;
