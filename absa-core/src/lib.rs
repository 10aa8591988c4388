pub mod config;
pub mod error;
pub mod error_recovery;
pub mod error_utils;
pub mod filter_mode;
pub mod stats;
pub mod types;

pub use config::*;
pub use error::*;
pub use error_recovery::*;
pub use error_utils::*;
pub use filter_mode::*;
pub use stats::*;
pub use types::*;
