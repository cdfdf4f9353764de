pub mod config;
pub mod error;
pub mod events;
pub mod recorder;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use events::Broadcaster;
pub use recorder::TradeRecorder;
pub use source::PriceSource;
pub use types::*;
