pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testkit;

pub use session::{MonitorSession, SessionEnd};
pub use supervisor::{MonitorConfig, MonitorSupervisor, SessionSnapshot};
