mod accounts;
mod health;
mod trades;
mod watches;
mod ws;

pub use accounts::accounts_router;
pub use health::health_router;
pub use trades::trades_router;
pub use watches::watches_router;
pub use ws::ws_router;
