//! API endpoints module.

pub mod bridge;
pub mod login;
pub mod messages;

pub use bridge::events;
pub use login::{pair, qr, status};
pub use messages::send;
