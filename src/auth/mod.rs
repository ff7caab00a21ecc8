//! Session authentication: who may drive the login, and how.

pub mod arbiter;
pub mod phone;
pub mod qr;
pub mod session;
pub mod terminal;

pub use arbiter::{Arbiter, ArbiterOptions, AuthSnapshot, QrCode};
pub use phone::validate_phone;
pub use session::{AuthSession, Method, Owner, Phase};
pub use terminal::{Console, StdConsole, TerminalFlow, TerminalOptions};
