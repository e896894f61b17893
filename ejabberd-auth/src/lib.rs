pub mod config;
pub mod protocol;
pub mod session;

pub use session::{Dispatcher, Session};
