//! Messaging transport — delivers inbound user events to the engine and
//! renders outcomes back as messages with keyboards.

pub mod render;
pub mod telegram;

pub use telegram::TelegramTransport;
