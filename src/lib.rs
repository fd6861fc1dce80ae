//! Incrementally-loading media gallery surface.
//!
//! [`Browser`] is a message-driven controller: the host reports frames,
//! scrolling and media events, and gets back [`Effect`]s to apply.
//! [`BrowserRuntime`] drives it on tokio against the HTTP gallery.

pub mod browser;
pub mod config;
pub mod error;
pub mod feed;
pub mod runtime;
pub mod selection;
pub mod state;
pub mod view;

pub use browser::{Browser, Card, Effect, Message};
pub use config::BrowserConfig;
pub use error::BrowserError;
pub use runtime::{BrowserRuntime, Host, RuntimeHandle};
