//! # wlframe
//!
//! Wayland window-system backend for a host editor's frame and terminal
//! model.
//!
//! ## Architecture
//!
//! - `display`: compositor connections, globals and the connection registry
//! - `input`: pointer and touch accumulation
//! - `keyboard`: keymaps, keysym names and modifier mapping
//! - `surface`: per-frame surface lifecycle and placeholder buffers
//! - `event_queue`: events buffered for the host's read hook
//! - `wait`: blocking waits that keep the socket serviced
//! - `frame`, `redisplay`, `fns`: frame parameters and host primitives
//! - `config`, `logging`: ambient setup for the driver
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wlframe::{fns, ConnectionRegistry, FrameParams, RegistryOptions, StandaloneHost};
//!
//! fn main() -> anyhow::Result<()> {
//!     let host = Arc::new(StandaloneHost::new());
//!     let mut registry = ConnectionRegistry::new(host, RegistryOptions::default());
//!     fns::open_connection(&mut registry, None, None, false)?;
//!     let frame = fns::create_frame(&mut registry, FrameParams::new())?;
//!     println!("created {:?}", frame);
//!     Ok(())
//! }
//! ```

pub mod color;
pub mod config;
pub mod display;
pub mod error;
pub mod event_queue;
pub mod fns;
pub mod frame;
pub mod host;
pub mod input;
pub mod keyboard;
pub mod logging;
pub mod redisplay;
pub mod surface;
pub mod wait;

pub use config::WlFrameConfig;
pub use display::{ConnectionRegistry, DisplayConnection, DisplaySelector, RegistryOptions};
pub use error::{BridgeError, BridgeResult};
pub use event_queue::{BufferedEvent, EventKind, SharedEventQueue};
pub use frame::{FrameParams, ParamValue};
pub use host::{ConnectionId, FrameId, Host, StandaloneHost, TerminalHandle};

/// Version information for wlframe
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_DATE: &str = env!("WLFRAME_BUILD_DATE");
pub const GIT_COMMIT: &str = env!("WLFRAME_GIT_COMMIT");
