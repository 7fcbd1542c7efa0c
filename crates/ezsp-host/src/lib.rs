//! EZSP host: frame envelope, command/response correlation and callback
//! delivery on top of an ASH link.
//!
//! ```no_run
//! use ezsp_host::{connect, Event};
//!
//! let ezsp = connect("/dev/ttyUSB0")?;
//! let version = ezsp.negotiate_version()?;
//! println!("EZSP v{} stack {}", version.protocol, version.stack_version_string());
//!
//! let events = ezsp.events();
//! ezsp.execute("networkInit", &())?;
//! if let Ok(Event::Frame(frame)) = events.recv() {
//!     println!("{}: {:?}", frame.name(), frame.params);
//! }
//! # Ok::<(), ezsp_host::EzspError>(())
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod frame;
pub mod pending;
pub mod queue;

pub use client::{check_status, CallbackSink, Event, Ezsp, ResetReason, VersionInfo};
pub use config::{EzspConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_PROTOCOL_VERSION};
pub use connector::{connect, connect_with_config};
pub use error::{EzspError, FrameError, FrameFailure, Result};
pub use frame::{Arguments, CallbackKind, EzspFrame, FrameCodec};
pub use pending::{PendingCall, PendingCalls};
pub use queue::SingleFlight;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
