//! Schema-driven serialization for EZSP frames.
//!
//! Field types are a closed [`FieldType`] enum; commands are entries in the
//! static [`COMMANDS`] table, indexed by [`SchemaRegistry`]. Values decode
//! to [`Value`]/[`Record`], which serialize to JSON in declared field order.
//!
//! ```
//! use ezsp_schema::SchemaRegistry;
//!
//! let registry = SchemaRegistry::builtin();
//! let (command, record) = registry
//!     .decode_response(0x00C4, 9, &[0x05, 0xE3, 0x99, 0xA0, 0x00])
//!     .unwrap();
//! assert_eq!(command.name, "incomingNetworkStatusHandler");
//! assert_eq!(record.get_u64("target"), Some(0x99E3));
//! ```

pub mod commands;
pub mod error;
pub mod registry;
pub mod status;
pub mod types;
pub mod value;

pub use commands::{CommandSchema, COMMANDS};
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
pub use status::EzspStatus;
pub use types::{Field, FieldType};
pub use value::{Record, Value};
