//! Host-side protocol stack for Silicon Labs EmberZNet Zigbee NCPs.
//!
//! The layers, bottom up:
//!
//! - [`transport`]: serial devices and `tcp://` serial bridges
//! - [`ash`]: the ASH link layer (framing, CRC, randomization, ARQ)
//! - [`schema`]: the EZSP command table and its binary serializer
//! - [`host`]: frame envelope, command/response correlation and callbacks
//!   (behind the default `host` feature)

/// Re-export transport types.
pub mod transport {
    pub use ezsp_transport::*;
}

/// Re-export ASH link-layer types.
pub mod ash {
    pub use ezsp_ash::*;
}

/// Re-export schema types.
pub mod schema {
    pub use ezsp_schema::*;
}

/// Re-export host types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use ezsp_host::*;
}

#[cfg(feature = "host")]
pub use ezsp_host::{connect, connect_with_config, Event, Ezsp, EzspConfig, EzspError, EzspFrame};
