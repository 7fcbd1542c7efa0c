use std::thread;

use tracing::{info, warn};

use crate::client::Ezsp;
use crate::config::EzspConfig;
use crate::error::{EzspError, Result};

/// Connect to the NCP at `path` with default configuration.
///
/// `path` is a serial device or `tcp://host:port`.
pub fn connect(path: &str) -> Result<Ezsp> {
    connect_with_config(path, &EzspConfig::default())
}

/// Connect with explicit configuration.
///
/// Opening the transport and the ASH reset are retried up to
/// `config.connect_attempts` times; attempt `n` is followed by a pause of
/// `n * config.connect_retry_delay`.
pub fn connect_with_config(path: &str, config: &EzspConfig) -> Result<Ezsp> {
    let attempts = config.connect_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match open_once(path, config) {
            Ok(ezsp) => {
                info!(%path, attempt, "connected to NCP");
                return Ok(ezsp);
            }
            Err(err) => {
                warn!(%path, attempt, attempts, error = %err, "NCP connection attempt failed");
                last_error = Some(err);
            }
        }
        if attempt < attempts {
            thread::sleep(config.connect_retry_delay * attempt);
        }
    }

    Err(last_error.unwrap_or_else(|| EzspError::ConnectionFailed(path.to_string())))
}

fn open_once(path: &str, config: &EzspConfig) -> Result<Ezsp> {
    let stream = ezsp_transport::open(path, &config.serial)?;
    Ezsp::from_stream(stream, config.clone())
}
