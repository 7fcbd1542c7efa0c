use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use ezsp_host::{Event, ResetReason};
use tracing::{info, warn};

use crate::cmd::{parse_timeout, ListenArgs};
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_frame, OutputFormat};

/// How often the loop checks for Ctrl-C while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = args.connect.config()?;
    config.watchdog_period = args.watchdog.as_deref().map(parse_timeout).transpose()?;

    let (ezsp, _) = args.connect.connect(&config)?;
    let events = ezsp.events();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(path = %args.connect.path, "listening for callbacks");

    let mut printed = 0usize;
    let mut outcome = Ok(SUCCESS);
    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match event {
            Event::Frame(frame) => {
                print_frame(&frame, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Event::Failure(error) => warn!(%error, "undecodable frame"),
            Event::Reset(ResetReason::Link(err)) => {
                outcome = Err(link_error("link failed", err));
                break;
            }
            Event::Reset(ResetReason::Watchdog { failures }) => {
                outcome = Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("NCP stopped answering ({failures} watchdog failures)"),
                ));
                break;
            }
        }
    }

    ezsp.close();
    outcome
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
