//! Threaded driver for [`AshLink`] over a blocking byte stream.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::AshConfig;
use crate::error::{AshError, Result};
use crate::link::{AshLink, LinkEvent, LinkState, ResetInfo};
use crate::reader::LinkReader;
use crate::writer::LinkWriter;

type BoxedWriter = LinkWriter<Box<dyn Write + Send>>;

struct Core {
    link: AshLink,
    writer: BoxedWriter,
}

impl Core {
    fn flush(&mut self) -> Result<()> {
        while let Some(bytes) = self.link.take_outbound() {
            self.writer.write_all(&bytes)?;
        }
        Ok(())
    }
}

fn lock(core: &Mutex<Core>) -> MutexGuard<'_, Core> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connected ASH session.
///
/// [`start`](Self::start) performs the RST/RSTACK exchange on the calling
/// thread, then moves the read half to a background thread that feeds the
/// link, services its timers and hands [`LinkEvent`]s to the handler.
/// The read half must have a read timeout set; each timeout is a timer tick.
pub struct AshConnection {
    core: Arc<Mutex<Core>>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    info: ResetInfo,
}

impl AshConnection {
    /// Reset the NCP and start the reader thread.
    ///
    /// Fails with the link error if the NCP does not answer RST with a
    /// supported RSTACK within `config.reset_timeout`.
    pub fn start<R, W, F>(reader: R, writer: W, config: AshConfig, mut handler: F) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        F: FnMut(LinkEvent) + Send + 'static,
    {
        let mut reader = LinkReader::new(reader);
        let mut core = Core {
            link: AshLink::new(config),
            writer: LinkWriter::new(Box::new(writer)),
        };

        core.link.reset(Instant::now());
        core.flush()?;

        let mut early = Vec::new();
        let info = loop {
            if let Some(chunk) = reader.read_chunk()? {
                core.link.receive(chunk, Instant::now());
            }
            core.link.poll_timers(Instant::now());
            core.flush()?;

            let mut connected = None;
            while let Some(event) = core.link.poll_event() {
                match event {
                    LinkEvent::Connected(info) => connected = Some(info),
                    LinkEvent::Failed(err) => return Err(err),
                    data => early.push(data),
                }
            }
            if let Some(info) = connected {
                break info;
            }
        };
        for event in early {
            handler(event);
        }

        let core = Arc::new(Mutex::new(core));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new().name("ash-reader".to_string()).spawn({
            let core = Arc::clone(&core);
            let stop = Arc::clone(&stop);
            move || reader_loop(reader, &core, &stop, handler)
        })?;

        Ok(Self {
            core,
            stop,
            reader: Some(handle),
            info,
        })
    }

    /// RSTACK contents from the reset that opened this session.
    pub fn info(&self) -> ResetInfo {
        self.info
    }

    pub fn state(&self) -> LinkState {
        lock(&self.core).link.state()
    }

    /// Queue one EZSP frame and write whatever the link releases.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let mut core = lock(&self.core);
        core.link.send(Bytes::copy_from_slice(payload), Instant::now())?;
        core.flush()
    }

    /// Stop the reader thread and drop link state.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        lock(&self.core).link.close();

        if let Some(handle) = self.reader.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("ASH reader thread panicked");
            }
        }
    }
}

impl Drop for AshConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AshConnection")
            .field("info", &self.info)
            .field("stopped", &self.stop.load(Ordering::Relaxed))
            .finish()
    }
}

fn reader_loop<R, F>(mut reader: LinkReader<R>, core: &Mutex<Core>, stop: &AtomicBool, mut handler: F)
where
    R: Read,
    F: FnMut(LinkEvent),
{
    loop {
        let read = reader.read_chunk();
        if stop.load(Ordering::Acquire) {
            break;
        }

        let mut failure = None;
        let mut events = Vec::new();
        {
            let mut core = lock(core);
            let now = Instant::now();
            match read {
                Ok(Some(chunk)) => core.link.receive(chunk, now),
                Ok(None) => {}
                Err(err) => failure = Some(err),
            }
            if failure.is_none() {
                core.link.poll_timers(now);
                if let Err(err) = core.flush() {
                    failure = Some(err);
                }
            }
            while let Some(event) = core.link.poll_event() {
                events.push(event);
            }
            if failure.is_some() {
                core.link.close();
            }
        }

        let mut failed = false;
        for event in events {
            failed |= matches!(event, LinkEvent::Failed(_));
            handler(event);
        }
        if let Some(err) = failure {
            if !failed {
                warn!(error = %err, "ASH reader stopping");
                handler(LinkEvent::Failed(err));
            }
            return;
        }
        if failed {
            return;
        }
    }
    debug!("ASH reader stopped");
}
