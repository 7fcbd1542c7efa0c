//! EZSP host client: one command in flight, responses correlated by
//! sequence number, everything else handed to a callback sink.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ezsp_ash::{AshConnection, AshError, LinkEvent, ResetInfo};
use ezsp_schema::{SchemaRegistry, Value};
use ezsp_transport::SerialStream;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EzspConfig;
use crate::error::{EzspError, FrameError, Result};
use crate::frame::{Arguments, EzspFrame, FrameCodec};
use crate::lock;
use crate::pending::{PendingCall, PendingCalls};
use crate::queue::SingleFlight;

/// Why the host considers the NCP connection lost.
#[derive(Debug)]
pub enum ResetReason {
    /// The ASH link failed.
    Link(AshError),
    /// Too many consecutive watchdog `nop`s failed.
    Watchdog { failures: u32 },
}

/// Something the NCP sent that no caller was waiting for.
#[derive(Debug)]
pub enum Event {
    /// A callback, or a response that arrived after its caller gave up.
    Frame(EzspFrame),
    /// An inbound frame that failed to decode and matched no caller.
    Failure(FrameError),
    /// The connection needs to be re-established.
    Reset(ResetReason),
}

/// Receiver of unsolicited [`Event`]s.
///
/// Runs on the link reader thread (or the watchdog thread for watchdog
/// resets). It must not block waiting on commands of the same client.
pub trait CallbackSink: Send + 'static {
    fn deliver(&mut self, event: Event);
}

impl<F> CallbackSink for F
where
    F: FnMut(Event) + Send + 'static,
{
    fn deliver(&mut self, event: Event) {
        self(event)
    }
}

impl CallbackSink for Sender<Event> {
    fn deliver(&mut self, event: Event) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// NCP firmware version, as reported by the `version` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub protocol: u8,
    pub stack_type: u8,
    pub stack_version: u16,
}

impl VersionInfo {
    fn from_frame(frame: &EzspFrame) -> Result<Self> {
        let field = |field: &'static str| {
            frame
                .params
                .get_u64(field)
                .ok_or(EzspError::MissingField {
                    command: frame.name(),
                    field,
                })
        };
        Ok(Self {
            protocol: field("protocolVersion")? as u8,
            stack_type: field("stackType")? as u8,
            stack_version: field("stackVersion")? as u16,
        })
    }

    /// Stack version as dotted nibbles, e.g. `0x6A20` is `6.10.2.0`.
    pub fn stack_version_string(&self) -> String {
        let v = self.stack_version;
        format!(
            "{}.{}.{}.{}",
            v >> 12,
            (v >> 8) & 0x0F,
            (v >> 4) & 0x0F,
            v & 0x0F
        )
    }
}

struct Shared {
    registry: Arc<SchemaRegistry>,
    codec: Mutex<FrameCodec>,
    pending: Arc<PendingCalls>,
    sink: Mutex<Option<Box<dyn CallbackSink>>>,
    closed: AtomicBool,
}

impl Shared {
    fn emit(&self, event: Event) {
        match lock(&self.sink).as_mut() {
            Some(sink) => sink.deliver(event),
            None => debug!(?event, "no subscriber, dropping event"),
        }
    }

    fn on_link_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connected(info) => {
                debug!(version = info.version, code = %info.code, "ASH link connected");
            }
            LinkEvent::Data(body) => self.on_frame(&body),
            LinkEvent::Failed(err) => {
                if self.closed.load(Ordering::Acquire) {
                    debug!(error = %err, "link stopped after close");
                    return;
                }
                warn!(error = %err, "ASH link failed");
                let reason = err.to_string();
                self.pending
                    .fail_all(|| EzspError::ConnectionFailed(reason.clone()));
                self.emit(Event::Reset(ResetReason::Link(err)));
            }
        }
    }

    fn on_frame(&self, body: &[u8]) {
        let decoded = lock(&self.codec).decode(body);
        match decoded {
            Ok(frame) => {
                debug!(
                    name = frame.name(),
                    sequence = frame.sequence,
                    "<== {}",
                    frame.name()
                );
                if let Err(frame) = self.pending.resolve(frame) {
                    self.emit(Event::Frame(frame));
                }
            }
            Err(error) => {
                warn!(%error, "dropping undecodable frame");
                if let Err(error) = self.pending.fail(error) {
                    self.emit(Event::Failure(error));
                }
            }
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    link: Mutex<Option<AshConnection>>,
    stream: Mutex<Option<SerialStream>>,
    queue: SingleFlight,
    sequence: AtomicU8,
    config: EzspConfig,
}

impl Inner {
    fn execute<A: Arguments + ?Sized>(
        &self,
        name: &str,
        args: &A,
        timeout: Duration,
    ) -> Result<EzspFrame> {
        let command = self.shared.registry.command(name)?;
        if command.is_callback() {
            return Err(EzspError::NotACommand(command.name));
        }

        let _turn = self.queue.enter()?;
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(EzspError::Closed);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let body = lock(&self.shared.codec).encode(command, sequence, args)?;
        let call = self
            .shared
            .pending
            .register(command, Some(sequence), timeout);
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(EzspError::Cancelled);
        }

        debug!(name = command.name, sequence, "==> {}", command.name);
        self.send(&body)?;
        call.wait()
    }

    fn send(&self, body: &[u8]) -> Result<()> {
        match lock(&self.link).as_ref() {
            Some(link) => Ok(link.send(body)?),
            None => Err(EzspError::Closed),
        }
    }

    fn cancel_calls(&self) {
        self.queue.close();
        self.shared.pending.fail_all(|| EzspError::Cancelled);
    }

    fn close_link(&self) {
        let link = lock(&self.link).take();
        if let Some(mut link) = link {
            link.close();
        }
        if let Some(stream) = lock(&self.stream).take() {
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "stream shutdown failed");
            }
        }
        info!("EZSP connection closed");
    }
}

struct Watchdog {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn spawn(inner: Weak<Inner>, period: Duration, max_failures: u32) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("ezsp-watchdog".to_string())
            .spawn(move || watchdog_loop(inner, period, max_failures, stopped))?;
        Ok(Self { stop, handle })
    }

    fn stop(self) {
        drop(self.stop);
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!("watchdog thread panicked");
        }
    }
}

fn watchdog_loop(inner: Weak<Inner>, period: Duration, max_failures: u32, stopped: Receiver<()>) {
    let mut failures = 0u32;
    loop {
        match stopped.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.execute("nop", &(), inner.config.command_timeout) {
            Ok(_) => failures = 0,
            Err(EzspError::Cancelled | EzspError::Closed) => break,
            Err(err) => {
                failures += 1;
                warn!(error = %err, failures, "watchdog nop failed");
                if failures > max_failures {
                    inner
                        .shared
                        .emit(Event::Reset(ResetReason::Watchdog { failures }));
                    failures = 0;
                }
            }
        }
    }
    debug!("watchdog stopped");
}

/// A connected EZSP host.
///
/// Commands are serialized: each [`execute`](Self::execute) waits for the
/// previous one to finish. Frames nobody waits for go to the sink set with
/// [`subscribe`](Self::subscribe).
pub struct Ezsp {
    inner: Arc<Inner>,
    watchdog: Mutex<Option<Watchdog>>,
}

impl Ezsp {
    /// Reset the NCP over `reader`/`writer` and start the host.
    ///
    /// The reader must have a short read timeout; see [`AshConnection`].
    pub fn start<R, W>(reader: R, writer: W, config: EzspConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::start_inner(reader, writer, config, None)
    }

    /// Start the host over an opened transport.
    pub fn from_stream(stream: SerialStream, config: EzspConfig) -> Result<Self> {
        let mut reader = stream.try_clone()?;
        reader.set_read_timeout(Some(config.serial.read_timeout))?;
        let writer = stream.try_clone()?;
        Self::start_inner(reader, writer, config, Some(stream))
    }

    fn start_inner<R, W>(
        reader: R,
        writer: W,
        config: EzspConfig,
        stream: Option<SerialStream>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let registry = Arc::new(SchemaRegistry::builtin());
        let shared = Arc::new(Shared {
            codec: Mutex::new(FrameCodec::new(
                Arc::clone(&registry),
                config.initial_version,
            )),
            registry,
            pending: PendingCalls::new(),
            sink: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let link = AshConnection::start(reader, writer, config.ash.clone(), {
            let shared = Arc::clone(&shared);
            move |event| shared.on_link_event(event)
        })?;
        let reset = link.info();
        info!(ash_version = reset.version, code = %reset.code, "NCP reset complete");

        let watchdog_period = config.watchdog_period;
        let max_failures = config.max_watchdog_failures;
        let inner = Arc::new(Inner {
            shared,
            link: Mutex::new(Some(link)),
            stream: Mutex::new(stream),
            queue: SingleFlight::new(),
            sequence: AtomicU8::new(0),
            config,
        });

        let watchdog = match watchdog_period {
            Some(period) => Some(
                Watchdog::spawn(Arc::downgrade(&inner), period, max_failures)
                    .map_err(|err| EzspError::Link(AshError::Io(err)))?,
            ),
            None => None,
        };

        Ok(Self {
            inner,
            watchdog: Mutex::new(watchdog),
        })
    }

    /// Send a command and wait for its response.
    pub fn execute<A: Arguments + ?Sized>(&self, name: &str, args: &A) -> Result<EzspFrame> {
        self.inner
            .execute(name, args, self.inner.config.command_timeout)
    }

    pub fn execute_with_timeout<A: Arguments + ?Sized>(
        &self,
        name: &str,
        args: &A,
        timeout: Duration,
    ) -> Result<EzspFrame> {
        self.inner.execute(name, args, timeout)
    }

    /// Register interest in the next frame with `name`'s frame id.
    ///
    /// With `sequence: None` any sequence matches, which is how callbacks
    /// such as `stackStatusHandler` are awaited. A frame taken by a waiter
    /// is not delivered to the sink.
    pub fn waiter(
        &self,
        name: &str,
        sequence: Option<u8>,
        timeout: Option<Duration>,
    ) -> Result<PendingCall> {
        let command = self.inner.shared.registry.command(name)?;
        let timeout = timeout.unwrap_or(self.inner.config.command_timeout);
        Ok(self
            .inner
            .shared
            .pending
            .register(command, sequence, timeout))
    }

    /// Exchange `version` with the NCP.
    ///
    /// If the NCP reports a different protocol version, the frame format
    /// switches to it and `version` is sent again in that format.
    pub fn negotiate_version(&self) -> Result<VersionInfo> {
        let desired = self.protocol_version();
        let frame = self.execute("version", &[Value::from(desired)])?;
        let mut version = VersionInfo::from_frame(&frame)?;
        if version.protocol != desired {
            info!(
                requested = desired,
                reported = version.protocol,
                "NCP speaks a different protocol version, re-sending version"
            );
            let frame = self.execute("version", &[Value::from(version.protocol)])?;
            version = VersionInfo::from_frame(&frame)?;
        }
        Ok(version)
    }

    /// Protocol version the frame codec currently uses.
    pub fn protocol_version(&self) -> u8 {
        lock(&self.inner.shared.codec).version()
    }

    /// Set the sink for unsolicited events, replacing any previous one.
    pub fn subscribe(&self, sink: impl CallbackSink) {
        *lock(&self.inner.shared.sink) = Some(Box::new(sink));
    }

    /// Subscribe a channel and return its receiving end.
    pub fn events(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(tx);
        rx
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.inner.shared.registry
    }

    pub fn config(&self) -> &EzspConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shared.closed.load(Ordering::Acquire)
    }

    /// RSTACK contents from the link reset, if the link is still open.
    pub fn link_info(&self) -> Option<ResetInfo> {
        lock(&self.inner.link).as_ref().map(AshConnection::info)
    }

    pub fn nop(&self) -> Result<()> {
        self.execute("nop", &()).map(drop)
    }

    pub fn echo(&self, data: &[u8]) -> Result<Vec<u8>> {
        let frame = self.execute("echo", &[Value::from(data)])?;
        bytes_field(&frame, "echo")
    }

    pub fn get_configuration_value(&self, config_id: u8) -> Result<u16> {
        let frame = self.execute("getConfigurationValue", &[Value::from(config_id)])?;
        check_status(&frame)?;
        Ok(uint_field(&frame, "value")? as u16)
    }

    pub fn set_configuration_value(&self, config_id: u8, value: u16) -> Result<()> {
        let frame = self.execute(
            "setConfigurationValue",
            &[Value::from(config_id), Value::from(value)],
        )?;
        check_status(&frame)
    }

    pub fn get_value(&self, value_id: u8) -> Result<Vec<u8>> {
        let frame = self.execute("getValue", &[Value::from(value_id)])?;
        check_status(&frame)?;
        bytes_field(&frame, "value")
    }

    pub fn set_policy(&self, policy_id: u8, decision_id: u8) -> Result<()> {
        let frame = self.execute(
            "setPolicy",
            &[Value::from(policy_id), Value::from(decision_id)],
        )?;
        check_status(&frame)
    }

    /// Stop the watchdog, cancel every waiter and close the link.
    ///
    /// Safe to call more than once.
    pub fn close(&self) {
        if self.inner.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel_calls();
        let watchdog = lock(&self.watchdog).take();
        if let Some(watchdog) = watchdog {
            watchdog.stop();
        }
        self.inner.close_link();
    }
}

impl Drop for Ezsp {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Ezsp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ezsp")
            .field("protocol_version", &self.protocol_version())
            .field("pending", &self.inner.shared.pending)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Fail with `Status` unless the frame's `status` field is SUCCESS.
pub fn check_status(frame: &EzspFrame) -> Result<()> {
    let status = frame.status().ok_or(EzspError::MissingField {
        command: frame.name(),
        field: "status",
    })?;
    if status.is_success() {
        Ok(())
    } else {
        Err(EzspError::Status {
            command: frame.name(),
            status,
        })
    }
}

fn uint_field(frame: &EzspFrame, field: &'static str) -> Result<u64> {
    frame.params.get_u64(field).ok_or(EzspError::MissingField {
        command: frame.name(),
        field,
    })
}

fn bytes_field(frame: &EzspFrame, field: &'static str) -> Result<Vec<u8>> {
    frame
        .params
        .get_bytes(field)
        .map(<[u8]>::to_vec)
        .ok_or(EzspError::MissingField {
            command: frame.name(),
            field,
        })
}
