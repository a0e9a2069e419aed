//! Ether Dream device worker: connection lifecycle, the playback state
//! machine and the refill loop.
//!
//! The device owns one TCP client and one worker thread. The worker is the
//! only thread that touches protocol state; the rest of the world talks to
//! the device through the thread-safe control surface (`start`, `stop`,
//! latency, `is_connected`, `last_error`).

mod refill;

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config;
use crate::device::{DeviceLoop, DeviceShared, PointSource, WorkerHandle};
use crate::error::{Error, Result};
use crate::logging;
use crate::net::{millis_to_timeout, NetService, TcpClient};
use crate::protocol::command::{self, Command};
use crate::protocol::{
    Ack, DacPoint, DeviceStatus, LightEngine, Playback, PlaybackFlags, SizeBytes, WriteBytes,
    WriteToBytes,
};
use crate::types::{FillCallback, PointFillRequest};

use refill::RefillState;

const DEVICE_NAME: &str = "ether-dream";

/// A single Ether Dream DAC driven by a callback generator.
///
/// Lifecycle: create, install a callback, `connect`, `start`. `stop`
/// signals the worker to exit and joins it; `close` tears down the TCP
/// connection. Dropping the device stops and closes it.
pub struct EtherDreamDevice {
    shared: Arc<DeviceShared>,
    /// Present while the worker is not running.
    engine: Option<Engine>,
    /// Present while the worker is running.
    worker: Option<WorkerHandle<Engine>>,
}

impl EtherDreamDevice {
    /// Create an idle device on the given I/O service.
    ///
    /// The service must outlive the device.
    pub fn new(service: &NetService) -> Self {
        let shared = DeviceShared::new();
        let engine = Engine::new(service.handle().clone(), Arc::clone(&shared));
        Self {
            shared,
            engine: Some(engine),
            worker: None,
        }
    }

    /// Connect to the DAC at an IP address literal.
    ///
    /// `port` defaults to [`config::DEFAULT_PORT`]. Fails with
    /// `InvalidArgument` if `address` does not parse.
    pub fn connect(&mut self, address: &str, port: Option<u16>) -> Result<()> {
        let ip: IpAddr = address.trim().parse().map_err(|_| {
            logging::error(&format!("[{DEVICE_NAME}] invalid IP address: {address}"));
            Error::invalid_argument(format!("invalid IP address: {address}"))
        })?;
        self.connect_addr(ip, port.unwrap_or(config::DEFAULT_PORT))
    }

    /// Connect to the DAC at the given address and port.
    pub fn connect_addr(&mut self, ip: IpAddr, port: u16) -> Result<()> {
        let engine = self.engine_mut("connect")?;
        engine.connect(SocketAddr::new(ip, port))
    }

    /// Tear down the TCP connection. Stops the worker first if it is
    /// still running. Idempotent.
    pub fn close(&mut self) {
        self.stop();
        if let Some(engine) = self.engine.as_mut() {
            engine.close();
        }
    }

    /// Whether the TCP connection is believed alive.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    /// Launch the worker thread. Idempotent while running.
    pub fn start(&mut self) -> Result<()> {
        if self.shared.is_running() {
            return Ok(());
        }
        self.reap_worker();
        let engine = self
            .engine
            .take()
            .ok_or_else(|| Error::invalid_argument("worker is not recoverable after a panic"))?;
        self.worker = Some(WorkerHandle::spawn(engine, &self.shared));
        Ok(())
    }

    /// Signal the worker to exit and join it. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if self.worker.is_some() {
            logging::info(&format!("[{DEVICE_NAME}] stop()"));
        }
        self.reap_worker();
    }

    /// Install or replace the point generator. Only permitted while not
    /// streaming.
    pub fn set_callback(&mut self, callback: FillCallback) -> Result<()> {
        let engine = self.engine_mut("set_callback")?;
        engine.source.set_callback(callback);
        Ok(())
    }

    /// Set the point rate the worker drives the DAC towards. Only
    /// permitted while not streaming.
    pub fn set_point_rate(&mut self, point_rate: u32) -> Result<()> {
        if point_rate == 0 {
            return Err(Error::invalid_argument("point rate must be non-zero"));
        }
        let engine = self.engine_mut("set_point_rate")?;
        engine.target_rate = point_rate;
        Ok(())
    }

    /// Set the latency budget between point submission and playback, in
    /// milliseconds. Values below 1 ms clamp to 1.
    pub fn set_latency_ms(&mut self, millis: i64) {
        self.shared.set_latency_ms(millis);
    }

    /// The currently configured latency budget in milliseconds.
    pub fn latency_ms(&self) -> i64 {
        self.shared.latency_ms()
    }

    /// The error that stopped the worker, if any.
    pub fn last_error(&self) -> Option<Error> {
        self.shared.last_error()
    }

    /// Whether the worker exited because of a failure.
    pub fn has_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// The address of the DAC this device last connected to, if any.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.engine.as_ref().and_then(|engine| engine.remembered_addr)
    }

    /// Join a worker whose `running` flag is cleared and recover the
    /// engine. A panicked worker dropped its engine (and with it the
    /// connection), so the connected flag is cleared in that case.
    fn reap_worker(&mut self) {
        if self.shared.is_running() {
            return;
        }
        if let Some(worker) = self.worker.take() {
            match worker.join(DEVICE_NAME) {
                Some(engine) => self.engine = Some(engine),
                None => self.shared.connected.store(false, Ordering::Relaxed),
            }
        }
    }

    fn engine_mut(&mut self, operation: &str) -> Result<&mut Engine> {
        if self.shared.is_running() {
            return Err(Error::invalid_argument(format!(
                "{operation} is not permitted while the worker is running"
            )));
        }
        self.reap_worker();
        self.engine
            .as_mut()
            .ok_or_else(|| Error::invalid_argument("worker is not recoverable after a panic"))
    }
}

impl Drop for EtherDreamDevice {
    fn drop(&mut self) {
        // Orderly shutdown: stop the worker thread, then the connection.
        self.stop();
        self.close();
    }
}

/// Outcome of one command/acknowledgement exchange.
///
/// `Rejected` means the 22 bytes parsed but the DAC did not accept the
/// command (non-`'a'` response or wrong echoed opcode). The carried status
/// has already been applied, which schedules a `clear`; the condition is
/// transient and does not stop the worker.
enum Reply {
    Acked,
    Rejected,
}

/// Worker-side state. Moves into the worker thread on `start` and back on
/// `stop`, so exactly one thread touches it at any time.
struct Engine {
    shared: Arc<DeviceShared>,
    client: TcpClient,
    source: PointSource,
    refill: RefillState,
    latest_status: Option<DeviceStatus>,
    clear_required: bool,
    prepare_required: bool,
    begin_required: bool,
    rate_change_pending: bool,
    target_rate: u32,
    point_index: u64,
    remembered_addr: Option<SocketAddr>,
    failure_encountered: bool,
    /// Reusable frame scratch so the hot path does not allocate.
    scratch: Vec<u8>,
    dac_points: Vec<DacPoint>,
}

impl Engine {
    fn new(handle: tokio::runtime::Handle, shared: Arc<DeviceShared>) -> Self {
        Self {
            shared,
            client: TcpClient::new(handle),
            source: PointSource::new(),
            refill: RefillState::new(),
            latest_status: None,
            clear_required: false,
            prepare_required: false,
            begin_required: false,
            rate_change_pending: false,
            target_rate: config::TARGET_POINT_RATE,
            point_index: 0,
            remembered_addr: None,
            failure_encountered: false,
            scratch: Vec::with_capacity(3 + DacPoint::SIZE_BYTES * config::FIFO_CAPACITY),
            dac_points: Vec::with_capacity(config::FIFO_CAPACITY),
        }
    }

    fn connect(&mut self, endpoint: SocketAddr) -> Result<()> {
        self.client
            .connect(&[endpoint], config::CONNECT_TIMEOUT)
            .map_err(|err| {
                logging::error(&format!(
                    "[{DEVICE_NAME}] connect to {endpoint} failed: {err}"
                ));
                err
            })?;
        // Low jitter matters more than throughput for realtime streams.
        self.client.enable_low_latency()?;
        self.remembered_addr = Some(endpoint);
        self.shared.connected.store(true, Ordering::Relaxed);
        logging::info(&format!("[{DEVICE_NAME}] connected to {endpoint}"));
        Ok(())
    }

    fn close(&mut self) {
        self.client.close();
        self.remembered_addr = None;
        self.shared.connected.store(false, Ordering::Relaxed);
    }

    fn running(&self) -> bool {
        self.shared.is_running()
    }

    fn op_timeout(&self) -> Duration {
        millis_to_timeout(self.shared.latency_ms())
    }

    /// Record a failure, stop the loop and mark the device failed.
    fn handle_failure(&mut self, where_tag: &str, err: Error) {
        logging::error(&format!("[{DEVICE_NAME}] {where_tag} failed: {err}"));
        self.shared.record_error(err);
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.failed.store(true, Ordering::SeqCst);
        self.failure_encountered = true;
    }

    /// Apply a decoded status frame: refresh the FIFO model and derive the
    /// control flags for the next iteration.
    fn apply_status(&mut self, status: &DeviceStatus, command_acked: bool) {
        self.latest_status = Some(*status);
        self.refill
            .note_status(status.buffer_fullness, status.point_rate, Instant::now());

        let estop = status.light_engine == LightEngine::EmergencyStop
            || status.playback_flags.contains(PlaybackFlags::EMERGENCY_STOP);
        self.clear_required = estop || !command_acked;

        self.prepare_required = !self.clear_required
            && status.light_engine == LightEngine::Ready
            && status.playback == Playback::Idle;

        self.begin_required = !self.clear_required
            && status.playback == Playback::Prepared
            && status.buffer_fullness as usize >= config::MIN_PACKET_POINTS;
    }

    /// Read one acknowledgement frame and match it against the command it
    /// should echo.
    ///
    /// The status carried by any parseable reply is applied before the
    /// match is judged, so the flags react to DAC state changes even when
    /// the reply is a NAK.
    fn wait_for_response(&mut self, expected: u8) -> Result<Reply> {
        if !self.running() {
            return Err(Error::Canceled);
        }
        if !self.client.is_connected() {
            return Err(Error::NotConnected);
        }

        let timeout = self.op_timeout();
        let mut raw = [0u8; config::ACK_FRAME_SIZE];
        let mut received = 0usize;
        if let Err(err) = self.client.read_exact(&mut raw, timeout, Some(&mut received)) {
            logging::error(&format!(
                "[{DEVICE_NAME}] rx error after {received} of {} bytes: {err}",
                config::ACK_FRAME_SIZE
            ));
            return Err(err);
        }

        let ack = Ack::decode(&raw).map_err(|err| {
            logging::error(&format!(
                "[{DEVICE_NAME}] failed to decode ack for '{}': {err}",
                expected as char
            ));
            err
        })?;

        let acked = ack.accepted() && ack.command == expected;
        self.apply_status(&ack.status, acked);

        if !acked {
            logging::error(&format!(
                "[{DEVICE_NAME}] unexpected reply: '{}' for '{}' (expected 'a' for '{}')",
                ack.response as char, ack.command as char, expected as char
            ));
            return Ok(Reply::Rejected);
        }
        Ok(Reply::Acked)
    }

    /// Write one command frame and wait for its acknowledgement.
    fn transact<C: Command + WriteToBytes>(&mut self, cmd: C) -> Result<Reply> {
        if !self.running() {
            return Err(Error::Canceled);
        }

        self.scratch.clear();
        self.scratch.write_bytes(&cmd)?;
        let timeout = self.op_timeout();
        self.client.write_all(&self.scratch, timeout)?;
        self.wait_for_response(cmd.start_byte())
    }

    fn send_clear(&mut self) -> Result<()> {
        logging::info(&format!("[{DEVICE_NAME}] clear required -> tx 'c'"));
        self.checked(command::Clear, "clear command")
    }

    fn send_prepare(&mut self) -> Result<()> {
        logging::info(&format!("[{DEVICE_NAME}] prepare required -> tx 'p'"));
        self.checked(command::PrepareStream, "prepare command")
    }

    fn send_begin(&mut self) -> Result<()> {
        let rate = self.target_rate;
        logging::info(&format!(
            "[{DEVICE_NAME}] begin required -> tx 'b' (rate={rate})"
        ));
        self.checked(
            command::Begin {
                low_water_mark: 0,
                point_rate: rate,
            },
            "begin command",
        )
    }

    /// Run one command through `transact`, turning wire failures into a
    /// worker stop. A rejected reply is not a failure: its status already
    /// scheduled a clear.
    fn checked<C: Command + WriteToBytes>(&mut self, cmd: C, where_tag: &str) -> Result<()> {
        match self.transact(cmd) {
            Ok(_) => Ok(()),
            // Stop was requested between iterations; not a failure.
            Err(Error::Canceled) => Err(Error::Canceled),
            Err(err) => {
                self.handle_failure(where_tag, err.clone());
                Err(err)
            }
        }
    }

    /// Keep the configured target rate queued while the DAC plays at a
    /// different one. The applied change rides on the first point of the
    /// next data frame.
    fn ensure_target_point_rate(&mut self) {
        if self.clear_required || self.prepare_required || self.begin_required {
            return;
        }
        let Some(status) = self.latest_status else {
            return;
        };
        if status.playback != Playback::Playing
            || status.point_rate == self.target_rate
            || self.rate_change_pending
        {
            return;
        }

        let rate = self.target_rate;
        logging::info(&format!("[{DEVICE_NAME}] tx 'q' (rate={rate})"));
        match self.transact(command::QueueRateChange(rate)) {
            Ok(Reply::Acked) => self.rate_change_pending = true,
            Ok(Reply::Rejected) => {}
            Err(Error::Canceled) => {}
            Err(err) => self.handle_failure("point rate command", err),
        }
    }

    /// Build the fill request for this iteration from the FIFO model.
    fn fill_request(&mut self) -> PointFillRequest {
        let now = Instant::now();
        let latency_ms = self.shared.latency_ms();
        let (minimum, maximum) = self.refill.fill_bounds(latency_ms, now);

        PointFillRequest {
            minimum_points_required: minimum,
            maximum_points_required: maximum,
            // TODO: incorporate the remaining buffered playback time.
            estimated_first_point_render_time: now
                + Duration::from_millis(latency_ms.max(0) as u64),
            point_index: self.point_index,
        }
    }

    /// Encode the sourced points as one data frame and send it.
    fn send_points(&mut self, request: &PointFillRequest) -> Result<()> {
        if self.clear_required || self.prepare_required {
            // The last reply changed the playback state under us; these
            // points would be rejected.
            self.source.points.clear();
            return Ok(());
        }

        let produced = self.source.points.len();
        if produced == 0 {
            return Ok(());
        }
        if produced < request.minimum_points_required {
            logging::error(&format!(
                "[{DEVICE_NAME}] generator produced {produced} of {} required points; dropping frame",
                request.minimum_points_required
            ));
            self.source.points.clear();
            return Ok(());
        }

        let inject_rate_change = self.rate_change_pending;
        self.dac_points.clear();
        for (idx, point) in self.source.points.iter().enumerate() {
            self.dac_points
                .push(DacPoint::from_laser(point, inject_rate_change && idx == 0));
        }

        self.scratch.clear();
        self.scratch.write_bytes(command::Data {
            points: Cow::Borrowed(&self.dac_points),
        })?;
        logging::info(&format!(
            "[{DEVICE_NAME}] tx data: points={produced} bytes={}",
            self.scratch.len()
        ));

        let timeout = self.op_timeout();
        if let Err(err) = self.client.write_all(&self.scratch, timeout) {
            self.handle_failure("stream write", err.clone());
            self.source.points.clear();
            return Err(err);
        }

        match self.wait_for_response(command::Data::START_BYTE) {
            Ok(Reply::Acked) => {
                if inject_rate_change {
                    self.rate_change_pending = false;
                }
                self.point_index += produced as u64;
            }
            Ok(Reply::Rejected) => {
                // Frame refused; the applied status schedules a clear.
            }
            // Stop was requested; the unread ack is drained by the next
            // session's handshake.
            Err(Error::Canceled) => {
                self.source.points.clear();
                return Err(Error::Canceled);
            }
            Err(err) => {
                self.handle_failure("waiting for data ack", err.clone());
                self.source.points.clear();
                return Err(err);
            }
        }

        self.source.points.clear();
        Ok(())
    }

    fn sleep_until_next_points(&self) {
        let duration = self
            .refill
            .sleep_duration(self.shared.latency_ms(), Instant::now());
        thread::sleep(duration);
    }

    /// One pass of the main loop. Returns early as soon as a step stops
    /// the worker.
    fn tick(&mut self) {
        if self.clear_required && self.send_clear().is_err() {
            return;
        }
        if self.prepare_required && self.send_prepare().is_err() {
            return;
        }

        self.sleep_until_next_points();
        if !self.running() {
            return;
        }

        let request = self.fill_request();
        if request.needs_points(config::MIN_PACKET_POINTS)
            && self.source.request_points(&request)
            && self.send_points(&request).is_err()
        {
            return;
        }

        if self.begin_required && self.send_begin().is_err() {
            return;
        }

        self.ensure_target_point_rate();
    }
}

impl DeviceLoop for Engine {
    fn device_name(&self) -> &'static str {
        DEVICE_NAME
    }

    fn run(&mut self) {
        self.failure_encountered = false;
        self.shared.failed.store(false, Ordering::SeqCst);

        if !self.client.is_connected() {
            logging::error(&format!(
                "[{DEVICE_NAME}] worker started without an active connection"
            ));
            self.shared.record_error(Error::NotConnected);
            self.shared.running.store(false, Ordering::SeqCst);
            return;
        }

        // The DAC announces itself with an unsolicited status reply once
        // the connection opens. If it never arrived, ask explicitly; a
        // DAC that answers neither is unusable for this session.
        if self.wait_for_response(command::Ping::START_BYTE).is_err() {
            match self.transact(command::Ping) {
                Ok(_) => {}
                Err(Error::Canceled) => return,
                Err(err) => {
                    self.handle_failure("initial ping", err);
                    return;
                }
            }
        }

        while self.running() {
            self.tick();
        }

        if self.failure_encountered && self.client.is_connected() {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LightEngineFlags;

    fn test_engine() -> (NetService, Engine) {
        let service = NetService::new().unwrap();
        let shared = DeviceShared::new();
        let engine = Engine::new(service.handle().clone(), shared);
        (service, engine)
    }

    fn status(
        light_engine: LightEngine,
        playback: Playback,
        playback_flags: PlaybackFlags,
        buffer_fullness: u16,
    ) -> DeviceStatus {
        DeviceStatus {
            protocol: 0,
            light_engine,
            playback,
            source: 0,
            light_engine_flags: LightEngineFlags::empty(),
            playback_flags,
            source_flags: 0,
            buffer_fullness,
            point_rate: 30_000,
            point_count: 0,
        }
    }

    #[test]
    fn estop_state_requires_clear() {
        let (_service, mut engine) = test_engine();
        engine.apply_status(
            &status(
                LightEngine::EmergencyStop,
                Playback::Idle,
                PlaybackFlags::empty(),
                0,
            ),
            true,
        );
        assert!(engine.clear_required);
        assert!(!engine.prepare_required);
        assert!(!engine.begin_required);
    }

    #[test]
    fn estop_flag_requires_clear() {
        let (_service, mut engine) = test_engine();
        engine.apply_status(
            &status(
                LightEngine::Ready,
                Playback::Idle,
                PlaybackFlags::EMERGENCY_STOP,
                0,
            ),
            true,
        );
        assert!(engine.clear_required);
        assert!(!engine.prepare_required);
    }

    #[test]
    fn unacked_command_requires_clear() {
        let (_service, mut engine) = test_engine();
        engine.apply_status(
            &status(LightEngine::Ready, Playback::Idle, PlaybackFlags::empty(), 0),
            false,
        );
        assert!(engine.clear_required);
    }

    #[test]
    fn ready_and_idle_requires_prepare() {
        let (_service, mut engine) = test_engine();
        engine.apply_status(
            &status(LightEngine::Ready, Playback::Idle, PlaybackFlags::empty(), 0),
            true,
        );
        assert!(!engine.clear_required);
        assert!(engine.prepare_required);
        assert!(!engine.begin_required);
    }

    #[test]
    fn prepared_with_enough_points_requires_begin() {
        let (_service, mut engine) = test_engine();
        engine.apply_status(
            &status(
                LightEngine::Ready,
                Playback::Prepared,
                PlaybackFlags::empty(),
                config::MIN_PACKET_POINTS as u16,
            ),
            true,
        );
        assert!(engine.begin_required);

        engine.apply_status(
            &status(
                LightEngine::Ready,
                Playback::Prepared,
                PlaybackFlags::empty(),
                config::MIN_PACKET_POINTS as u16 - 1,
            ),
            true,
        );
        assert!(!engine.begin_required);
    }

    #[test]
    fn playing_state_requires_nothing() {
        let (_service, mut engine) = test_engine();
        engine.apply_status(
            &status(
                LightEngine::Ready,
                Playback::Playing,
                PlaybackFlags::SHUTTER_OPEN,
                1500,
            ),
            true,
        );
        assert!(!engine.clear_required);
        assert!(!engine.prepare_required);
        assert!(!engine.begin_required);
    }
}
