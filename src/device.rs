//! Callback-driven device base.
//!
//! Device-specific workers are built from three pieces: a [`PointSource`]
//! holding the generator callback and the outbound point buffer, a
//! [`DeviceShared`] block of thread-safe control state, and a
//! [`WorkerHandle`] harness that owns the worker thread. The harness runs
//! any [`DeviceLoop`] implementation, which supplies the device-specific
//! loop body and a name for the thread.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::config;
use crate::error::Error;
use crate::logging;
use crate::types::{FillCallback, LaserPoint, PointFillRequest};

/// Generator callback plus the buffer of points pending transmission.
///
/// The buffer is pre-reserved well beyond any hardware FIFO so the hot
/// path reuses capacity instead of reallocating.
pub(crate) struct PointSource {
    callback: Option<FillCallback>,
    pub(crate) points: Vec<LaserPoint>,
}

impl PointSource {
    pub(crate) fn new() -> Self {
        Self {
            callback: None,
            points: Vec::with_capacity(config::POINT_BUFFER_RESERVE),
        }
    }

    /// Install or replace the callback that generates points.
    pub(crate) fn set_callback(&mut self, callback: FillCallback) {
        self.callback = Some(callback);
    }

    /// Ask the callback for points, replacing the buffer contents.
    ///
    /// Returns `false` if no callback is installed. Debug builds enforce
    /// the contract that the callback produced at least the requested
    /// minimum and respected a non-zero maximum.
    pub(crate) fn request_points(&mut self, request: &PointFillRequest) -> bool {
        let Some(callback) = self.callback.as_mut() else {
            return false;
        };

        // Reset the transmission buffer while retaining capacity.
        self.points.clear();
        callback(request, &mut self.points);

        debug_assert!(
            self.points.len() >= request.minimum_points_required,
            "callback produced {} points, below the required minimum {}",
            self.points.len(),
            request.minimum_points_required,
        );
        if request.maximum_points_required > 0 {
            debug_assert!(
                self.points.len() <= request.maximum_points_required,
                "callback produced {} points, above the allowed maximum {}",
                self.points.len(),
                request.maximum_points_required,
            );
        }

        true
    }
}

/// Control state shared between a device handle and its worker thread.
pub(crate) struct DeviceShared {
    /// Worker loop keeps iterating while set.
    pub(crate) running: AtomicBool,
    /// Reflects whether the TCP connection is believed alive.
    pub(crate) connected: AtomicBool,
    /// Set when the worker exits because of a failure.
    pub(crate) failed: AtomicBool,
    latency_ms: AtomicI64,
    last_error: Mutex<Option<Error>>,
}

impl DeviceShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            latency_ms: AtomicI64::new(config::DEFAULT_LATENCY_MS),
            last_error: Mutex::new(None),
        })
    }

    /// Set the latency budget in milliseconds. Values below 1 ms clamp to
    /// 1 to avoid zero-length deadlines.
    pub(crate) fn set_latency_ms(&self, millis: i64) {
        self.latency_ms.store(millis.max(1), Ordering::Relaxed);
    }

    pub(crate) fn latency_ms(&self) -> i64 {
        self.latency_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub(crate) fn record_error(&self, error: Error) {
        *self.last_error.lock().expect("last_error lock") = Some(error);
    }

    pub(crate) fn last_error(&self) -> Option<Error> {
        self.last_error.lock().expect("last_error lock").clone()
    }
}

/// Device-specific worker loop run by the harness.
pub(crate) trait DeviceLoop: Send + 'static {
    /// Short name used for the worker thread and log tags.
    fn device_name(&self) -> &'static str;

    /// The loop body; must return once `running` is cleared.
    fn run(&mut self);
}

/// Owns the worker thread for one device.
///
/// The loop object moves into the thread on spawn and is handed back on
/// join, so the device regains exclusive access to its engine after
/// `stop`.
pub(crate) struct WorkerHandle<L: DeviceLoop> {
    handle: Option<JoinHandle<L>>,
}

impl<L: DeviceLoop> WorkerHandle<L> {
    /// Mark the device running and spawn the worker thread.
    pub(crate) fn spawn(mut device_loop: L, shared: &Arc<DeviceShared>) -> Self {
        shared.running.store(true, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name(device_loop.device_name().to_string())
            .spawn(move || {
                device_loop.run();
                device_loop
            })
            .expect("failed to spawn device worker thread");
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the worker to finish and recover the loop object.
    ///
    /// The caller clears `running` first; this join happens exactly once.
    /// Returns `None` if the worker panicked.
    pub(crate) fn join(mut self, name: &str) -> Option<L> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(device_loop) => Some(device_loop),
            Err(_) => {
                logging::error(&format!("[{name}] worker thread panicked"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn request(min: usize, max: usize) -> PointFillRequest {
        PointFillRequest {
            minimum_points_required: min,
            maximum_points_required: max,
            estimated_first_point_render_time: Instant::now(),
            point_index: 0,
        }
    }

    #[test]
    fn request_points_without_callback_returns_false() {
        let mut source = PointSource::new();
        assert!(!source.request_points(&request(10, 100)));
        assert!(source.points.is_empty());
    }

    #[test]
    fn request_points_replaces_buffer_contents() {
        let mut source = PointSource::new();
        source.set_callback(Box::new(|req, out| {
            for _ in 0..req.minimum_points_required {
                out.push(LaserPoint::blanked(0.0, 0.0));
            }
        }));

        assert!(source.request_points(&request(5, 10)));
        assert_eq!(source.points.len(), 5);

        // A second request starts from an empty buffer again.
        assert!(source.request_points(&request(3, 10)));
        assert_eq!(source.points.len(), 3);
    }

    #[test]
    fn buffer_capacity_is_preserved_across_requests() {
        let mut source = PointSource::new();
        let capacity = source.points.capacity();
        assert!(capacity >= config::POINT_BUFFER_RESERVE);

        source.set_callback(Box::new(|_, out| {
            out.push(LaserPoint::blanked(0.0, 0.0));
        }));
        source.request_points(&request(0, 10));
        assert_eq!(source.points.capacity(), capacity);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "below the required minimum")]
    fn underfilled_callback_trips_debug_assertion() {
        let mut source = PointSource::new();
        source.set_callback(Box::new(|req, out| {
            for _ in 0..req.minimum_points_required.saturating_sub(1) {
                out.push(LaserPoint::blanked(0.0, 0.0));
            }
        }));
        source.request_points(&request(10, 0));
    }

    #[test]
    fn latency_clamps_to_one_millisecond() {
        let shared = DeviceShared::new();
        assert_eq!(shared.latency_ms(), config::DEFAULT_LATENCY_MS);

        shared.set_latency_ms(0);
        assert_eq!(shared.latency_ms(), 1);
        shared.set_latency_ms(-20);
        assert_eq!(shared.latency_ms(), 1);
        shared.set_latency_ms(120);
        assert_eq!(shared.latency_ms(), 120);
    }

    struct CountingLoop {
        shared: Arc<DeviceShared>,
        iterations: usize,
    }

    impl DeviceLoop for CountingLoop {
        fn device_name(&self) -> &'static str {
            "counting-loop"
        }

        fn run(&mut self) {
            while self.shared.is_running() {
                self.iterations += 1;
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    #[test]
    fn harness_runs_loop_until_stopped_and_returns_it() {
        let shared = DeviceShared::new();
        let worker = WorkerHandle::spawn(
            CountingLoop {
                shared: Arc::clone(&shared),
                iterations: 0,
            },
            &shared,
        );
        assert!(shared.is_running());

        thread::sleep(Duration::from_millis(20));
        shared.running.store(false, Ordering::SeqCst);
        let device_loop = worker.join("counting-loop").expect("worker completed");
        assert!(device_loop.iterations > 0);
    }
}
