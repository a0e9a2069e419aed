//! Process-wide pluggable logging sinks.
//!
//! The engine reports worker-loop events through two function objects, one
//! for informational messages and one for errors. Hosts that want the
//! output somewhere specific (a GUI console, a file) install their own
//! sinks; everyone else gets the defaults, which forward to the `log`
//! facade so the embedding application's logger configuration applies.
//!
//! Sink installation is guarded by a lock and safe from any thread. The
//! sink is cloned out of the registry before invocation, so a slow sink
//! never holds the lock while it runs.

use std::sync::{Arc, LazyLock, Mutex};

/// A logging sink. Receives one complete message per call.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

struct Sinks {
    info: LogSink,
    error: LogSink,
}

fn default_info_sink() -> LogSink {
    Arc::new(|message| log::info!(target: "etherdream_stream", "{message}"))
}

fn default_error_sink() -> LogSink {
    Arc::new(|message| log::error!(target: "etherdream_stream", "{message}"))
}

static SINKS: LazyLock<Mutex<Sinks>> = LazyLock::new(|| {
    Mutex::new(Sinks {
        info: default_info_sink(),
        error: default_error_sink(),
    })
});

/// Install or replace the informational sink.
pub fn set_info_sink(sink: LogSink) {
    SINKS.lock().expect("log sink lock").info = sink;
}

/// Install or replace the error sink.
pub fn set_error_sink(sink: LogSink) {
    SINKS.lock().expect("log sink lock").error = sink;
}

/// Install both sinks in one step.
pub fn set_sinks(info: LogSink, error: LogSink) {
    let mut sinks = SINKS.lock().expect("log sink lock");
    sinks.info = info;
    sinks.error = error;
}

/// Restore the default sinks (the `log` facade).
pub fn reset_sinks() {
    let mut sinks = SINKS.lock().expect("log sink lock");
    sinks.info = default_info_sink();
    sinks.error = default_error_sink();
}

/// Emit an informational message through the installed sink.
pub fn info(message: &str) {
    let sink = SINKS.lock().expect("log sink lock").info.clone();
    sink(message);
}

/// Emit an error message through the installed sink.
pub fn error(message: &str) {
    let sink = SINKS.lock().expect("log sink lock").error.clone();
    sink(message);
}
