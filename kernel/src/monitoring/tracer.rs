/*!
 * Structured Tracing
 * Subscriber setup and syscall spans using the tracing crate
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// Calling it more than once is harmless; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::NONE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Span covering one syscall from entry to return
pub struct SyscallSpan {
    span: tracing::Span,
    start: Instant,
    syscall: &'static str,
}

impl SyscallSpan {
    pub fn new(syscall: &'static str, pid: u32) -> Self {
        let span = span!(
            Level::DEBUG,
            "syscall",
            syscall = syscall,
            pid = pid,
            return_value = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            syscall,
        }
    }

    /// Record the value handed back to the process
    pub fn record_return(&self, value: i64) {
        self.span.record("return_value", value);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();

        // Blocking syscalls (wait, sleep) are expected to be slow; this only flags
        // the ones that should return promptly.
        if duration.as_millis() > 10 && !matches!(self.syscall, "wait" | "sleep" | "yield") {
            warn!(
                syscall = self.syscall,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow syscall detected"
            );
        } else {
            debug!(
                syscall = self.syscall,
                duration_us = duration.as_micros() as u64,
                "syscall completed"
            );
        }
    }
}
