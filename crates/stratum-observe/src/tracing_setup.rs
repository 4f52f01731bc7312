//! Process-wide `tracing` subscriber for the `stratum` binary.
//!
//! Log lines go to stderr so command output on stdout stays parseable.
//! Directives come from `RUST_LOG` when it is set, otherwise from the
//! caller's defaults. Span export through OpenTelemetry is opt-in.
//!
//! ```no_run
//! use stratum_observe::tracing_setup::{init_tracing, LogFormat};
//!
//! init_tracing("warn", LogFormat::Text, false).unwrap();
//! ```

use std::io;
use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Layout of emitted log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Kept for `shutdown_tracing`, which must flush buffered spans.
static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

fn directives(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber.
///
/// Worker spans (`layer_worker`) are logged when they close, which reports
/// how long each layer worker ran. With `enable_otel` the same spans are also
/// exported through the OpenTelemetry stdout exporter.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(
    default_directives: &str,
    format: LogFormat,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel = enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("stratum");
        let _ = PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(directives(default_directives))
        .with(text)
        .with(json)
        .with(otel)
        .try_init()?;
    Ok(())
}

/// Flush and shut down the OpenTelemetry provider, if one was installed.
pub fn shutdown_tracing() {
    let Some(provider) = PROVIDER.get() else {
        return;
    };
    if let Err(e) = provider.shutdown() {
        eprintln!("warning: failed to shut down span exporter: {e}");
    }
}
