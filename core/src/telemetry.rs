// Logging setup shared by the binaries
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a compact fmt subscriber on stdout, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
        .is_ok();
    if installed {
        info!(target: "telemetry", "Tracing initialized");
    }
}

/// Same as [`init_tracing`] but writes to stderr.
///
/// Processes speaking a protocol on stdout (the MCP calendar server) must use this.
pub fn init_tracing_stderr() {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok();
    if installed {
        info!(target: "telemetry", "Tracing initialized (stderr)");
    }
}
