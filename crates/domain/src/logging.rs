use tracing_subscriber::EnvFilter;

/// Initialize the process-wide structured logger. `RUST_LOG` overrides the
/// default filter; falls back to `info` with `va_*` crates at `debug`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,va_pipeline=debug,va_nlu=debug,va_actions=debug")),
        )
        .json()
        .init();
}
