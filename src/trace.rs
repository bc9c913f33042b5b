//! Tracing setup untuk binaries dan tests.
//!
//! Library hanya memanggil macro `tracing`; subscriber dipasang oleh binary.
//! Filter default `circq=info`, bisa di-override lewat `RUST_LOG`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pasang fmt subscriber dengan timestamp uptime dan thread names.
///
/// Aman dipanggil lebih dari sekali; call berikutnya diabaikan.
pub fn init_tracing() {
    init_with_default("circq=info");
}

/// Seperti [`init_tracing`], dengan filter default `circq=debug` untuk verbose mode
pub fn init_tracing_verbose() {
    init_with_default("circq=debug");
}

fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}
