//! Tracing subscriber setup for the binary.
//!
//! Log lines go to stderr so table and JSON output on stdout stay clean.
//! `RUST_LOG` takes precedence over the built-in defaults.

use tracing_subscriber::EnvFilter;

fn cli_filter(verbose: bool) -> &'static str {
    if verbose {
        "depdoctor=debug,info"
    } else {
        "depdoctor=warn,warn"
    }
}

fn server_filter(verbose: bool) -> &'static str {
    if verbose {
        "depdoctor=debug,info"
    } else {
        "depdoctor=info,warn"
    }
}

fn install(default_directives: &str, with_target: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    // A second call finds a subscriber already set and does nothing.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(with_target)
        .try_init();
}

/// Installs the global subscriber for one-shot commands (warnings only
/// unless `verbose`).
pub fn init(verbose: bool) {
    install(cli_filter(verbose), false);
}

/// Installs the global subscriber for `serve` (info by default).
pub fn init_server(verbose: bool) {
    install(server_filter(verbose), true);
}
