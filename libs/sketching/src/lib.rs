#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use tracing_forest::printer::TestCapturePrinter;
use tracing_forest::tag::NoTag;
use tracing_forest::ForestLayer;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub use {tracing, tracing_forest, tracing_subscriber};

const DEBUG_DIRECTIVES: &str = "proxycheck_client=debug,proxycheck_cli=debug";
const DEFAULT_DIRECTIVES: &str = "proxycheck_client=warn,proxycheck_cli=info";

/// Build the filter used by the command line tool.
///
/// `--debug` always wins. Otherwise `RUST_LOG` is honoured, falling back to
/// quiet client logs and informational flow logs.
pub fn cli_filter(debug: bool) -> Result<EnvFilter, String> {
    if debug {
        EnvFilter::try_new(DEBUG_DIRECTIVES)
            .map_err(|e| format!("Unable to build debug log filter: {:?}", e))
    } else {
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .parse_lossy(DEFAULT_DIRECTIVES)
        }))
    }
}

/// Start up the logging for the command line tool. Events go to stderr so that
/// the progress lines on stdout stay clean.
pub fn cli_init(debug: bool) -> Result<(), String> {
    let filter_layer = cli_filter(debug)?;
    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| format!("Unable to start tracing: {:?}", e))
}

/// Start up the logging for test mode.
pub fn test_init() {
    let mut filter = EnvFilter::from_default_env().add_directive(LevelFilter::TRACE.into());

    // hyper's very noisy in debug mode with connectivity-related things that we only need in extreme cases.
    if let Ok(directive) = "hyper=INFO".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    // start the logging!
    let _ = tracing_subscriber::Registry::default()
        .with(ForestLayer::new(TestCapturePrinter::new(), NoTag).with_filter(filter))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_filter_debug_overrides_env() {
        let filter = cli_filter(true).expect("debug filter must build");
        let rendered = filter.to_string();
        assert!(rendered.contains("proxycheck_client=debug"));
        assert!(rendered.contains("proxycheck_cli=debug"));
    }

    #[test]
    fn test_init_is_repeatable() {
        test_init();
        test_init();
        tracing::info!("logging still works after a second init");
    }
}
