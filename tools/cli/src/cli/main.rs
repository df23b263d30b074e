#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]

use clap::Parser;
use proxycheck_cli::ProxyCheckParser;
use std::process::ExitCode;
use tokio::runtime;

fn main() -> ExitCode {
    let opt = ProxyCheckParser::parse();

    if let Err(e) = sketching::cli_init(opt.debug) {
        eprintln!("ERROR! {}", e);
        return ExitCode::FAILURE;
    }

    // The flow is strictly sequential, one thread is all it needs.
    let rt = match runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("ERROR! Unable to start the tokio runtime {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(opt.exec())
}
