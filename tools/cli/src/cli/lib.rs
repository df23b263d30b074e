#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]
// We allow expect since it forces good error messages at the least.
#![allow(clippy::expect_used)]

#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::process::ExitCode;

include!("../opt/proxycheck.rs");

pub mod common;
pub mod flow;

impl ProxyCheckParser {
    pub async fn exec(&self) -> ExitCode {
        let config = match self.read_config() {
            Ok(c) => c,
            Err(e) => {
                report_abort(&format!("Unable to load configuration - {}", e));
                return ExitCode::FAILURE;
            }
        };

        let client = match self.to_client(&config) {
            Ok(c) => c,
            Err(e) => {
                report_abort(&format!("Unable to build client - {}", e));
                return ExitCode::FAILURE;
            }
        };

        match flow::run_flow(&client, &self.flow_options(&config)).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                report_abort(&e.to_string());
                ExitCode::FAILURE
            }
        }
    }
}

/// The reason for a failed run goes to stderr even when logging is filtered
/// off.
fn report_abort(msg: &str) {
    error!("{}", msg);
    eprintln!("ERROR! {}", msg);
}
