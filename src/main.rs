//! `x402-paywall` command-line entrypoint.
//!
//! Fetches a URL and pays through `402 Payment Required` challenges on the way:
//! the payment terms from the response headers are shown, a receipt is read
//! from stdin (or taken from `--receipt`), and the request is replayed once
//! with the receipt in the `X-Payment-Receipt` header.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `PAYWALL_URL`, `PAYWALL_RECEIPT`, `PAYWALL_TIMEOUT`, `CONFIG` as flag fallbacks
//! - `RUST_LOG` controls log verbosity
//! - `OTEL_*` variables enable span export to an OTLP collector

mod config;
mod prompt;
mod run;
mod util;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    };
    // A cancelled prompt may leave stdin's blocking reader behind; don't wait for it.
    process::exit(code)
}
