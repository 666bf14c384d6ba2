//! Fetches the configured URL through the paywall middleware.

use dotenvy::dotenv;
use reqwest::Client;
use x402_paywall_reqwest::{
    PaymentResolver, PaywallClient, ReqwestWithPaywall, ReqwestWithPaywallBuild, StaticReceipt,
    WithTimeout,
};

use crate::config::Config;
use crate::prompt::ConsolePrompt;
use crate::util::{SigDown, Telemetry};

/// Runs a single paid fetch.
///
/// - Loads `.env` variables.
/// - Sets up logging and optional OpenTelemetry export.
/// - Resolves challenges with `--receipt` if given, by prompting on stdin otherwise.
/// - Prints completion events to stderr as JSON and the response body to stdout.
///
/// Fails when the final response is not successful, including a 402 whose
/// payment was declined.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _telemetry = Telemetry::init(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    let resolver: Box<dyn PaymentResolver> = match config.receipt() {
        Some(receipt) => Box::new(StaticReceipt::new(receipt.clone())),
        None => Box::new(ConsolePrompt::stdin()),
    };
    let resolver: Box<dyn PaymentResolver> = match config.timeout() {
        Some(timeout) => Box::new(WithTimeout::new(resolver, timeout)),
        None => resolver,
    };

    let paywall =
        PaywallClient::new(resolver).with_receipt_header(config.receipt_header().clone());
    let gate = paywall.gate().clone();
    let (completions, mut events) = paywall.notifier().subscribe_channel();
    let client = Client::new().with_paywall(paywall).build();

    let mut request = client
        .request(config.method().clone(), config.url().clone())
        .headers(config.headers().clone());
    if let Some(body) = config.body() {
        request = request.body(body.to_owned());
    }

    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();
    let send = request.send();
    tokio::pin!(send);
    let response = tokio::select! {
        response = &mut send => response?,
        _ = shutdown.cancelled() => {
            // With a challenge open, cancelling it lets the request finish with the original 402.
            if !gate.cancel() {
                return Err("Interrupted".into());
            }
            send.await?
        }
    };

    // Deliveries still in flight hold a sender; the channel closes once they are done.
    completions.unsubscribe();
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => eprintln!("Payment completed: {json}"),
            Err(err) => tracing::warn!(error = %err, "Failed to encode completion event"),
        }
    }

    let status = response.status();
    tracing::info!(%status, url = %response.url(), "Received response");
    let body = response.text().await?;
    println!("{body}");

    if status.is_success() {
        Ok(())
    } else {
        Err(format!("Request failed with status {status}").into())
    }
}
