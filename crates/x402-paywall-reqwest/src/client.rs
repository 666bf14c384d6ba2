//! Client-side paywall handling for reqwest.
//!
//! This module provides the [`PaywallClient`] middleware which detects payment
//! challenges, has them resolved through a [`SingleFlightGate`], and replays the
//! challenged request once with the receipt attached.

use http::header::{HeaderName, HeaderValue};
use http::{Extensions, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;
use x402_paywall_types::{PaymentRequest, RECEIPT_HEADER, Resolution, parse_challenge};

use crate::gate::SingleFlightGate;
use crate::notifier::CompletionNotifier;
use crate::resolver::PaymentResolver;

#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace, warn};

/// Middleware that pays for `402 Payment Required` responses.
///
/// For every request that comes back with status 402 and a well-formed
/// challenge, the client asks its gate for a receipt. If one is obtained the
/// request is sent again, exactly once, with the receipt in the
/// `X-Payment-Receipt` header. Otherwise the original 402 response is returned
/// as if no paywall support existed.
///
/// ## Creating a PaywallClient
///
/// ```rust,no_run
/// use x402_paywall_reqwest::{PaywallClient, StaticReceipt};
///
/// let client = PaywallClient::new(StaticReceipt::new("receipt-xyz"));
/// ```
///
/// ## Observing paid requests
///
/// ```rust,no_run
/// use x402_paywall_reqwest::{PaywallClient, StaticReceipt};
///
/// let client = PaywallClient::new(StaticReceipt::new("receipt-xyz"));
/// client
///     .notifier()
///     .subscribe(|event| println!("paid {} for {}", event.challenge.amount, event.url))
///     .detach();
/// ```
///
/// ## Using with Reqwest
///
/// See the [`ReqwestWithPaywall`](crate::ReqwestWithPaywall) trait for integrating with reqwest.
#[derive(Clone)]
pub struct PaywallClient {
    gate: Arc<SingleFlightGate>,
    notifier: CompletionNotifier,
    receipt_header: HeaderName,
}

impl PaywallClient {
    /// Creates a client with its own gate around `resolver` and a fresh notifier.
    pub fn new<R: PaymentResolver + 'static>(resolver: R) -> Self {
        Self::with_gate(Arc::new(SingleFlightGate::new(resolver)))
    }

    /// Creates a client around an existing gate, e.g. one the UI also holds
    /// to confirm or cancel challenges.
    pub fn with_gate(gate: Arc<SingleFlightGate>) -> Self {
        Self {
            gate,
            notifier: CompletionNotifier::new(),
            receipt_header: RECEIPT_HEADER,
        }
    }

    /// Publishes completion events through `notifier` instead of a private one.
    pub fn with_notifier(mut self, notifier: CompletionNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Overrides the request header the receipt is sent in.
    pub fn with_receipt_header(mut self, header: HeaderName) -> Self {
        self.receipt_header = header;
        self
    }

    pub fn gate(&self) -> &Arc<SingleFlightGate> {
        &self.gate
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    pub fn receipt_header(&self) -> &HeaderName {
        &self.receipt_header
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for PaywallClient {
    /// Handles a request, paying for it if the server asks.
    ///
    /// When a 402 response carries a challenge, this middleware:
    /// 1. Asks the gate for a receipt
    /// 2. Retries a copy of the request with the receipt header
    /// 3. Emits a completion event if the retry succeeded
    ///
    /// Transport errors from either attempt are returned untouched.
    #[cfg_attr(feature = "telemetry", instrument(name = "x402.paywall.handle", skip_all, err, fields(method = %req.method(), url = %req.url())))]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let url = req.url().to_string();
        let method = req.method().to_string();
        let res = next.clone().run(req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }

        let Some(challenge) = parse_challenge(res.headers()) else {
            #[cfg(feature = "telemetry")]
            debug!("402 response without a well-formed challenge, returning response");
            return Ok(res);
        };

        #[cfg(feature = "telemetry")]
        info!(pay_to = %challenge.pay_to, amount = %challenge.amount, currency = %challenge.currency, network = %challenge.network, "Received 402 Payment Required, resolving challenge");

        let Some(mut retry) = retry_req else {
            #[cfg(feature = "telemetry")]
            warn!("Request is not cloneable, cannot replay it with a receipt");
            return Ok(res);
        };

        let payment_request = PaymentRequest::new(challenge, url, method);
        let receipt = match self.gate.open_challenge(payment_request.clone()).await {
            Resolution::Paid(receipt) => receipt,
            Resolution::Declined(_decline) => {
                #[cfg(feature = "telemetry")]
                debug!(reason = %_decline, "No receipt, returning original response");
                return Ok(res);
            }
        };

        let header_value = match HeaderValue::from_str(receipt.as_str()) {
            Ok(value) => value,
            Err(_) => {
                #[cfg(feature = "telemetry")]
                warn!("Receipt is not a valid header value, returning original response");
                return Ok(res);
            }
        };
        retry
            .headers_mut()
            .insert(self.receipt_header.clone(), header_value);

        #[cfg(feature = "telemetry")]
        trace!(url = %retry.url(), "Retrying request with receipt");

        let retried = next.run(retry, extensions).await?;
        if retried.status().is_success() {
            self.notifier.emit(payment_request.complete(receipt));
        } else {
            #[cfg(feature = "telemetry")]
            debug!(status = ?retried.status(), "Paid retry was not successful");
        }
        Ok(retried)
    }
}
