//! Single-flight gate for payment challenges.
//!
//! At most one challenge is resolved at a time per gate. A challenger that
//! arrives while another challenge is open is declined with [`Decline::Busy`]
//! right away instead of being queued, so payment prompts never stack.
//!
//! The open challenge can be settled in two ways, whichever comes first:
//! the gate's [`PaymentResolver`] returns, or the UI calls
//! [`SingleFlightGate::confirm`] / [`SingleFlightGate::cancel`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use x402_paywall_types::{Decline, PaymentRequest, Receipt, Resolution};

use crate::resolver::PaymentResolver;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument, warn};

/// The challenge currently being resolved and its one-shot continuation.
///
/// `respond` is taken by the first external answer; the record itself stays in
/// place until [`SingleFlightGate::open_challenge`] returns.
struct PendingChallenge {
    request: PaymentRequest,
    respond: Option<oneshot::Sender<Resolution>>,
}

/// Serializes payment challenges: one open challenge per gate, no queue.
pub struct SingleFlightGate {
    resolver: Arc<dyn PaymentResolver>,
    pending: Mutex<Option<PendingChallenge>>,
}

impl SingleFlightGate {
    pub fn new<R: PaymentResolver + 'static>(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
            pending: Mutex::new(None),
        }
    }

    /// Resolves `request`, or declines it with [`Decline::Busy`] if another
    /// challenge is open.
    ///
    /// A failing resolver yields [`Decline::Failed`] after the failure has been
    /// reported through [`PaymentResolver::report_failure`]. The gate is free
    /// again once this future completes or is dropped.
    #[cfg_attr(feature = "telemetry", instrument(name = "x402.paywall.open_challenge", skip_all, fields(url = %request.url, method = %request.method)))]
    pub async fn open_challenge(&self, request: PaymentRequest) -> Resolution {
        let (respond, answer) = oneshot::channel();
        {
            let mut slot = self.slot();
            if slot.is_some() {
                #[cfg(feature = "telemetry")]
                debug!("Challenge already in progress, declining");
                return Resolution::Declined(Decline::Busy);
            }
            *slot = Some(PendingChallenge {
                request: request.clone(),
                respond: Some(respond),
            });
        }
        let _release = Release(&self.pending);

        #[cfg(feature = "telemetry")]
        debug!(nonce = %request.challenge.nonce, "Opened payment challenge");

        tokio::select! {
            biased;
            answer = answer => answer.unwrap_or_else(|_| Resolution::cancelled()),
            outcome = self.resolver.resolve(&request) => match outcome {
                Ok(resolution) => resolution,
                Err(err) => {
                    let reason = err.to_string();
                    #[cfg(feature = "telemetry")]
                    warn!(error = %reason, "Payment resolver failed");
                    self.resolver.report_failure(&request, &reason);
                    Resolution::Declined(Decline::Failed(reason))
                }
            },
        }
    }

    /// Whether a challenge is currently open.
    pub fn is_busy(&self) -> bool {
        self.slot().is_some()
    }

    /// The request behind the open challenge, for display.
    pub fn pending(&self) -> Option<PaymentRequest> {
        self.slot().as_ref().map(|pending| pending.request.clone())
    }

    /// Settles the open challenge with `receipt`.
    ///
    /// Returns `false` if there is nothing to settle.
    pub fn confirm(&self, receipt: Receipt) -> bool {
        self.answer(Resolution::Paid(receipt))
    }

    /// Abandons the open challenge; its caller gets the original response back.
    ///
    /// Returns `false` if there is nothing to cancel.
    pub fn cancel(&self) -> bool {
        self.answer(Resolution::cancelled())
    }

    fn answer(&self, resolution: Resolution) -> bool {
        let respond = self
            .slot()
            .as_mut()
            .and_then(|pending| pending.respond.take());
        match respond {
            Some(respond) => respond.send(resolution).is_ok(),
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PendingChallenge>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the pending slot when the challenge future ends, however it ends.
struct Release<'a>(&'a Mutex<Option<PendingChallenge>>);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use x402_paywall_types::PaymentChallenge;

    fn payment_request(nonce: &str) -> PaymentRequest {
        let challenge = PaymentChallenge {
            pay_to: "ACCT1".into(),
            amount: "2.5".into(),
            currency: "USDC".into(),
            network: "algorand".into(),
            nonce: nonce.into(),
            callback_url: None,
        };
        PaymentRequest::new(challenge, "http://localhost/api/report", "GET")
    }

    /// Blocks inside `resolve` until released.
    struct HeldResolver {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
        answer: Result<Resolution, String>,
        failures: Mutex<Vec<String>>,
    }

    impl HeldResolver {
        fn new(answer: Result<Resolution, String>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
                release: Notify::new(),
                answer,
                failures: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait::async_trait]
    impl PaymentResolver for HeldResolver {
        async fn resolve(&self, _request: &PaymentRequest) -> Result<Resolution, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.answer.clone().map_err(ResolverError::Interaction)
        }

        fn report_failure(&self, _request: &PaymentRequest, reason: &str) {
            self.failures.lock().unwrap().push(reason.to_string());
        }
    }

    #[tokio::test]
    async fn test_second_challenger_is_declined_while_first_is_open() {
        let resolver = HeldResolver::new(Ok(Resolution::paid("R1")));
        let gate = Arc::new(SingleFlightGate::new(resolver.clone()));

        let first = tokio::spawn({
            let gate = gate.clone();
            async move { gate.open_challenge(payment_request("first")).await }
        });
        resolver.entered.notified().await;
        assert!(gate.is_busy());
        assert_eq!(gate.pending().unwrap().challenge.nonce, "first");

        let second = gate.open_challenge(payment_request("second")).await;
        assert_eq!(second, Resolution::Declined(Decline::Busy));

        resolver.release.notify_one();
        assert_eq!(first.await.unwrap(), Resolution::paid("R1"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_external_cancel_declines_and_frees_gate() {
        let resolver = HeldResolver::new(Ok(Resolution::paid("never")));
        let gate = Arc::new(SingleFlightGate::new(resolver.clone()));

        let open = tokio::spawn({
            let gate = gate.clone();
            async move { gate.open_challenge(payment_request("n1")).await }
        });
        resolver.entered.notified().await;

        assert!(gate.cancel());
        assert_eq!(open.await.unwrap(), Resolution::cancelled());
        assert!(!gate.is_busy());
        assert!(!gate.cancel());
    }

    #[tokio::test]
    async fn test_external_confirm_pays() {
        let resolver = HeldResolver::new(Ok(Resolution::cancelled()));
        let gate = Arc::new(SingleFlightGate::new(resolver.clone()));

        let open = tokio::spawn({
            let gate = gate.clone();
            async move { gate.open_challenge(payment_request("n1")).await }
        });
        resolver.entered.notified().await;

        assert!(gate.confirm(Receipt::new("from-ui")));
        assert_eq!(open.await.unwrap(), Resolution::paid("from-ui"));
        assert!(!gate.confirm(Receipt::new("late")));
    }

    #[tokio::test]
    async fn test_resolver_failure_is_reported_and_declined() {
        let resolver = HeldResolver::new(Err("wallet disconnected".to_string()));
        let gate = SingleFlightGate::new(resolver.clone());
        resolver.release.notify_one();

        let resolution = gate.open_challenge(payment_request("n1")).await;
        let reason = match resolution {
            Resolution::Declined(Decline::Failed(reason)) => reason,
            other => panic!("expected failure, got {other:?}"),
        };
        assert!(reason.contains("wallet disconnected"));
        assert_eq!(*resolver.failures.lock().unwrap(), vec![reason]);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_challenge_frees_gate() {
        let resolver = HeldResolver::new(Ok(Resolution::paid("R1")));
        let gate = Arc::new(SingleFlightGate::new(resolver.clone()));

        let open = tokio::spawn({
            let gate = gate.clone();
            async move { gate.open_challenge(payment_request("n1")).await }
        });
        resolver.entered.notified().await;
        assert!(gate.is_busy());

        open.abort();
        assert!(open.await.unwrap_err().is_cancelled());
        assert!(!gate.is_busy());
        assert!(gate.pending().is_none());
    }

    #[tokio::test]
    async fn test_gate_is_reusable_after_settlement() {
        let resolver = HeldResolver::new(Ok(Resolution::paid("R1")));
        let gate = SingleFlightGate::new(resolver.clone());

        for nonce in ["a", "b"] {
            resolver.release.notify_one();
            assert_eq!(
                gate.open_challenge(payment_request(nonce)).await,
                Resolution::paid("R1")
            );
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }
}
