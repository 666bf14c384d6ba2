//! Obtaining receipts for payment challenges.
//!
//! A [`PaymentResolver`] is the seam between the interceptor and whatever
//! collects a payment: a wallet, a dialog, a console prompt. The interceptor
//! only relies on the async contract below and never talks to a wallet itself.

use std::sync::Arc;
use std::time::Duration;
use x402_paywall_types::{Decline, PaymentRequest, Receipt, Resolution};

#[cfg(feature = "telemetry")]
use tracing::debug;

/// Failure inside a resolver's collaborator.
///
/// A user cancelling is not an error: resolvers report it as
/// [`Resolution::Declined`]. The gate turns any `ResolverError` into a
/// declined resolution as well, so the caller of the HTTP request never sees it.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Payment interaction failed: {0}")]
    Interaction(String),
}

/// Errors raised by a [`WalletSession`].
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet is unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to sign payment: {0}")]
    Signing(String),
}

/// Collects a receipt for a payment challenge.
#[async_trait::async_trait]
pub trait PaymentResolver: Send + Sync {
    /// Presents the payment terms and waits until the user pays or walks away.
    ///
    /// May suspend for an unbounded amount of time.
    async fn resolve(&self, request: &PaymentRequest) -> Result<Resolution, ResolverError>;

    /// Called by the gate when [`PaymentResolver::resolve`] failed, with a
    /// reason fit for showing to the user.
    fn report_failure(&self, _request: &PaymentRequest, _reason: &str) {}
}

#[async_trait::async_trait]
impl<T: PaymentResolver + ?Sized> PaymentResolver for Arc<T> {
    async fn resolve(&self, request: &PaymentRequest) -> Result<Resolution, ResolverError> {
        (**self).resolve(request).await
    }

    fn report_failure(&self, request: &PaymentRequest, reason: &str) {
        (**self).report_failure(request, reason)
    }
}

#[async_trait::async_trait]
impl<T: PaymentResolver + ?Sized> PaymentResolver for Box<T> {
    async fn resolve(&self, request: &PaymentRequest) -> Result<Resolution, ResolverError> {
        (**self).resolve(request).await
    }

    fn report_failure(&self, request: &PaymentRequest, reason: &str) {
        (**self).report_failure(request, reason)
    }
}

/// Pays every challenge with the same preconfigured receipt.
#[derive(Debug, Clone)]
pub struct StaticReceipt(Receipt);

impl StaticReceipt {
    pub fn new<R: Into<Receipt>>(receipt: R) -> Self {
        Self(receipt.into())
    }
}

#[async_trait::async_trait]
impl PaymentResolver for StaticReceipt {
    async fn resolve(&self, _request: &PaymentRequest) -> Result<Resolution, ResolverError> {
        Ok(Resolution::Paid(self.0.clone()))
    }
}

/// The wallet side of a payment: who pays, and the signing step that yields a receipt.
#[async_trait::async_trait]
pub trait WalletSession: Send + Sync {
    /// Address of the connected account, if any.
    fn active_account(&self) -> Option<String>;

    /// Asks the user to approve the payment from `account`.
    ///
    /// Returns `Ok(None)` when the user rejects the signature request.
    async fn sign_payment(
        &self,
        account: &str,
        request: &PaymentRequest,
    ) -> Result<Option<Receipt>, WalletError>;
}

/// Resolves challenges by having a [`WalletSession`] sign the payment.
pub struct WalletResolver<W> {
    wallet: W,
}

impl<W> WalletResolver<W> {
    pub fn new(wallet: W) -> Self {
        Self { wallet }
    }
}

#[async_trait::async_trait]
impl<W: WalletSession> PaymentResolver for WalletResolver<W> {
    async fn resolve(&self, request: &PaymentRequest) -> Result<Resolution, ResolverError> {
        let Some(account) = self.wallet.active_account() else {
            return Ok(Resolution::Declined(Decline::Failed(
                "no active wallet account".to_string(),
            )));
        };
        #[cfg(feature = "telemetry")]
        debug!(account = %account, pay_to = %request.challenge.pay_to, "Requesting wallet signature");
        let receipt = self.wallet.sign_payment(&account, request).await?;
        Ok(Resolution::from(receipt))
    }
}

/// Gives up on a resolver that has not answered within a deadline.
pub struct WithTimeout<R> {
    inner: R,
    timeout: Duration,
}

impl<R> WithTimeout<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait::async_trait]
impl<R: PaymentResolver> PaymentResolver for WithTimeout<R> {
    async fn resolve(&self, request: &PaymentRequest) -> Result<Resolution, ResolverError> {
        match tokio::time::timeout(self.timeout, self.inner.resolve(request)).await {
            Ok(resolution) => resolution,
            Err(_elapsed) => {
                #[cfg(feature = "telemetry")]
                debug!(timeout = ?self.timeout, "Payment resolver timed out");
                Ok(Resolution::Declined(Decline::TimedOut))
            }
        }
    }

    fn report_failure(&self, request: &PaymentRequest, reason: &str) {
        self.inner.report_failure(request, reason)
    }
}
