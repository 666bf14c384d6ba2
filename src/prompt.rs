//! Interactive console resolver: shows the payment terms and reads a receipt from stdin.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use x402_paywall_reqwest::{PaymentResolver, ResolverError};
use x402_paywall_types::{PaymentRequest, Resolution};

pub struct ConsolePrompt<R> {
    input: Mutex<R>,
}

impl ConsolePrompt<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsolePrompt<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

/// Human-readable payment terms, as shown before asking for a receipt.
pub fn describe_terms(request: &PaymentRequest) -> String {
    let challenge = &request.challenge;
    let mut terms = format!(
        "Payment required for {} {}\n  amount:  {} {}\n  network: {}\n  pay to:  {}\n  nonce:   {}",
        request.method,
        request.url,
        challenge.amount,
        challenge.currency,
        challenge.network,
        challenge.pay_to,
        challenge.nonce,
    );
    if let Some(callback) = &challenge.callback_url {
        terms.push_str(&format!("\n  callback: {callback}"));
    }
    terms
}

#[async_trait::async_trait]
impl<R> PaymentResolver for ConsolePrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn resolve(&self, request: &PaymentRequest) -> Result<Resolution, ResolverError> {
        eprintln!("{}", describe_terms(request));
        eprint!("Paste the payment receipt (empty line to cancel): ");

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| ResolverError::Interaction(format!("failed to read receipt: {e}")))?;

        let receipt = line.trim();
        if read == 0 || receipt.is_empty() {
            tracing::info!("Payment cancelled at the prompt");
            return Ok(Resolution::cancelled());
        }
        Ok(Resolution::paid(receipt))
    }

    fn report_failure(&self, _request: &PaymentRequest, reason: &str) {
        eprintln!("Payment could not be completed: {reason}");
    }
}
