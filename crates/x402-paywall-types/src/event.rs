//! Context handed to resolvers and events published after a paid request.

use serde::{Deserialize, Serialize};

use crate::challenge::PaymentChallenge;
use crate::receipt::Receipt;

/// A challenge together with the request that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(flatten)]
    pub challenge: PaymentChallenge,
    /// URL of the challenged request.
    pub url: String,
    /// HTTP method of the challenged request, e.g. `GET`.
    pub method: String,
}

impl PaymentRequest {
    pub fn new<U: Into<String>, M: Into<String>>(
        challenge: PaymentChallenge,
        url: U,
        method: M,
    ) -> Self {
        Self {
            challenge,
            url: url.into(),
            method: method.into(),
        }
    }

    /// Builds the event published once the paid retry succeeds.
    pub fn complete(self, receipt: Receipt) -> CompletionEvent {
        CompletionEvent {
            challenge: self.challenge,
            url: self.url,
            method: self.method,
            receipt,
        }
    }
}

/// Published after a retried request carrying a receipt returned 2xx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    #[serde(flatten)]
    pub challenge: PaymentChallenge,
    pub url: String,
    pub method: String,
    pub receipt: Receipt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_event_json_shape() {
        let challenge = PaymentChallenge {
            pay_to: "ACCT1".into(),
            amount: "2.5".into(),
            currency: "USDC".into(),
            network: "algorand".into(),
            nonce: "abc123".into(),
            callback_url: None,
        };
        let event = PaymentRequest::new(challenge, "/api/report", "GET")
            .complete(Receipt::new("receipt-xyz"));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "payTo": "ACCT1",
                "amount": "2.5",
                "currency": "USDC",
                "network": "algorand",
                "nonce": "abc123",
                "url": "/api/report",
                "method": "GET",
                "receipt": "receipt-xyz",
            })
        );
    }
}
