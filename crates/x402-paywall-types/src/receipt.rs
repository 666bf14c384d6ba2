//! Receipts and the outcome of resolving a payment challenge.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque proof-of-payment token.
///
/// The client never inspects a receipt: it is replayed verbatim in the
/// receipt header of the retried request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(String);

impl Receipt {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Receipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Receipt {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Receipt {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

impl AsRef<str> for Receipt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why no receipt was obtained for a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decline {
    /// The user dismissed the payment.
    Cancelled,
    /// Another challenge was already being resolved.
    Busy,
    /// The resolver could not produce a receipt. Carries a human-readable reason.
    Failed(String),
    /// The resolver did not answer in time.
    TimedOut,
}

impl Display for Decline {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Decline::Cancelled => f.write_str("payment cancelled"),
            Decline::Busy => f.write_str("another payment challenge is in progress"),
            Decline::Failed(reason) => write!(f, "payment failed: {reason}"),
            Decline::TimedOut => f.write_str("payment timed out"),
        }
    }
}

/// Outcome of a user-mediated payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Paid(Receipt),
    Declined(Decline),
}

impl Resolution {
    pub fn paid<R: Into<Receipt>>(receipt: R) -> Self {
        Resolution::Paid(receipt.into())
    }

    pub fn cancelled() -> Self {
        Resolution::Declined(Decline::Cancelled)
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Resolution::Paid(receipt) => Some(receipt),
            Resolution::Declined(_) => None,
        }
    }

    pub fn into_receipt(self) -> Option<Receipt> {
        match self {
            Resolution::Paid(receipt) => Some(receipt),
            Resolution::Declined(_) => None,
        }
    }
}

impl From<Option<Receipt>> for Resolution {
    /// `None` means the user walked away without paying.
    fn from(receipt: Option<Receipt>) -> Self {
        match receipt {
            Some(receipt) => Resolution::Paid(receipt),
            None => Resolution::cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_is_transparent_in_json() {
        let receipt = Receipt::new("receipt-xyz");
        assert_eq!(
            serde_json::to_string(&receipt).unwrap(),
            "\"receipt-xyz\""
        );
        assert_eq!(receipt.to_string(), "receipt-xyz");
    }

    #[test]
    fn test_resolution_from_option() {
        assert_eq!(
            Resolution::from(Some(Receipt::from("R1"))),
            Resolution::paid("R1")
        );
        assert_eq!(Resolution::from(None), Resolution::cancelled());
        assert_eq!(Resolution::cancelled().into_receipt(), None);
    }
}
