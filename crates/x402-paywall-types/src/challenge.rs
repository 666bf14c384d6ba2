//! Payment challenges carried in `402 Payment Required` response headers.
//!
//! A challenge is a flat set of headers on the 402 response:
//!
//! | Field         | Header     | Required |
//! |---------------|------------|----------|
//! | `pay_to`      | `Pay-To`   | yes      |
//! | `amount`      | `Amount`   | yes      |
//! | `currency`    | `Currency` | yes      |
//! | `network`     | `Network`  | yes      |
//! | `nonce`       | `Nonce`    | yes      |
//! | `callback_url`| `Callback` | no       |
//!
//! A response that lacks any required header is simply not a challenge.
//! [`PaymentChallenge::from_headers`] returns `None` for it rather than an error.

use http::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};

pub const PAY_TO_HEADER: HeaderName = HeaderName::from_static("pay-to");
pub const AMOUNT_HEADER: HeaderName = HeaderName::from_static("amount");
pub const CURRENCY_HEADER: HeaderName = HeaderName::from_static("currency");
pub const NETWORK_HEADER: HeaderName = HeaderName::from_static("network");
pub const NONCE_HEADER: HeaderName = HeaderName::from_static("nonce");
pub const CALLBACK_HEADER: HeaderName = HeaderName::from_static("callback");

/// Request header that carries the receipt when the request is replayed.
pub const RECEIPT_HEADER: HeaderName = HeaderName::from_static("x-payment-receipt");

/// Terms of a payment demanded by the server before it serves a resource.
///
/// All string fields are kept verbatim. In particular `amount` is a decimal
/// string that is never parsed: the client only relays it to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    /// Destination account identifier.
    pub pay_to: String,
    /// Decimal amount, opaque.
    pub amount: String,
    /// Asset code, e.g. `USDC`.
    pub currency: String,
    /// Settlement network, e.g. `algorand`.
    pub network: String,
    /// Single-use token correlating the challenge with its receipt.
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Error returned when a challenge cannot be written into response headers.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeHeaderError {
    #[error("Challenge field {field} is empty")]
    EmptyField { field: &'static str },
    #[error("Challenge field {field} is not a valid header value")]
    InvalidValue {
        field: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },
}

impl PaymentChallenge {
    /// Reads a challenge out of response headers.
    ///
    /// Header names are matched case-insensitively. Values are trimmed; a value
    /// that is missing, blank, or not visible ASCII counts as absent. Returns
    /// `None` unless all five required fields are present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Some(Self {
            pay_to: header_text(headers, &PAY_TO_HEADER)?,
            amount: header_text(headers, &AMOUNT_HEADER)?,
            currency: header_text(headers, &CURRENCY_HEADER)?,
            network: header_text(headers, &NETWORK_HEADER)?,
            nonce: header_text(headers, &NONCE_HEADER)?,
            callback_url: header_text(headers, &CALLBACK_HEADER),
        })
    }

    /// Writes the challenge into `headers`, replacing any previous values.
    pub fn write_headers(&self, headers: &mut HeaderMap) -> Result<(), ChallengeHeaderError> {
        let required = [
            ("payTo", PAY_TO_HEADER, &self.pay_to),
            ("amount", AMOUNT_HEADER, &self.amount),
            ("currency", CURRENCY_HEADER, &self.currency),
            ("network", NETWORK_HEADER, &self.network),
            ("nonce", NONCE_HEADER, &self.nonce),
        ];
        for (field, name, value) in required {
            headers.insert(name, header_value(field, value)?);
        }
        match &self.callback_url {
            Some(callback) if !callback.trim().is_empty() => {
                headers.insert(CALLBACK_HEADER, header_value("callbackUrl", callback)?);
            }
            _ => {
                headers.remove(CALLBACK_HEADER);
            }
        }
        Ok(())
    }

    /// Serializes the challenge into a fresh header map.
    pub fn to_headers(&self) -> Result<HeaderMap, ChallengeHeaderError> {
        let mut headers = HeaderMap::new();
        self.write_headers(&mut headers)?;
        Ok(headers)
    }
}

/// Shorthand for [`PaymentChallenge::from_headers`].
pub fn parse_challenge(headers: &HeaderMap) -> Option<PaymentChallenge> {
    PaymentChallenge::from_headers(headers)
}

fn header_text(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

fn header_value(field: &'static str, value: &str) -> Result<HeaderValue, ChallengeHeaderError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ChallengeHeaderError::EmptyField { field });
    }
    HeaderValue::from_str(value)
        .map_err(|source| ChallengeHeaderError::InvalidValue { field, source })
}
