#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Reqwest middleware that pays through HTTP 402 paywalls.
//!
//! This crate provides a [`PaywallClient`] that can be used as a `reqwest`
//! middleware. When a request receives a `402 Payment Required` response with
//! a payment challenge in its headers, the middleware asks a
//! [`PaymentResolver`] for a receipt and replays the request once with the
//! receipt attached.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use x402_paywall_reqwest::{PaywallClient, ReqwestWithPaywall, ReqwestWithPaywallBuild, StaticReceipt};
//! use reqwest::Client;
//!
//! let paywall = PaywallClient::new(StaticReceipt::new("receipt-xyz"));
//!
//! let http_client = Client::new()
//!     .with_paywall(paywall)
//!     .build();
//!
//! // Paid resources are fetched transparently
//! let response = http_client
//!     .get("https://api.example.com/api/report")
//!     .send()
//!     .await?;
//! ```
//!
//! ## Resolvers
//!
//! - **[`StaticReceipt`]** - pays every challenge with one preconfigured receipt
//! - **[`WalletResolver`]** - asks a [`WalletSession`] to sign the payment
//! - **[`WithTimeout`]** - declines when the wrapped resolver takes too long
//!
//! Implement [`PaymentResolver`] to plug in a payment dialog of your own.
//!
//! ## One challenge at a time
//!
//! Each [`PaywallClient`] owns a [`SingleFlightGate`]. While one challenge is
//! being resolved, any other request that hits a 402 gets its original response
//! back instead of opening a second prompt. The gate also lets a UI confirm or
//! cancel the open challenge directly.
//!
//! ## Completion events
//!
//! After a paid retry succeeds, a [`CompletionEvent`](x402_paywall_types::CompletionEvent)
//! is published through the client's [`CompletionNotifier`].

mod builder;
mod client;
pub mod gate;
pub mod notifier;
pub mod resolver;

pub use builder::*;
pub use client::*;
pub use gate::SingleFlightGate;
pub use notifier::{CompletionNotifier, Subscription};
pub use resolver::{
    PaymentResolver, ResolverError, StaticReceipt, WalletError, WalletResolver, WalletSession,
    WithTimeout,
};
