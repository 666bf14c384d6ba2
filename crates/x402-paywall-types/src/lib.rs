#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for HTTP 402 paywalls.
//!
//! A server that wants to be paid before serving a resource answers with
//! `402 Payment Required` and describes the payment in response headers. This
//! crate defines those terms ([`PaymentChallenge`]), the header codec that reads
//! and writes them, the opaque [`Receipt`] a client obtains out-of-band, and the
//! [`CompletionEvent`] published once a paid request goes through.
//!
//! # Modules
//!
//! - [`challenge`] - Challenge data and its header representation
//! - [`receipt`] - Receipts and the [`Resolution`] of a challenge
//! - [`event`] - [`PaymentRequest`] context and [`CompletionEvent`]

pub mod challenge;
pub mod event;
pub mod receipt;

pub use challenge::{ChallengeHeaderError, PaymentChallenge, RECEIPT_HEADER, parse_challenge};
pub use event::{CompletionEvent, PaymentRequest};
pub use receipt::{Decline, Receipt, Resolution};
