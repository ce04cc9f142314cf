//! # Mnemosyne Core
//!
//! Core types and the engine contract for the Mnemosyne idempotency middleware.
//!
//! This crate provides the types shared by the interception layer and any
//! idempotency engine:
//!
//! - [`IdempotencyRequest`] - Read-only snapshot of an inbound request
//! - [`CachedOutcome`] - Canonical, storable form of a completed response
//! - [`IdempotencyEngine`] - The decision/completion contract
//! - [`EngineError`] / [`FailureCode`] - Engine failures and their codes
//! - [`conventions`] - Status table, cacheable headers, protocol header names
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/mnemosyne-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod conventions;
mod engine;
mod error;
pub mod fixtures;
mod outcome;
mod request;
mod request_id;

pub use engine::{BoxFuture, IdempotencyEngine, SharedEngine};
pub use error::{EngineError, EngineResult, FailureCode};
pub use outcome::{Additional, CachedOutcome};
pub use request::IdempotencyRequest;
pub use request_id::RequestId;
