//! Voucher ledger HTTP API service.
//!
//! This crate exposes the voucher-sales ledger over HTTP:
//!
//! - Reseller directory and fee schedules
//! - Stock distribution and bulk import
//! - Sale recording with the four-way revenue split
//! - Deposits that reset unclaimed revenue
//! - Sales-target coupons and prize claims
//!
//! # Authentication
//!
//! 1. **HS256 JWT tokens** - For hierarchy members (the `sub` claim is the user id)
//! 2. **Admin API key** - The `X-Admin-Key` header, for back-office tooling

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;

pub use auth::issue_token;
pub use config::ServiceConfig;
pub use error::ApiError;
pub use notify::{LogSink, NotificationSink, NotifyError, WebhookSink};
pub use routes::create_router;
pub use state::AppState;
