//! Voucher ledger client SDK.
//!
//! This crate provides a client library for back-office tools and point-of-sale
//! services to talk to the voucher ledger API.
//!
//! # Example
//!
//! ```no_run
//! use voucher_client::{Credentials, VoucherClient};
//! use voucher_core::{NewSale, UserId};
//!
//! # async fn example(link_id: UserId, token: String) -> Result<(), voucher_client::ClientError> {
//! let client = VoucherClient::new("http://voucher-ledger:8080", Credentials::Bearer(token))?;
//!
//! let sale = client
//!     .record_sale(&NewSale {
//!         voucher_type: "10K".to_string(),
//!         quantity: 20,
//!         link_id,
//!     })
//!     .await?;
//!
//! println!("Link earned {}", sale.fee_link);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, Credentials, VoucherClient};
pub use error::ClientError;
pub use types::*;
