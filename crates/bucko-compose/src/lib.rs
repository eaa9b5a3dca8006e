//! # bucko-compose
//!
//! Compose handling for bucko.
//!
//! Handles:
//! - **Info**: parsing productmd `composeinfo.json` metadata.
//! - **Reader**: fetching that metadata from an HTTP-accessible compose.
//! - **Repo**: the compose object and its yum `.repo` descriptor.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod info;
pub mod reader;
pub mod repo;

pub use info::{ComposeInfo, Variant};
pub use reader::{ComposeReader, HttpComposeReader};
pub use repo::{BaseProduct, Compose};
