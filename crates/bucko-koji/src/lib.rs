//! # bucko-koji
//!
//! Scratch container builds on a Koji build system.
//!
//! The [`ContainerBuilder`] trait is the seam the orchestrator drives;
//! [`KojiCli`] implements it with the `koji` command-line client, whose
//! container-build plugin performs the remote submission and watch.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod settings;

pub use builder::{ContainerBuilder, KojiCli, ScratchBuild};
pub use settings::KojiSettings;
