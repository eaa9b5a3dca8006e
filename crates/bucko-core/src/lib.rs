//! # bucko-core
//!
//! Scratch container builds from compose contents.
//!
//! This crate provides:
//! - **Resolve**: deriving the compose URL from CI event metadata.
//! - **Branch**: mapping a compose's release to its dist-git branch.
//! - **Pipeline**: the orchestrator that publishes a `.repo` descriptor,
//!   submits the build, and publishes its metadata.
//!
//! External systems are reached only through the [`Collaborators`] factory,
//! so the whole pipeline can run against in-memory fakes.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod branch;
pub mod collaborators;
pub mod output;
pub mod pipeline;
pub mod resolve;

pub use branch::BranchResolver;
pub use collaborators::{Collaborators, SystemCollaborators};
pub use pipeline::{CiEnvironment, ErrorKind, Orchestrator, PipelineError, RunReport, Stage};
pub use resolve::{resolve, resolve_request};
