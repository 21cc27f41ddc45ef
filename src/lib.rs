//! NuGet package mirroring library.
//!
//! This crate copies every version of a package that exists on a source NuGet
//! feed but not on a destination feed. It is used by the `nuget-mirror` CLI
//! binary and can be driven programmatically with any
//! [`nuget_feed::client::FeedClient`] implementation.
//!
//! # Modules
//!
//! - [`cancel`] - Run-scoped cancellation and signal wiring
//! - [`cli`] - Command-line argument definitions
//! - [`diff`] - Missing-version computation
//! - [`error`] - Run errors with exit codes and recovery hints
//! - [`listing`] - Version listing with retry
//! - [`logging`] - Logger initialisation
//! - [`output`] - Progress, summary and error text
//! - [`pipeline`] - End-to-end mirroring orchestration
//! - [`scratch`] - Temporary package files
//! - [`transfer`] - Download-then-publish driver

pub mod cancel;
pub mod cli;
pub mod diff;
pub mod error;
pub mod listing;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod scratch;
pub mod transfer;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
