//! Build, upload and restart the crawler and api services.
//!
//! [`orchestrator::Orchestrator`] sequences the three collaborators: the
//! [`builder`] for local cross-compilation, the [`transport`] for copying
//! artifacts over `scp`, and the [`remote`] executor for commands over
//! `ssh`. Every external program runs through a [`runner::CommandRunner`].

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod remote;
pub mod runner;
pub mod transport;
