//! Domain logic for the honestman deploy tool.
//!
//! Everything in this crate is pure: no processes are spawned and no
//! files are touched. The `honestman-deploy` crate turns these values
//! into commands and runs them.

pub mod deployable;
pub mod error;
pub mod host_group;
pub mod shell;
pub mod ssh;
pub mod target;
