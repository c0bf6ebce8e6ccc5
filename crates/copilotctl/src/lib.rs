//! copilotctl - command-line front end for the retail copilot.
//!
//! The binary wires configuration, collaborators and output together;
//! everything testable without a terminal lives in this library.

pub mod commands;
pub mod display;
pub mod jsonl;
pub mod runtime;
