//! Security utilities.
//!
//! Tokens used to reach the cluster REST API must never reach a log file or
//! the console status block; this module masks them.

pub mod credential_scrubber;

pub use credential_scrubber::{mask_command, scrub_credentials, scrub_secret};
