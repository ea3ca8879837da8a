//! Typed error kinds for conditions callers need to tell apart.
//!
//! Everything else in the crate travels as `anyhow::Error` with context
//! attached; these variants are wrapped inside it and recovered with
//! `err.downcast_ref::<DdcError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DdcError {
    /// Configuration or usage problem detected before any work starts
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `process_and_wait` was called on a pool with nothing queued
    #[error("no pending jobs to process")]
    NoPendingJobs,

    /// Neither the coordinator nor the executor selector resolved to a host
    #[error("no hosts found for the coordinator or executor selectors")]
    NoHostsFound,

    /// Hosts were contacted but not a single node tarball made it back
    #[error("no files transferred from any node")]
    NoFilesTransferred,

    /// One node's capture pipeline stopped at `stage`
    #[error("{stage} failed on host {host}: {reason}")]
    NodeFailure {
        host: String,
        stage: String,
        reason: String,
    },
}

impl DdcError {
    /// Returns the typed kind carried by an `anyhow::Error`, if any
    pub fn kind_of(err: &anyhow::Error) -> Option<&DdcError> {
        err.downcast_ref::<DdcError>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_kind_survives_context() {
        let result: anyhow::Result<()> = Err(DdcError::NoHostsFound.into());
        let err = result.context("resolving hosts").unwrap_err();

        assert!(matches!(DdcError::kind_of(&err), Some(DdcError::NoHostsFound)));
    }

    #[test]
    fn test_node_failure_message() {
        let err = DdcError::NodeFailure {
            host: "10.0.0.4".to_string(),
            stage: "COPY DDC.YAML".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "COPY DDC.YAML failed on host 10.0.0.4: permission denied");
    }
}
