//! Error taxonomy for the audit pipeline
//!
//! Three tiers: [`DiscoveryError`] is fatal and aborts the run before any
//! work is distributed, [`AccountScanError`] is contained at the account
//! boundary and becomes a single sentinel record, [`ReportError`] concerns
//! only the final artifact.

use thiserror::Error;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pre-fan-out failure. Nothing is scanned and nothing is written.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("unable to list accounts in this organization")]
    ListAccounts(#[source] Source),

    #[error("unable to describe enabled regions")]
    ListRegions(#[source] Source),
}

impl DiscoveryError {
    pub fn list_accounts(source: impl Into<Source>) -> Self {
        Self::ListAccounts(source.into())
    }

    pub fn list_regions(source: impl Into<Source>) -> Self {
        Self::ListRegions(source.into())
    }
}

/// Per-account failure: assume-role or a route-table listing page failed.
///
/// Never propagated across account boundaries; the owning worker logs it,
/// emits one sentinel record, and abandons that account's remaining regions.
#[derive(Debug, Error)]
#[error("unable to retrieve route tables from account {account} in {region}")]
pub struct AccountScanError {
    pub account: String,
    pub region: String,
    #[source]
    pub source: Source,
}

impl AccountScanError {
    pub fn new(account: impl Into<String>, region: impl Into<String>, source: impl Into<Source>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            source: source.into(),
        }
    }
}

/// Failure to serialize or persist the final aggregate.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unable to serialize scan result to JSON")]
    Serialize(#[from] serde_json::Error),

    #[error("unable to write report to {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_scan_error_message_names_account_and_region() {
        let err = AccountScanError::new(
            "111111111111",
            "eu-west-1",
            std::io::Error::new(std::io::ErrorKind::Other, "throttled"),
        );
        let msg = err.to_string();
        assert!(msg.contains("111111111111"));
        assert!(msg.contains("eu-west-1"));
    }

    #[test]
    fn test_discovery_error_keeps_source() {
        use std::error::Error as _;
        let err = DiscoveryError::list_accounts(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "access denied",
        ));
        assert!(err.source().is_some());
    }
}
