//! Data model for the organization route audit
//!
//! The unit of result is [`ExposedRoute`]: one record per route-table entry
//! that forwards 0.0.0.0/0 to an internet gateway. A record carrying only an
//! account id is a sentinel marking that account's scan as incomplete.

use serde::{Deserialize, Serialize};

/// Opaque identifier of an organization member account.
pub type AccountId = String;

/// Opaque region code (e.g. "us-east-1").
///
/// The region set is resolved once before the scan starts and shared
/// read-only by every worker; it never changes mid-scan.
pub type Region = String;

/// One internet-exposed route, or a per-account failure sentinel.
///
/// Field names serialize in PascalCase to match the `routes.json` artifact
/// consumed downstream. Absent optionals are omitted, not emptied, so a
/// deserialized record is field-for-field identical to the one written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExposedRoute {
    pub account: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_gateway: Option<String>,
}

impl ExposedRoute {
    /// Sentinel record: the scan of `account` terminated early on an error.
    ///
    /// Only the account id is populated; callers distinguish the sentinel
    /// from a genuine finding by field presence, there is no status field.
    pub fn account_failure(account: impl Into<AccountId>) -> Self {
        Self {
            account: account.into(),
            region: None,
            vpc: None,
            route_table: None,
            destination_cidr: None,
            internet_gateway: None,
        }
    }

    /// True if this record is a per-account failure sentinel.
    pub fn is_account_failure(&self) -> bool {
        self.region.is_none()
            && self.vpc.is_none()
            && self.route_table.is_none()
            && self.destination_cidr.is_none()
            && self.internet_gateway.is_none()
    }
}

/// The final aggregate handed to the report sink.
///
/// Record order reflects worker interleaving and is not meaningful; two runs
/// against an unchanged backend agree only up to reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanResult {
    pub routes: Vec<ExposedRoute>,
}

impl ScanResult {
    pub fn new(routes: Vec<ExposedRoute>) -> Self {
        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of genuine findings (sentinels excluded).
    pub fn finding_count(&self) -> usize {
        self.routes.len() - self.failure_count()
    }

    /// Number of accounts whose scan ended on a failure sentinel.
    pub fn failure_count(&self) -> usize {
        self.routes.iter().filter(|r| r.is_account_failure()).count()
    }

    /// Accounts that were not fully scanned.
    pub fn failed_accounts(&self) -> impl Iterator<Item = &str> {
        self.routes
            .iter()
            .filter(|r| r.is_account_failure())
            .map(|r| r.account.as_str())
    }
}
