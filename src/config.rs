//! Scan configuration
//!
//! Built once from the CLI in `main`, then passed by reference into the
//! pipeline and collectors. Immutable for the life of a scan; there are no
//! process-wide mutable globals.

use std::path::PathBuf;

/// Immutable configuration shared by the whole scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Shared-config profile used for the base (unscoped) credentials.
    pub profile: String,
    /// Name of the automation role assumed in every member account.
    pub role_name: String,
    /// Where the aggregated report is written.
    pub output: PathBuf,
    /// Upper bound on concurrently scanning accounts.
    pub max_concurrent: usize,
}

impl ScanConfig {
    /// Role ARN for a member account, templated on the account id.
    pub fn role_arn(&self, account: &str) -> String {
        format!("arn:aws:iam::{}:role/{}", account, self.role_name)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            profile: "tavern-automation".to_string(),
            role_name: "TavernAutomationRole".to_string(),
            output: PathBuf::from("routes.json"),
            max_concurrent: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn_templates_account_id() {
        let config = ScanConfig::default();
        assert_eq!(
            config.role_arn("111111111111"),
            "arn:aws:iam::111111111111:role/TavernAutomationRole"
        );
    }
}
