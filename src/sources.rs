//! Account and region discovery
//!
//! Both sources run once, before any collection starts, and their failures
//! are fatal: without the account list there is no work to distribute, and
//! without the region set a worker has nowhere to look.

use async_trait::async_trait;
use aws_sdk_ec2 as ec2;
use aws_sdk_organizations as organizations;
use tracing::debug;

use crate::error::DiscoveryError;
use crate::model::{AccountId, Region};

/// Enumerates every member account of the organization.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Exhausts all result pages; a failure on any page aborts the scan.
    async fn list_accounts(&self) -> Result<Vec<AccountId>, DiscoveryError>;
}

/// Enumerates the regions to scan.
///
/// The set reflects regions enabled for the caller's own account, which may
/// be a strict subset of what a given member account has enabled;
/// member-specific region restrictions are not detected here.
#[async_trait]
pub trait RegionSource: Send + Sync {
    async fn list_enabled_regions(&self) -> Result<Vec<Region>, DiscoveryError>;
}

/// Account source backed by the Organizations ListAccounts API.
pub struct OrganizationsAccountSource {
    client: organizations::Client,
}

impl OrganizationsAccountSource {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: organizations::Client::new(config),
        }
    }
}

#[async_trait]
impl AccountSource for OrganizationsAccountSource {
    async fn list_accounts(&self) -> Result<Vec<AccountId>, DiscoveryError> {
        let mut accounts = Vec::new();
        let mut pages = self.client.list_accounts().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(DiscoveryError::list_accounts)?;
            for account in page.accounts() {
                if let Some(id) = account.id() {
                    accounts.push(id.to_string());
                }
            }
        }

        debug!("discovered {} member accounts", accounts.len());
        Ok(accounts)
    }
}

/// Region source backed by the EC2 DescribeRegions API.
///
/// DescribeRegions only returns regions enabled for the calling account.
pub struct Ec2RegionSource {
    client: ec2::Client,
}

impl Ec2RegionSource {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: ec2::Client::new(config),
        }
    }
}

#[async_trait]
impl RegionSource for Ec2RegionSource {
    async fn list_enabled_regions(&self) -> Result<Vec<Region>, DiscoveryError> {
        let resp = self
            .client
            .describe_regions()
            .send()
            .await
            .map_err(DiscoveryError::list_regions)?;

        let regions: Vec<Region> = resp
            .regions()
            .iter()
            .filter_map(|r| r.region_name().map(str::to_string))
            .collect();

        Ok(regions)
    }
}
