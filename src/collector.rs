//! Per-account route collection
//!
//! One collector call is one unit of fan-out: assume the automation role in
//! the target account, then walk every enabled region's route tables looking
//! for default routes to an internet gateway. A failure anywhere inside an
//! account ends that account's scan with a single sentinel record; other
//! accounts are unaffected.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_ec2 as ec2;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::AccountScanError;
use crate::model::{AccountId, ExposedRoute, Region};

/// Substring marking a gateway id as an internet gateway.
///
/// Deliberately a loose containment match rather than an exact type check,
/// mirroring how the audit has always classified gateways.
pub const INTERNET_GATEWAY_MARKER: &str = "igw-";

/// Collects exposed routes for one account, emitting into the merge channel.
#[async_trait]
pub trait RouteCollector: Send + Sync {
    /// Scans `account` across `regions`, sending each finding into `emit`.
    ///
    /// On a per-account failure the implementation sends exactly one
    /// sentinel record and returns; findings already emitted for earlier
    /// regions stand. Dropping `emit` on return is the worker's completion
    /// signal to the fan-in stage.
    async fn collect(
        &self,
        account: AccountId,
        regions: Arc<[Region]>,
        emit: mpsc::Sender<ExposedRoute>,
    );
}

/// Route collector backed by STS assume-role and the EC2 API.
pub struct StsRouteCollector {
    base: aws_config::SdkConfig,
    config: ScanConfig,
}

impl StsRouteCollector {
    /// `base` carries the unscoped credentials used to bootstrap the
    /// per-account assume-role providers; it is shared read-only across
    /// every worker.
    pub fn new(base: aws_config::SdkConfig, config: ScanConfig) -> Self {
        Self { base, config }
    }

    /// Scoped credentials for one member account.
    ///
    /// The provider is lazy and caches the assumed credentials, so the role
    /// is assumed on first use and reused across that account's regions.
    async fn scoped_credentials(&self, account: &str) -> SharedCredentialsProvider {
        let provider = AssumeRoleProvider::builder(self.config.role_arn(account))
            .session_name("org-route-audit")
            .configure(&self.base)
            .build()
            .await;
        SharedCredentialsProvider::new(provider)
    }

    fn regional_client(
        &self,
        credentials: SharedCredentialsProvider,
        region: &str,
    ) -> ec2::Client {
        let conf = ec2::config::Builder::from(&self.base)
            .credentials_provider(credentials)
            .region(ec2::config::Region::new(region.to_string()))
            .build();
        ec2::Client::from_conf(conf)
    }

    /// Pages through one region's route tables, emitting every match.
    async fn scan_region(
        &self,
        client: &ec2::Client,
        account: &str,
        region: &str,
        emit: &mpsc::Sender<ExposedRoute>,
    ) -> Result<(), AccountScanError> {
        let mut pages = client.describe_route_tables().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| AccountScanError::new(account, region, err))?;

            for table in page.route_tables() {
                for route in route_findings(account, region, table) {
                    info!(
                        "account: {} region: {} destination: {} gateway: {}",
                        route.account,
                        region,
                        route.destination_cidr.as_deref().unwrap_or("-"),
                        route.internet_gateway.as_deref().unwrap_or("-"),
                    );
                    if emit.send(route).await.is_err() {
                        // Aggregate consumer is gone, nothing left to report to.
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl RouteCollector for StsRouteCollector {
    async fn collect(
        &self,
        account: AccountId,
        regions: Arc<[Region]>,
        emit: mpsc::Sender<ExposedRoute>,
    ) {
        let credentials = self.scoped_credentials(&account).await;

        for region in regions.iter() {
            debug!("scanning account {} in {}", account, region);
            let client = self.regional_client(credentials.clone(), region);

            if let Err(err) = self.scan_region(&client, &account, region, &emit).await {
                warn!("{}, caused by: {}", err, err.source);
                // One sentinel marks the whole account as incompletely
                // scanned; remaining regions are skipped, earlier findings
                // stand.
                let _ = emit.send(ExposedRoute::account_failure(&account)).await;
                return;
            }
        }
    }
}

/// Internet-gateway findings in a single route table.
///
/// A route matches when its gateway id contains [`INTERNET_GATEWAY_MARKER`];
/// routes without a gateway id never match.
pub fn route_findings(
    account: &str,
    region: &str,
    table: &ec2::types::RouteTable,
) -> Vec<ExposedRoute> {
    let mut findings = Vec::new();

    for route in table.routes() {
        if let Some(gateway) = route.gateway_id() {
            if gateway.contains(INTERNET_GATEWAY_MARKER) {
                findings.push(ExposedRoute {
                    account: account.to_string(),
                    region: Some(region.to_string()),
                    vpc: table.vpc_id().map(str::to_string),
                    route_table: table.route_table_id().map(str::to_string),
                    destination_cidr: route.destination_cidr_block().map(str::to_string),
                    internet_gateway: Some(gateway.to_string()),
                });
            }
        }
    }

    findings
}
