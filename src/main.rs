//! Organization Internet-Route Audit
//!
//! Scans every member account of an AWS Organization for route tables
//! forwarding the default route (0.0.0.0/0) to an internet gateway and
//! writes one aggregated JSON report.
//!
//! # Usage
//! ```bash
//! # Full scan with the defaults of the reference deployment
//! org-route-audit
//!
//! # Custom role and output, capped at 4 concurrent accounts
//! org-route-audit --role-name SecurityAuditRole --output /tmp/routes.json --max-concurrent 4
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use org_route_audit::{
    report, AccountSource, Ec2RegionSource, OrganizationsAccountSource, Pipeline, Region,
    RegionSource, ScanConfig, StsRouteCollector,
};

#[derive(Parser)]
#[command(name = "org-route-audit")]
#[command(about = "Audits an AWS Organization for internet-exposed default routes", long_about = None)]
#[command(version)]
struct Cli {
    /// Shared-config profile holding the organization-level credentials
    #[arg(long, env = "ORG_AUDIT_PROFILE", default_value = "tavern-automation")]
    profile: String,

    /// Automation role assumed in every member account
    #[arg(long, default_value = "TavernAutomationRole")]
    role_name: String,

    /// Output path for the aggregated report
    #[arg(long, default_value = "routes.json")]
    output: PathBuf,

    /// Maximum number of accounts scanned concurrently
    #[arg(long, default_value_t = 16)]
    max_concurrent: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ScanConfig {
        profile: cli.profile,
        role_name: cli.role_name,
        output: cli.output,
        max_concurrent: cli.max_concurrent,
    };

    info!("🚀 Organization route audit starting (profile: {})", config.profile);

    let base = aws_config::defaults(BehaviorVersion::latest())
        .profile_name(&config.profile)
        .load()
        .await;

    // Both discovery calls are fatal preconditions: without the region set
    // or the account list there is no work to distribute.
    let regions: Arc<[Region]> = Ec2RegionSource::new(&base)
        .list_enabled_regions()
        .await
        .context("Unable to describe enabled regions")?
        .into();
    info!("📍 Listing all enabled regions: {:?}", regions);

    let accounts = OrganizationsAccountSource::new(&base)
        .list_accounts()
        .await
        .context("Unable to list accounts in this organization")?;
    info!("🏢 Organization has {} member accounts", accounts.len());

    let collector = Arc::new(StsRouteCollector::new(base, config.clone()));
    let pipeline = Pipeline::new(collector, config.max_concurrent);
    let result = pipeline.run(accounts, regions).await;

    if let Err(err) = report::write_report(&config.output, &result).await {
        // The scan itself succeeded; make sure its outcome is visible even
        // though the artifact could not be persisted.
        error!(
            "collected {} findings and {} incomplete accounts, but the report was not written",
            result.finding_count(),
            result.failure_count()
        );
        return Err(err).context("Unable to persist the aggregated report");
    }

    for account in result.failed_accounts() {
        warn!("account {} was not fully scanned", account);
    }
    info!(
        "✅ {} exposed routes found across {} records ({} accounts incomplete)",
        result.finding_count(),
        result.len(),
        result.failure_count()
    );

    Ok(())
}
