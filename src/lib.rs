//! Organization Internet-Route Audit Library
//!
//! Scans every member account of an AWS Organization, across every enabled
//! region, for route tables that forward 0.0.0.0/0 to an internet gateway,
//! and aggregates the findings into a single report.

pub mod collector;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod sources;

pub use collector::{RouteCollector, StsRouteCollector};
pub use config::ScanConfig;
pub use error::{AccountScanError, DiscoveryError, ReportError};
pub use model::{AccountId, ExposedRoute, Region, ScanResult};
pub use pipeline::Pipeline;
pub use sources::{AccountSource, Ec2RegionSource, OrganizationsAccountSource, RegionSource};
