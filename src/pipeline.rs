//! Fan-out / fan-in scan pipeline
//!
//! One worker task per member account, all emitting into a single merge
//! channel consumed by the coordinator. Workers are independent: the only
//! shared state is the read-only region set, the collector, and the channel.
//!
//! Completion tracking rides on channel closure. Every worker owns one
//! sender clone for its whole lifetime and drops it exactly once on any exit
//! path, including a panic, so the receiver yields `None` only after all
//! workers have terminated. No record can be dropped while any worker is
//! still running.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::collector::RouteCollector;
use crate::model::{AccountId, ExposedRoute, Region, ScanResult};

const MERGE_CHANNEL_CAPACITY: usize = 64;

/// Coordinates the whole scan: fan-out, merge, completion.
pub struct Pipeline {
    collector: Arc<dyn RouteCollector>,
    max_concurrent: usize,
}

impl Pipeline {
    /// `max_concurrent` bounds in-flight accounts; it is clamped to at
    /// least 1. One task is still spawned per account, the bound only
    /// gates how many make progress at once.
    pub fn new(collector: Arc<dyn RouteCollector>, max_concurrent: usize) -> Self {
        Self {
            collector,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs every account to its natural completion or failure point and
    /// returns the merged aggregate.
    ///
    /// One account's failure never cancels or blocks another; a sentinel in
    /// the aggregate is the only trace it leaves. With zero accounts the
    /// result is simply empty.
    pub async fn run(&self, accounts: Vec<AccountId>, regions: Arc<[Region]>) -> ScanResult {
        let (emit, mut merged) = mpsc::channel::<ExposedRoute>(MERGE_CHANNEL_CAPACITY);
        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers = JoinSet::new();

        for account in accounts {
            let collector = Arc::clone(&self.collector);
            let regions = Arc::clone(&regions);
            let emit = emit.clone();
            let gate = Arc::clone(&gate);

            workers.spawn(async move {
                // The gate is never closed, so acquire only fails on
                // shutdown paths this pipeline does not have.
                if let Ok(_permit) = gate.acquire_owned().await {
                    collector.collect(account, regions, emit).await;
                }
            });
        }

        let spawned = workers.len();
        info!("scanning {} accounts", spawned);

        // The coordinator's own sender must go before draining, otherwise
        // the channel never closes.
        drop(emit);

        let mut routes = Vec::new();
        while let Some(record) = merged.recv().await {
            routes.push(record);
        }

        let mut completed = 0usize;
        while let Some(outcome) = workers.join_next().await {
            completed += 1;
            if let Err(err) = outcome {
                warn!("route collector task aborted: {}", err);
            }
        }

        info!(
            "scan complete: {}/{} workers finished, {} records collected",
            completed,
            spawned,
            routes.len()
        );

        ScanResult::new(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    /// Scripted collector: per-account findings by region, plus an optional
    /// region at which the account's listing fails.
    #[derive(Default)]
    struct ScriptedCollector {
        findings: HashMap<(AccountId, Region), Vec<ExposedRoute>>,
        fail_at: HashMap<AccountId, Region>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedCollector {
        fn with_finding(mut self, account: &str, region: &str, gateway: &str) -> Self {
            self.findings
                .entry((account.to_string(), region.to_string()))
                .or_default()
                .push(ExposedRoute {
                    account: account.to_string(),
                    region: Some(region.to_string()),
                    vpc: Some("vpc-test".to_string()),
                    route_table: Some("rtb-test".to_string()),
                    destination_cidr: Some("0.0.0.0/0".to_string()),
                    internet_gateway: Some(gateway.to_string()),
                });
            self
        }

        fn failing_in(mut self, account: &str, region: &str) -> Self {
            self.fail_at
                .insert(account.to_string(), region.to_string());
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl RouteCollector for ScriptedCollector {
        async fn collect(
            &self,
            account: AccountId,
            regions: Arc<[Region]>,
            emit: mpsc::Sender<ExposedRoute>,
        ) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            for region in regions.iter() {
                if self.fail_at.get(&account) == Some(region) {
                    let _ = emit.send(ExposedRoute::account_failure(&account)).await;
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
                if let Some(found) = self.findings.get(&(account.clone(), region.clone())) {
                    for record in found {
                        let _ = emit.send(record.clone()).await;
                    }
                }
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn regions(names: &[&str]) -> Arc<[Region]> {
        names.iter().map(|r| r.to_string()).collect::<Vec<_>>().into()
    }

    fn accounts(ids: &[&str]) -> Vec<AccountId> {
        ids.iter().map(|a| a.to_string()).collect()
    }

    fn sorted(mut routes: Vec<ExposedRoute>) -> Vec<ExposedRoute> {
        routes.sort();
        routes
    }

    #[tokio::test]
    async fn test_zero_accounts_completes_with_empty_aggregate() {
        let collector = Arc::new(ScriptedCollector::default());
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 16);

        let result = pipeline.run(Vec::new(), regions(&["us-east-1"])).await;

        assert!(result.is_empty());
        assert_eq!(collector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_worker_started_per_account() {
        let collector = Arc::new(ScriptedCollector::default());
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 16);

        let result = pipeline
            .run(
                accounts(&["111111111111", "222222222222", "333333333333"]),
                regions(&["us-east-1"]),
            )
            .await;

        assert_eq!(collector.calls.load(Ordering::SeqCst), 3);
        // Clean accounts with no exposed routes contribute nothing at all.
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_findings_and_failure_aggregate() {
        // Account one has a genuine exposure, account two fails outright:
        // the aggregate holds exactly one finding and one sentinel.
        let collector = Arc::new(
            ScriptedCollector::default()
                .with_finding("111111111111", "us-east-1", "igw-abc123")
                .failing_in("222222222222", "us-east-1"),
        );
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 16);

        let result = pipeline
            .run(
                accounts(&["111111111111", "222222222222"]),
                regions(&["us-east-1"]),
            )
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(result.finding_count(), 1);
        assert_eq!(result.failure_count(), 1);

        let finding = result
            .routes
            .iter()
            .find(|r| !r.is_account_failure())
            .unwrap();
        assert_eq!(finding.account, "111111111111");
        assert_eq!(finding.region.as_deref(), Some("us-east-1"));
        assert_eq!(finding.destination_cidr.as_deref(), Some("0.0.0.0/0"));
        assert_eq!(finding.internet_gateway.as_deref(), Some("igw-abc123"));

        assert_eq!(
            result.failed_accounts().collect::<Vec<_>>(),
            vec!["222222222222"]
        );
    }

    #[tokio::test]
    async fn test_mid_scan_failure_keeps_earlier_regions_only() {
        // Fails in the second region: first-region findings stand, the
        // third region is never reached, one sentinel marks the account.
        let collector = Arc::new(
            ScriptedCollector::default()
                .with_finding("111111111111", "us-east-1", "igw-early")
                .failing_in("111111111111", "eu-west-1")
                .with_finding("111111111111", "ap-southeast-2", "igw-late"),
        );
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 16);

        let result = pipeline
            .run(
                accounts(&["111111111111"]),
                regions(&["us-east-1", "eu-west-1", "ap-southeast-2"]),
            )
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(result.finding_count(), 1);
        assert_eq!(result.failure_count(), 1);

        let finding = result
            .routes
            .iter()
            .find(|r| !r.is_account_failure())
            .unwrap();
        assert_eq!(finding.internet_gateway.as_deref(), Some("igw-early"));
        assert!(!result
            .routes
            .iter()
            .any(|r| r.internet_gateway.as_deref() == Some("igw-late")));
    }

    #[tokio::test]
    async fn test_early_failure_does_not_lose_slow_workers_records() {
        // One account fails immediately while the others are still asleep;
        // the merge stage must stay open until every worker is done.
        let collector = Arc::new(
            ScriptedCollector::default()
                .failing_in("111111111111", "us-east-1")
                .with_finding("222222222222", "us-east-1", "igw-slow")
                .with_delay(Duration::from_millis(50)),
        );
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 16);

        let result = pipeline
            .run(
                accounts(&["111111111111", "222222222222"]),
                regions(&["us-east-1"]),
            )
            .await;

        assert_eq!(result.len(), 2);
        assert!(result
            .routes
            .iter()
            .any(|r| r.internet_gateway.as_deref() == Some("igw-slow")));
    }

    #[tokio::test]
    async fn test_concurrency_gate_bounds_in_flight_workers() {
        let collector = Arc::new(
            ScriptedCollector::default().with_delay(Duration::from_millis(10)),
        );
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 2);

        let ids: Vec<String> = (0..8).map(|i| format!("{:012}", i)).collect();
        pipeline.run(ids, regions(&["us-east-1"])).await;

        assert_eq!(collector.calls.load(Ordering::SeqCst), 8);
        assert!(collector.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_rerun_agrees_up_to_reordering() {
        let collector = Arc::new(
            ScriptedCollector::default()
                .with_finding("111111111111", "us-east-1", "igw-a")
                .with_finding("111111111111", "eu-west-1", "igw-b")
                .with_finding("333333333333", "us-east-1", "igw-c")
                .failing_in("222222222222", "us-east-1"),
        );
        let pipeline = Pipeline::new(Arc::clone(&collector) as Arc<dyn RouteCollector>, 16);

        let all = accounts(&["111111111111", "222222222222", "333333333333"]);
        let region_set = regions(&["us-east-1", "eu-west-1"]);

        let first = pipeline.run(all.clone(), Arc::clone(&region_set)).await;
        let second = pipeline.run(all, region_set).await;

        assert_eq!(first.len(), 4);
        assert_eq!(sorted(first.routes), sorted(second.routes));
    }
}
