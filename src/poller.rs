//! Spot-request fulfillment polling
//!
//! A spot request is submitted, then re-described until every request has
//! an instance assigned. One failed describe call is tolerated as transient;
//! a second failure in a row abandons the operation. The loop is bounded by
//! a maximum number of describe calls and reports `TimedOut` when that is
//! exhausted.

use crate::config::Config;
use crate::format;
use crate::gateway::{ComputeGateway, InstanceFilter, InstanceSpec, SpotRequest};
use crate::session::Session;
use std::collections::HashSet;
use std::time::Duration;

/// Tag added to every instance launched through a spot request
pub const SPOT_MARKER_TAG: (&str, &str) = ("SpotInstance", "yes");

/// Terminal state of one poll loop
#[derive(Debug)]
pub enum PollOutcome {
    /// Every request has an instance; records from the last describe call
    Fulfilled(Vec<SpotRequest>),
    /// Two describe calls failed back to back
    Failed(anyhow::Error),
    /// `attempts` describe calls made, some request still pending
    TimedOut { attempts: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct FulfillmentPoller {
    interval: Duration,
    max_attempts: u32,
}

impl FulfillmentPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.poll_interval(), config.poll_max_attempts)
    }

    /// Poll until every id in `ids` is fulfilled, abandoned, or timed out
    pub async fn wait(
        &self,
        session: &mut Session,
        compute: &dyn ComputeGateway,
        ids: &[String],
    ) -> PollOutcome {
        let mut failed_last = false;

        for attempt in 1..=self.max_attempts {
            match compute.describe_spot_requests(ids).await {
                Ok(requests) => {
                    failed_last = false;
                    let fulfilled: HashSet<&str> = requests
                        .iter()
                        .filter(|r| r.is_fulfilled())
                        .map(|r| r.spot_instance_request_id.as_str())
                        .collect();

                    let mut pending = 0;
                    for id in ids {
                        if !fulfilled.contains(id.as_str()) {
                            session.log(format!("{} is not fulfilled", id));
                            pending += 1;
                        }
                    }

                    if pending == 0 {
                        return PollOutcome::Fulfilled(requests);
                    }
                    tracing::debug!(attempt, pending, "spot requests still pending");
                }
                Err(e) => {
                    session.log(format!("DescribeSpotInstanceRequests: {:#}", e));
                    if failed_last {
                        return PollOutcome::Failed(e);
                    }
                    failed_last = true;
                    tracing::warn!(attempt, "describe spot requests failed, retrying once");
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        PollOutcome::TimedOut {
            attempts: self.max_attempts,
        }
    }

    /// Request `count` spot instances, wait for fulfillment, then describe
    /// the resulting instances and tag them with the instance tags plus the
    /// spot marker.
    pub async fn fulfill(
        &self,
        session: &mut Session,
        compute: &dyn ComputeGateway,
        count: u32,
        spec: &InstanceSpec,
    ) {
        let requests = match compute.request_spot_instances(count, spec).await {
            Ok(requests) => requests,
            Err(e) => {
                session.log(format!("RequestSpotInstances: {:#}", e));
                return;
            }
        };

        let ids: Vec<String> = requests
            .into_iter()
            .map(|r| r.spot_instance_request_id)
            .collect();
        for id in &ids {
            session.log(format!("id={}", id));
        }
        if ids.is_empty() {
            session.log("no spot requests created");
            return;
        }

        let requests = match self.wait(session, compute, &ids).await {
            PollOutcome::Fulfilled(requests) => requests,
            PollOutcome::Failed(_) => {
                session.log("spot request abandoned after repeated describe failures");
                return;
            }
            PollOutcome::TimedOut { attempts } => {
                session.log(format!(
                    "spot request timed out after {} attempts",
                    attempts
                ));
                return;
            }
        };

        let instance_ids: Vec<String> = requests
            .into_iter()
            .filter_map(|r| r.instance_id)
            .collect();
        let instances = match compute
            .describe_instances(&InstanceFilter::ids(instance_ids))
            .await
        {
            Ok(instances) => instances,
            Err(e) => {
                session.log(format!("DescribeInstances: {:#}", e));
                return;
            }
        };
        for instance in &instances {
            session.log(format::instance_line(instance));
        }
        if instances.is_empty() {
            return;
        }

        let mut tags = spec.tags.clone();
        tags.insert(SPOT_MARKER_TAG.0.to_string(), SPOT_MARKER_TAG.1.to_string());
        let ids: Vec<String> = instances.into_iter().map(|i| i.instance_id).collect();
        if let Err(e) = compute.create_tags(&ids, &tags).await {
            session.log(format!("CreateTags: {:#}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spot, test_config, FakeCloud};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn poller(max_attempts: u32) -> FulfillmentPoller {
        FulfillmentPoller::new(Duration::ZERO, max_attempts)
    }

    #[tokio::test]
    async fn test_three_iterations_until_all_fulfilled() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        let compute = &cloud.compute;
        compute.script_spot(Ok(vec![
            spot("A", Some("i-a")),
            spot("B", None),
            spot("C", Some("i-c")),
        ]));
        compute.script_spot(Ok(vec![
            spot("A", Some("i-a")),
            spot("B", None),
            spot("C", Some("i-c")),
        ]));
        compute.script_spot(Ok(vec![
            spot("A", Some("i-a")),
            spot("B", Some("i-b")),
            spot("C", Some("i-c")),
        ]));

        let outcome = poller(10)
            .wait(&mut session, &**compute, &ids(&["A", "B", "C"]))
            .await;

        assert!(matches!(outcome, PollOutcome::Fulfilled(ref r) if r.len() == 3));
        assert_eq!(compute.calls.count("describe_spot_requests"), 3);
        assert_eq!(
            session.lines(),
            ["B is not fulfilled", "B is not fulfilled"]
        );
    }

    #[tokio::test]
    async fn test_two_consecutive_failures_abort() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        cloud.compute.script_spot(Err("throttled"));
        cloud.compute.script_spot(Err("throttled again"));
        cloud.compute.script_spot(Ok(vec![spot("A", Some("i-a"))]));

        let outcome = poller(10)
            .wait(&mut session, &*cloud.compute, &ids(&["A"]))
            .await;

        assert!(matches!(outcome, PollOutcome::Failed(_)));
        assert_eq!(cloud.compute.calls.count("describe_spot_requests"), 2);
    }

    #[tokio::test]
    async fn test_single_failure_is_tolerated() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        cloud.compute.script_spot(Err("throttled"));
        cloud.compute.script_spot(Ok(vec![spot("A", Some("i-a"))]));

        let outcome = poller(10)
            .wait(&mut session, &*cloud.compute, &ids(&["A"]))
            .await;

        assert!(matches!(outcome, PollOutcome::Fulfilled(_)));
        assert_eq!(session.lines(), ["DescribeSpotInstanceRequests: throttled"]);
    }

    #[tokio::test]
    async fn test_failure_streak_resets_after_success() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        cloud.compute.script_spot(Err("e1"));
        cloud.compute.script_spot(Ok(vec![spot("A", None)]));
        cloud.compute.script_spot(Err("e2"));
        cloud.compute.script_spot(Ok(vec![spot("A", Some("i-a"))]));

        let outcome = poller(10)
            .wait(&mut session, &*cloud.compute, &ids(&["A"]))
            .await;

        assert!(matches!(outcome, PollOutcome::Fulfilled(_)));
        assert_eq!(cloud.compute.calls.count("describe_spot_requests"), 4);
    }

    #[tokio::test]
    async fn test_missing_request_counts_as_pending() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        cloud.compute.script_spot(Ok(vec![spot("A", Some("i-a"))]));
        cloud.compute.script_spot(Ok(vec![spot("A", Some("i-a")), spot("B", Some("i-b"))]));

        let outcome = poller(10)
            .wait(&mut session, &*cloud.compute, &ids(&["A", "B"]))
            .await;

        assert!(matches!(outcome, PollOutcome::Fulfilled(_)));
        assert_eq!(session.lines(), ["B is not fulfilled"]);
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());

        let outcome = poller(4)
            .wait(&mut session, &*cloud.compute, &ids(&["A"]))
            .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { attempts: 4 }));
        assert_eq!(cloud.compute.calls.count("describe_spot_requests"), 4);
    }

    #[tokio::test]
    async fn test_fulfill_tags_once_after_last_describe() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        cloud.compute.script_spot(Ok(vec![spot("sir-1", None), spot("sir-2", None)]));
        cloud.compute.script_spot(Ok(vec![spot("sir-1", Some("i-1")), spot("sir-2", None)]));
        cloud.compute.script_spot(Ok(vec![
            spot("sir-1", Some("i-1")),
            spot("sir-2", Some("i-2")),
        ]));

        cloud.compute.add_instance("i-1", "worker");
        cloud.compute.add_instance("i-2", "worker");

        let mut spec = InstanceSpec::default();
        spec.tags.insert("Name".to_string(), "worker".to_string());
        poller(10)
            .fulfill(&mut session, &*cloud.compute, 2, &spec)
            .await;

        assert_eq!(
            cloud.compute.calls.all(),
            [
                "request_spot_instances",
                "describe_spot_requests",
                "describe_spot_requests",
                "describe_spot_requests",
                "describe_instances",
                "create_tags",
            ]
        );
        let tagged = cloud.compute.tagged.lock().unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].0, ["i-1", "i-2"]);
        assert_eq!(tagged[0].1.get("SpotInstance").map(String::as_str), Some("yes"));
        assert_eq!(tagged[0].1.get("Name").map(String::as_str), Some("worker"));
        assert_eq!(session.lines()[..2], ["id=sir-1", "id=sir-2"]);
        let instances = cloud.compute.instances.lock().unwrap();
        assert_eq!(
            session.lines()[session.lines().len() - 2..],
            [
                format::instance_line(&instances[0]),
                format::instance_line(&instances[1]),
            ]
        );
    }

    #[tokio::test]
    async fn test_fulfill_describe_failure_leaves_instances_untagged() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        cloud.compute.script_spot(Ok(vec![spot("sir-1", Some("i-1"))]));
        cloud.compute.add_instance("i-1", "worker");
        cloud.compute.calls.fail("describe_instances");

        poller(10)
            .fulfill(&mut session, &*cloud.compute, 1, &InstanceSpec::default())
            .await;

        assert_eq!(cloud.compute.calls.count("create_tags"), 0);
        assert!(cloud.compute.tagged.lock().unwrap().is_empty());
        assert_eq!(
            session.lines(),
            ["id=sir-1", "DescribeInstances: describe_instances failed"]
        );
    }

    #[tokio::test]
    async fn test_fulfill_timeout_leaves_instances_untagged() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());

        poller(2)
            .fulfill(&mut session, &*cloud.compute, 1, &InstanceSpec::default())
            .await;

        assert_eq!(cloud.compute.calls.count("create_tags"), 0);
        assert_eq!(
            session.lines().last().map(String::as_str),
            Some("spot request timed out after 2 attempts")
        );
    }
}
