//! Discovery and value subscription tests through the metric service.

use futures::{FutureExt, StreamExt};
use otelhub_lib::core::config::IngestionConfig;
use otelhub_lib::metrics::{MetricId, MetricPoint};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

mod common;
use common::*;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_new_ids_are_announced_once() {
    let service = service();
    let _consumer = service.start();
    let mut ids = service.subscribe_metric_ids("abc");

    service.send(single_sum("abc", "http", "request.count", 1, 1));
    service.send(single_sum("abc", "http", "request.count", 2, 2));
    service.send(single_sum("other", "http", "request.count", 1, 1));
    service.send(single_sum("abc", "db", "query.count", 1, 1));

    let first = timeout(WAIT, ids.next()).await.unwrap().unwrap();
    let second = timeout(WAIT, ids.next()).await.unwrap().unwrap();

    assert_eq!(first, MetricId::new("abc", "http", "request.count"));
    assert_eq!(second, MetricId::new("abc", "db", "query.count"));
    assert!(timeout(QUIET, ids.next()).await.is_err());
}

#[tokio::test]
async fn test_late_subscriber_gets_existing_ids() {
    let service = service();
    let _consumer = service.start();

    service.send(
        TestBatchBuilder::new("abc")
            .scope("http", vec![sum("a", vec![]), sum("b", vec![])])
            .build(),
    );
    assert!(wait_for(|| service.metric_ids("abc").len() == 2).await);

    let mut ids = service.subscribe_metric_ids("abc");
    let mut replayed = vec![
        timeout(WAIT, ids.next()).await.unwrap().unwrap(),
        timeout(WAIT, ids.next()).await.unwrap().unwrap(),
    ];
    replayed.sort();

    assert_eq!(
        replayed,
        vec![MetricId::new("abc", "http", "a"), MetricId::new("abc", "http", "b")]
    );

    service.send(TestBatchBuilder::new("abc").scope("http", vec![sum("c", vec![])]).build());
    assert_eq!(
        timeout(WAIT, ids.next()).await.unwrap(),
        Some(MetricId::new("abc", "http", "c"))
    );
}

#[tokio::test]
async fn test_replay_can_be_disabled() {
    let service = service_with(IngestionConfig {
        replay_existing_ids: false,
        ..IngestionConfig::default()
    });
    let _consumer = service.start();

    service.send(single_sum("abc", "http", "a", 1, 1));
    assert!(wait_for(|| service.metric_ids("abc").len() == 1).await);

    let mut ids = service.subscribe_metric_ids("abc");
    assert!(timeout(QUIET, ids.next()).await.is_err());
}

/// A subscriber registered before a metric exists sees its first value.
#[tokio::test]
async fn test_value_subscription_before_discovery() {
    let service = service();
    let _consumer = service.start();
    let id = MetricId::new("abc", "http", "request.count");

    let mut ids = service.subscribe_metric_ids("abc");
    let mut values = service.subscribe_metric_values(id.clone(), CancellationToken::new());
    assert_eq!(values.id(), &id);

    service.send(single_sum("abc", "http", "request.count", 1000, 5));
    service.send(single_sum("abc", "http", "request.count", 2000, 7));

    assert_eq!(timeout(WAIT, ids.next()).await.unwrap(), Some(id.clone()));
    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::long(1000, 5))
    );
    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::long(2000, 7))
    );
}

/// By the time a new identity's first value arrives, its discovery event is already queued.
#[tokio::test]
async fn test_discovery_precedes_first_value() {
    let service = service();
    let id = MetricId::new("abc", "http", "request.count");
    let mut ids = service.subscribe_metric_ids("abc");
    let mut values = service.subscribe_metric_values(id.clone(), CancellationToken::new());

    let _consumer = service.start();
    service.send(single_sum("abc", "http", "request.count", 1000, 5));

    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::long(1000, 5))
    );
    assert_eq!(ids.next().now_or_never(), Some(Some(id)));
    assert_eq!(service.subscription_stats().announcements, 1);
}

#[tokio::test]
async fn test_every_series_is_pushed() {
    let service = service();
    let _consumer = service.start();
    let id = MetricId::new("abc", "http", "latency");
    let mut values = service.subscribe_metric_values(id, CancellationToken::new());

    service.send(
        TestBatchBuilder::new("abc")
            .scope(
                "http",
                vec![gauge(
                    "latency",
                    vec![
                        double_point(1, 1.0, vec![kv("route", "/a")]),
                        double_point(1, 2.0, vec![kv("route", "/b")]),
                    ],
                )],
            )
            .build(),
    );

    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::double(1, 1.0))
    );
    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::double(1, 2.0))
    );
}

#[tokio::test]
async fn test_ended_lifetime_stops_values() {
    let service = service();
    let _consumer = service.start();
    let id = MetricId::new("abc", "http", "request.count");
    let lifetime = CancellationToken::new();
    let mut values = service.subscribe_metric_values(id.clone(), lifetime.clone());

    service.send(single_sum("abc", "http", "request.count", 1, 1));
    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::long(1, 1))
    );

    lifetime.cancel();
    service.send(single_sum("abc", "http", "request.count", 2, 2));
    assert!(wait_for(|| service.history(&id).len() == 2).await);

    assert_eq!(timeout(WAIT, values.next()).await.unwrap(), None);
}

#[tokio::test]
async fn test_shutdown_ends_nested_lifetimes() {
    let service = service();
    let _consumer = service.start();
    let lifetime = service.lifetime().child_token();
    let mut values =
        service.subscribe_metric_values(MetricId::new("abc", "http", "request.count"), lifetime);

    service.shutdown();

    assert_eq!(timeout(WAIT, values.next()).await.unwrap(), None);
}

#[tokio::test]
async fn test_lagging_subscriber_does_not_block_ingestion() {
    let service = service();
    let _consumer = service.start();
    let id = MetricId::new("abc", "http", "request.count");
    let mut values = service.subscribe_metric_values(id.clone(), CancellationToken::new());

    let points = (0..1000).map(|i| long_point(i, i as i64, vec![])).collect();
    service.send(
        TestBatchBuilder::new("abc")
            .scope("http", vec![sum("request.count", points)])
            .build(),
    );

    assert!(wait_for(|| service.stats().processed == 1).await);
    assert_eq!(service.get_current_point(&id), Some(MetricPoint::long(999, 999)));

    // The oldest buffered pushes are still delivered in order.
    assert_eq!(
        timeout(WAIT, values.next()).await.unwrap(),
        Some(MetricPoint::long(0, 0))
    );
}

#[tokio::test]
async fn test_closed_feeds_leave_no_bookkeeping() {
    let service = service();

    for i in 0..100 {
        let lifetime = CancellationToken::new();
        let values = service.subscribe_metric_values(
            MetricId::new("nobody", "http", format!("metric-{}", i)),
            lifetime.clone(),
        );
        lifetime.cancel();
        drop(values);
        drop(service.subscribe_metric_ids(&format!("nobody-{}", i)));
    }

    let stats = service.subscription_stats();
    assert_eq!(stats.value_ids, 0);
    assert_eq!(stats.value_subscribers, 0);
    assert_eq!(stats.discovery_resources, 0);
    assert_eq!(stats.discovery_subscribers, 0);
}
