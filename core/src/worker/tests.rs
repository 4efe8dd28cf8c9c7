//! Tests for the Worker module

use super::*;
use crate::cancel::CancelHandle;
use crate::error::ErrorKind;
use crate::record::{RequestRecord, RequestStatus};
use crate::testing::{Behavior, MockClient};
use crate::traits::{ClientError, EndpointClient};

use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

fn create_test_worker(client: Arc<dyn EndpointClient>, timeout: Duration) -> Worker {
    WorkerBuilder::new(0)
        .level(1)
        .prompt("test prompt")
        .client(client)
        .timeout(timeout)
        .build()
        .unwrap()
}

fn assert_close(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

async fn run_to_record(client: MockClient, timeout: Duration) -> RequestRecord {
    let cancel = CancelHandle::new();
    let worker = create_test_worker(Arc::new(client), timeout);
    match worker.run(cancel.subscribe()).await {
        WorkerOutcome::Finished(record) => record,
        WorkerOutcome::Abandoned => panic!("worker was not cancelled"),
    }
}

// ============================================================================
// Terminal statuses
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_worker_success_records_every_arrival() {
    let record = run_to_record(
        MockClient::steady(10, Duration::from_secs(1)),
        Duration::from_secs(60),
    )
    .await;

    assert_eq!(record.status, RequestStatus::Success);
    assert_eq!(record.events.len(), 10);
    assert_eq!(record.total_tokens, 10);
    assert_eq!(record.events.last().unwrap().cumulative, 10);
    assert_close(record.duration(), Duration::from_secs(1));
    assert_close(
        record.time_to_first_token().unwrap(),
        Duration::from_millis(100),
    );

    let rate = record.token_rate().unwrap();
    assert!((rate - 10.0).abs() < 0.1);

    for pair in record.events.windows(2) {
        assert!(pair[0].at <= pair[1].at);
        assert!(pair[0].cumulative <= pair[1].cumulative);
    }
}

#[tokio::test(start_paused = true)]
async fn test_worker_times_out_on_stalled_stream() {
    let record = run_to_record(MockClient::hanging(), Duration::from_secs(2)).await;

    assert_eq!(record.status, RequestStatus::TimedOut);
    assert_close(record.duration(), Duration::from_secs(2));
    assert_eq!(record.total_tokens, 0);
    assert!(record.token_rate().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_worker_deadline_covers_slow_stream() {
    // 10 tokens over 10s cannot finish inside a 3.5s deadline
    let record = run_to_record(
        MockClient::steady(10, Duration::from_secs(10)),
        Duration::from_millis(3500),
    )
    .await;

    assert_eq!(record.status, RequestStatus::TimedOut);
    assert_close(record.duration(), Duration::from_millis(3500));
    assert_eq!(record.total_tokens, 3);
}

#[tokio::test(start_paused = true)]
async fn test_worker_captures_open_error() {
    let client = MockClient::new(Behavior::FailOpen(ClientError::Auth(
        "HTTP 401: bad key".into(),
    )));
    let record = run_to_record(client, Duration::from_secs(5)).await;

    assert_eq!(record.status.error_kind(), Some(ErrorKind::AuthError));
    assert!(record.events.is_empty());
    assert!(record.ended_at >= record.started_at);
}

#[tokio::test(start_paused = true)]
async fn test_worker_keeps_partial_events_on_mid_stream_error() {
    let client = MockClient::new(Behavior::FailMidStream {
        after: 4,
        interval: Duration::from_millis(50),
        error: ClientError::Connection("reset by peer".into()),
    });
    let record = run_to_record(client, Duration::from_secs(5)).await;

    assert_eq!(record.status.error_kind(), Some(ErrorKind::ConnectionError));
    assert_eq!(record.events.len(), 4);
    assert_eq!(record.total_tokens, 4);
    assert_close(record.duration(), Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_client_reported_timeout_maps_to_timed_out() {
    let client = MockClient::new(Behavior::FailOpen(ClientError::Timeout(
        Duration::from_secs(1),
    )));
    let record = run_to_record(client, Duration::from_secs(5)).await;

    assert_eq!(record.status, RequestStatus::TimedOut);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_worker_abandoned_mid_flight() {
    let cancel = CancelHandle::new();
    let worker = create_test_worker(Arc::new(MockClient::hanging()), Duration::from_secs(60));
    let rx = cancel.subscribe();

    let handle = tokio::spawn(async move { worker.run(rx).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.abandon();

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome, WorkerOutcome::Abandoned));
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_level_lets_worker_finish() {
    let cancel = CancelHandle::new();
    cancel.stop_after_level();

    let client = Arc::new(MockClient::steady(5, Duration::from_millis(500)));
    let worker = create_test_worker(client, Duration::from_secs(60));

    let record = worker.run(cancel.subscribe()).await.into_record().unwrap();
    assert_eq!(record.status, RequestStatus::Success);
    assert_eq!(record.total_tokens, 5);
}

#[tokio::test(start_paused = true)]
async fn test_worker_issues_exactly_one_request() {
    let client = Arc::new(MockClient::new(Behavior::FailOpen(ClientError::Connection(
        "refused".into(),
    ))));
    let cancel = CancelHandle::new();
    let worker = create_test_worker(client.clone(), Duration::from_secs(5));

    let _ = worker.run(cancel.subscribe()).await;
    assert_eq!(client.calls(), 1);
    assert_eq!(client.prompts_seen(), vec!["test prompt".to_string()]);
}
