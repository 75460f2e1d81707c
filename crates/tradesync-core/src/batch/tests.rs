use super::*;
use std::cell::{Cell, RefCell};
use tokio::time::Instant;

fn status(code: u16) -> WriteError {
    WriteError::Status {
        status: code,
        message: format!("status {}", code),
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new()
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(Duration::ZERO)
}

#[test]
fn test_retryable_classification() {
    assert!(status(429).is_retryable());
    assert!(status(500).is_retryable());
    assert!(status(503).is_retryable());
    assert!(!status(400).is_retryable());
    assert!(!status(404).is_retryable());
    assert!(!WriteError::Timeout.is_retryable());
    assert!(!WriteError::Network("reset".into()).is_retryable());
    assert!(!WriteError::MalformedResponse("no id".into()).is_retryable());
}

#[test]
fn test_reason_codes() {
    assert_eq!(status(429).reason_code(), "RATE_LIMITED");
    assert_eq!(status(502).reason_code(), "UPSTREAM_UNAVAILABLE");
    assert_eq!(status(400).reason_code(), "BAD_REQUEST");
    assert_eq!(status(401).reason_code(), "UNAUTHORIZED");
    assert_eq!(status(403).reason_code(), "FORBIDDEN");
    assert_eq!(status(404).reason_code(), "NOT_FOUND");
    assert_eq!(status(409).reason_code(), "CONFLICT");
    assert_eq!(status(422).reason_code(), "HTTP_422");
    assert_eq!(WriteError::Timeout.reason_code(), "TIMEOUT");
    assert_eq!(WriteError::Network("x".into()).reason_code(), "NETWORK_ERROR");
    assert_eq!(
        WriteError::MalformedResponse("x".into()).reason_code(),
        "MALFORMED_RESPONSE"
    );
    assert_eq!(
        WriteError::InvalidRequest("x".into()).reason_code(),
        "BAD_REQUEST"
    );
    assert!(!WriteError::InvalidRequest("x".into()).is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_always_retryable_makes_exactly_one_plus_max_retries_calls() {
    let calls = Cell::new(0u32);
    let policy = RetryPolicy::default();

    let result = write_batch_with_retry(
        &["only"],
        |_| {
            calls.set(calls.get() + 1);
            async { Err(status(429)) }
        },
        DEFAULT_PACING,
        &policy,
    )
    .await;

    assert_eq!(calls.get(), 1 + policy.max_retries);
    assert!(result.succeeded.is_empty());
    assert_eq!(
        result.failed,
        vec![FailedWrite {
            index: 0,
            reason_code: "RATE_LIMITED".to_string(),
            message: "HTTP 429: status 429".to_string(),
            attempts: 4,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_fails_immediately() {
    let calls = Cell::new(0u32);

    let result = write_batch_with_retry(
        &[1],
        |_| {
            calls.set(calls.get() + 1);
            async { Err(status(400)) }
        },
        DEFAULT_PACING,
        &RetryPolicy::default(),
    )
    .await;

    assert_eq!(calls.get(), 1);
    assert_eq!(result.failed[0].attempts, 1);
    assert_eq!(result.failed[0].reason_code, "BAD_REQUEST");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_not_retried() {
    let calls = Cell::new(0u32);

    let result = write_batch_with_retry(
        &[1],
        |_| {
            calls.set(calls.get() + 1);
            async { Err(WriteError::Timeout) }
        },
        DEFAULT_PACING,
        &RetryPolicy::default(),
    )
    .await;

    assert_eq!(calls.get(), 1);
    assert_eq!(result.failed[0].reason_code, "TIMEOUT");
}

#[tokio::test(start_paused = true)]
async fn test_alternating_batch_partitions_in_order() {
    let items: Vec<usize> = (0..7).collect();

    let result = write_batch_with_retry(
        &items,
        |item| {
            let outcome = if item % 2 == 0 {
                Ok(format!("page-{}", item))
            } else {
                Err(status(404))
            };
            async move { outcome }
        },
        DEFAULT_PACING,
        &fast_policy(),
    )
    .await;

    assert_eq!(result.len(), items.len());
    let ok: Vec<usize> = result.succeeded.iter().map(|s| s.index).collect();
    let failed: Vec<usize> = result.failed.iter().map(|f| f.index).collect();
    assert_eq!(ok, vec![0, 2, 4, 6]);
    assert_eq!(failed, vec![1, 3, 5]);
    assert_eq!(result.succeeded[1].remote_id, "page-2");
}

#[tokio::test(start_paused = true)]
async fn test_failure_does_not_abort_batch() {
    let items = ["a", "b", "c"];
    let seen = RefCell::new(Vec::new());

    let result = write_batch_with_retry(
        &items,
        |item| {
            seen.borrow_mut().push(*item);
            let outcome = if *item == "a" {
                Err(status(500))
            } else {
                Ok(item.to_uppercase())
            };
            async move { outcome }
        },
        DEFAULT_PACING,
        &fast_policy(),
    )
    .await;

    assert_eq!(*seen.borrow(), vec!["a", "a", "a", "a", "b", "c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].reason_code, "UPSTREAM_UNAVAILABLE");
    assert_eq!(result.succeeded.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failures() {
    let calls = Cell::new(0u32);

    let result = write_batch_with_retry(
        &["trade"],
        |_| {
            calls.set(calls.get() + 1);
            let outcome = if calls.get() < 3 {
                Err(status(503))
            } else {
                Ok("page-1".to_string())
            };
            async move { outcome }
        },
        DEFAULT_PACING,
        &RetryPolicy::default(),
    )
    .await;

    assert_eq!(calls.get(), 3);
    assert_eq!(
        result.succeeded,
        vec![SucceededWrite {
            index: 0,
            remote_id: "page-1".to_string(),
        }]
    );
    assert!(result.failed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pacing_between_items() {
    let calls = RefCell::new(Vec::new());
    let pacing = Duration::from_millis(340);

    write_batch_with_retry(
        &[1, 2, 3],
        |_| {
            calls.borrow_mut().push(Instant::now());
            async { Ok("id".to_string()) }
        },
        pacing,
        &RetryPolicy::default(),
    )
    .await;

    let calls = calls.borrow();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= pacing);
    }
}

#[tokio::test(start_paused = true)]
async fn test_retries_never_closer_than_pacing() {
    let calls = RefCell::new(Vec::new());
    let pacing = Duration::from_millis(340);

    let result = write_batch_with_retry(
        &[1, 2],
        |_| {
            calls.borrow_mut().push(Instant::now());
            async { Err(status(429)) }
        },
        pacing,
        &fast_policy(),
    )
    .await;

    let calls = calls.borrow();
    assert_eq!(calls.len(), 8);
    assert_eq!(result.failed.len(), 2);
    for pair in calls.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= pacing, "writes {:?} apart, pacing is {:?}", gap, pacing);
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_grow_exponentially() {
    let calls = RefCell::new(Vec::new());
    let policy = RetryPolicy::default();

    write_batch_with_retry(
        &[1],
        |_| {
            calls.borrow_mut().push(Instant::now());
            async { Err(status(429)) }
        },
        DEFAULT_PACING,
        &policy,
    )
    .await;

    let calls = calls.borrow();
    assert_eq!(calls.len(), 4);
    for (retry, pair) in calls.windows(2).enumerate() {
        let (min, max) = policy.delay_bounds(retry as u32);
        let gap = pair[1] - pair[0];
        assert!(gap >= min, "retry {} waited {:?}, expected at least {:?}", retry, gap, min);
        // Paused clock may overshoot by a scheduler tick
        assert!(gap <= max + Duration::from_millis(5), "retry {} waited {:?}", retry, gap);
    }
}

#[tokio::test]
async fn test_empty_batch() {
    let result = write_batch_with_retry(
        &[] as &[u8],
        |_| async { Ok(String::new()) },
        DEFAULT_PACING,
        &RetryPolicy::default(),
    )
    .await;

    assert!(result.is_empty());
}

#[test]
fn test_result_serializes_camel_case() {
    let result = WriteBatchResult {
        succeeded: vec![SucceededWrite {
            index: 0,
            remote_id: "abc".to_string(),
        }],
        failed: vec![FailedWrite {
            index: 1,
            reason_code: "RATE_LIMITED".to_string(),
            message: "HTTP 429: slow down".to_string(),
            attempts: 4,
        }],
    };

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["succeeded"][0]["remoteId"], "abc");
    assert_eq!(json["failed"][0]["reasonCode"], "RATE_LIMITED");
    assert_eq!(json["failed"][0]["attempts"], 4);
}
