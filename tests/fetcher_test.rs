mod common;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use datacenter::error::CollectorError;
use datacenter::github::GithubClient;

use common::{http_response, serve_responses};

fn epoch_secs_from_now(offset: i64) -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        + offset
}

fn rate_limited_json(remaining: &str, reset_epoch: i64, body: &str) -> String {
    http_response(
        "200 OK",
        &[
            ("content-type", "application/json".to_string()),
            ("x-ratelimit-remaining", remaining.to_string()),
            ("x-ratelimit-reset", reset_epoch.to_string()),
        ],
        body,
    )
}

#[tokio::test]
async fn waits_out_the_reset_when_remaining_hits_zero() {
    let reset = epoch_secs_from_now(2);
    let addr = serve_responses(vec![
        rate_limited_json("0", reset, "{}"),
        rate_limited_json("4999", reset, r#"{"ok":true}"#),
    ])
    .await;

    let client = GithubClient::new(None, None);
    let started = Instant::now();
    let value = client
        .get_json(&format!("http://{addr}/repos/acme/widget"))
        .await
        .unwrap();

    assert!(
        started.elapsed() >= Duration::from_secs(2),
        "must not retry before the advertised reset"
    );
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn a_403_with_reset_header_is_treated_like_an_exhausted_limit() {
    let reset = epoch_secs_from_now(1);
    let forbidden = http_response(
        "403 Forbidden",
        &[
            ("content-type", "application/json".to_string()),
            ("x-ratelimit-reset", reset.to_string()),
        ],
        r#"{"message":"API rate limit exceeded"}"#,
    );
    let addr = serve_responses(vec![
        forbidden,
        rate_limited_json("4999", reset, r#"{"ok":true}"#),
    ])
    .await;

    let client = GithubClient::new(None, None);
    let started = Instant::now();
    let value = client
        .get_json(&format!("http://{addr}/repos/acme/widget"))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn other_error_statuses_fail_immediately() {
    let addr = serve_responses(vec![http_response(
        "500 Internal Server Error",
        &[("content-type", "application/json".to_string())],
        "{}",
    )])
    .await;

    let client = GithubClient::new(None, None);
    let started = Instant::now();
    let err = client
        .get_json(&format!("http://{addr}/repos/acme/widget"))
        .await
        .unwrap_err();

    assert!(
        started.elapsed() < Duration::from_secs(1),
        "a hard failure must not wait"
    );
    assert!(matches!(err, CollectorError::Api { .. }), "got {err:?}");
}

#[tokio::test]
async fn the_wait_cap_turns_a_stuck_limit_into_an_error() {
    // reset already passed: each retry only burns the one-second margin
    let reset = epoch_secs_from_now(-1);
    let addr = serve_responses(vec![
        rate_limited_json("0", reset, "{}"),
        rate_limited_json("0", reset, "{}"),
    ])
    .await;

    let client = GithubClient::new(None, Some(1));
    let err = client
        .get_json(&format!("http://{addr}/repos/acme/widget"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, CollectorError::RateLimited { waits: 1, .. }),
        "got {err:?}"
    );
}
