//! Request executor and rate-limit handling against a scripted transport

use std::time::Duration;

use fac_collector::downloader::{RateLimitPolicy, RetryLimit};
use fac_collector::fetcher::query::{FilterSet, GeneralQuery};
use fac_collector::fetcher::{FetcherError, RawResponse, TransportError};

use crate::support::{test_client, test_config, LogCapture, RecordingSleeper, ScriptedTransport};

#[tokio::test]
async fn test_unknown_endpoint_makes_no_request() {
    let transport = ScriptedTransport::sequence(vec![]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    let err = client
        .query("genral", &FilterSet::new(), RateLimitPolicy::Fail)
        .await
        .unwrap_err();

    match err {
        FetcherError::InvalidEndpoint { name, available } => {
            assert_eq!(name, "genral");
            assert!(available.contains("federal_awards"));
        }
        other => panic!("expected InvalidEndpoint, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_endpoint_names_are_case_insensitive() {
    let transport = ScriptedTransport::sequence(vec![Ok(RawResponse::ok(r#"[{"a":1}]"#))]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    let records = client
        .query(" General ", &FilterSet::new(), RateLimitPolicy::Fail)
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(transport.calls()[0].url, "http://fac.test/general");
}

#[tokio::test]
async fn test_429_without_handling_fails_without_sleeping() {
    let transport =
        ScriptedTransport::sequence(vec![Ok(RawResponse::too_many_requests(Some("3")))]);
    let sleeper = RecordingSleeper::new();
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        sleeper.clone(),
    );

    let err = client
        .get_general(&GeneralQuery::new().audit_year(2022), false)
        .await
        .unwrap_err();

    match err {
        FetcherError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after.as_deref(), Some("3"))
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 1);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_retry_after_is_honored_and_request_reissued_unchanged() {
    let transport = ScriptedTransport::sequence(vec![
        Ok(RawResponse::too_many_requests(Some("1.5"))),
        Ok(RawResponse::ok(r#"[{"report_id":"R1"}]"#)),
    ]);
    let sleeper = RecordingSleeper::new();
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        sleeper.clone(),
    );

    let query = GeneralQuery::new().audit_year(2022).auditee_state("AK");
    let records = client.get_general(&query, true).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(sleeper.slept(), vec![Duration::from_millis(1500)]);
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert_eq!(calls[0].param("audit_year"), Some("eq.2022"));
    assert_eq!(calls[0].param("auditee_state"), Some("eq.AK"));
}

#[tokio::test]
async fn test_missing_retry_after_is_not_waited_out() {
    let transport = ScriptedTransport::sequence(vec![Ok(RawResponse::too_many_requests(None))]);
    let sleeper = RecordingSleeper::new();
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        sleeper.clone(),
    );

    let err = client
        .query("general", &FilterSet::new(), RateLimitPolicy::PATIENT)
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::RateLimited { .. }));
    assert_eq!(transport.call_count(), 1);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_limited_wait_budget_is_enforced() {
    let transport =
        ScriptedTransport::responding(|_| Ok(RawResponse::too_many_requests(Some("1"))));
    let sleeper = RecordingSleeper::new();
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        sleeper.clone(),
    );

    let err = client
        .query(
            "general",
            &FilterSet::new(),
            RateLimitPolicy::WaitAndRetry(RetryLimit::Limited(2)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::RateLimited { .. }));
    assert_eq!(sleeper.slept().len(), 2);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_error_object_body_yields_empty_result() {
    let transport = ScriptedTransport::sequence(vec![Ok(RawResponse::ok(
        r#"{"error":"query timeout"}"#,
    ))]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport,
        RecordingSleeper::new(),
    );

    let (logs, _guard) = LogCapture::install();
    let records = client
        .query("findings", &FilterSet::new(), RateLimitPolicy::Fail)
        .await
        .unwrap();
    assert!(records.is_empty());

    let warnings = logs.warnings_containing("Unexpected response shape");
    assert_eq!(warnings.len(), 1, "logs were:\n{}", logs.contents());
    assert!(warnings[0].contains("findings"));
}

#[tokio::test]
async fn test_status_classification() {
    let cases = vec![
        (RawResponse::status(401), "auth"),
        (RawResponse::status(404), "not_found"),
        (
            RawResponse {
                status: 503,
                retry_after: None,
                body: "x".repeat(500),
            },
            "http",
        ),
    ];

    for (response, expected) in cases {
        let transport = ScriptedTransport::sequence(vec![Ok(response)]);
        let client = test_client(
            test_config((2016, 2016), "AK"),
            transport,
            RecordingSleeper::new(),
        );
        let err = client
            .query("general", &FilterSet::new(), RateLimitPolicy::PATIENT)
            .await
            .unwrap_err();

        match (expected, err) {
            ("auth", FetcherError::AuthenticationFailure { .. }) => {}
            ("not_found", FetcherError::NotFound { .. }) => {}
            ("http", FetcherError::Http { status, message, .. }) => {
                assert_eq!(status, 503);
                assert!(message.len() < 500);
            }
            (expected, other) => panic!("expected {expected}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_transport_failures_are_classified() {
    let transport = ScriptedTransport::sequence(vec![
        Err(TransportError::Connect("refused".into())),
        Err(TransportError::Timeout("30s".into())),
    ]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport,
        RecordingSleeper::new(),
    );

    let first = client
        .query("general", &FilterSet::new(), RateLimitPolicy::Fail)
        .await
        .unwrap_err();
    let second = client
        .query("general", &FilterSet::new(), RateLimitPolicy::Fail)
        .await
        .unwrap_err();

    assert!(matches!(first, FetcherError::ConnectionFailure { .. }));
    assert!(matches!(second, FetcherError::Timeout { .. }));
}
