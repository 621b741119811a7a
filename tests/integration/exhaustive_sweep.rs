//! Year x jurisdiction sweep

use fac_collector::downloader::{CollectError, ExhaustiveCollector};
use fac_collector::fetcher::{FetcherError, RawResponse};

use crate::support::{test_client, test_config, RecordingSleeper, ScriptedTransport};

#[tokio::test]
async fn test_sweep_issues_one_request_per_pair_in_order() {
    let transport = ScriptedTransport::sequence(vec![
        Ok(RawResponse::ok(r#"[{"report_id":"R1","auditee_state":"AK"}]"#)),
        Ok(RawResponse::ok(
            r#"[{"report_id":"R2","auditee_state":"AL"},{"report_id":"R3","auditee_state":"AL"}]"#,
        )),
    ]);
    let client = test_client(
        test_config((2016, 2016), "AK,AL"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    let sweep = ExhaustiveCollector::new(client)
        .collect("general", None)
        .await
        .unwrap();

    assert!(sweep.is_complete());
    assert_eq!(sweep.requests_made, 2);
    assert_eq!(sweep.records.len(), 3);
    assert_eq!(sweep.records[0]["report_id"], "R1");

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].param("audit_year"), Some("eq.2016"));
    assert_eq!(calls[0].param("auditee_state"), Some("eq.AK"));
    assert_eq!(calls[1].param("auditee_state"), Some("eq.AL"));
}

#[tokio::test]
async fn test_years_are_outer_loop() {
    let transport = ScriptedTransport::responding(|_| Ok(RawResponse::ok("[]")));
    let client = test_client(
        test_config((2016, 2017), "AK,AL"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    ExhaustiveCollector::new(client)
        .collect("general", None)
        .await
        .unwrap();

    let order: Vec<(String, String)> = transport
        .calls()
        .iter()
        .map(|c| {
            (
                c.param("audit_year").unwrap_or_default().to_string(),
                c.param("auditee_state").unwrap_or_default().to_string(),
            )
        })
        .collect();
    let expected = [
        ("eq.2016", "eq.AK"),
        ("eq.2016", "eq.AL"),
        ("eq.2017", "eq.AK"),
        ("eq.2017", "eq.AL"),
    ];
    assert_eq!(order.len(), expected.len());
    for (got, want) in order.iter().zip(expected) {
        assert_eq!((got.0.as_str(), got.1.as_str()), want);
    }
}

#[tokio::test]
async fn test_failed_partition_is_skipped_and_recorded() {
    let transport = ScriptedTransport::sequence(vec![
        Ok(RawResponse::status(500)),
        Ok(RawResponse::ok(r#"[{"report_id":"R2"}]"#)),
    ]);
    let client = test_client(
        test_config((2020, 2020), "AK,AL"),
        transport,
        RecordingSleeper::new(),
    );

    let sweep = ExhaustiveCollector::new(client)
        .collect("general", None)
        .await
        .unwrap();

    assert!(!sweep.is_complete());
    assert_eq!(sweep.records.len(), 1);
    assert_eq!(sweep.failed_partitions.len(), 1);
    assert_eq!(sweep.failed_partitions[0].year, 2020);
    assert_eq!(sweep.failed_partitions[0].jurisdiction, "AK");
}

#[tokio::test]
async fn test_column_projection_is_sent() {
    let transport = ScriptedTransport::responding(|_| Ok(RawResponse::ok("[]")));
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    ExhaustiveCollector::new(client)
        .collect("general", Some(vec!["report_id".into(), "auditee_name".into()]))
        .await
        .unwrap();

    assert_eq!(
        transport.calls()[0].param("select"),
        Some("report_id,auditee_name")
    );
}

#[tokio::test]
async fn test_authentication_failure_on_one_pair_keeps_other_records() {
    let transport = ScriptedTransport::sequence(vec![
        Ok(RawResponse::ok(r#"[{"report_id":"R1"},{"report_id":"R2"}]"#)),
        Ok(RawResponse::status(401)),
        Ok(RawResponse::ok(r#"[{"report_id":"R3"}]"#)),
    ]);
    let client = test_client(
        test_config((2016, 2016), "AK,AL,AR"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    let sweep = ExhaustiveCollector::new(client)
        .collect("general", None)
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 3);
    assert_eq!(sweep.requests_made, 3);
    let ids: Vec<&str> = sweep
        .records
        .iter()
        .filter_map(|r| r["report_id"].as_str())
        .collect();
    assert_eq!(ids, ["R1", "R2", "R3"]);
    assert_eq!(sweep.failed_partitions.len(), 1);
    assert_eq!(sweep.failed_partitions[0].jurisdiction, "AL");
    assert!(sweep.failed_partitions[0]
        .error
        .contains("authentication failed"));
}

#[tokio::test]
async fn test_invalid_endpoint_rejected_before_requests() {
    let transport = ScriptedTransport::sequence(vec![]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );

    let err = ExhaustiveCollector::new(client)
        .collect("nope", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CollectError::Fetcher(FetcherError::InvalidEndpoint { .. })
    ));
    assert_eq!(transport.call_count(), 0);
}
