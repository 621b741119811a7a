//! Dependent-resource batch collection

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fac_collector::downloader::batch::partition;
use fac_collector::downloader::{BatchCollector, BatchConfig, CollectError};
use fac_collector::fetcher::{FetcherError, RawResponse, TransportError};
use fac_collector::resume::BatchCheckpoint;
use fac_collector::shutdown::ShutdownCoordinator;

use crate::support::{
    in_list, report_id_rows, test_client, test_config, Call, LogCapture, RecordingSleeper,
    ScriptedTransport,
};

/// One award row per requested report id
fn awards_for(call: &Call) -> RawResponse {
    let ids = in_list(call.param("report_id").unwrap_or("in.()"));
    let rows: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({ "report_id": id, "amount_expended": 100 }))
        .collect();
    RawResponse::ok(serde_json::Value::Array(rows).to_string())
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_harvest_deduplicates_report_ids() {
    let transport = ScriptedTransport::sequence(vec![Ok(RawResponse::ok(report_id_rows(&[
        "R1", "R1", "R2",
    ])))]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );
    let collector = BatchCollector::new(client, BatchConfig::new()).unwrap();

    let report_ids = collector.harvest().await.unwrap();

    assert_eq!(report_ids.into_iter().collect::<Vec<_>>(), ids(&["R1", "R2"]));
    assert_eq!(transport.calls()[0].param("select"), Some("report_id"));
}

#[tokio::test]
async fn test_harvest_warns_about_rows_without_report_id() {
    let transport = ScriptedTransport::sequence(vec![Ok(RawResponse::ok(
        r#"[{"report_id":"R1"},{"report_id":null},{"auditee_name":"x"},{"report_id":"  "}]"#,
    ))]);
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport,
        RecordingSleeper::new(),
    );
    let collector = BatchCollector::new(client, BatchConfig::new()).unwrap();

    let (logs, _guard) = LogCapture::install();
    let report_ids = collector.harvest().await.unwrap();

    assert_eq!(report_ids.into_iter().collect::<Vec<_>>(), ids(&["R1"]));
    let warnings = logs.warnings_containing("without a report id");
    assert_eq!(warnings.len(), 1, "logs were:\n{}", logs.contents());
    assert!(warnings[0].contains("skipped=3"));
}

#[tokio::test]
async fn test_harvest_fails_when_every_partition_fails() {
    let transport = ScriptedTransport::responding(|_| Ok(RawResponse::status(401)));
    let client = test_client(
        test_config((2016, 2017), "AK,AL"),
        transport.clone(),
        RecordingSleeper::new(),
    );
    let collector = BatchCollector::new(client, BatchConfig::new()).unwrap();

    let err = collector.harvest().await.unwrap_err();

    assert!(matches!(
        err,
        CollectError::Harvest(FetcherError::AuthenticationFailure { .. })
    ));
    assert!(err.to_string().starts_with("report id harvest failed"));
    assert_eq!(transport.call_count(), 4);

    let batch_err = collector.collect("federal_awards").await.unwrap_err();
    assert!(matches!(batch_err, CollectError::Harvest(_)));
    assert!(transport
        .calls()
        .iter()
        .all(|c| c.url.ends_with("/general")));
}

#[tokio::test]
async fn test_harvest_survives_some_failed_partitions() {
    let transport = ScriptedTransport::sequence(vec![
        Ok(RawResponse::status(500)),
        Ok(RawResponse::ok(report_id_rows(&["R7"]))),
    ]);
    let client = test_client(
        test_config((2016, 2016), "AK,AL"),
        transport,
        RecordingSleeper::new(),
    );
    let collector = BatchCollector::new(client, BatchConfig::new()).unwrap();

    let report_ids = collector.harvest().await.unwrap();
    assert_eq!(report_ids.into_iter().collect::<Vec<_>>(), ids(&["R7"]));
}

#[tokio::test]
async fn test_collect_end_to_end() {
    let transport = ScriptedTransport::responding(|call| {
        if call.url.ends_with("/general") {
            Ok(RawResponse::ok(report_id_rows(&["R3", "R1", "R2", "R1"])))
        } else {
            Ok(awards_for(call))
        }
    });
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );
    let sleeper = RecordingSleeper::new();
    let collector = BatchCollector::new(client, BatchConfig::new().with_batch_size(2))
        .unwrap()
        .with_sleeper(sleeper.clone());

    let report = collector.collect("federal_awards").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.total_batches, 2);
    assert_eq!(report.unique_keys, 3);
    assert_eq!(report.records.len(), 3);

    let batch_calls: Vec<Call> = transport
        .calls()
        .into_iter()
        .filter(|c| c.url.ends_with("/federal_awards"))
        .collect();
    assert_eq!(batch_calls.len(), 2);
    assert_eq!(batch_calls[0].param("report_id"), Some("in.(R1,R2)"));
    assert_eq!(batch_calls[1].param("report_id"), Some("in.(R3)"));
    // Pacing only between batches
    assert_eq!(sleeper.slept(), vec![Duration::from_millis(500)]);
}

#[tokio::test]
async fn test_network_failure_retried_with_backoff_then_recorded() {
    let transport = ScriptedTransport::responding(|call| {
        if in_list(call.param("report_id").unwrap_or_default()).contains(&"R1".to_string()) {
            Err(TransportError::Connect("connection refused".into()))
        } else {
            Ok(awards_for(call))
        }
    });
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );
    let sleeper = RecordingSleeper::new();
    let collector = BatchCollector::new(client, BatchConfig::new().with_batch_size(2))
        .unwrap()
        .with_sleeper(sleeper.clone());

    let batches = partition(&ids(&["R1", "R2", "R3"]), 2);
    let report = collector
        .collect_batches("federal_awards", batches)
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 4);
    assert_eq!(
        sleeper.slept(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_millis(500)
        ]
    );
    assert_eq!(report.failed_batches.len(), 1);
    assert_eq!(report.failed_batches[0].batch_number, 1);
    assert_eq!(report.failed_batches[0].report_ids, ids(&["R1", "R2"]));
    assert!(report.failed_batches[0].error.contains("connect"));
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0]["report_id"], "R3");
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let transport = ScriptedTransport::responding(|_| Ok(RawResponse::status(500)));
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        RecordingSleeper::new(),
    );
    let sleeper = RecordingSleeper::new();
    let collector = BatchCollector::new(client, BatchConfig::new())
        .unwrap()
        .with_sleeper(sleeper.clone());

    let report = collector
        .collect_batches("federal_awards", partition(&ids(&["R1"]), 250))
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 1);
    assert!(sleeper.slept().is_empty());
    assert_eq!(report.failed_batches.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_inside_batch_does_not_consume_attempts() {
    let transport = ScriptedTransport::sequence(vec![
        Ok(RawResponse::too_many_requests(Some("2"))),
        Ok(RawResponse::ok(r#"[{"report_id":"R1"}]"#)),
    ]);
    let client_sleeper = RecordingSleeper::new();
    let client = test_client(
        test_config((2016, 2016), "AK"),
        transport.clone(),
        client_sleeper.clone(),
    );
    let collector = BatchCollector::new(client, BatchConfig::new().with_max_attempts(1))
        .unwrap()
        .with_sleeper(RecordingSleeper::new());

    let report = collector
        .collect_batches("federal_awards", partition(&ids(&["R1"]), 250))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(client_sleeper.slept(), vec![Duration::from_secs(2)]);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_checkpoint_written_and_failed_batches_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("awards_checkpoint.json");

    let failing = ScriptedTransport::responding(|call| {
        if call.param("report_id") == Some("in.(R2)") {
            Err(TransportError::Timeout("30s".into()))
        } else {
            Ok(awards_for(call))
        }
    });
    let config = BatchConfig::new()
        .with_batch_size(1)
        .with_max_attempts(2)
        .with_checkpoint_path(&checkpoint_path);
    let collector = BatchCollector::new(
        test_client(
            test_config((2016, 2016), "AK"),
            failing,
            RecordingSleeper::new(),
        ),
        config.clone(),
    )
    .unwrap()
    .with_sleeper(RecordingSleeper::new());

    let report = collector
        .collect_batches("federal_awards", partition(&ids(&["R1", "R2", "R3"]), 1))
        .await
        .unwrap();
    assert_eq!(report.records.len(), 2);

    let checkpoint = BatchCheckpoint::load(&checkpoint_path).unwrap();
    assert_eq!(checkpoint.endpoint(), "federal_awards");
    assert_eq!(checkpoint.total_batches(), 3);
    assert_eq!(checkpoint.completed_batches(), 3);
    assert_eq!(checkpoint.records_collected(), 2);
    assert_eq!(checkpoint.failed_batches().len(), 1);
    assert_eq!(checkpoint.failed_batches()[0].batch_number, 2);

    let healthy = ScriptedTransport::responding(|call| Ok(awards_for(call)));
    let retry = BatchCollector::new(
        test_client(
            test_config((2016, 2016), "AK"),
            healthy.clone(),
            RecordingSleeper::new(),
        ),
        config,
    )
    .unwrap()
    .with_sleeper(RecordingSleeper::new());

    let rerun = retry.retry_from_checkpoint(&checkpoint_path).await.unwrap();
    assert!(rerun.is_complete());
    assert_eq!(rerun.records.len(), 1);
    assert_eq!(rerun.records[0]["report_id"], "R2");
    assert_eq!(healthy.calls()[0].param("report_id"), Some("in.(R2)"));

    let rewritten = BatchCheckpoint::load(&checkpoint_path).unwrap();
    assert!(rewritten.failed_batches().is_empty());
    assert!(rewritten.is_finished());
}

#[tokio::test]
async fn test_checkpoint_saved_at_interval() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("cp.json");
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    let transport = {
        let path = checkpoint_path.clone();
        let seen = seen.clone();
        ScriptedTransport::responding(move |call| {
            if let Ok(cp) = BatchCheckpoint::load(&path) {
                seen.lock().unwrap().push(cp.completed_batches());
            }
            Ok(awards_for(call))
        })
    };
    let config = BatchConfig::new()
        .with_batch_size(1)
        .with_checkpoint_interval(2)
        .with_checkpoint_path(&checkpoint_path);
    let collector = BatchCollector::new(
        test_client(
            test_config((2016, 2016), "AK"),
            transport,
            RecordingSleeper::new(),
        ),
        config,
    )
    .unwrap()
    .with_sleeper(RecordingSleeper::new());

    collector
        .collect_batches(
            "federal_awards",
            partition(&ids(&["R1", "R2", "R3", "R4"]), 1),
        )
        .await
        .unwrap();

    // Batches 3 and 4 run after the save at batch 2
    assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
    let final_cp = BatchCheckpoint::load(&checkpoint_path).unwrap();
    assert_eq!(final_cp.completed_batches(), 4);
}

#[tokio::test]
async fn test_cancellation_records_unprocessed_batches() {
    let shutdown = ShutdownCoordinator::shared();
    let transport = {
        let shutdown = shutdown.clone();
        ScriptedTransport::responding(move |call| {
            shutdown.request_shutdown();
            Ok(awards_for(call))
        })
    };
    let collector = BatchCollector::new(
        test_client(
            test_config((2016, 2016), "AK"),
            transport.clone(),
            RecordingSleeper::new(),
        ),
        BatchConfig::new().with_batch_size(1),
    )
    .unwrap()
    .with_sleeper(RecordingSleeper::new())
    .with_shutdown(shutdown);

    let report = collector
        .collect_batches("federal_awards", partition(&ids(&["R1", "R2", "R3"]), 1))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(report.records.len(), 1);
    let pending: Vec<usize> = report.failed_batches.iter().map(|f| f.batch_number).collect();
    assert_eq!(pending, vec![2, 3]);
    assert!(report.failed_batches[0].error.contains("not attempted"));
}

#[tokio::test]
async fn test_cancelled_harvest_is_an_error() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let transport = ScriptedTransport::sequence(vec![]);
    let client = Arc::new(
        fac_collector::fetcher::fac_http::FacHttpClient::new(
            test_config((2016, 2016), "AK"),
            transport.clone(),
        )
        .with_shutdown(shutdown),
    );
    let collector = BatchCollector::new(client, BatchConfig::new()).unwrap();

    let err = collector.harvest().await.unwrap_err();
    assert!(matches!(err, CollectError::Cancelled));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_zero_batch_size_rejected() {
    let client = test_client(
        test_config((2016, 2016), "AK"),
        ScriptedTransport::sequence(vec![]),
        RecordingSleeper::new(),
    );
    let err = BatchCollector::new(client.clone(), BatchConfig::new().with_batch_size(0))
        .unwrap_err();
    assert!(matches!(err, CollectError::InvalidArgument(_)));

    let collector = BatchCollector::new(client, BatchConfig::new().with_batch_size(7)).unwrap();
    let debug = format!("{collector:?}");
    assert!(debug.starts_with("BatchCollector"));
    assert!(debug.contains("batch_size: 7"));
}
