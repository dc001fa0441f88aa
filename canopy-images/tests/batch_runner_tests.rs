//! Integration tests for the concurrent batch runner
//!
//! Covers de-duplication, the concurrency bound, merge-back onto records,
//! idempotent re-runs, setup failure and cancellation.

mod helpers;

use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use canopy_images::build_runner;
use canopy_images::config::PipelineSettings;
use canopy_images::records::write_records;
use canopy_images::services::ExportFilter;

use helpers::{metadata_url, page_body, png_bytes, record, test_settings, MockRemote};

/// Script a successful lookup and download for `id`
fn script_success(remote: &MockRemote, settings: &PipelineSettings, id: i64) {
    let media = format!("https://media.test/content/{}.png", id);
    remote.respond(
        &metadata_url(settings, id),
        200,
        page_body(&[(media.as_str(), "Photographer")]).to_string(),
    );
    remote.respond(&media, 200, png_bytes(32, 16));
}

fn images_of(value: &Value) -> &Vec<Value> {
    value["images"].as_array().expect("images array")
}

#[tokio::test]
async fn test_duplicate_identifiers_fetched_once() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let remote = MockRemote::new();
    script_success(&remote, &settings, 1);
    script_success(&remote, &settings, 2);

    let records = vec![
        record(json!({"tree_id": "a", "eol_id": 1})),
        record(json!({"tree_id": "b", "eol_id": 1})),
        record(json!({"tree_id": "c", "eol_id": 2})),
        record(json!({"tree_id": "d", "eol_id": -1})),
    ];

    let report = build_runner(&settings, remote.picker()).run(records).await.unwrap();

    assert_eq!(report.identifiers, 2);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(remote.request_count(&metadata_url(&settings, 1)), 1);
    assert_eq!(remote.request_count(&metadata_url(&settings, 2)), 1);
    assert_eq!(remote.requests().len(), 4, "two lookups and two downloads");

    let values: Vec<Value> = report
        .records
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    assert_eq!(images_of(&values[0]), images_of(&values[1]));
    assert_eq!(images_of(&values[0])[0]["url"], "https://storage.test/img/1.png");
    assert_eq!(images_of(&values[2])[0]["author"]["url"], "https://eol.org/pages/2/media");
    assert!(images_of(&values[3]).is_empty());
    assert_eq!(values[3]["tree_id"], "d");
}

#[tokio::test]
async fn test_failed_identifier_gets_empty_images() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let remote = MockRemote::new();
    script_success(&remote, &settings, 1);
    remote.respond(&metadata_url(&settings, 2), 200, r#"{"taxonConcept": {}}"#);

    let records = vec![
        record(json!({"eol_id": 1})),
        record(json!({"eol_id": 2})),
        record(json!({"name_botanical": "Quercus agrifolia"})),
    ];
    let report = build_runner(&settings, remote.picker()).run(records).await.unwrap();

    assert_eq!(report.outcomes.success_count(), 1);
    assert_eq!(report.outcomes.failure_count(), 1);
    let second = serde_json::to_value(&report.records[1]).unwrap();
    let third = serde_json::to_value(&report.records[2]).unwrap();
    assert!(images_of(&second).is_empty());
    assert!(images_of(&third).is_empty());

    let failures = report.outcomes.to_csv(ExportFilter::FailuresOnly);
    let lines: Vec<&str> = failures.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "identifier,responseCode,firstCode,mediaURL,writtenFile,error");
    assert_eq!(lines[1], "2,200,,,,no media available");
}

#[tokio::test]
async fn test_concurrency_bound_respected() {
    let temp = TempDir::new().unwrap();
    let settings = PipelineSettings {
        concurrency: 4,
        ..test_settings(temp.path())
    };
    let remote = MockRemote::gated();
    for id in 1..=10 {
        script_success(&remote, &settings, id);
    }
    let records = (1..=10).map(|id| record(json!({"eol_id": id}))).collect();
    let runner = build_runner(&settings, remote.picker());

    let controller = async {
        // Wait for the pool to fill, then check nothing else starts
        for _ in 0..200 {
            if remote.in_flight() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(remote.in_flight(), 4);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(remote.in_flight(), 4);
        assert_eq!(remote.requests().len(), 4);

        // Two requests per identifier
        remote.release(20);
    };

    let (report, ()) = tokio::join!(runner.run(records), controller);
    let report = report.unwrap();

    assert_eq!(report.outcomes.len(), 10);
    assert_eq!(report.outcomes.success_count(), 10);
    assert_eq!(remote.max_in_flight(), 4);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let remote = MockRemote::new();
    for id in [3, 5, 8] {
        script_success(&remote, &settings, id);
    }
    let input = vec![
        record(json!({"tree_id": 1, "eol_id": 3, "name_botanical": "Arbutus menziesii"})),
        record(json!({"tree_id": 2, "eol_id": "5"})),
        record(json!({"tree_id": 3, "eol_id": 8})),
        record(json!({"tree_id": 4, "eol_id": 3})),
    ];
    let runner = build_runner(&settings, remote.picker());

    let first = runner.run(input.clone()).await.unwrap();
    let files_after_first = std::fs::read_dir(temp.path()).unwrap().count();
    let second = runner.run(input).await.unwrap();
    let files_after_second = std::fs::read_dir(temp.path()).unwrap().count();

    let mut first_json = Vec::new();
    write_records(&mut first_json, &first.records).unwrap();
    let mut second_json = Vec::new();
    write_records(&mut second_json, &second.records).unwrap();

    assert_eq!(first_json, second_json);
    assert_eq!(files_after_first, files_after_second);
    assert_eq!(second.outcomes.len(), 3, "log is per run");
}

#[tokio::test]
async fn test_unwritable_image_dir_fails_setup() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("img");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();
    let settings = test_settings(&blocker);
    let remote = MockRemote::new();

    let result = build_runner(&settings, remote.picker())
        .run(vec![record(json!({"eol_id": 1}))])
        .await;

    assert!(matches!(result, Err(canopy_common::Error::Setup { .. })));
    assert!(remote.requests().is_empty(), "no request before setup succeeds");
}

#[tokio::test]
async fn test_cancelled_batch_dispatches_nothing_new() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let remote = MockRemote::new();
    for id in 1..=3 {
        script_success(&remote, &settings, id);
    }
    let token = CancellationToken::new();
    token.cancel();

    let records = (1..=3).map(|id| record(json!({"eol_id": id}))).collect();
    let report = build_runner(&settings, remote.picker())
        .with_cancel_token(token)
        .run(records)
        .await
        .unwrap();

    assert!(report.was_cancelled());
    assert_eq!(report.skipped, 3);
    assert!(report.outcomes.is_empty());
    assert!(remote.requests().is_empty());
    for record in &report.records {
        let value = serde_json::to_value(record).unwrap();
        assert!(images_of(&value).is_empty());
    }
}

#[tokio::test]
async fn test_empty_input() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let remote = MockRemote::new();

    let report = build_runner(&settings, remote.picker()).run(Vec::new()).await.unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.outcomes.to_csv(ExportFilter::All), "");
    assert!(temp.path().join("other").is_dir());
    assert!(temp.path().join("csv").is_dir());
}
