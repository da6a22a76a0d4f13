//! End-to-end runs against an in-memory device.

use async_trait::async_trait;
use coex_bench::config::HarnessConfig;
use coex_bench::dut::{Dut, DutConnector, LineDut};
use coex_bench::error::{AppResult, HarnessError};
use coex_bench::results::{ReportRow, ResultsAggregator};
use coex_bench::runner::{run_all, run_profile, ProfileOutcome};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};
use tokio::io::{BufReader, DuplexStream};

/// Replays a fixed console transcript per profile; unknown profiles stay silent.
#[derive(Default)]
struct ScriptedConnector {
    transcripts: HashMap<String, String>,
    silent: Mutex<Vec<DuplexStream>>,
}

impl ScriptedConnector {
    fn with(mut self, profile: &str, transcript: &str) -> Self {
        self.transcripts
            .insert(profile.to_string(), transcript.to_string());
        self
    }
}

#[async_trait]
impl DutConnector for ScriptedConnector {
    async fn connect(&self, profile: &str, build_dir: &Path) -> AppResult<Box<dyn Dut>> {
        assert!(build_dir.ends_with(format!("build_{profile}")));
        match self.transcripts.get(profile) {
            Some(text) => Ok(Box::new(LineDut::new(BufReader::new(Cursor::new(
                text.clone().into_bytes(),
            ))))),
            None => {
                let (console, board) = tokio::io::duplex(64);
                self.silent.lock().unwrap().push(board);
                Ok(Box::new(LineDut::new(BufReader::new(console))))
            }
        }
    }
}

fn transcript(rows: &[&str], heap: Option<u64>) -> String {
    let mut text = String::from(
        "I (10) boot: chip revision v0.1\n\
         I (500) coex_test: Starting speed test suite (3 tests)\n\
         I (900) coex_test: RESULT: 6553600 bytes in 8826 ms = 5.94 Mbit/s\n\
         I (901) coex_test: ========================================\n\
         I (902) coex_test:            TEST SUMMARY\n\
         I (903) coex_test: ========================================\n\
         I (904) coex_test: ----------------------------------------\n",
    );
    for row in rows {
        text.push_str(&format!("I (905) coex_test: {row}\n"));
    }
    text.push_str("I (906) coex_test: ========================================\n");
    if let Some(bytes) = heap {
        text.push_str(&format!("I (907) coex_test: Minimum free heap: {bytes} bytes\n"));
    }
    text.push_str("I (908) coex_test: Test suite complete.\n");
    text
}

fn project(profiles: &[&str], built: &[&str]) -> (TempDir, HarnessConfig) {
    let dir = tempdir().unwrap();
    for profile in profiles {
        fs::write(dir.path().join(format!("sdkconfig.{profile}")), "").unwrap();
    }
    for profile in built {
        fs::create_dir(dir.path().join(format!("build_{profile}"))).unwrap();
    }
    let mut config = HarnessConfig {
        project_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    config.timeouts.start_secs = 1;
    config.timeouts.complete_secs = 1;
    config.timeouts.profile_secs = 2;
    (dir, config)
}

#[tokio::test]
async fn test_passing_profiles_are_aggregated() {
    let (_dir, config) = project(&["aggressive", "balanced"], &["aggressive", "balanced"]);
    let connector = ScriptedConnector::default()
        .with(
            "balanced",
            &transcript(
                &[
                    "WiFi only                            5.94         OK",
                    "WiFi+BLE                             3.21         OK",
                ],
                Some(187392),
            ),
        )
        .with(
            "aggressive",
            &transcript(&["WiFi only                            6.50         OK"], None),
        );

    let profiles = vec!["aggressive".to_string(), "balanced".to_string()];
    let mut aggregator = ResultsAggregator::new();
    let summary = run_all(&profiles, &connector, &config, &mut aggregator).await;

    assert!(summary.success());
    assert_eq!(summary.passed(), 2);

    let rows = aggregator.render();
    assert_eq!(rows.len(), 4);
    assert!(matches!(&rows[0], ReportRow::Result { profile: Some(p), throughput, .. } if p == "aggressive" && *throughput == 6.5));
    assert!(matches!(&rows[1], ReportRow::Result { profile: Some(p), name, .. } if p == "balanced" && name == "WiFi only"));
    assert!(matches!(&rows[2], ReportRow::Result { profile: None, name, .. } if name == "WiFi+BLE"));
    assert_eq!(
        rows[3],
        ReportRow::Heap {
            profile: None,
            bytes: 187392
        }
    );
}

#[tokio::test]
async fn test_missing_build_is_skipped() {
    let (_dir, config) = project(&["balanced"], &[]);
    let connector = ScriptedConnector::default();
    let mut aggregator = ResultsAggregator::new();

    let outcome = run_profile("balanced", &connector, &config, &mut aggregator).await;
    match outcome {
        ProfileOutcome::Skipped { reason } => {
            assert!(reason.contains("build_balanced"));
            assert!(reason.contains("make PROFILE=balanced build"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(aggregator.is_empty());
}

#[tokio::test]
async fn test_failing_row_fails_profile_only() {
    let (_dir, config) = project(&["a", "b"], &["a", "b"]);
    let connector = ScriptedConnector::default()
        .with(
            "a",
            &transcript(
                &[
                    "WiFi only                            5.94         OK",
                    "BLE only                                -       FAIL",
                    "WiFi+BLE                             3.21         OK",
                ],
                Some(187392),
            ),
        )
        .with(
            "b",
            &transcript(&["WiFi only                            5.10         OK"], None),
        );

    let profiles = vec!["a".to_string(), "b".to_string()];
    let mut aggregator = ResultsAggregator::new();
    let summary = run_all(&profiles, &connector, &config, &mut aggregator).await;

    assert!(!summary.success());
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.passed(), 1);
    assert!(matches!(
        &summary.outcomes[0].1,
        ProfileOutcome::Failed { error: HarnessError::EntryFailed { name } } if name == "BLE only"
    ));
    let failed = aggregator.profile("a").unwrap();
    assert_eq!(failed.entries().count(), 2);
    assert!(failed.get("ble_only").is_some_and(|e| !e.passed));
    assert!(failed.get("wifi+ble").is_none());
    assert_eq!(failed.min_free_heap(), None);
}

#[tokio::test]
async fn test_empty_summary_fails() {
    let (_dir, config) = project(&["balanced"], &["balanced"]);
    let connector = ScriptedConnector::default().with("balanced", &transcript(&[], Some(1)));
    let mut aggregator = ResultsAggregator::new();

    let outcome = run_profile("balanced", &connector, &config, &mut aggregator).await;
    assert!(matches!(
        outcome,
        ProfileOutcome::Failed {
            error: HarnessError::EmptyResults
        }
    ));
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let (_dir, config) = project(&["quiet"], &["quiet"]);
    let connector = ScriptedConnector::default();
    let mut aggregator = ResultsAggregator::new();

    let outcome = run_profile("quiet", &connector, &config, &mut aggregator).await;
    match outcome {
        ProfileOutcome::Failed { error } => {
            assert!(error.is_device_wait());
            assert!(matches!(error, HarnessError::DeviceTimeout { ref pattern, .. } if pattern == "Starting speed test suite"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_output_fails() {
    let (_dir, config) = project(&["cut"], &["cut"]);
    let connector = ScriptedConnector::default().with(
        "cut",
        "I (500) coex_test: Starting speed test suite (3 tests)\nI (501) coex_test: Running: WiFi only\n",
    );
    let mut aggregator = ResultsAggregator::new();

    let outcome = run_profile("cut", &connector, &config, &mut aggregator).await;
    assert!(matches!(
        outcome,
        ProfileOutcome::Failed {
            error: HarnessError::DeviceClosed { .. }
        }
    ));
}
