//! Per-profile test driver.
//!
//! Each profile runs to completion before the next starts:
//!
//! 1. skip when `build_<profile>` is missing,
//! 2. open the device console and wait for the start and completion markers,
//! 3. parse the output captured between the two markers,
//! 4. record entries in the [`ResultsAggregator`] up to and including the first `FAIL` row.
//!
//! A failing profile never stops the run; the failure is kept in its [`ProfileOutcome`]
//! and reflected in [`RunSummary::success`].

use crate::config::HarnessConfig;
use crate::dut::DutConnector;
use crate::error::{AppResult, HarnessError};
use crate::parser::{parse_throughput_output, ParsedResults};
use crate::profile::{build_dir, missing_build_message};
use crate::results::ResultsAggregator;
use tracing::{info, info_span, warn, Instrument};

/// How a single profile ended.
#[derive(Debug)]
pub enum ProfileOutcome {
    /// All entries passed.
    Passed { entries: usize },
    /// The profile was not built; not a failure.
    Skipped { reason: String },
    /// Device wait, empty output or a failing entry.
    Failed { error: HarnessError },
}

impl ProfileOutcome {
    /// True only for [`ProfileOutcome::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, ProfileOutcome::Failed { .. })
    }
}

/// Outcomes of every profile of a run, in execution order.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// `(profile, outcome)` pairs.
    pub outcomes: Vec<(String, ProfileOutcome)>,
}

impl RunSummary {
    /// True when no profile failed. Skipped profiles do not count as failures.
    pub fn success(&self) -> bool {
        !self.outcomes.iter().any(|(_, outcome)| outcome.is_failure())
    }

    /// Number of profiles that passed.
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, ProfileOutcome::Passed { .. }))
    }

    /// Number of profiles skipped for a missing build.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ProfileOutcome::Skipped { .. }))
    }

    /// Number of profiles that failed.
    pub fn failed(&self) -> usize {
        self.count(ProfileOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&ProfileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Checks a parsed capture and records it under `profile`.
///
/// Entries are recorded in order and each one is checked right after it is recorded,
/// so the failing row itself shows up in the report but nothing after it does. The
/// heap metric is only recorded once every entry has passed.
///
/// # Errors
/// [`HarnessError::EmptyResults`] when nothing was parsed,
/// [`HarnessError::EntryFailed`] for the first entry that did not pass.
pub fn accept_results(
    profile: &str,
    results: &ParsedResults,
    aggregator: &mut ResultsAggregator,
) -> AppResult<usize> {
    aggregator.ensure_profile(profile);
    if results.is_empty() {
        return Err(HarnessError::EmptyResults);
    }

    for entry in results.entries() {
        aggregator.record(profile, &entry.key(), entry.clone());
        if !entry.passed {
            return Err(HarnessError::EntryFailed {
                name: entry.name.clone(),
            });
        }
    }
    if let Some(bytes) = results.min_free_heap {
        aggregator.record_heap(profile, bytes);
    }
    Ok(results.len())
}

/// Drives one profile through the device and records its results.
pub async fn run_profile(
    profile: &str,
    connector: &dyn DutConnector,
    config: &HarnessConfig,
    aggregator: &mut ResultsAggregator,
) -> ProfileOutcome {
    let build_path = build_dir(&config.project_dir, profile);
    if !build_path.exists() {
        let reason = missing_build_message(profile);
        warn!(profile, "{reason}");
        return ProfileOutcome::Skipped { reason };
    }

    info!(profile, "Testing profile");

    let capture = async {
        let mut dut = connector.connect(profile, &build_path).await?;
        dut.expect(&config.markers.start, config.timeouts.start())
            .await?;
        dut.expect(&config.markers.complete, config.timeouts.complete())
            .await?;
        Ok::<_, HarnessError>(dut.before().to_string())
    };

    let watchdog = config.timeouts.profile();
    let output = match tokio::time::timeout(watchdog, capture).await {
        Ok(Ok(output)) => output,
        Ok(Err(error)) => return ProfileOutcome::Failed { error },
        Err(_) => {
            return ProfileOutcome::Failed {
                error: HarnessError::ProfileTimeout {
                    profile: profile.to_string(),
                    timeout: watchdog,
                },
            }
        }
    };

    let results = parse_throughput_output(&output);
    match accept_results(profile, &results, aggregator) {
        Ok(entries) => {
            info!(profile, entries, "Profile completed successfully");
            ProfileOutcome::Passed { entries }
        }
        Err(error) => ProfileOutcome::Failed { error },
    }
}

/// Runs every profile in order and collects their outcomes.
pub async fn run_all(
    profiles: &[String],
    connector: &dyn DutConnector,
    config: &HarnessConfig,
    aggregator: &mut ResultsAggregator,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for profile in profiles {
        let outcome = run_profile(profile, connector, config, aggregator)
            .instrument(info_span!("profile", name = %profile))
            .await;
        if let ProfileOutcome::Failed { error } = &outcome {
            warn!(profile = %profile, %error, "profile failed");
        }
        summary.outcomes.push((profile.clone(), outcome));
    }

    info!(
        passed = summary.passed(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        "run finished"
    );
    summary
}
