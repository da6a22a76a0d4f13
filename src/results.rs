//! Run-wide result aggregation and the final report.
//!
//! A [`ResultsAggregator`] is created once per run and handed by `&mut` to each profile
//! as it executes, so the store is never shared between threads without the borrow
//! checker noticing. Profiles are kept sorted; within a profile, entries keep the order
//! in which their keys were first recorded.

use crate::error::AppResult;
use crate::parser::ResultEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

const PROFILE_WIDTH: usize = 15;
const TEST_WIDTH: usize = 20;
const SEPARATOR_WIDTH: usize = 80;

/// Everything recorded for a single profile.
///
/// Entries are keyed by their normalized name; the heap metric is kept apart from
/// them, so no entry label can collide with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileRecord {
    entries: Vec<(String, ResultEntry)>,
    min_free_heap: Option<u64>,
}

impl ProfileRecord {
    fn set(&mut self, key: &str, entry: ResultEntry) {
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = entry,
            None => self.entries.push((key.to_string(), entry)),
        }
    }

    /// Result entries in recording order.
    pub fn entries(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Last heap metric recorded for this profile.
    pub fn min_free_heap(&self) -> Option<u64> {
        self.min_free_heap
    }

    /// Looks up a recorded entry by key.
    pub fn get(&self, key: &str) -> Option<&ResultEntry> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, entry)| entry)
    }
}

/// One line of the final report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRow {
    /// A result entry; `profile` is only set on the first row of each profile.
    Result {
        profile: Option<String>,
        name: String,
        throughput: f64,
        passed: bool,
    },
    /// The heap metric of a profile, after its result rows.
    Heap {
        profile: Option<String>,
        bytes: u64,
    },
}

/// Process-wide store of per-profile results.
#[derive(Debug, Default)]
pub struct ResultsAggregator {
    profiles: BTreeMap<String, ProfileRecord>,
}

impl ResultsAggregator {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `store[profile][key] = entry`, creating the profile on first use.
    pub fn record(&mut self, profile: &str, key: &str, entry: ResultEntry) {
        self.profiles
            .entry(profile.to_string())
            .or_default()
            .set(key, entry);
    }

    /// Sets the heap metric of `profile`, replacing an earlier value.
    pub fn record_heap(&mut self, profile: &str, bytes: u64) {
        self.profiles
            .entry(profile.to_string())
            .or_default()
            .min_free_heap = Some(bytes);
    }

    /// Makes sure `profile` exists, even if nothing gets recorded for it.
    pub fn ensure_profile(&mut self, profile: &str) {
        self.profiles.entry(profile.to_string()).or_default();
    }

    /// Everything recorded for `profile`, if it was seen.
    pub fn profile(&self, profile: &str) -> Option<&ProfileRecord> {
        self.profiles.get(profile)
    }

    /// True when no profile has been recorded.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Builds the report rows: profiles sorted, entries in recording order, heap last.
    pub fn render(&self) -> Vec<ReportRow> {
        let mut rows = Vec::new();

        for (profile, record) in &self.profiles {
            let mut first = true;
            let mut label = || {
                if std::mem::take(&mut first) {
                    Some(profile.clone())
                } else {
                    None
                }
            };

            for entry in record.entries() {
                rows.push(ReportRow::Result {
                    profile: label(),
                    name: entry.name.clone(),
                    throughput: entry.throughput,
                    passed: entry.passed,
                });
            }
            if let Some(bytes) = record.min_free_heap() {
                rows.push(ReportRow::Heap {
                    profile: label(),
                    bytes,
                });
            }
        }

        rows
    }

    /// Writes the report table. Nothing is written when the store is empty.
    pub fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        writeln!(out, "{}", banner("throughput results"))?;
        writeln!(
            out,
            "{:<PROFILE_WIDTH$} {:<TEST_WIDTH$} {:>15}   Status",
            "Profile", "Test", "Throughput"
        )?;
        writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;

        for row in self.render() {
            match row {
                ReportRow::Result {
                    profile,
                    name,
                    throughput,
                    passed,
                } => {
                    let status = if passed { "PASS" } else { "FAIL" };
                    writeln!(
                        out,
                        "{:<PROFILE_WIDTH$} {:<TEST_WIDTH$} {:>12.2} Mbit/s  {}",
                        profile.unwrap_or_default(),
                        name,
                        throughput,
                        status
                    )?;
                }
                ReportRow::Heap { profile, bytes } => {
                    writeln!(
                        out,
                        "{:<PROFILE_WIDTH$} {:<TEST_WIDTH$} {:>12} bytes",
                        profile.unwrap_or_default(),
                        "Min free heap",
                        bytes
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Serializes the store to `path` as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> AppResult<()> {
        let document = ResultsDocument {
            generated_at: Utc::now(),
            profiles: self
                .profiles
                .iter()
                .map(|(name, record)| {
                    (
                        name.as_str(),
                        ProfileDocument {
                            results: record.entries().collect(),
                            min_free_heap: record.min_free_heap(),
                        },
                    )
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&document)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "saved results");
        Ok(())
    }
}

#[derive(Serialize)]
struct ResultsDocument<'a> {
    generated_at: DateTime<Utc>,
    profiles: BTreeMap<&'a str, ProfileDocument<'a>>,
}

#[derive(Serialize)]
struct ProfileDocument<'a> {
    results: Vec<&'a ResultEntry>,
    min_free_heap: Option<u64>,
}

fn banner(title: &str) -> String {
    let title = format!(" {title} ");
    let fill = SEPARATOR_WIDTH.saturating_sub(title.len());
    let left = fill / 2;
    format!("{}{}{}", "=".repeat(left), title, "=".repeat(fill - left))
}
