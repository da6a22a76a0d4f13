//! Throughput summary parser.
//!
//! The firmware ends every run with a summary table printed through the ESP-IDF logger:
//!
//! ```text
//! I (90412) coex_test: ========================================
//! I (90413) coex_test:            TEST SUMMARY
//! I (90414) coex_test: ========================================
//! I (90415) coex_test: Test                               Mbit/s     Status
//! I (90416) coex_test: ----------------------------------------
//! I (90417) coex_test: WiFi only                            5.94         OK
//! I (90418) coex_test: BLE only                                -       FAIL
//! I (90419) coex_test: ========================================
//! I (90420) coex_test: Minimum free heap: 123456 bytes
//! ```
//!
//! [`parse_throughput_output`] strips the logger prefix from each line and runs a small
//! two-state machine over the result. Rows are only matched between the `TEST SUMMARY`
//! marker and the first `===` separator that follows a captured row, so unrelated log
//! lines that happen to look like `<words>  <number>  OK` are never picked up. The heap
//! line is matched everywhere.
//!
//! Lines that match neither pattern are dropped silently.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `<severity> (<timestamp>) <tag>: <rest>`
static LOG_PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[IWEDV]\s*\(\d+\)\s*[\w_]+:\s*(.*)$").expect("Invalid log prefix regex")
});

/// `<label>  <number|->  <OK|FAIL>`
static SUMMARY_ROW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s{2,}([\d.]+|-)\s+(OK|FAIL)\s*$").expect("Invalid summary row regex")
});

static HEAP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Minimum free heap:\s*(\d+)\s*bytes").expect("Invalid heap regex")
});

const SUMMARY_MARKER: &str = "TEST SUMMARY";
const SUMMARY_END: &str = "===";

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Label exactly as printed by the firmware.
    pub name: String,
    /// Measured throughput in Mbit/s; `0.0` when the firmware printed `-`.
    pub throughput: f64,
    /// True when the row ended in `OK`.
    pub passed: bool,
}

impl ResultEntry {
    /// Lookup key of this entry, see [`entry_key`].
    pub fn key(&self) -> String {
        entry_key(&self.name)
    }
}

/// Normalizes a display name into a lookup key: lowercase, spaces to underscores.
pub fn entry_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Everything extracted from one capture of device output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResults {
    entries: Vec<ResultEntry>,
    /// Last `Minimum free heap` value seen in the capture.
    pub min_free_heap: Option<u64>,
}

impl ParsedResults {
    /// Inserts `entry`, replacing an earlier entry with the same key in place.
    pub fn insert(&mut self, entry: ResultEntry) {
        let key = entry.key();
        match self.entries.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Looks up an entry by its normalized key.
    pub fn get(&self, key: &str) -> Option<&ResultEntry> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    /// Entries in the order their keys first appeared.
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// Number of result entries (the heap metric is not counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no result row was found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry that did not pass, if any.
    pub fn first_failure(&self) -> Option<&ResultEntry> {
        self.entries.iter().find(|entry| !entry.passed)
    }
}

/// Strips an ESP-IDF logger prefix, returning the message part.
///
/// Lines without the prefix come back trimmed but otherwise unchanged.
pub fn strip_log_prefix(line: &str) -> &str {
    let line = line.trim();
    LOG_PREFIX_REGEX
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map_or(line, |rest| rest.as_str())
}

/// Matches one normalized line against the summary row shape.
pub fn parse_summary_row(line: &str) -> Option<ResultEntry> {
    let caps = SUMMARY_ROW_REGEX.captures(line)?;
    let name = caps.get(1)?.as_str().trim();
    let throughput = match caps.get(2)?.as_str() {
        "-" => 0.0,
        number => number.parse::<f64>().ok()?,
    };
    Some(ResultEntry {
        name: name.to_string(),
        throughput,
        passed: caps.get(3)?.as_str() == "OK",
    })
}

/// Extracts the byte count from a `Minimum free heap: <n> bytes` line.
pub fn parse_heap_line(line: &str) -> Option<u64> {
    HEAP_REGEX.captures(line)?.get(1)?.as_str().parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutsideSummary,
    InsideSummary,
}

/// Parses the captured console output of one test run.
///
/// An empty result is a valid return value; deciding whether that is a failure is
/// left to the caller.
pub fn parse_throughput_output(output: &str) -> ParsedResults {
    let mut results = ParsedResults::default();
    let mut state = State::OutsideSummary;

    for raw in output.lines() {
        let line = strip_log_prefix(raw);

        if line.contains(SUMMARY_MARKER) {
            state = State::InsideSummary;
            continue;
        }

        if state == State::InsideSummary {
            if line.starts_with(SUMMARY_END) && !results.is_empty() {
                state = State::OutsideSummary;
                continue;
            }
            if !line.is_empty() && !line.starts_with('-') {
                if let Some(entry) = parse_summary_row(line) {
                    results.insert(entry);
                }
            }
        }

        if let Some(heap) = parse_heap_line(line) {
            results.min_free_heap = Some(heap);
        }
    }

    results
}
