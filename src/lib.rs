//! # WiFi/BLE Coexistence Bench Library
//!
//! This crate drives throughput firmware through a set of build profiles on real
//! hardware and turns the device console output into a consolidated results table.
//! The binary (`main.rs`) is a thin CLI over these modules, so the same pieces can be
//! used from integration tests with an in-memory device.
//!
//! ## Crate Structure
//!
//! - **`profile`**: discovers profiles from `sdkconfig.<profile>` files and locates
//!   their `build_<profile>` directories.
//! - **`parser`**: extracts the `TEST SUMMARY` rows and the minimum-free-heap metric
//!   from raw, possibly log-prefixed console text.
//! - **`results`**: the run-wide `ResultsAggregator`, the final report table and the
//!   optional JSON results file.
//! - **`dut`**: the `Dut` console abstraction, a stream-backed implementation and the
//!   serial-port connector.
//! - **`runner`**: the per-profile test driver and run summary.
//! - **`config`**: layered configuration loading with `figment`. See `config::HarnessConfig`.
//! - **`tracing_setup`**: `tracing-subscriber` initialization.
//! - **`error`**: the `HarnessError` enum shared by all modules.

pub mod config;
pub mod dut;
pub mod error;
pub mod parser;
pub mod profile;
pub mod results;
pub mod runner;
pub mod tracing_setup;
