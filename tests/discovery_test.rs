use coex_bench::profile::*;
use std::fs;
use tempfile::tempdir;

fn touch(dir: &std::path::Path, name: &str) {
    fs::write(dir.join(name), "# CONFIG\n").unwrap();
}

#[test]
fn test_reserved_overlays_excluded() {
    let dir = tempdir().unwrap();
    for name in [
        "sdkconfig.defaults",
        "sdkconfig.ci_smoke",
        "sdkconfig.balanced",
        "sdkconfig.aggressive",
    ] {
        touch(dir.path(), name);
    }

    let profiles = discover_profiles(dir.path()).unwrap();
    assert_eq!(profiles, vec!["aggressive", "balanced"]);
}

#[test]
fn test_sorted_case_sensitive() {
    let dir = tempdir().unwrap();
    for name in [
        "sdkconfig.high_throughput",
        "sdkconfig.Zeta",
        "sdkconfig.balanced",
        "sdkconfig.old",
        "sdkconfig.local",
        "sdkconfig",
        "CMakeLists.txt",
        "build_balanced",
    ] {
        touch(dir.path(), name);
    }

    let profiles = discover_profiles(dir.path()).unwrap();
    assert_eq!(profiles, vec!["Zeta", "balanced", "high_throughput"]);
}

#[test]
fn test_empty_directory_is_not_an_error() {
    let dir = tempdir().unwrap();
    assert!(discover_profiles(dir.path()).unwrap().is_empty());
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(discover_profiles(&dir.path().join("gone")).is_err());
}

#[test]
fn test_results_never_contain_reserved_names() {
    let dir = tempdir().unwrap();
    for suffix in ["defaults", "old", "local", "ci", "ci_nightly", "cix", "lowpower", "a", "b"] {
        touch(dir.path(), &format!("sdkconfig.{suffix}"));
    }

    let profiles = discover_profiles(dir.path()).unwrap();
    for profile in &profiles {
        assert!(!["defaults", "old", "local"].contains(&profile.as_str()));
        assert!(!profile.starts_with("ci"));
    }
    let mut sorted = profiles.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(profiles, sorted);
    assert_eq!(profiles, vec!["a", "b", "lowpower"]);
}
