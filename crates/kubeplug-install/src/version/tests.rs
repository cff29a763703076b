//! Unit tests for manifest version parsing and ordering.

use rstest::rstest;

use super::*;

fn version(text: &str) -> PluginVersion {
    PluginVersion::parse(text).expect("valid version")
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn parses_core_triple() {
    let parsed = version("v1.22.333");
    assert_eq!(parsed.major(), 1);
    assert_eq!(parsed.minor(), 22);
    assert_eq!(parsed.patch(), 333);
    assert!(!parsed.is_pre_release());
}

#[rstest]
#[case::plain("v0.1.0")]
#[case::pre_release("v1.0.0-rc.1")]
#[case::build("v1.0.0+20240101")]
#[case::both("v2.3.4-beta.2+sha.abc123")]
fn display_round_trips(#[case] text: &str) {
    assert_eq!(version(text).to_string(), text);
}

#[rstest]
#[case::missing_prefix("1.0.0")]
#[case::two_components("v1.0")]
#[case::four_components("v1.0.0.0")]
#[case::leading_zero("v01.0.0")]
#[case::not_numeric("v1.x.0")]
#[case::empty_pre_release("v1.0.0-")]
#[case::empty_identifier("v1.0.0-rc..1")]
#[case::empty_build("v1.0.0+")]
#[case::empty("")]
fn rejects_malformed_versions(#[case] text: &str) {
    let error = PluginVersion::parse(text).expect_err("should reject");
    assert!(matches!(error, InstallError::Manifest { .. }), "{error}");
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[rstest]
#[case::patch("v1.0.0", "v1.0.1")]
#[case::minor_is_numeric("v1.2.0", "v1.10.0")]
#[case::major("v1.99.99", "v2.0.0")]
#[case::pre_release_before_release("v1.0.0-rc.1", "v1.0.0")]
#[case::numeric_identifiers("v1.0.0-rc.2", "v1.0.0-rc.10")]
#[case::numeric_before_alpha("v1.0.0-1", "v1.0.0-alpha")]
#[case::shorter_pre_release_first("v1.0.0-alpha", "v1.0.0-alpha.1")]
fn orders_older_before_newer(#[case] older: &str, #[case] newer: &str) {
    assert!(version(older) < version(newer), "{older} should sort before {newer}");
}

#[test]
fn build_metadata_is_ignored_for_ordering() {
    assert_eq!(version("v1.0.0+a"), version("v1.0.0+b"));
    assert_eq!(version("v1.0.0+a").cmp(&version("v1.0.0")), Ordering::Equal);
}
