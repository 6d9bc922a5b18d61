//! Fixture helpers shared by the reader behaviour tests.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use base64::{Engine as _, engine::general_purpose};
use tempfile::{Builder, TempPath};

/// Tolerance for coordinates decoded from 1e-7 degree PBF units.
const COORDINATE_EPSILON: f64 = 1.0e-7;

/// Directory holding the Base64 fixture blobs.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Write the fixture `<stem>.osm.pbf.b64` from `dir` out as a binary
/// `.osm.pbf` file that lives as long as the returned path.
pub fn materialise_fixture(dir: &Path, stem: &str) -> TempPath {
    let source = dir.join(format!("{stem}.osm.pbf.b64"));
    let encoded: String = fs::read_to_string(&source)
        .unwrap_or_else(|err| panic!("failed to read fixture {source:?}: {err}"))
        .split_ascii_whitespace()
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .unwrap_or_else(|err| panic!("fixture {source:?} is not Base64: {err}"));

    let mut file = Builder::new()
        .prefix(stem)
        .suffix(".osm.pbf")
        .tempfile()
        .unwrap_or_else(|err| panic!("failed to create file for fixture {stem}: {err}"));
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .unwrap_or_else(|err| panic!("failed to write fixture {stem}: {err}"));
    file.into_temp_path()
}

/// Compare coordinates within [`COORDINATE_EPSILON`].
#[expect(
    clippy::float_arithmetic,
    reason = "test delta computation requires float maths"
)]
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}
