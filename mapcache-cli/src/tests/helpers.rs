//! Test helpers for preparing datasets and databases on disk.

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use mapcache_core::Clock;
use std::fs;
use tempfile::TempDir;

/// Region around the first three nodes of the corner dataset.
pub(super) const CORNER_REGION: &str = "52.49,13.39,52.52,13.42";

/// Temporary directory exposed as a UTF-8 path.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.path("cache/mapcache.db")
    }

    /// Decode the shared corner dataset (5 nodes, 3 ways, 3 relations).
    pub(super) fn corner_pbf(&self) -> Utf8PathBuf {
        let source = Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../mapcache-data/tests/fixtures/corner.osm.pbf.b64");
        let encoded: String = fs::read_to_string(&source)
            .unwrap_or_else(|err| panic!("failed to read fixture {source}: {err}"))
            .split_ascii_whitespace()
            .collect();
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .unwrap_or_else(|err| panic!("fixture {source} is not Base64: {err}"));
        let target = self.path("corner.osm.pbf");
        write_utf8(&target, &bytes);
        target
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("root", &self.root).finish()
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write file");
}

/// Clock frozen at a given epoch millisecond.
#[derive(Debug, Clone, Copy)]
pub(super) struct FixedClock(pub(super) i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

pub(super) fn output_lines(buffer: &[u8]) -> Vec<String> {
    String::from_utf8(buffer.to_vec())
        .expect("utf-8 output")
        .lines()
        .map(str::to_owned)
        .collect()
}
