//! End-to-end command runs against a temporary SQLite database.

use super::helpers::{CORNER_REGION, FixedClock, Workspace, output_lines};
use super::*;
use crate::prune::run_prune_with;
use mapcache_core::{
    BoundingBox, ElementKey, ElementStore, MapDataError, SqliteElementStore, SystemClock,
};
use rstest::{fixture, rstest};

#[fixture]
fn imported() -> Workspace {
    let workspace = Workspace::new();
    let pbf = workspace.corner_pbf();
    let mut stdout = Vec::new();
    invoke(
        &[
            "import",
            "--database",
            workspace.database().as_str(),
            "--pbf",
            pbf.as_str(),
        ],
        &mut stdout,
    )
    .expect("import should succeed");
    let lines = output_lines(&stdout);
    let expected = format!(
        "imported 5 nodes, 3 ways and 3 relations into {} for ",
        workspace.database()
    );
    assert!(
        lines.len() == 1 && lines.iter().all(|line| line.starts_with(&expected)),
        "unexpected import output {lines:?}"
    );
    workspace
}

fn invoke(args: &[&str], writer: &mut Vec<u8>) -> Result<(), CliError> {
    let argv = std::iter::once("mapcache").chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv)?;
    run_command(cli.command, writer)
}

#[rstest]
fn query_counts_elements_in_the_region(imported: Workspace) {
    let mut stdout = Vec::new();
    invoke(
        &[
            "query",
            "--database",
            imported.database().as_str(),
            "--bbox",
            CORNER_REGION,
        ],
        &mut stdout,
    )
    .expect("query should succeed");

    assert_eq!(
        output_lines(&stdout),
        ["nodes: 3", "ways: 2", "relations: 1"]
    );
}

#[rstest]
fn importing_a_region_replaces_only_that_region(imported: Workspace) {
    let pbf = imported.corner_pbf();
    let mut stdout = Vec::new();
    invoke(
        &[
            "import",
            "--database",
            imported.database().as_str(),
            "--pbf",
            pbf.as_str(),
            "--bbox",
            CORNER_REGION,
        ],
        &mut stdout,
    )
    .expect("regional import should succeed");

    let controller =
        store::open_controller(&imported.database(), SystemClock).expect("reopen database");
    let whole = BoundingBox::new(50.0, 10.0, 55.0, 15.0).expect("valid box");
    let data = controller
        .get_map_data_with_geometry(&whole)
        .expect("query whole area");
    let nodes: Vec<_> = data.nodes().map(|node| node.id).collect();
    assert_eq!(nodes, [1, 2, 3, 4, 5]);
    controller.check_integrity().expect("consistent database");
}

#[rstest]
fn prune_removes_everything_written_before_the_cutoff(imported: Workspace) {
    let args = |days: &str| {
        let cli = Cli::try_parse_from([
            "mapcache",
            "prune",
            "--database",
            imported.database().as_str(),
            "--older-than-days",
            days,
        ])
        .expect("arguments should parse");
        match cli.command {
            Command::Prune(args) => args,
            other => panic!("expected prune command, found {other:?}"),
        }
    };

    let mut stdout = Vec::new();
    run_prune_with(args("1"), SystemClock, &mut stdout).expect("recent data is kept");
    run_prune_with(args("1"), FixedClock(i64::MAX), &mut stdout).expect("old data is pruned");

    assert_eq!(
        output_lines(&stdout),
        ["removed 0 elements", "removed 11 elements"]
    );
}

#[rstest]
fn check_reports_a_consistent_database(imported: Workspace) {
    let mut stdout = Vec::new();
    invoke(
        &["check", "--database", imported.database().as_str()],
        &mut stdout,
    )
    .expect("check should succeed");
    assert_eq!(
        output_lines(&stdout),
        [format!(
            "{}: every geometry has its element",
            imported.database()
        )]
    );
}

#[rstest]
fn check_reports_orphan_geometry(imported: Workspace) {
    remove_element_row(&imported, ElementKey::node(1));

    let mut stdout = Vec::new();
    let err = invoke(
        &["check", "--database", imported.database().as_str()],
        &mut stdout,
    )
    .expect_err("orphans should be reported");
    match err {
        CliError::MapData(MapDataError::OrphanGeometry { keys }) => assert!(!keys.is_empty()),
        other => panic!("expected OrphanGeometry, found {other:?}"),
    }
    assert!(stdout.is_empty());
}

/// Delete an element row without touching its geometry.
fn remove_element_row(workspace: &Workspace, key: ElementKey) {
    let mut elements =
        SqliteElementStore::open(workspace.database(), SystemClock).expect("open element store");
    let removed = elements.delete_all(&[key]).expect("delete element row");
    assert_eq!(removed, 1);
}

#[rstest]
#[case::query(&["query", "--bbox", CORNER_REGION])]
#[case::check(&["check"])]
fn commands_require_an_existing_database(#[case] args: &[&str]) {
    let workspace = Workspace::new();
    let mut argv = args.to_vec();
    let database = workspace.database();
    argv.extend(["--database", database.as_str()]);

    let mut stdout = Vec::new();
    match invoke(&argv, &mut stdout) {
        Err(CliError::MissingSourceFile { field, path }) => {
            assert_eq!(field, ARG_DATABASE);
            assert_eq!(path, database);
        }
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
    assert!(!database.exists(), "database must not be created");
}

#[rstest]
fn import_reports_decode_failures() {
    let workspace = Workspace::new();
    let pbf = workspace.path("broken.osm.pbf");
    helpers::write_utf8(&pbf, b"not a protobuf blob");

    let mut stdout = Vec::new();
    let err = invoke(
        &[
            "import",
            "--database",
            workspace.database().as_str(),
            "--pbf",
            pbf.as_str(),
        ],
        &mut stdout,
    )
    .expect_err("decode should fail");
    assert!(
        matches!(err, CliError::ReadOsm(_)),
        "expected ReadOsm, found {err:?}"
    );
    assert!(
        err.to_string().starts_with("failed to read OSM data"),
        "unexpected message: {err}"
    );
}
