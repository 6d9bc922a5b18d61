//! Focused unit tests covering CLI configuration validation.

use super::helpers::{Workspace, write_utf8};
use super::*;
use crate::import::{ENV_IMPORT_DATABASE, ENV_IMPORT_PBF, ImportConfig, config_from_layers_for_test};
use crate::prune::PruneConfig;
use crate::query::{ENV_QUERY_BBOX, QueryConfig};
use log::LevelFilter;
use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(None, Some("corner.osm.pbf"), ARG_DATABASE, ENV_IMPORT_DATABASE)]
#[case(Some("cache.db"), None, ARG_PBF, ENV_IMPORT_PBF)]
fn import_without_required_fields_errors(
    #[case] database: Option<&str>,
    #[case] pbf: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = ImportArgs {
        database: database.map(Into::into),
        pbf: pbf.map(Into::into),
        bbox: None,
    };
    let err = ImportConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn import_parses_the_region() {
    let args = ImportArgs {
        database: Some("cache.db".into()),
        pbf: Some("corner.osm.pbf".into()),
        bbox: Some(" -1.5, -2, 1.5 ,2".to_owned()),
    };
    let config = ImportConfig::try_from(args).expect("config should build");
    let bbox = config.bbox.expect("region parsed");
    assert_eq!(
        (bbox.min_lat(), bbox.min_lon(), bbox.max_lat(), bbox.max_lon()),
        (-1.5, -2.0, 1.5, 2.0)
    );
}

#[rstest]
#[case("1,2,3")]
#[case("north,0,1,1")]
#[case("2,0,1,1")]
fn query_rejects_malformed_regions(#[case] raw: &str) {
    let args = QueryArgs {
        database: Some("cache.db".into()),
        bbox: Some(raw.to_owned()),
    };
    let err = QueryConfig::try_from(args).expect_err("region should be rejected");
    match err {
        CliError::InvalidBoundingBox { field, value, .. } => {
            assert_eq!(field, ARG_BBOX);
            assert_eq!(value, raw);
        }
        other => panic!("expected InvalidBoundingBox, found {other:?}"),
    }
}

#[rstest]
fn query_requires_a_region() {
    let args = QueryArgs {
        database: Some("cache.db".into()),
        bbox: None,
    };
    match QueryConfig::try_from(args) {
        Err(CliError::MissingArgument { field, env }) => {
            assert_eq!(field, ARG_BBOX);
            assert_eq!(env, ENV_QUERY_BBOX);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(0, 1_000_000, 1_000_000)]
#[case(1, 100_000_000, 13_600_000)]
#[case(u32::MAX, 0, 0_i64.saturating_sub(i64::from(u32::MAX) * 86_400_000))]
fn prune_cutoff_counts_whole_days(#[case] days: u32, #[case] now: i64, #[case] expected: i64) {
    let config = PruneConfig {
        database: "cache.db".into(),
        older_than_days: days,
    };
    assert_eq!(config.cutoff_millis(now), expected);
}

#[rstest]
#[case(None, None, LevelFilter::Info)]
#[case(Some("debug"), Some("error"), LevelFilter::Debug)]
#[case(None, Some("WARN"), LevelFilter::Warn)]
#[case(Some("  "), Some("trace"), LevelFilter::Trace)]
#[case(Some("off"), None, LevelFilter::Off)]
fn log_level_prefers_flag_then_environment(
    #[case] flag: Option<&str>,
    #[case] env: Option<&str>,
    #[case] expected: LevelFilter,
) {
    let level = resolve_log_level(flag, env).expect("level should resolve");
    assert_eq!(level, expected);
}

#[rstest]
fn unknown_log_level_is_reported() {
    match resolve_log_level(Some("chatty"), None) {
        Err(CliError::InvalidLogLevel { value }) => assert_eq!(value, "chatty"),
        other => panic!("expected InvalidLogLevel, found {other:?}"),
    }
}

#[rstest]
fn import_sources_must_be_files() {
    let workspace = Workspace::new();
    let config = ImportConfig {
        database: workspace.database(),
        pbf: workspace.path("missing.osm.pbf"),
        bbox: None,
    };
    match config.validate_sources() {
        Err(CliError::MissingSourceFile { field, path }) => {
            assert_eq!(field, ARG_PBF);
            assert_eq!(path, workspace.path("missing.osm.pbf"));
        }
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }

    write_utf8(&workspace.path("folder/placeholder"), b"");
    let config = ImportConfig {
        pbf: workspace.path("folder"),
        ..config
    };
    match config.validate_sources() {
        Err(CliError::SourcePathNotFile { field, .. }) => assert_eq!(field, ARG_PBF),
        other => panic!("expected SourcePathNotFile, found {other:?}"),
    }
}

#[rstest]
fn invalid_config_layer_maps_to_configuration_error() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "database": 42 }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honour_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "database": "from-file.db",
            "pbf": "from-file.osm.pbf",
            "bbox": "0,0,1,1",
        }),
        None,
    );
    composer.push_environment(json!({
        "pbf": "from-env.osm.pbf",
        "bbox": "0,0,2,2",
    }));
    composer.push_cli(json!({ "bbox": "0,0,3,3" }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.database, "from-file.db");
    assert_eq!(config.pbf, "from-env.osm.pbf");
    let bbox = config.bbox.expect("region from the CLI layer");
    assert_eq!((bbox.max_lat(), bbox.max_lon()), (3.0, 3.0));
}

#[rstest]
fn log_level_flag_is_global() {
    let cli = Cli::try_parse_from([
        "mapcache",
        "check",
        "--database",
        "cache.db",
        "--log-level",
        "debug",
    ])
    .expect("arguments should parse");
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(matches!(cli.command, Command::Check(_)));
}
