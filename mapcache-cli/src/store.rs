//! Opening the SQLite-backed controller.

use camino::Utf8Path;
use mapcache_core::{
    Clock, MapDataController, SqliteElementStore, SqliteGeometryStore, StoreError,
};

use crate::CliError;

/// Controller over one SQLite database holding both stores.
pub(crate) type SqliteController = MapDataController<SqliteElementStore, SqliteGeometryStore>;

/// Open (or create) the database at `path`, stamping writes with `clock`.
pub(crate) fn open_controller(
    path: &Utf8Path,
    clock: impl Clock + 'static,
) -> Result<SqliteController, CliError> {
    let open_error = |source: StoreError| CliError::OpenDatabase {
        path: path.to_path_buf(),
        source,
    };
    let elements = SqliteElementStore::open(path, clock).map_err(open_error)?;
    let geometries = SqliteGeometryStore::open(path).map_err(open_error)?;
    Ok(MapDataController::new(elements, geometries))
}
