// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// redb-backed persistent action store.
//
// Uses redb (pure Rust, B-tree, ACID, single-file database) for durable
// storage. No C/C++ dependencies.
//
// # Design
//
// - One redb `Database` file holding the four index tables (see `index`).
// - Every operation is exactly one redb transaction run on the blocking pool.
// - `add_action` allocates ids and writes both orderings in one write
//   transaction; `set_action_state` reads, validates and rewrites the record
//   in one write transaction. redb serialises write transactions, which is
//   the single point of contention for the global counter.
// - Listing runs in one read transaction, so a page (and its count) always
//   comes from a single consistent snapshot.
// - A failed or abandoned write transaction is aborted on drop, leaving the
//   store as it was.

use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    AccessGuard, Database, ReadOnlyTable, ReadableDatabase, ReadableTable, StorageError,
};
use tracing::{debug, instrument, warn};

use crate::action::{Action, ActionLocator, ActionState, SessionId};
use crate::codec::{decode_action, encode_action};
use crate::config::ActionsDbConfig;
use crate::error::{ActionStoreError, ActionStoreResult};
use crate::index::{self, GLOBAL_ACTIONS, SESSION_ACTIONS};
use crate::query::{
    paginate, walk_bounds, ActionOrdering, ActionsPage, ListActionsFilterFn, ListActionsQuery,
    OrderedEntry,
};
use crate::store::{check_new_action, check_state_transition, ActionsDb};

type SessionActionsTable = ReadOnlyTable<(u32, u64), &'static [u8]>;
type GlobalActionsTable = ReadOnlyTable<u64, (u32, u64)>;

/// A persistent action store powered by redb.
///
/// Thread-safe: `Database` is `Send + Sync` and handles internal locking.
/// Clones share the same database handle.
///
/// # Example
///
/// ```rust,no_run
/// use firewalldb_actions::{Action, ActionsDb, RedbActionsDb, SessionId};
///
/// # tokio_test::block_on(async {
/// let db = RedbActionsDb::open_path("/tmp/firewalldb-actions.db").unwrap();
/// let session = SessionId::new([1, 1, 1, 1]);
/// let id = db.add_action(session, Action::new(session, "SendToRoute")).await.unwrap();
/// let page = db.list_actions(Some(session), None).await.unwrap();
/// assert_eq!(page.actions.last().unwrap().action_id, id);
/// # });
/// ```
#[derive(Clone)]
pub struct RedbActionsDb {
    /// The redb database handle.
    db: Arc<Database>,
    /// Path to the database file (for diagnostics).
    path: PathBuf,
}

impl RedbActionsDb {
    /// Open or create the database described by `config`.
    ///
    /// Creates the file, its parent directories and all index tables if they
    /// don't exist yet.
    pub fn open(config: &ActionsDbConfig) -> ActionStoreResult<Self> {
        let path = config.path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(ActionStoreError::storage("create database directory"))?;
        }

        let mut builder = Database::builder();
        if let Some(bytes) = config.cache_size_bytes {
            builder.set_cache_size(bytes);
        }
        let db = builder.create(&path).map_err(|e| {
            ActionStoreError::Storage(format!("failed to open redb at {}: {}", path.display(), e))
        })?;
        index::create_tables(&db)?;

        debug!(path = %path.display(), "opened action store");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Open or create a database file at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> ActionStoreResult<Self> {
        let path = path.as_ref();
        let config = ActionsDbConfig {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    ActionStoreError::InvalidArgument(format!(
                        "database path has no file name: {}",
                        path.display()
                    ))
                })?,
            ..ActionsDbConfig::default()
        };
        Self::open(&config)
    }

    /// Return the filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the database on the blocking thread pool.
    async fn run_blocking<T, F>(&self, op: F) -> ActionStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> ActionStoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(ActionStoreError::storage("task join"))?
    }
}

impl std::fmt::Debug for RedbActionsDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbActionsDb")
            .field("path", &self.path)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn add_action_txn(db: &Database, session_id: SessionId, mut action: Action) -> ActionStoreResult<u64> {
    let txn = db
        .begin_write()
        .map_err(ActionStoreError::storage("begin write"))?;

    let ids = index::allocate(&txn, session_id)?;
    action.action_id = ids.action_id;
    action.global_id = ids.global_id;
    let record = encode_action(&action)?;
    index::insert(&txn, &action, &record)?;

    txn.commit()
        .map_err(ActionStoreError::storage("commit add action"))?;

    debug!(session = %session_id, action_id = ids.action_id, global_id = ids.global_id, "added action");
    Ok(ids.action_id)
}

fn set_action_state_txn(
    db: &Database,
    locator: ActionLocator,
    state: ActionState,
    reason: String,
) -> ActionStoreResult<()> {
    let txn = db
        .begin_write()
        .map_err(ActionStoreError::storage("begin write"))?;
    {
        let mut table = txn
            .open_table(SESSION_ACTIONS)
            .map_err(ActionStoreError::storage("open session actions"))?;

        let record = table
            .get(locator.index_key())
            .map_err(ActionStoreError::storage("read action record"))?
            .map(|guard| guard.value().to_vec())
            .ok_or(ActionStoreError::NotFound(locator))?;

        let mut action = decode_action(&record)?;
        action.state = state;
        action.error_reason = reason;
        let record = encode_action(&action)?;

        table
            .insert(locator.index_key(), record.as_slice())
            .map_err(ActionStoreError::storage("write action record"))?;
    }
    txn.commit()
        .map_err(ActionStoreError::storage("commit action state"))?;

    debug!(%locator, %state, "updated action state");
    Ok(())
}

fn get_action_txn(db: &Database, locator: ActionLocator) -> ActionStoreResult<Action> {
    let txn = db
        .begin_read()
        .map_err(ActionStoreError::storage("begin read"))?;
    let table = txn
        .open_table(SESSION_ACTIONS)
        .map_err(ActionStoreError::storage("open session actions"))?;
    let guard = table
        .get(locator.index_key())
        .map_err(ActionStoreError::storage("read action record"))?
        .ok_or(ActionStoreError::NotFound(locator))?;
    Ok(decode_action(guard.value())?)
}

// ---------------------------------------------------------------------------
// Orderings
// ---------------------------------------------------------------------------

/// One session's records, read straight from the session table.
struct SessionOrdering {
    actions: SessionActionsTable,
    session_key: u32,
}

impl SessionOrdering {
    fn decode(
        entry: Result<(AccessGuard<'_, (u32, u64)>, AccessGuard<'_, &'static [u8]>), StorageError>,
    ) -> OrderedEntry {
        let (key, record) = entry.map_err(ActionStoreError::storage("scan session actions"))?;
        let (_, action_id) = key.value();
        Ok((action_id, decode_action(record.value())?))
    }
}

impl ActionOrdering for SessionOrdering {
    fn walk(
        &self,
        offset: u64,
        reversed: bool,
    ) -> ActionStoreResult<Box<dyn Iterator<Item = OrderedEntry> + '_>> {
        // Unbounded ends are clamped to this session's slice of the table.
        let session = self.session_key;
        let clamp = |bound: Bound<u64>, edge: u64| match bound {
            Bound::Unbounded => Bound::Included((session, edge)),
            bound => bound.map(|id| (session, id)),
        };
        let (start, end) = walk_bounds(offset, reversed);
        let range = (clamp(start, 0), clamp(end, u64::MAX));

        let range = self
            .actions
            .range(range)
            .map_err(ActionStoreError::storage("range session actions"))?;
        if reversed {
            Ok(Box::new(range.rev().map(Self::decode)))
        } else {
            Ok(Box::new(range.map(Self::decode)))
        }
    }
}

/// The global index, dereferenced into the session table.
struct GlobalOrdering {
    global: GlobalActionsTable,
    actions: SessionActionsTable,
    session_key: Option<u32>,
}

impl GlobalOrdering {
    fn resolve(
        &self,
        entry: Result<(AccessGuard<'_, u64>, AccessGuard<'_, (u32, u64)>), StorageError>,
    ) -> Option<OrderedEntry> {
        let (global_id, key) = match entry {
            Ok((global_id, key)) => (global_id.value(), key.value()),
            Err(e) => return Some(Err(ActionStoreError::storage("scan global actions")(e))),
        };
        if self.session_key.is_some_and(|session| session != key.0) {
            return None;
        }
        Some(self.load(global_id, key))
    }

    fn load(&self, global_id: u64, key: (u32, u64)) -> OrderedEntry {
        let guard = self
            .actions
            .get(key)
            .map_err(ActionStoreError::storage("read action record"))?
            .ok_or_else(|| {
                ActionStoreError::Storage(format!(
                    "global index {global_id} points at missing action {}",
                    ActionLocator::from_index_key(key)
                ))
            })?;
        Ok((global_id, decode_action(guard.value())?))
    }
}

impl ActionOrdering for GlobalOrdering {
    fn walk(
        &self,
        offset: u64,
        reversed: bool,
    ) -> ActionStoreResult<Box<dyn Iterator<Item = OrderedEntry> + '_>> {
        let range = self
            .global
            .range(walk_bounds(offset, reversed))
            .map_err(ActionStoreError::storage("range global actions"))?;
        if reversed {
            Ok(Box::new(range.rev().filter_map(move |entry| self.resolve(entry))))
        } else {
            Ok(Box::new(range.filter_map(move |entry| self.resolve(entry))))
        }
    }
}

fn list_session_txn(
    db: &Database,
    session_id: SessionId,
    filter: Option<ListActionsFilterFn>,
    query: ListActionsQuery,
) -> ActionStoreResult<ActionsPage> {
    let txn = db
        .begin_read()
        .map_err(ActionStoreError::storage("begin read"))?;
    let ordering = SessionOrdering {
        actions: txn
            .open_table(SESSION_ACTIONS)
            .map_err(ActionStoreError::storage("open session actions"))?,
        session_key: session_id.index_key(),
    };
    paginate(&ordering, filter.as_ref(), &query)
}

fn list_global_txn(
    db: &Database,
    session_id: Option<SessionId>,
    filter: Option<ListActionsFilterFn>,
    query: ListActionsQuery,
) -> ActionStoreResult<ActionsPage> {
    let txn = db
        .begin_read()
        .map_err(ActionStoreError::storage("begin read"))?;
    let ordering = GlobalOrdering {
        global: txn
            .open_table(GLOBAL_ACTIONS)
            .map_err(ActionStoreError::storage("open global actions"))?,
        actions: txn
            .open_table(SESSION_ACTIONS)
            .map_err(ActionStoreError::storage("open session actions"))?,
        session_key: session_id.map(SessionId::index_key),
    };
    paginate(&ordering, filter.as_ref(), &query)
}

#[async_trait]
impl ActionsDb for RedbActionsDb {
    #[instrument(skip(self, action), fields(backend = "redb"))]
    async fn add_action(&self, session_id: SessionId, action: Action) -> ActionStoreResult<u64> {
        check_new_action(session_id, &action)?;
        self.run_blocking(move |db| add_action_txn(db, session_id, action))
            .await
    }

    #[instrument(skip(self), fields(backend = "redb"))]
    async fn set_action_state(
        &self,
        locator: ActionLocator,
        state: ActionState,
        reason: &str,
    ) -> ActionStoreResult<()> {
        if let Err(err) = check_state_transition(state, reason) {
            warn!(error = %err, "rejected action state change");
            return Err(err);
        }
        let reason = reason.to_string();
        self.run_blocking(move |db| set_action_state_txn(db, locator, state, reason))
            .await
    }

    async fn get_action(&self, locator: ActionLocator) -> ActionStoreResult<Action> {
        self.run_blocking(move |db| get_action_txn(db, locator)).await
    }

    #[instrument(skip(self, filter), fields(backend = "redb"))]
    async fn list_session_actions(
        &self,
        session_id: SessionId,
        filter: Option<ListActionsFilterFn>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage> {
        let query = query.unwrap_or_default();
        let page = self
            .run_blocking(move |db| list_session_txn(db, session_id, filter, query))
            .await?;

        debug!(returned = page.actions.len(), last_index = page.last_index, "listed session actions");
        Ok(page)
    }

    #[instrument(skip(self, filter), fields(backend = "redb"))]
    async fn list_global(
        &self,
        session_id: Option<SessionId>,
        filter: Option<ListActionsFilterFn>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage> {
        let query = query.unwrap_or_default();
        let page = self
            .run_blocking(move |db| list_global_txn(db, session_id, filter, query))
            .await?;

        debug!(returned = page.actions.len(), last_index = page.last_index, "listed actions");
        Ok(page)
    }

    fn name(&self) -> &str {
        "redb"
    }
}
