// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Index manager: identifier allocation and the two action orderings.
//
// Every action lives in two orderings:
//
// - the per-session ordering, keyed by `(session, action_id)`, which holds the
//   record itself, and
// - the global ordering, keyed by `global_id`, which holds a back-pointer to
//   the record's `(session, action_id)` key.
//
// Both counters start at 0 and are bumped by exactly one per added action, so
// ids are dense and gap-free. Allocation and the record write always happen in
// the same unit of work (one redb write transaction, or one write-lock guard
// for the in-memory index).
//
// redb layout:
//
// ```text
// action_counters   &str        -> u64            "global" -> last global id
// session_counters  u32         -> u64            session  -> last action id
// session_actions   (u32, u64)  -> &[u8]          record bytes (see codec)
// global_actions    u64         -> (u32, u64)     global id -> session key
// ```
//
// Session ids are stored as their big-endian integer value so that tuple keys
// sort by session first and by action id second.

use std::collections::{BTreeMap, HashMap};

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use tracing::debug;

use crate::action::{Action, ActionLocator, SessionId};
use crate::error::{ActionStoreError, ActionStoreResult};

/// Counter table; holds the global counter under [`GLOBAL_COUNTER_KEY`].
pub(crate) const ACTION_COUNTERS: TableDefinition<&str, u64> =
    TableDefinition::new("action_counters");

/// Last allocated action id per session.
pub(crate) const SESSION_COUNTERS: TableDefinition<u32, u64> =
    TableDefinition::new("session_counters");

/// Encoded action records in per-session order.
pub(crate) const SESSION_ACTIONS: TableDefinition<(u32, u64), &[u8]> =
    TableDefinition::new("session_actions");

/// Global creation order, pointing back into `SESSION_ACTIONS`.
pub(crate) const GLOBAL_ACTIONS: TableDefinition<u64, (u32, u64)> =
    TableDefinition::new("global_actions");

pub(crate) const GLOBAL_COUNTER_KEY: &str = "global";

/// The pair of identifiers handed out for one new action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionIds {
    /// Session-scoped id.
    pub action_id: u64,
    /// Store-wide id.
    pub global_id: u64,
}

impl ActionIds {
    /// The ids following the given last-allocated counter values.
    fn next(last_action_id: u64, last_global_id: u64) -> ActionStoreResult<Self> {
        let exhausted = || ActionStoreError::Storage("action id space exhausted".to_string());
        Ok(Self {
            action_id: last_action_id.checked_add(1).ok_or_else(exhausted)?,
            global_id: last_global_id.checked_add(1).ok_or_else(exhausted)?,
        })
    }
}

// ---------------------------------------------------------------------------
// redb index
// ---------------------------------------------------------------------------

/// Create every index table so read transactions never miss one.
pub(crate) fn create_tables(db: &Database) -> ActionStoreResult<()> {
    let txn = db
        .begin_write()
        .map_err(ActionStoreError::storage("begin write"))?;
    txn.open_table(ACTION_COUNTERS)
        .map_err(ActionStoreError::storage("create action counters"))?;
    txn.open_table(SESSION_COUNTERS)
        .map_err(ActionStoreError::storage("create session counters"))?;
    txn.open_table(SESSION_ACTIONS)
        .map_err(ActionStoreError::storage("create session actions"))?;
    txn.open_table(GLOBAL_ACTIONS)
        .map_err(ActionStoreError::storage("create global actions"))?;
    txn.commit()
        .map_err(ActionStoreError::storage("commit table creation"))?;
    Ok(())
}

/// Bump the session and global counters inside `txn`.
pub(crate) fn allocate(txn: &WriteTransaction, session_id: SessionId) -> ActionStoreResult<ActionIds> {
    let mut counters = txn
        .open_table(ACTION_COUNTERS)
        .map_err(ActionStoreError::storage("open action counters"))?;
    let mut session_counters = txn
        .open_table(SESSION_COUNTERS)
        .map_err(ActionStoreError::storage("open session counters"))?;

    let last_global = counters
        .get(GLOBAL_COUNTER_KEY)
        .map_err(ActionStoreError::storage("read global counter"))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let last_action = session_counters
        .get(session_id.index_key())
        .map_err(ActionStoreError::storage("read session counter"))?
        .map(|guard| guard.value())
        .unwrap_or(0);

    let ids = ActionIds::next(last_action, last_global)?;

    counters
        .insert(GLOBAL_COUNTER_KEY, ids.global_id)
        .map_err(ActionStoreError::storage("write global counter"))?;
    session_counters
        .insert(session_id.index_key(), ids.action_id)
        .map_err(ActionStoreError::storage("write session counter"))?;

    debug!(session = %session_id, action_id = ids.action_id, global_id = ids.global_id, "allocated action ids");
    Ok(ids)
}

/// Write a freshly stamped record into both orderings inside `txn`.
pub(crate) fn insert(txn: &WriteTransaction, action: &Action, record: &[u8]) -> ActionStoreResult<()> {
    let key = action.locator().index_key();

    let mut session_actions = txn
        .open_table(SESSION_ACTIONS)
        .map_err(ActionStoreError::storage("open session actions"))?;
    session_actions
        .insert(key, record)
        .map_err(ActionStoreError::storage("write action record"))?;

    let mut global_actions = txn
        .open_table(GLOBAL_ACTIONS)
        .map_err(ActionStoreError::storage("open global actions"))?;
    global_actions
        .insert(action.global_id, key)
        .map_err(ActionStoreError::storage("write global index"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory index
// ---------------------------------------------------------------------------

/// The in-memory counterpart of the redb tables.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    last_global_id: u64,
    session_counters: HashMap<SessionId, u64>,
    pub(crate) global: BTreeMap<u64, ActionLocator>,
    pub(crate) sessions: HashMap<SessionId, BTreeMap<u64, Action>>,
}

impl MemoryIndex {
    /// Bump the session and global counters.
    pub fn allocate(&mut self, session_id: SessionId) -> ActionStoreResult<ActionIds> {
        let last_action = self.session_counters.get(&session_id).copied().unwrap_or(0);
        let ids = ActionIds::next(last_action, self.last_global_id)?;
        self.last_global_id = ids.global_id;
        self.session_counters.insert(session_id, ids.action_id);
        Ok(ids)
    }

    /// Write a freshly stamped action into both orderings.
    pub fn insert(&mut self, action: Action) {
        let locator = action.locator();
        self.global.insert(action.global_id, locator);
        self.sessions
            .entry(locator.session_id)
            .or_default()
            .insert(locator.action_id, action);
    }

    pub fn get(&self, locator: &ActionLocator) -> Option<&Action> {
        self.sessions.get(&locator.session_id)?.get(&locator.action_id)
    }

    pub fn get_mut(&mut self, locator: &ActionLocator) -> Option<&mut Action> {
        self.sessions
            .get_mut(&locator.session_id)?
            .get_mut(&locator.action_id)
    }

    /// Number of actions in the global ordering.
    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }
}
