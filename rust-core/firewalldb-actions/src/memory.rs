// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory action store.
//
// Holds the whole `MemoryIndex` behind a single tokio `RwLock`: writers take
// the write lock for the full allocate-then-insert (or read-modify-write)
// sequence, readers take the read lock for the full page walk. Intended for
// testing, development and ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::action::{Action, ActionLocator, ActionState, SessionId};
use crate::error::{ActionStoreError, ActionStoreResult};
use crate::index::MemoryIndex;
use crate::query::{
    paginate, walk_bounds, ActionOrdering, ActionsPage, ListActionsFilterFn, ListActionsQuery,
    OrderedEntry,
};
use crate::store::{check_new_action, check_state_transition, ActionsDb};

/// An action store that lives entirely in process memory.
///
/// All data is lost on drop. Clones share the same underlying index.
///
/// # Example
///
/// ```rust
/// use firewalldb_actions::{Action, ActionsDb, InMemoryActionsDb, SessionId};
///
/// # tokio_test::block_on(async {
/// let db = InMemoryActionsDb::new();
/// let session = SessionId::new([1, 1, 1, 1]);
/// let id = db.add_action(session, Action::new(session, "UpdateChanPolicy")).await.unwrap();
/// assert_eq!(id, 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryActionsDb {
    index: Arc<RwLock<MemoryIndex>>,
}

impl InMemoryActionsDb {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of actions stored.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Return true if no action has been added.
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }
}

/// One session's actions in action id order.
struct SessionOrdering<'a> {
    actions: Option<&'a BTreeMap<u64, Action>>,
}

impl ActionOrdering for SessionOrdering<'_> {
    fn walk(
        &self,
        offset: u64,
        reversed: bool,
    ) -> ActionStoreResult<Box<dyn Iterator<Item = OrderedEntry> + '_>> {
        let Some(actions) = self.actions else {
            return Ok(Box::new(std::iter::empty()));
        };
        let range = actions.range(walk_bounds(offset, reversed));
        let to_entry = |(id, action): (&u64, &Action)| -> OrderedEntry { Ok((*id, action.clone())) };
        if reversed {
            Ok(Box::new(range.rev().map(to_entry)))
        } else {
            Ok(Box::new(range.map(to_entry)))
        }
    }
}

/// All actions in global id order, optionally restricted to one session.
struct GlobalOrdering<'a> {
    index: &'a MemoryIndex,
    session_id: Option<SessionId>,
}

impl GlobalOrdering<'_> {
    fn resolve(&self, global_id: u64, locator: &ActionLocator) -> Option<OrderedEntry> {
        if self.session_id.is_some_and(|s| s != locator.session_id) {
            return None;
        }
        Some(match self.index.get(locator) {
            Some(action) => Ok((global_id, action.clone())),
            None => Err(ActionStoreError::Storage(format!(
                "global index {global_id} points at missing action {locator}"
            ))),
        })
    }
}

impl ActionOrdering for GlobalOrdering<'_> {
    fn walk(
        &self,
        offset: u64,
        reversed: bool,
    ) -> ActionStoreResult<Box<dyn Iterator<Item = OrderedEntry> + '_>> {
        let range = self.index.global.range(walk_bounds(offset, reversed));
        let resolve = move |(global_id, locator): (&u64, &ActionLocator)| self.resolve(*global_id, locator);
        if reversed {
            Ok(Box::new(range.rev().filter_map(resolve)))
        } else {
            Ok(Box::new(range.filter_map(resolve)))
        }
    }
}

#[async_trait]
impl ActionsDb for InMemoryActionsDb {
    #[instrument(skip(self, action), fields(backend = "in-memory"))]
    async fn add_action(&self, session_id: SessionId, mut action: Action) -> ActionStoreResult<u64> {
        check_new_action(session_id, &action)?;

        let mut index = self.index.write().await;
        let ids = index.allocate(session_id)?;
        action.action_id = ids.action_id;
        action.global_id = ids.global_id;
        index.insert(action);

        debug!(action_id = ids.action_id, global_id = ids.global_id, "added action");
        Ok(ids.action_id)
    }

    #[instrument(skip(self), fields(backend = "in-memory"))]
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

        let mut index = self.index.write().await;
        let action = index
            .get_mut(&locator)
            .ok_or(ActionStoreError::NotFound(locator))?;
        action.state = state;
        action.error_reason = reason.to_string();

        debug!("updated action state");
        Ok(())
    }

    async fn get_action(&self, locator: ActionLocator) -> ActionStoreResult<Action> {
        self.index
            .read()
            .await
            .get(&locator)
            .cloned()
            .ok_or(ActionStoreError::NotFound(locator))
    }

    #[instrument(skip(self, filter), fields(backend = "in-memory"))]
    async fn list_session_actions(
        &self,
        session_id: SessionId,
        filter: Option<ListActionsFilterFn>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage> {
        let index = self.index.read().await;
        let ordering = SessionOrdering {
            actions: index.sessions.get(&session_id),
        };
        let page = paginate(&ordering, filter.as_ref(), &query.unwrap_or_default())?;

        debug!(returned = page.actions.len(), last_index = page.last_index, "listed session actions");
        Ok(page)
    }

    #[instrument(skip(self, filter), fields(backend = "in-memory"))]
    async fn list_global(
        &self,
        session_id: Option<SessionId>,
        filter: Option<ListActionsFilterFn>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage> {
        let index = self.index.read().await;
        let ordering = GlobalOrdering {
            index: &index,
            session_id,
        };
        let page = paginate(&ordering, filter.as_ref(), &query.unwrap_or_default())?;

        debug!(returned = page.actions.len(), last_index = page.last_index, "listed actions");
        Ok(page)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
