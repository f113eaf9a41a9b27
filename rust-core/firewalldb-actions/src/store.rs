// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The action store contract.
//
// Defines the `ActionsDb` trait that every backend implements, plus the pure
// validation rules that run before any backend touches storage. Producers
// (the interception layer) call `add_action` / `set_action_state`; consumers
// (the transport layer) call the listing methods.

use async_trait::async_trait;

use crate::action::{Action, ActionLocator, ActionState, SessionId};
use crate::error::{ActionStoreError, ActionStoreResult};
use crate::filter::ActionFilter;
use crate::query::{ActionsPage, ListActionsFilterFn, ListActionsQuery};

/// A persistent, indexed log of firewall actions.
///
/// Every mutating call is a single atomic unit: it either fully persists
/// before returning `Ok` or leaves the store as it was. Readers observe
/// consistent snapshots.
///
/// Implementations must be safe to share across threads and tokio tasks.
#[async_trait]
pub trait ActionsDb: Send + Sync {
    /// Record a new action for `session_id`, returning its session-scoped id.
    ///
    /// The store assigns `action_id` and `global_id`; the action must arrive
    /// with both unset.
    async fn add_action(&self, session_id: SessionId, action: Action) -> ActionStoreResult<u64>;

    /// Move an existing action to `state`, recording `reason`.
    ///
    /// `reason` must be empty unless `state` is [`ActionState::Error`]; this is
    /// checked before the action is looked up.
    async fn set_action_state(
        &self,
        locator: ActionLocator,
        state: ActionState,
        reason: &str,
    ) -> ActionStoreResult<()>;

    /// Fetch the current record for `locator`.
    async fn get_action(&self, locator: ActionLocator) -> ActionStoreResult<Action>;

    /// Page through one session's actions in session order.
    ///
    /// `last_index` and `index_offset` are session-scoped action ids.
    async fn list_session_actions(
        &self,
        session_id: SessionId,
        filter: Option<ListActionsFilterFn>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage>;

    /// Page through all actions in global creation order, optionally
    /// restricted to one session.
    ///
    /// `last_index` and `index_offset` are global ids.
    async fn list_global(
        &self,
        session_id: Option<SessionId>,
        filter: Option<ListActionsFilterFn>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage>;

    /// Page through all actions (or one session's) in global order.
    async fn list_actions(
        &self,
        session_id: Option<SessionId>,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage> {
        self.list_global(session_id, None, query).await
    }

    /// Page through actions in global order that satisfy `filter`.
    async fn list_actions_matching(
        &self,
        filter: &ActionFilter,
        query: Option<ListActionsQuery>,
    ) -> ActionStoreResult<ActionsPage> {
        self.list_global(filter.session_id, filter.to_filter_fn(), query)
            .await
    }

    /// A human-readable name for this backend, used in logging.
    fn name(&self) -> &str;
}

/// Reject a non-empty error reason for any state other than `Error`.
///
/// Pure: independent of the action's current state.
pub fn check_state_transition(state: ActionState, reason: &str) -> ActionStoreResult<()> {
    if !reason.is_empty() && state != ActionState::Error {
        return Err(ActionStoreError::InvalidStateTransition {
            state,
            reason: reason.to_string(),
        });
    }
    Ok(())
}

/// Validate an action handed to `add_action` for `session_id`.
pub fn check_new_action(session_id: SessionId, action: &Action) -> ActionStoreResult<()> {
    if action.action_id != 0 || action.global_id != 0 {
        return Err(ActionStoreError::InvalidArgument(format!(
            "action already carries ids (action_id={}, global_id={})",
            action.action_id, action.global_id
        )));
    }
    if action.session_id != session_id {
        return Err(ActionStoreError::InvalidArgument(format!(
            "action belongs to session {} but was added to session {}",
            action.session_id, session_id
        )));
    }
    check_state_transition(action.state, &action.error_reason)
}
