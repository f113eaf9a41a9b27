// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Declarative action filters.
//!
//! `ActionFilter` carries the criteria a listing request can name (session,
//! feature, actor, RPC method, state and an attempt-time window) and compiles
//! them into a [`ListActionsFilterFn`].
//!
//! The time window ends a scan early: the global ordering is creation order,
//! so once a candidate was attempted after `end_time` while walking forward
//! (or before `start_time` while walking backward) no later candidate can
//! fall inside the window. This assumes producers stamp `attempted_at` in
//! creation order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionState, SessionId};
use crate::query::{FilterVerdict, ListActionsFilterFn};

/// Criteria for listing actions. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFilter {
    pub session_id: Option<SessionId>,
    pub feature_name: Option<String>,
    pub actor_name: Option<String>,
    pub rpc_method: Option<String>,
    pub state: Option<ActionState>,
    /// Inclusive lower bound on `attempted_at`.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `attempted_at`.
    pub end_time: Option<DateTime<Utc>>,
}

impl ActionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn feature(mut self, feature_name: impl Into<String>) -> Self {
        self.feature_name = Some(feature_name.into());
        self
    }

    pub fn actor(mut self, actor_name: impl Into<String>) -> Self {
        self.actor_name = Some(actor_name.into());
        self
    }

    pub fn rpc_method(mut self, rpc_method: impl Into<String>) -> Self {
        self.rpc_method = Some(rpc_method.into());
        self
    }

    pub fn state(mut self, state: ActionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn attempted_between(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// True when the filter names no criteria at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Decide on one candidate, walking in the given direction.
    pub fn verdict(&self, action: &Action, reversed: bool) -> FilterVerdict {
        if self.end_time.is_some_and(|end| action.attempted_at > end) {
            return if reversed {
                FilterVerdict::reject()
            } else {
                FilterVerdict::stop()
            };
        }
        if self.start_time.is_some_and(|start| action.attempted_at < start) {
            return if reversed {
                FilterVerdict::stop()
            } else {
                FilterVerdict::reject()
            };
        }

        let matches = self.session_id.map_or(true, |s| s == action.session_id)
            && matches_str(&self.feature_name, &action.feature_name)
            && matches_str(&self.actor_name, &action.actor_name)
            && matches_str(&self.rpc_method, &action.rpc_method)
            && self.state.map_or(true, |s| s == action.state);

        FilterVerdict::new(matches, true)
    }

    /// Compile into a filter function, or `None` if nothing is filtered.
    pub fn to_filter_fn(&self) -> Option<ListActionsFilterFn> {
        if self.is_empty() {
            return None;
        }
        let filter = self.clone();
        Some(Arc::new(move |action: &Action, reversed: bool| {
            filter.verdict(action, reversed)
        }))
    }
}

fn matches_str(want: &Option<String>, have: &str) -> bool {
    want.as_deref().map_or(true, |want| want == have)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn action_at(secs: i64) -> Action {
        let mut action = Action::new(SessionId::new([1, 1, 1, 1]), "SendToRoute");
        action.actor_name = "Autopilot".to_string();
        action.feature_name = "rebalancer".to_string();
        action.attempted_at = Utc.timestamp_opt(secs, 0).unwrap();
        action
    }

    #[test]
    fn test_empty_filter_compiles_to_none() {
        assert!(ActionFilter::new().is_empty());
        assert!(ActionFilter::new().to_filter_fn().is_none());
        assert!(ActionFilter::new().actor("x").to_filter_fn().is_some());
    }

    #[test]
    fn test_field_criteria() {
        let action = action_at(100);
        let filter = ActionFilter::new()
            .actor("Autopilot")
            .feature("rebalancer")
            .rpc_method("SendToRoute")
            .state(ActionState::Init);
        assert_eq!(filter.verdict(&action, false), FilterVerdict::accept());

        let wrong_feature = filter.clone().feature("auto-fees");
        assert_eq!(wrong_feature.verdict(&action, false), FilterVerdict::reject());

        let wrong_session = filter.session(SessionId::new([2, 2, 2, 2]));
        assert!(!wrong_session.verdict(&action, false).matches);
    }

    #[test]
    fn test_time_window_stops_in_walking_direction() {
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let end = Utc.timestamp_opt(200, 0).unwrap();
        let filter = ActionFilter::new().attempted_between(Some(start), Some(end));

        // Inside the window, bounds inclusive.
        assert_eq!(filter.verdict(&action_at(100), false), FilterVerdict::accept());
        assert_eq!(filter.verdict(&action_at(200), true), FilterVerdict::accept());

        // Past the end: stop going forward, keep looking going backward.
        assert_eq!(filter.verdict(&action_at(201), false), FilterVerdict::stop());
        assert_eq!(filter.verdict(&action_at(201), true), FilterVerdict::reject());

        // Before the start: the mirror image.
        assert_eq!(filter.verdict(&action_at(99), false), FilterVerdict::reject());
        assert_eq!(filter.verdict(&action_at(99), true), FilterVerdict::stop());
    }

    #[test]
    fn test_compiled_filter_matches_verdict() {
        let filter = ActionFilter::new().state(ActionState::Done);
        let compiled = filter.to_filter_fn().unwrap();
        let mut action = action_at(5);
        assert!(!compiled(&action, false).matches);
        action.state = ActionState::Done;
        assert!(compiled(&action, false).matches);
    }
}
