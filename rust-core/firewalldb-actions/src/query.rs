// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Query/pagination engine shared by every action store backend.
//
// A backend exposes each of its orderings (per-session or global) through the
// `ActionOrdering` trait; `paginate` then applies the caller's filter, page
// size, direction and cursor identically on top of any of them.
//
// Cursor semantics: `index_offset` is exclusive. Walking forward starts at the
// first index strictly greater than the offset; walking backward starts at the
// first index strictly smaller, with an offset of 0 meaning "from the end".
// The returned `last_index` is the index of the last candidate examined, so
// feeding it back as the next `index_offset` (same direction) resumes exactly
// where the previous page stopped.

use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::ActionStoreResult;

/// What a filter decided about one candidate action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterVerdict {
    /// Include the candidate in the page and the count.
    pub matches: bool,
    /// Continue the scan after this candidate.
    pub keep_going: bool,
}

impl FilterVerdict {
    pub const fn new(matches: bool, keep_going: bool) -> Self {
        Self {
            matches,
            keep_going,
        }
    }

    /// Match and continue.
    pub const fn accept() -> Self {
        Self::new(true, true)
    }

    /// Skip and continue.
    pub const fn reject() -> Self {
        Self::new(false, true)
    }

    /// Skip and end the scan.
    pub const fn stop() -> Self {
        Self::new(false, false)
    }
}

/// Caller-supplied predicate, evaluated per candidate in walking order.
///
/// The second argument is the walk direction (`true` when reversed), which
/// lets time-bounded filters tell when no later candidate can match.
pub type ListActionsFilterFn = Arc<dyn Fn(&Action, bool) -> FilterVerdict + Send + Sync>;

/// Pagination parameters. The default walks everything forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListActionsQuery {
    /// Exclusive cursor to resume from; 0 starts at the beginning (or end).
    pub index_offset: u64,
    /// Maximum number of actions to return; 0 means unbounded.
    pub max_num: u64,
    /// Walk from the highest index toward the lowest.
    pub reversed: bool,
    /// Also count every match in the whole ordering.
    pub count_all: bool,
}

impl ListActionsQuery {
    fn page_limit(&self) -> usize {
        match self.max_num {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsPage {
    /// Matching actions in walking order.
    pub actions: Vec<Action>,
    /// Index of the last examined candidate (the next cursor).
    pub last_index: u64,
    /// Total matches in the ordering when `count_all` was set, else 0.
    pub total_count: u64,
}

/// An `(index, action)` pair yielded while walking an ordering.
pub type OrderedEntry = ActionStoreResult<(u64, Action)>;

/// A totally ordered view of stored actions.
pub trait ActionOrdering {
    /// Iterate entries strictly after `offset` (or strictly before it when
    /// `reversed`, where an offset of 0 starts from the last entry).
    fn walk(
        &self,
        offset: u64,
        reversed: bool,
    ) -> ActionStoreResult<Box<dyn Iterator<Item = OrderedEntry> + '_>>;
}

/// Index bounds selected by an exclusive cursor and a direction.
pub(crate) fn walk_bounds(offset: u64, reversed: bool) -> (Bound<u64>, Bound<u64>) {
    match (reversed, offset) {
        (false, offset) => (Bound::Excluded(offset), Bound::Unbounded),
        (true, 0) => (Bound::Unbounded, Bound::Unbounded),
        (true, offset) => (Bound::Unbounded, Bound::Excluded(offset)),
    }
}

fn verdict_for(filter: Option<&ListActionsFilterFn>, action: &Action, reversed: bool) -> FilterVerdict {
    filter.map_or(FilterVerdict::accept(), |f| f(action, reversed))
}

/// Walk `ordering` according to `query`, returning one page.
pub fn paginate<O: ActionOrdering + ?Sized>(
    ordering: &O,
    filter: Option<&ListActionsFilterFn>,
    query: &ListActionsQuery,
) -> ActionStoreResult<ActionsPage> {
    let limit = query.page_limit();
    let reversed = query.reversed;

    // Starting from the very beginning the count can ride along the page
    // walk; otherwise it needs its own pass over the whole ordering.
    let count_in_walk = query.count_all && query.index_offset == 0;

    let mut page = ActionsPage {
        last_index: query.index_offset,
        ..ActionsPage::default()
    };
    let mut matched = 0u64;
    let mut filling = true;

    for entry in ordering.walk(query.index_offset, reversed)? {
        let (index, action) = entry?;
        let verdict = verdict_for(filter, &action, reversed);

        if verdict.matches {
            matched += 1;
        }
        if filling {
            page.last_index = index;
            if verdict.matches {
                page.actions.push(action);
                filling = page.actions.len() < limit;
            }
        }

        if !verdict.keep_going || (!filling && !count_in_walk) {
            break;
        }
    }

    if query.count_all {
        page.total_count = if count_in_walk {
            matched
        } else {
            count_matches(ordering, filter, reversed)?
        };
    }

    Ok(page)
}

/// Count every match in the whole ordering, honouring early termination.
fn count_matches<O: ActionOrdering + ?Sized>(
    ordering: &O,
    filter: Option<&ListActionsFilterFn>,
    reversed: bool,
) -> ActionStoreResult<u64> {
    let mut count = 0;
    for entry in ordering.walk(0, reversed)? {
        let (_, action) = entry?;
        let verdict = verdict_for(filter, &action, reversed);
        if verdict.matches {
            count += 1;
        }
        if !verdict.keep_going {
            break;
        }
    }
    Ok(count)
}
