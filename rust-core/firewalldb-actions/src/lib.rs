// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FirewallDB Action Ledger
//
// This crate records every RPC call the firewall intercepts as an `Action`
// and keeps it in two orderings: per session (by session-scoped action id)
// and store-wide (by global id, i.e. creation order). Consumers page through
// either ordering with offset, page size, direction, optional total counts
// and an early-terminating filter.
//
// # Modules
//
// - [`action`] -- The `Action` record, `SessionId`, `ActionLocator`, `ActionState`.
// - [`codec`] -- Versioned, checksummed binary record format.
// - [`index`] -- Counter allocation and the redb / in-memory index layout.
// - [`query`] -- Listing requests, pages and the shared pagination walk.
// - [`filter`] -- Declarative `ActionFilter` compiled to a filter function.
// - [`store`] -- The `ActionsDb` trait and its input validation.
// - [`memory`] -- An in-memory backend for testing and ephemeral workloads.
// - [`redb_backend`] -- The persistent redb backend.
// - [`config`] -- Where the persistent store lives.
// - [`error`] -- `ActionStoreError`, `CodecError` and the coarse `ErrorKind`.
//
// # Example
//
// ```rust
// use firewalldb_actions::{Action, ActionState, ActionsDb, InMemoryActionsDb, ListActionsQuery, SessionId};
//
// # tokio_test::block_on(async {
// let db = InMemoryActionsDb::new();
// let session = SessionId::new([1, 2, 3, 4]);
//
// let id = db.add_action(session, Action::new(session, "SendToRoute")).await.unwrap();
// db.set_action_state(firewalldb_actions::ActionLocator::new(session, id), ActionState::Done, "")
//     .await
//     .unwrap();
//
// let query = ListActionsQuery { count_all: true, ..Default::default() };
// let page = db.list_actions(None, Some(query)).await.unwrap();
// assert_eq!(page.total_count, 1);
// assert_eq!(page.actions[0].state, ActionState::Done);
// # });
// ```

pub mod action;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod memory;
pub mod query;
pub mod redb_backend;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use action::{Action, ActionLocator, ActionState, SessionId, SESSION_ID_LEN};
pub use codec::{decode_action, encode_action};
pub use config::ActionsDbConfig;
pub use error::{ActionStoreError, ActionStoreResult, CodecError, ErrorKind};
pub use filter::ActionFilter;
pub use memory::InMemoryActionsDb;
pub use query::{ActionsPage, FilterVerdict, ListActionsFilterFn, ListActionsQuery};
pub use redb_backend::RedbActionsDb;
pub use store::ActionsDb;
