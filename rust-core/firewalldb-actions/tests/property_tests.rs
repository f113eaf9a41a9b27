// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for id allocation, pagination and the record codec

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use firewalldb_actions::{
    decode_action, encode_action, Action, ActionState, ActionsDb, FilterVerdict,
    InMemoryActionsDb, ListActionsFilterFn, ListActionsQuery, RedbActionsDb, SessionId,
};

/// Generate a sequence of sessions to add actions for
fn arb_sessions(max_len: usize) -> impl Strategy<Value = Vec<SessionId>> {
    prop::collection::vec((0u8..4).prop_map(|b| SessionId::new([b; 4])), 0..max_len)
}

/// Generate arbitrary action contents
fn arb_action() -> impl Strategy<Value = Action> {
    (
        any::<[u8; 4]>(),
        "[A-Za-z]{0,12}",
        "[a-z\\-]{0,12}",
        proptest::option::of("[ -~]{0,24}"),
        prop::collection::vec(any::<u8>(), 0..32),
        any::<i32>(),
        0u32..1_000_000_000,
        prop_oneof![Just(ActionState::Init), Just(ActionState::Done), Just(ActionState::Error)],
    )
        .prop_map(|(session, method, feature, json, params, secs, nanos, state)| {
            let mut action = Action::new(SessionId::new(session), method);
            action.feature_name = feature;
            action.structured_json_data = json;
            action.rpc_params_json = params;
            action.attempted_at = chrono::DateTime::from_timestamp(i64::from(secs), nanos).unwrap();
            action.state = state;
            action
        })
}

async fn seed(db: &InMemoryActionsDb, sessions: &[SessionId]) {
    for (n, session) in sessions.iter().enumerate() {
        let mut action = Action::new(*session, "Method");
        action.feature_name = n.to_string();
        db.add_action(*session, action).await.unwrap();
    }
}

/// Follow `last_index` cursors until a page comes back empty.
async fn collect_pages(
    db: &InMemoryActionsDb,
    session: Option<SessionId>,
    page_size: u64,
    reversed: bool,
) -> Vec<u64> {
    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let query = ListActionsQuery {
            index_offset: offset,
            max_num: page_size,
            reversed,
            count_all: false,
        };
        let page = db.list_actions(session, Some(query)).await.unwrap();
        if page.actions.is_empty() {
            return seen;
        }
        seen.extend(page.actions.iter().map(|a| a.global_id));
        offset = page.last_index;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_ids_are_dense_per_session_and_globally(sessions in arb_sessions(40)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = InMemoryActionsDb::new();
            let mut expected: HashMap<SessionId, u64> = HashMap::new();
            for (n, session) in sessions.iter().enumerate() {
                let id = db.add_action(*session, Action::new(*session, "M")).await.unwrap();
                let counter = expected.entry(*session).or_default();
                *counter += 1;
                prop_assert_eq!(id, *counter);

                let page = db
                    .list_actions(None, Some(ListActionsQuery { index_offset: n as u64, ..Default::default() }))
                    .await
                    .unwrap();
                prop_assert_eq!(page.actions.len(), 1);
                prop_assert_eq!(page.actions[0].global_id, n as u64 + 1);
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_paging_composes_to_full_listing(
        sessions in arb_sessions(30),
        page_size in 1u64..7,
        reversed in any::<bool>(),
        restrict in proptest::option::of(0u8..4),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = InMemoryActionsDb::new();
            seed(&db, &sessions).await;
            let session = restrict.map(|b| SessionId::new([b; 4]));

            let full = db
                .list_actions(session, Some(ListActionsQuery { reversed, ..Default::default() }))
                .await
                .unwrap();
            let full: Vec<u64> = full.actions.iter().map(|a| a.global_id).collect();

            let paged = collect_pages(&db, session, page_size, reversed).await;
            prop_assert_eq!(&paged, &full);

            let mut sorted = full.clone();
            sorted.sort_unstable();
            if reversed {
                sorted.reverse();
            }
            prop_assert_eq!(sorted, full);
            Ok(())
        })?;
    }

    #[test]
    fn test_count_all_ignores_offset_and_page_size(
        sessions in arb_sessions(30),
        offset in 0u64..35,
        page_size in 0u64..5,
        reversed in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = InMemoryActionsDb::new();
            seed(&db, &sessions).await;

            let even: ListActionsFilterFn = Arc::new(|action: &Action, _: bool| {
                FilterVerdict::new(action.global_id % 2 == 0, true)
            });
            let query = ListActionsQuery { index_offset: offset, max_num: page_size, reversed, count_all: true };
            let page = db.list_global(None, Some(even), Some(query)).await.unwrap();

            prop_assert_eq!(page.total_count, sessions.len() as u64 / 2);
            if page_size > 0 {
                prop_assert!(page.actions.len() as u64 <= page_size);
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_action(&bytes);
    }

    #[test]
    fn test_codec_preserves_every_field(action in arb_action()) {
        let encoded = encode_action(&action).unwrap();
        prop_assert_eq!(decode_action(&encoded).unwrap(), action);
    }

    #[test]
    fn test_single_bit_flip_is_detected(action in arb_action(), bit in any::<prop::sample::Index>()) {
        let mut encoded = encode_action(&action).unwrap();
        let bit = bit.index(encoded.len() * 8);
        encoded[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(decode_action(&encoded).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn test_redb_matches_in_memory(
        sessions in arb_sessions(20),
        page_size in 0u64..5,
        offset in 0u64..22,
        reversed in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let redb = RedbActionsDb::open_path(dir.path().join("prop.db")).unwrap();
            let memory = InMemoryActionsDb::new();
            for session in &sessions {
                let action = Action::new(*session, "M");
                let a = redb.add_action(*session, action.clone()).await.unwrap();
                let b = memory.add_action(*session, action).await.unwrap();
                prop_assert_eq!(a, b);
            }

            let query = ListActionsQuery { index_offset: offset, max_num: page_size, reversed, count_all: true };
            let from_redb = redb.list_actions(None, Some(query)).await.unwrap();
            let from_memory = memory.list_actions(None, Some(query)).await.unwrap();
            prop_assert_eq!(from_redb, from_memory);
            Ok(())
        })?;
    }
}
