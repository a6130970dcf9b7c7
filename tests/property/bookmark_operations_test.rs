//! Property-based tests for bookmark add/remove sequences.
//!
//! Any interleaving of adds and removes, some of them sent while the
//! backend is unreachable, leaves at most one bookmark per content id and a
//! local view that agrees with the server once every request has settled.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;

use common::{signed_in_app, MockApi};
use promptshelf::services::bookmark_service::BookmarkServiceTrait;
use promptshelf::types::bookmark::CategoryAssignment;
use promptshelf::types::errors::EngagementError;

#[derive(Debug, Clone)]
enum Op {
    Add { content: u8, offline: bool },
    Remove { content: u8, offline: bool },
}

/// Operations over a handful of content ids so collisions are common.
fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, prop::bool::weighted(0.2)).prop_map(|(content, offline)| Op::Add { content, offline }),
        (0u8..4, prop::bool::weighted(0.2)).prop_map(|(content, offline)| Op::Remove { content, offline }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn settled_bookmarks_match_the_model(ops in prop::collection::vec(arb_op(), 1..24)) {
        runtime().block_on(async {
            let api = MockApi::new();
            let app = signed_in_app(&api).await;
            let mut model: BTreeSet<String> = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Add { content, offline } => {
                        let id = content.to_string();
                        api.set_offline(offline);
                        let result = app.bookmarks.add(&id, CategoryAssignment::None, None).await;
                        if model.contains(&id) {
                            prop_assert_eq!(result, Err(EngagementError::AlreadyBookmarked(id.clone())));
                        } else if offline {
                            prop_assert!(matches!(result, Err(EngagementError::NetworkError(_))));
                        } else {
                            prop_assert!(result.is_ok());
                            model.insert(id.clone());
                        }
                    }
                    Op::Remove { content, offline } => {
                        let id = content.to_string();
                        api.set_offline(offline);
                        let result = app.bookmarks.remove(&id).await;
                        if !model.contains(&id) {
                            prop_assert_eq!(result, Err(EngagementError::NotBookmarked(id.clone())));
                        } else if offline {
                            prop_assert!(matches!(result, Err(EngagementError::NetworkError(_))));
                        } else {
                            prop_assert!(result.is_ok());
                            model.remove(&id);
                        }
                    }
                }
                api.set_offline(false);

                let local: Vec<String> = app.bookmarks.bookmarks().into_iter().map(|b| b.content_id).collect();
                let unique: BTreeSet<String> = local.iter().cloned().collect();
                prop_assert_eq!(local.len(), unique.len());
                prop_assert_eq!(&unique, &model);

                let server: BTreeSet<String> = api.server_bookmarks().into_iter().map(|b| b.content_id).collect();
                prop_assert_eq!(&server, &model);
                for content in 0u8..4 {
                    let id = content.to_string();
                    prop_assert_eq!(app.bookmarks.is_bookmarked(&id), model.contains(&id));
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn speculative_add_is_visible_until_it_settles(content in "[0-9]{1,4}", offline in any::<bool>()) {
        runtime().block_on(async {
            let api = MockApi::gated();
            let app = signed_in_app(&api).await;
            api.set_offline(offline);

            let pending = app.bookmarks.add(&content, CategoryAssignment::None, None);
            prop_assert!(app.bookmarks.is_bookmarked(&content));
            prop_assert!(app.bookmarks.bookmark(&content).map(|b| b.is_pending()).unwrap_or(false));

            api.release(1);
            let result = pending.await;
            prop_assert_eq!(result.is_ok(), !offline);
            prop_assert_eq!(app.bookmarks.is_bookmarked(&content), !offline);
            prop_assert_eq!(app.store.bookmarks.pending_count(&content), 0);
            Ok(())
        })?;
    }
}
