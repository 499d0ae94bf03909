//! Property-based tests for modification tracking.

mod common;

use common::{MemoryStore, post_model};
use outpost_document::SaveOutcome;
use proptest::prelude::*;
use serde_json::json;

fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").unwrap()
}

proptest! {
    /// Marking a path marks every prefix of it and nothing unrelated.
    #[test]
    fn marking_covers_every_prefix(segments in prop::collection::vec(segment_strategy(), 1..6)) {
        let post = post_model().hydrate(json!({})).unwrap();
        post.mark_modified(segments.clone(), None, None);

        for n in 1..=segments.len() {
            let prefix = segments[..n].join(".");
            prop_assert!(post.is_modified(Some(&prefix)));
        }
        prop_assert_eq!(post.modified_paths().len(), segments.len());
        prop_assert!(!post.is_modified(Some("zzzzzzz")));
    }

    /// After a successful save nothing is modified and a second save is a
    /// no-op, whatever was written before.
    #[test]
    fn save_settles_the_document(title in "[A-Za-z ]{0,20}", views in 0u32..1000) {
        let mut store = MemoryStore::default();
        let post = post_model().create(json!({})).unwrap();
        post.set("title", title).unwrap();
        post.set("views", views).unwrap();

        let first = post.save(&mut store).unwrap();
        prop_assert!(matches!(first, SaveOutcome::Inserted(_)));
        prop_assert!(!post.is_modified(None));
        prop_assert_eq!(post.save(&mut store).unwrap(), SaveOutcome::Unchanged);
    }
}
