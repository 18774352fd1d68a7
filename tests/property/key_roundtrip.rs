//! Property-based tests for cache key rendering and pack ids

use overlay_forge::key::{key, pack_id};
use overlay_forge::types::WorkspaceType;
use overlay_forge::CacheKey;
use proptest::prelude::*;

fn workspace() -> impl Strategy<Value = WorkspaceType> {
    prop::sample::select(WorkspaceType::ALL.to_vec())
}

/// Rendering then parsing a key yields the same key, for any family.
#[test]
fn test_key_roundtrip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any::<String>(), workspace()), |(family, ws)| {
            let original = CacheKey::new(family.clone(), ws);
            let rendered = key(&family, ws);
            let parsed: CacheKey = rendered.parse().unwrap();
            prop_assert_eq!(&parsed, &original);
            prop_assert_eq!(parsed.to_string(), rendered);
            Ok(())
        })
        .unwrap();
}

/// Same inputs always give the same pack id.
#[test]
fn test_pack_id_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&("[a-z0-9_]{0,24}", workspace()), |(family, ws)| {
            let first = pack_id(&family, ws);
            let second = CacheKey::new(family.as_str(), ws).pack_id();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), 32);
            Ok(())
        })
        .unwrap();
}

proptest! {
    /// Distinct (family, workspace) pairs never share a pack id.
    #[test]
    fn pack_ids_distinguish_pairs(
        a in "[a-z_]{1,12}",
        b in "[a-z_]{1,12}",
        ws_a in workspace(),
        ws_b in workspace(),
    ) {
        prop_assume!(a != b || ws_a != ws_b);
        prop_assert_ne!(pack_id(&a, ws_a), pack_id(&b, ws_b));
    }
}
