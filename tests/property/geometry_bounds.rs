//! Property-based tests for geometry synthesis and JSON extraction

use overlay_forge::extract::extract_json_object;
use overlay_forge::geometry::synthesize_from_labels;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    /// Whatever labels the provider sends, synthesized rectangles stay in the unit square.
    #[test]
    fn synthesized_rectangles_are_normalized(position in ".{0,32}", size in ".{0,16}") {
        let polygon = synthesize_from_labels(&position, &size);
        prop_assert_eq!(polygon.len(), 4);
        prop_assert!(polygon.iter().all(|c| c.is_normalized()));
    }

    /// An object embedded in prose and a code fence is recovered intact.
    #[test]
    fn embedded_object_is_extracted(
        prefix in "[A-Za-z ,.:]{0,40}",
        suffix in "[A-Za-z ,.:]{0,40}",
        name in "[a-z_]{1,16}",
        value in any::<i32>(),
    ) {
        let object = json!({ "name": name, "value": value, "nested": { "ok": true } });
        let text = format!("{}\n```json\n{}\n```\n{}", prefix, object, suffix);
        let extracted = extract_json_object(&text).unwrap();
        prop_assert_eq!(extracted, object);
    }
}
