//! Property-based tests using proptest
//! Tests invariants of the multi-value merge behind contact reconciliation
use amo_form_sync::models::FieldValue;
use amo_form_sync::submitter::merge_multi_value;
use proptest::prelude::*;

fn field_values() -> impl Strategy<Value = Vec<FieldValue>> {
    prop::collection::vec(
        ("[a-z0-9@.]{1,16}", prop::option::of("[A-Z]{3,6}"))
            .prop_map(|(value, kind)| FieldValue { value, kind }),
        0..6,
    )
}

// Property: merging never panics, whatever the inputs
proptest! {
    #[test]
    fn merge_never_panics(existing in field_values(), value in "\\PC*") {
        let _ = merge_multi_value(&existing, &value);
    }
}

// Property: existing entries survive the merge unchanged and in order
proptest! {
    #[test]
    fn merge_preserves_existing_entries_and_order(
        existing in field_values(),
        value in "[a-z0-9@.]{1,16}"
    ) {
        let merged = merge_multi_value(&existing, &value);
        prop_assert!(merged.len() >= existing.len());
        prop_assert_eq!(&merged[..existing.len()], &existing[..]);
    }
}

// Property: a value new to the field is appended exactly once, labeled WORK
proptest! {
    #[test]
    fn new_value_appended_once_with_work_label(
        existing in field_values(),
        value in "[a-z0-9@.]{1,16}"
    ) {
        prop_assume!(!existing.iter().any(|entry| entry.value == value));

        let merged = merge_multi_value(&existing, &value);
        prop_assert_eq!(merged.len(), existing.len() + 1);

        let appended = merged.last().unwrap();
        prop_assert_eq!(appended.value.as_str(), value.as_str());
        prop_assert_eq!(appended.kind.as_deref(), Some("WORK"));
    }
}

// Property: merging is idempotent, so resubmitting the same value twice
// cannot produce duplicate entries
proptest! {
    #[test]
    fn merge_is_idempotent(existing in field_values(), value in "[a-z0-9@.]{1,16}") {
        let once = merge_multi_value(&existing, &value);
        let twice = merge_multi_value(&once, &value);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merged_value_never_duplicated(existing in field_values(), value in "[a-z0-9@.]{1,16}") {
        let merged = merge_multi_value(&existing, &value);
        let occurrences_before = existing.iter().filter(|entry| entry.value == value).count();
        let occurrences_after = merged.iter().filter(|entry| entry.value == value).count();
        prop_assert_eq!(occurrences_after, occurrences_before.max(1));
    }
}
