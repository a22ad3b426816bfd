#![forbid(unsafe_code)]

//! Property tests for normalized positions.

use pinmap_core::model::{POSITION_MAX, POSITION_MIN};
use pinmap_core::{AnnotationDraft, Position};
use proptest::prelude::*;

fn any_coordinate() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1.0e6f64..1.0e6f64,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

proptest! {
    #[test]
    fn clamped_is_always_in_range(x in any_coordinate(), y in any_coordinate()) {
        let p = Position::clamped(x, y);
        prop_assert!(p.is_in_range());
        prop_assert!(p.x >= POSITION_MIN && p.x <= POSITION_MAX);
        prop_assert!(p.y >= POSITION_MIN && p.y <= POSITION_MAX);
    }

    #[test]
    fn clamp_is_identity_inside_range(x in 0.0f64..=100.0, y in 0.0f64..=100.0) {
        prop_assert_eq!(Position::clamped(x, y), Position::new(x, y));
    }

    #[test]
    fn clamp_is_idempotent(x in any_coordinate(), y in any_coordinate()) {
        let once = Position::clamped(x, y);
        prop_assert_eq!(once.clamp(), once);
    }

    #[test]
    fn drafts_never_hold_out_of_range_positions(x in any_coordinate(), y in any_coordinate()) {
        let draft = AnnotationDraft::new("pin", "", Position::new(x, y));
        prop_assert!(draft.position.is_in_range());
    }
}
