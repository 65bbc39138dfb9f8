//! Property tests for the voxel geometry primitives.

use microcosm_core::voxel::bresenham_3d;
use microcosm_data::{BlockPos, BoundingBox};
use proptest::prelude::*;

prop_compose! {
    fn arb_pos()(
        x in -64i32..64,
        y in -64i32..64,
        z in 0i32..32
    ) -> BlockPos {
        BlockPos::new(x, y, z)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_line_includes_both_endpoints(a in arb_pos(), b in arb_pos()) {
        let line = bresenham_3d(a, b);
        prop_assert_eq!(*line.first().unwrap(), a);
        prop_assert_eq!(*line.last().unwrap(), b);
    }

    #[test]
    fn test_line_length_is_chebyshev_distance(a in arb_pos(), b in arb_pos()) {
        let line = bresenham_3d(a, b);
        let expected = (a.x - b.x)
            .abs()
            .max((a.y - b.y).abs())
            .max((a.z - b.z).abs()) as usize
            + 1;
        prop_assert_eq!(line.len(), expected);
    }

    #[test]
    fn test_line_steps_are_adjacent(a in arb_pos(), b in arb_pos()) {
        let line = bresenham_3d(a, b);
        for pair in line.windows(2) {
            prop_assert!((pair[0].x - pair[1].x).abs() <= 1);
            prop_assert!((pair[0].y - pair[1].y).abs() <= 1);
            prop_assert!((pair[0].z - pair[1].z).abs() <= 1);
            prop_assert!(pair[0] != pair[1]);
        }
    }

    #[test]
    fn test_box_overlap_is_symmetric(
        a in arb_pos(), b in arb_pos(),
        c in arb_pos(), d in arb_pos()
    ) {
        let first = BoundingBox::from_corners(a, b);
        let second = BoundingBox::from_corners(c, d);
        prop_assert_eq!(first.overlaps(&second), second.overlaps(&first));
    }

    #[test]
    fn test_box_contains_implies_overlap(a in arb_pos(), b in arb_pos(), p in arb_pos()) {
        let bounds = BoundingBox::from_corners(a, b);
        if bounds.contains(p) {
            let point = BoundingBox::from_corners(p, p);
            prop_assert!(bounds.overlaps(&point));
        }
    }

    #[test]
    fn test_cell_count_matches_extent(a in arb_pos(), b in arb_pos()) {
        let bounds = BoundingBox::from_corners(a, b);
        let extent = i64::from((a.x - b.x).abs() + 1)
            * i64::from((a.y - b.y).abs() + 1)
            * i64::from((a.z - b.z).abs() + 1);
        prop_assert_eq!(bounds.cell_count(), extent as u64);
    }
}
