use super::*;
use crate::{ArraySource, DAffine3, Timepoint, Volume, VoxelBox, VoxfuseError};

#[test]
fn best_level_rounds_up_to_at_least_as_coarse() {
    let sizes = [1.0, 2.0, 4.0, 8.0];
    assert_eq!(best_level(&sizes, 0.5).unwrap(), 0);
    assert_eq!(best_level(&sizes, 1.0).unwrap(), 0);
    assert_eq!(best_level(&sizes, 1.5).unwrap(), 1);
    assert_eq!(best_level(&sizes, 4.0).unwrap(), 2);
    // Coarser than everything clamps to the coarsest level.
    assert_eq!(best_level(&sizes, 100.0).unwrap(), 3);
}

#[test]
fn best_level_is_monotone_in_target() {
    let sizes = [1.0, 2.0, 4.0, 8.0, 16.0];
    let targets = [0.5, 1.0, 1.7, 3.0, 6.0, 12.0, 40.0];
    let mut last = 0;
    for &t in &targets {
        let l = best_level(&sizes, t).unwrap();
        assert!(l >= last, "level regressed at target {t}");
        last = l;
    }
}

#[test]
fn zero_levels_is_a_config_error() {
    assert!(matches!(
        best_level(&[], 1.0),
        Err(VoxfuseError::Config(_))
    ));
}

#[test]
fn correspondence_maps_every_model_level() {
    let origin = [1.0, 2.0, 4.0];
    let model = [1.0, 2.0, 4.0, 8.0];
    assert_eq!(correspondence(&origin, &model).unwrap(), vec![0, 1, 2, 2]);
}

#[test]
fn level_sizes_follow_the_transform_scales() {
    fn scaled(s: f64) -> DAffine3 {
        crate::transform::affine::from_row_major(&[
            s, 0.0, 0.0, 0.0, //
            0.0, s, 0.0, 0.0, //
            0.0, 0.0, s, 0.0,
        ])
    }
    let b = VoxelBox::from_shape([2, 2, 2]);
    let src = ArraySource::new(vec![
        (Volume::splat(b, 0u8), scaled(1.0)),
        (Volume::splat(b, 0u8), scaled(2.0)),
        (Volume::splat(b, 0u8), scaled(4.0)),
    ])
    .unwrap();

    let sizes = level_sizes(&src, Timepoint(0)).unwrap();
    assert_eq!(sizes.len(), 3);
    assert!((sizes[0] - 1.0).abs() < 1e-12);
    assert!((sizes[1] - 2.0).abs() < 1e-12);
    assert!((sizes[2] - 4.0).abs() < 1e-12);
}
