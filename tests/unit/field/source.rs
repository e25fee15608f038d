use super::*;
use crate::{
    foundation::core::{DAffine3, Timepoint, VoxelBox},
    transform::affine::from_row_major,
};

fn translate_x(tx: f64) -> DAffine3 {
    from_row_major(&[
        1.0, 0.0, 0.0, tx, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ])
}

fn uniform(b: VoxelBox, value: u8) -> Volume<u8> {
    Volume::splat(b, value)
}

#[test]
fn array_source_requires_at_least_one_level() {
    assert!(ArraySource::<u8>::new(vec![]).is_err());
}

#[test]
fn array_source_presence_window_is_half_open() {
    let b = VoxelBox::from_shape([2, 2, 1]);
    let src = ArraySource::single_level(uniform(b, 7), DAffine3::IDENTITY)
        .with_presence(2..5);
    assert!(!SourceField::is_present(&src, Timepoint(1)));
    assert!(SourceField::is_present(&src, Timepoint(2)));
    assert!(SourceField::is_present(&src, Timepoint(4)));
    assert!(!SourceField::is_present(&src, Timepoint(5)));
}

#[test]
fn array_source_rejects_out_of_range_level() {
    let b = VoxelBox::from_shape([2, 2, 1]);
    let src = ArraySource::single_level(uniform(b, 7), DAffine3::IDENTITY);
    assert!(src.field(Timepoint(0), 1).is_err());
    assert!(src.transform(Timepoint(0), 1).is_err());
}

#[test]
fn full_coverage_is_one_inside_and_zero_outside() {
    let b = VoxelBox::from_shape([4, 4, 1]);
    let src = ArraySource::single_level(uniform(b, 9), DAffine3::IDENTITY);
    let alpha = FullCoverage::for_source(&src, Timepoint(0)).unwrap();

    assert_eq!(alpha.num_levels(), 1);
    let field = AlphaSource::field(&alpha, Timepoint(0), 0).unwrap();
    assert_eq!(field.get([0, 0, 0]), 1.0);
    assert_eq!(field.get([3, 3, 0]), 1.0);
    assert_eq!(field.get([4, 0, 0]), 0.0);
}

#[test]
fn default_culling_test_uses_world_extents() {
    let b = VoxelBox::from_shape([4, 4, 1]);
    let src = ArraySource::single_level(uniform(b, 9), translate_x(100.0));
    let alpha = FullCoverage::for_source(&src, Timepoint(0)).unwrap();

    // Model cell at the origin: far away from the shifted source.
    let cell = VoxelBox::from_shape([8, 8, 1]);
    let hit = alpha
        .intersects_box(&DAffine3::IDENTITY, cell, Timepoint(0))
        .unwrap();
    assert!(!hit);

    // A cell whose world box reaches the source does intersect.
    let near = VoxelBox::new([98, 0, 0], [8, 8, 1]);
    let hit = alpha
        .intersects_box(&DAffine3::IDENTITY, near, Timepoint(0))
        .unwrap();
    assert!(hit);
}

#[test]
fn culling_can_be_declined() {
    let b = VoxelBox::from_shape([2, 2, 1]);
    let alpha = ArraySource::single_level(Volume::splat(b, 1.0f32), DAffine3::IDENTITY)
        .with_culling(false);
    assert!(!AlphaSource::bounding_box_culling(&alpha));

    let cov = FullCoverage::for_source(
        &ArraySource::single_level(uniform(b, 1), DAffine3::IDENTITY),
        Timepoint(0),
    )
    .unwrap()
    .with_culling(false);
    assert!(!cov.bounding_box_culling());
}
