use std::sync::Arc;

use super::*;
use crate::{
    ArraySource, BlendMode, FusionConfig, FusionEngine, Interpolation, Timepoint, Volume,
    VoxelBox,
};

fn identity_engine<T: Voxel>(
    model: ArraySource<T>,
    blend: BlendMode,
) -> FusionEngine<T> {
    let config = FusionConfig {
        blend,
        cache_enabled: false,
        ..FusionConfig::default()
    };
    FusionEngine::new(Arc::new(model), config).unwrap()
}

fn uniform_source<T: Voxel>(shape: [u64; 3], value: T) -> ArraySource<T> {
    ArraySource::single_level(
        Volume::splat(VoxelBox::from_shape(shape), value),
        DAffine3::IDENTITY,
    )
}

fn alpha(shape: [u64; 3], value: f32) -> Arc<ArraySource<f32>> {
    Arc::new(ArraySource::single_level(
        Volume::splat(VoxelBox::from_shape(shape), value),
        DAffine3::IDENTITY,
    ))
}

#[test]
fn identity_resampling_reproduces_origin_exactly() {
    let bounds = VoxelBox::from_shape([4, 4, 2]);
    let data: Vec<u8> = (0..bounds.num_voxels() as u32).map(|i| i as u8).collect();
    let origin = ArraySource::single_level(
        Volume::from_vec(bounds, data.clone()).unwrap(),
        DAffine3::IDENTITY,
    );

    let mut engine = identity_engine(origin.clone(), BlendMode::Average);
    engine
        .add_origin(Arc::new(origin), Interpolation::Nearest)
        .unwrap();

    let mut reader = engine.fused_view(Timepoint(0), 0).unwrap();
    let max = bounds.max_excl();
    for z in 0..max[2] {
        for y in 0..max[1] {
            for x in 0..max[0] {
                reader.set_position([x, y, z]);
                let expected = data[bounds.linear_index([x, y, z]).unwrap()];
                assert_eq!(reader.get(), expected, "mismatch at {x},{y},{z}");
            }
        }
    }
}

#[test]
fn average_scenario_two_weighted_origins() {
    // A: value 100, alpha 1; B: value 50, alpha 0.5.
    // (100*1 + 50*0.5) / 1.5 = 83.33.. -> 83 in u8.
    let shape = [8, 8, 1];
    let mut engine = identity_engine(uniform_source(shape, 0u8), BlendMode::Average);
    engine
        .add_origin_with_alpha(
            Arc::new(uniform_source(shape, 100u8)),
            alpha(shape, 1.0),
            Interpolation::Nearest,
        )
        .unwrap();
    engine
        .add_origin_with_alpha(
            Arc::new(uniform_source(shape, 50u8)),
            alpha(shape, 0.5),
            Interpolation::Nearest,
        )
        .unwrap();

    let mut reader = engine.fused_view(Timepoint(0), 0).unwrap();
    for y in 0..8 {
        for x in 0..8 {
            reader.set_position([x, y, 0]);
            assert_eq!(reader.get(), 83);
        }
    }
}

#[test]
fn sum_scenario_is_alpha_weighted_without_clamping() {
    // 100*1 + 50*0.5 = 125 fits u16 unclamped.
    let shape = [8, 8, 1];
    let mut engine = identity_engine(uniform_source(shape, 0u16), BlendMode::Sum);
    engine
        .add_origin_with_alpha(
            Arc::new(uniform_source(shape, 100u16)),
            alpha(shape, 1.0),
            Interpolation::Nearest,
        )
        .unwrap();
    engine
        .add_origin_with_alpha(
            Arc::new(uniform_source(shape, 50u16)),
            alpha(shape, 0.5),
            Interpolation::Nearest,
        )
        .unwrap();

    let mut reader = engine.fused_view(Timepoint(0), 0).unwrap();
    reader.set_position([3, 4, 0]);
    assert_eq!(reader.get(), 125);
}

#[test]
fn sum_clamps_into_integral_destination() {
    // Two origins at 200 with alpha 1 saturate u8 at 255, not 400 mod 256.
    let shape = [2, 2, 1];
    let mut engine = identity_engine(uniform_source(shape, 0u8), BlendMode::Sum);
    for _ in 0..2 {
        engine
            .add_origin_with_alpha(
                Arc::new(uniform_source(shape, 200u8)),
                alpha(shape, 1.0),
                Interpolation::Nearest,
            )
            .unwrap();
    }

    let mut reader = engine.fused_view(Timepoint(0), 0).unwrap();
    reader.set_position([0, 0, 0]);
    assert_eq!(reader.get(), 255);
}

#[test]
fn max_gates_on_alpha_only() {
    let shape = [2, 2, 1];
    let mut engine = identity_engine(uniform_source(shape, 0u8), BlendMode::Max);
    engine
        .add_origin_with_alpha(
            Arc::new(uniform_source(shape, 10u8)),
            alpha(shape, 1.0),
            Interpolation::Nearest,
        )
        .unwrap();
    // Largest raw value, but zero coverage: must never win.
    engine
        .add_origin_with_alpha(
            Arc::new(uniform_source(shape, 200u8)),
            alpha(shape, 0.0),
            Interpolation::Nearest,
        )
        .unwrap();

    let mut reader = engine.fused_view(Timepoint(0), 0).unwrap();
    reader.set_position([1, 1, 0]);
    assert_eq!(reader.get(), 10);
}

#[test]
fn absent_origin_is_left_out() {
    let shape = [2, 2, 1];
    let mut engine = identity_engine(uniform_source(shape, 0u8), BlendMode::Average);
    engine
        .add_origin(
            Arc::new(uniform_source(shape, 40u8)),
            Interpolation::Nearest,
        )
        .unwrap();
    engine
        .add_origin(
            Arc::new(uniform_source(shape, 80u8).with_presence(5..6)),
            Interpolation::Nearest,
        )
        .unwrap();

    let mut at0 = engine.fused_view(Timepoint(0), 0).unwrap();
    assert_eq!(at0.num_origins(), 1);
    at0.set_position([0, 0, 0]);
    assert_eq!(at0.get(), 40);

    let mut at5 = engine.fused_view(Timepoint(5), 0).unwrap();
    assert_eq!(at5.num_origins(), 2);
    at5.set_position([0, 0, 0]);
    assert_eq!(at5.get(), 60);
}

#[test]
fn clone_subset_elides_origins_without_rebuilding() {
    let shape = [2, 2, 1];
    let mut engine = identity_engine(uniform_source(shape, 0u8), BlendMode::Average);
    engine
        .add_origin(
            Arc::new(uniform_source(shape, 40u8)),
            Interpolation::Nearest,
        )
        .unwrap();
    engine
        .add_origin(
            Arc::new(uniform_source(shape, 80u8)),
            Interpolation::Nearest,
        )
        .unwrap();

    let reader = engine.fused_view(Timepoint(0), 0).unwrap();
    let mut only_second = reader.clone_subset(&[false, true]).unwrap();
    assert_eq!(only_second.num_origins(), 1);
    only_second.set_position([0, 0, 0]);
    assert_eq!(only_second.get(), 80);

    // Mask length must match the reader's origin count.
    assert!(reader.clone_subset(&[true]).is_err());
}

#[test]
fn clones_keep_independent_positions() {
    let bounds = VoxelBox::from_shape([4, 1, 1]);
    let origin = ArraySource::single_level(
        Volume::from_vec(bounds, vec![1u8, 2, 3, 4]).unwrap(),
        DAffine3::IDENTITY,
    );
    let mut engine = identity_engine(origin.clone(), BlendMode::Average);
    engine
        .add_origin(Arc::new(origin), Interpolation::Nearest)
        .unwrap();

    let mut a = engine.fused_view(Timepoint(0), 0).unwrap();
    a.set_position([1, 0, 0]);
    let mut b = a.clone();
    b.move_by([2, 0, 0]);
    b.step(1);
    b.move_by([0, -1, 0]);

    assert_eq!(a.position(), [1, 0, 0]);
    assert_eq!(b.position(), [3, 0, 0]);
    assert_eq!(a.get(), 2);
    assert_eq!(b.get(), 4);
}

#[test]
fn linear_interpolation_follows_scaled_grid() {
    // Origin voxels are twice the size of model voxels: model voxel x maps to
    // origin coordinate x/2, halfway samples interpolate between neighbors.
    let origin_bounds = VoxelBox::from_shape([3, 1, 1]);
    let double = crate::transform::affine::from_row_major(&[
        2.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ]);
    let origin = ArraySource::single_level(
        Volume::from_vec(origin_bounds, vec![0u8, 100, 200]).unwrap(),
        double,
    );
    let model = uniform_source([5, 1, 1], 0u8);

    let mut engine = identity_engine(model, BlendMode::Average);
    engine
        .add_origin(Arc::new(origin), Interpolation::Linear)
        .unwrap();

    let mut reader = engine.fused_view(Timepoint(0), 0).unwrap();
    reader.set_position([2, 0, 0]);
    assert_eq!(reader.get(), 100);
    reader.set_position([1, 0, 0]);
    assert_eq!(reader.get(), 50);
    reader.set_position([3, 0, 0]);
    assert_eq!(reader.get(), 150);
}
