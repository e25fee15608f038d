//! Shared 3D geometry helpers.

pub mod affine;
