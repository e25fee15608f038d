pub mod interp;
pub mod source;
pub mod volume;
pub mod voxel;
