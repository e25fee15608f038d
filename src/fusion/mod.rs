pub mod blend;
pub mod cache;
pub mod engine;
pub mod fused;
pub mod resolution;
