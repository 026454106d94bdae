//! Reference product generators.

pub mod volume;

pub use volume::VolumeProducts;
