//! Image storage shared by the fusion engine

pub mod image_set;

pub use image_set::ImageSet;
