//! starfm: Spatial and Temporal Adaptive Reflectance Fusion Model
//!
//! Predicts a synthetic high resolution image at an intermediate date from
//! one or two pairs of co-registered high/low resolution observations and the
//! low resolution image of the prediction date.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AnyRaster, Element, ElementType, FusionError, FusionResult, Mask, Raster, Rectangle
};

pub use io::ImageSet;
pub use crate::core::{predict_parallel, StarfmFusor, StarfmOptions, TempDiffWeighting};
