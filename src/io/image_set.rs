use crate::types::{AnyRaster, FusionError, FusionResult};
use std::collections::HashMap;

/// Collection of co-registered rasters keyed by resolution tag and date
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    images: HashMap<(String, i32), AnyRaster>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raster, returning the one previously stored under the same key
    pub fn insert<R: Into<AnyRaster>>(&mut self, tag: &str, date: i32, raster: R) -> Option<AnyRaster> {
        log::debug!("Adding image {}@{} to image set", tag, date);
        self.images.insert((tag.to_string(), date), raster.into())
    }

    pub fn remove(&mut self, tag: &str, date: i32) -> Option<AnyRaster> {
        self.images.remove(&(tag.to_string(), date))
    }

    pub fn has(&self, tag: &str, date: i32) -> bool {
        self.images.contains_key(&(tag.to_string(), date))
    }

    /// Get a raster or fail with `NotFound`
    pub fn get(&self, tag: &str, date: i32) -> FusionResult<&AnyRaster> {
        self.images
            .get(&(tag.to_string(), date))
            .ok_or_else(|| FusionError::NotFound(format!("No image with tag '{}' at date {}", tag, date)))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
