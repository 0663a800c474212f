use crate::core::options::StarfmOptions;
use crate::io::ImageSet;
use crate::types::{AnyRaster, ElementType, FusionError, FusionResult, Mask, Rectangle};

/// Rasters taking part in one prediction, resolved from the image set
#[derive(Debug, Clone, Copy)]
pub struct InputImages<'a> {
    pub high1: &'a AnyRaster,
    pub low1: &'a AnyRaster,
    pub low2: &'a AnyRaster,
    /// Second pair `(high, low)` at date3 in double-pair mode
    pub pair3: Option<(&'a AnyRaster, &'a AnyRaster)>,
    /// Validated mask, if one was supplied
    pub mask: Option<&'a Mask>,
}

impl<'a> InputImages<'a> {
    pub fn element_type(&self) -> ElementType {
        self.high1.element_type()
    }

    pub fn channels(&self) -> usize {
        self.high1.channels()
    }

    /// Full image extent shared by all inputs
    pub fn rect(&self) -> Rectangle {
        self.high1.rect()
    }
}

/// Cross-check availability, type, channel count and size of all required
/// rasters and the optional mask.
///
/// Checks run in a fixed order and the first failure aborts.
pub fn check_input_images<'a>(
    images: &'a ImageSet,
    options: &StarfmOptions,
    date2: i32,
    mask: Option<&'a AnyRaster>,
) -> FusionResult<InputImages<'a>> {
    let date1 = options.date1()?;
    let high = options.high_tag.as_str();
    let low = options.low_tag.as_str();

    let mut required = vec![(high, date1), (low, date1), (low, date2)];
    if let Some(date3) = options.date3 {
        required.push((high, date3));
        required.push((low, date3));
    }

    if required.iter().any(|(tag, date)| !images.has(tag, *date)) {
        let listing: Vec<String> = required
            .iter()
            .map(|(tag, date)| {
                let state = if images.has(tag, *date) { "available" } else { "missing" };
                format!("{}@{}: {}", tag, date, state)
            })
            .collect();
        return Err(FusionError::NotFound(format!(
            "Not all required images are available. {}",
            listing.join(", ")
        )));
    }

    let high1 = images.get(high, date1)?;
    let low1 = images.get(low, date1)?;
    let low2 = images.get(low, date2)?;
    let pair3 = match options.date3 {
        Some(date3) => Some((images.get(high, date3)?, images.get(low, date3)?)),
        None => None,
    };

    let mut high_images = vec![(date1, high1)];
    let mut low_images = vec![(date1, low1), (date2, low2)];
    if let (Some(date3), Some((high3, low3))) = (options.date3, pair3) {
        high_images.push((date3, high3));
        low_images.push((date3, low3));
    }

    check_same_type(high, &high_images)?;
    check_same_type(low, &low_images)?;

    if high1.element_type() != low1.element_type() {
        return Err(FusionError::ImageType(format!(
            "The high resolution images ({}) and the low resolution images ({}) must have the same base type",
            high1.element_type(),
            low1.element_type()
        )));
    }

    if high1.channels() != low1.channels() {
        return Err(FusionError::ImageType(format!(
            "The high resolution images have {} channels and the low resolution images have {} channels. They must match",
            high1.channels(),
            low1.channels()
        )));
    }

    let all_images: Vec<(&str, i32, &AnyRaster)> = high_images
        .iter()
        .map(|(d, r)| (high, *d, *r))
        .chain(low_images.iter().map(|(d, r)| (low, *d, *r)))
        .collect();
    let (width, height) = (high1.width(), high1.height());
    if all_images
        .iter()
        .any(|(_, _, r)| r.width() != width || r.height() != height)
    {
        let sizes: Vec<String> = all_images
            .iter()
            .map(|(tag, date, r)| format!("{}@{}: {}x{}", tag, date, r.width(), r.height()))
            .collect();
        return Err(FusionError::Size(format!(
            "The input images must all have the same size. Got {}",
            sizes.join(", ")
        )));
    }

    let mask = match mask {
        Some(m) => Some(check_mask(m, width, height, high1.channels())?),
        None => None,
    };

    if let Some(area) = options.prediction_area {
        if area.is_empty() || !high1.rect().contains_rect(&area) {
            return Err(FusionError::Size(format!(
                "The prediction area {} must be non-empty and lie inside the {}x{} input images",
                area, width, height
            )));
        }
    }

    log::debug!(
        "Input images valid: {} pair(s), {}x{} {}",
        if pair3.is_some() { 2 } else { 1 },
        width,
        height,
        high1.type_name()
    );

    Ok(InputImages {
        high1,
        low1,
        low2,
        pair3,
        mask,
    })
}

fn check_same_type(tag: &str, rasters: &[(i32, &AnyRaster)]) -> FusionResult<()> {
    let first = rasters[0].1.type_name();
    if rasters.iter().any(|(_, r)| r.type_name() != first) {
        let types: Vec<String> = rasters
            .iter()
            .map(|(date, r)| format!("{}@{}: {}", tag, date, r.type_name()))
            .collect();
        return Err(FusionError::ImageType(format!(
            "The '{}' images must all have the same data type. Got {}",
            tag,
            types.join(", ")
        )));
    }
    Ok(())
}

fn check_mask(mask: &AnyRaster, width: usize, height: usize, channels: usize) -> FusionResult<&Mask> {
    if mask.width() != width || mask.height() != height {
        return Err(FusionError::Size(format!(
            "The mask has a wrong size: {}x{}, but the images have {}x{}",
            mask.width(),
            mask.height(),
            width,
            height
        )));
    }

    let typed = mask.as_raster::<u8>().ok_or_else(|| {
        FusionError::ImageType(format!(
            "The mask must be an 8-bit boolean image (u8 with 0 and 255), but has type {}",
            mask.element_type()
        ))
    })?;

    if mask.channels() != 1 && mask.channels() != channels {
        return Err(FusionError::ImageType(format!(
            "The mask must have either 1 channel or {} channels like the images, but has {}",
            channels,
            mask.channels()
        )));
    }

    Ok(typed)
}
