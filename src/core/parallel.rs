use crate::core::options::StarfmOptions;
use crate::core::starfm::StarfmFusor;
use crate::core::validate::check_input_images;
use crate::io::ImageSet;
use crate::types::{AnyRaster, FusionError, FusionResult, Rectangle};

/// Split `area` into at most `num_bands` row bands of near-equal height
pub fn split_into_bands(area: &Rectangle, num_bands: usize) -> Vec<Rectangle> {
    let num_bands = num_bands.clamp(1, area.height.max(1));
    let band_height = (area.height + num_bands - 1) / num_bands;
    (0..area.height)
        .step_by(band_height.max(1))
        .map(|offset| {
            let height = band_height.min(area.height - offset);
            Rectangle::new(area.x, area.y + offset, area.width, height)
        })
        .collect()
}

/// Predict `date2` by running an independent fusor per row band of the
/// prediction area and assembling the bands into one output.
///
/// Inputs are validated once up front. Pixels excluded by `mask` are zero in
/// the assembled output.
pub fn predict_parallel(
    images: &ImageSet,
    options: &StarfmOptions,
    date2: i32,
    mask: Option<&AnyRaster>,
    num_bands: usize,
) -> FusionResult<AnyRaster> {
    options.validate()?;
    let inputs = check_input_images(images, options, date2, mask)?;
    let prediction = options.prediction_area.unwrap_or_else(|| inputs.rect());
    let bands = split_into_bands(&prediction, num_bands);

    log::info!(
        "Predicting date {} in {} row bands of {}",
        date2,
        bands.len(),
        prediction
    );

    let band_outputs = predict_bands(images, options, date2, mask, &bands)?;

    let mut output = AnyRaster::zeros(
        inputs.element_type(),
        prediction.width,
        prediction.height,
        inputs.channels(),
    );
    for (band, band_output) in bands.iter().zip(band_outputs.iter()) {
        output.paste(band_output, 0, band.y - prediction.y)?;
    }

    log::info!("Row band prediction for date {} completed", date2);
    Ok(output)
}

fn predict_band(
    images: &ImageSet,
    options: &StarfmOptions,
    date2: i32,
    mask: Option<&AnyRaster>,
    band: &Rectangle,
) -> FusionResult<AnyRaster> {
    let band_options = StarfmOptions {
        prediction_area: Some(*band),
        ..options.clone()
    };
    let mut fusor = StarfmFusor::new(images, band_options)?;
    fusor.predict(date2, mask)?;
    fusor
        .take_output()
        .ok_or_else(|| FusionError::Size(format!("No output produced for band {}", band)))
}

#[cfg(feature = "parallel")]
fn predict_bands(
    images: &ImageSet,
    options: &StarfmOptions,
    date2: i32,
    mask: Option<&AnyRaster>,
    bands: &[Rectangle],
) -> FusionResult<Vec<AnyRaster>> {
    use rayon::prelude::*;

    log::debug!("Running {} bands on {} threads", bands.len(), rayon::current_num_threads());
    bands
        .par_iter()
        .map(|band| predict_band(images, options, date2, mask, band))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn predict_bands(
    images: &ImageSet,
    options: &StarfmOptions,
    date2: i32,
    mask: Option<&AnyRaster>,
    bands: &[Rectangle],
) -> FusionResult<Vec<AnyRaster>> {
    bands
        .iter()
        .map(|band| predict_band(images, options, date2, mask, band))
        .collect()
}
