use crate::core::options::StarfmOptions;
use crate::core::predict::{class_tolerance, predict_window, PairData, SearchParams};
use crate::core::shortcut::{copy_on_zero_diff, PairView};
use crate::core::statistics::mean_std_dev;
use crate::core::validate::{check_input_images, InputImages};
use crate::core::window::{compute_distance_weights, find_sample_area};
use crate::io::ImageSet;
use crate::types::{AnyRaster, Element, ElementType, FusionError, FusionResult, Raster, Rectangle};

/// STARFM fusor: predicts a high resolution image at an intermediate date from
/// one or two high/low resolution reference pairs.
///
/// The output raster is kept between calls. Pixels excluded by the mask are
/// left as they were, as long as the existing output still matches the
/// prediction area and image type.
pub struct StarfmFusor<'a> {
    images: &'a ImageSet,
    options: StarfmOptions,
    output: Option<AnyRaster>,
}

impl<'a> StarfmFusor<'a> {
    /// Create a fusor over `images`, validating `options`
    pub fn new(images: &'a ImageSet, options: StarfmOptions) -> FusionResult<Self> {
        options.validate()?;
        Ok(Self {
            images,
            options,
            output: None,
        })
    }

    /// Replace the options after validating them
    pub fn process_options(&mut self, options: StarfmOptions) -> FusionResult<()> {
        options.validate()?;
        log::debug!("STARFM options: {:?}", options);
        self.options = options;
        Ok(())
    }

    pub fn options(&self) -> &StarfmOptions {
        &self.options
    }

    pub fn output(&self) -> Option<&AnyRaster> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<AnyRaster> {
        self.output.take()
    }

    /// Provide an output raster to be (partially) overwritten by `predict`
    pub fn set_output(&mut self, output: AnyRaster) {
        self.output = Some(output);
    }

    /// Predict the high resolution image at `date2`.
    ///
    /// `mask` (u8, 0/255, 1 or C channels, full image size) restricts both the
    /// pixels that are predicted and the window locations used as candidates.
    /// On error the output is left unchanged.
    pub fn predict(&mut self, date2: i32, mask: Option<&AnyRaster>) -> FusionResult<()> {
        let inputs = check_input_images(self.images, &self.options, date2, mask)?;

        let full = inputs.rect();
        let prediction = self.options.prediction_area.unwrap_or(full);
        let sample = find_sample_area(&full, &prediction, self.options.win_size);

        log::info!(
            "Predicting date {} from {} pair(s): prediction area {}, sample area {}",
            date2,
            if inputs.pair3.is_some() { 2 } else { 1 },
            prediction,
            sample
        );

        let mut output = match self.output.take() {
            Some(existing)
                if existing.element_type() == inputs.element_type()
                    && existing.channels() == inputs.channels()
                    && existing.width() == prediction.width
                    && existing.height() == prediction.height =>
            {
                existing
            }
            _ => AnyRaster::zeros(
                inputs.element_type(),
                prediction.width,
                prediction.height,
                inputs.channels(),
            ),
        };

        let result = match inputs.element_type() {
            ElementType::U8 => self.predict_typed::<u8>(&inputs, &prediction, &sample, &mut output),
            ElementType::I8 => self.predict_typed::<i8>(&inputs, &prediction, &sample, &mut output),
            ElementType::U16 => self.predict_typed::<u16>(&inputs, &prediction, &sample, &mut output),
            ElementType::I16 => self.predict_typed::<i16>(&inputs, &prediction, &sample, &mut output),
            ElementType::I32 => self.predict_typed::<i32>(&inputs, &prediction, &sample, &mut output),
            ElementType::F32 => self.predict_typed::<f32>(&inputs, &prediction, &sample, &mut output),
            ElementType::F64 => self.predict_typed::<f64>(&inputs, &prediction, &sample, &mut output),
        };

        self.output = Some(output);
        result?;
        log::info!("STARFM prediction for date {} completed", date2);
        Ok(())
    }

    fn predict_typed<T: Element>(
        &self,
        inputs: &InputImages<'_>,
        prediction: &Rectangle,
        sample: &Rectangle,
        output: &mut AnyRaster,
    ) -> FusionResult<()> {
        let high1 = typed::<T>(inputs.high1)?;
        let low1 = typed::<T>(inputs.low1)?;
        let low2 = typed::<T>(inputs.low2)?;
        let mut pairs = vec![(high1, low1)];
        if let Some((high3, low3)) = inputs.pair3 {
            pairs.push((typed::<T>(high3)?, typed::<T>(low3)?));
        }
        let output = output.as_raster_mut::<T>().ok_or_else(|| {
            FusionError::ImageType(format!("Output raster is not of type {}", T::ELEMENT_TYPE))
        })?;
        let mut output = output.crop_mut(&Rectangle::from_size(prediction.width, prediction.height))?;

        let resolved = if self.options.do_copy_on_zero_diff {
            let views = pairs
                .iter()
                .map(|(high, low)| {
                    Ok(PairView {
                        high: high.crop(prediction)?,
                        low: low.crop(prediction)?,
                    })
                })
                .collect::<FusionResult<Vec<_>>>()?;
            let mask = inputs.mask.map(|m| m.crop(prediction)).transpose()?;
            Some(copy_on_zero_diff(&views, &low2.crop(prediction)?, mask.as_ref(), &mut output))
        } else {
            log::debug!("Zero-difference shortcut disabled");
            None
        };

        let full_mask = inputs.mask.map(|m| m.view());
        let low2_sample = low2.crop(sample)?;
        let pair_data = pairs
            .iter()
            .map(|(high, low)| {
                let tolerance = mean_std_dev(&high.view(), full_mask.as_ref())
                    .into_iter()
                    .map(|(_, std_dev)| class_tolerance(std_dev, self.options.number_classes))
                    .collect();
                Ok(PairData::new(&high.crop(sample)?, &low.crop(sample)?, &low2_sample, tolerance))
            })
            .collect::<FusionResult<Vec<_>>>()?;

        let (sigma_dt, sigma_ds, sigma_combined) =
            SearchParams::uncertainties(self.options.temporal_uncertainty, self.options.spectral_uncertainty);
        let params = SearchParams {
            half_window: self.options.half_window(),
            number_classes: self.options.number_classes,
            use_local_tol: self.options.use_local_tol,
            use_strict_filtering: self.options.use_strict_filtering,
            use_temp_diff: self
                .options
                .use_temp_diff_for_weights
                .is_enabled(self.options.is_double_pair()),
            log_scale_factor: self.options.log_scale_factor,
            sigma_dt,
            sigma_ds,
            sigma_combined,
            data_range: self.options.data_range,
        };
        log::debug!("Search parameters: {:?}", params);

        let distance_weights = compute_distance_weights(self.options.win_size);
        let sample_mask = inputs.mask.map(|m| m.crop(sample)).transpose()?;
        predict_window(
            &pair_data,
            &distance_weights,
            sample,
            prediction,
            sample_mask.as_ref(),
            resolved.as_ref(),
            &params,
            &mut output,
        );

        Ok(())
    }
}

fn typed<T: Element>(raster: &AnyRaster) -> FusionResult<&Raster<T>> {
    raster.as_raster::<T>().ok_or_else(|| {
        FusionError::ImageType(format!(
            "Expected a {} image, got {}",
            T::ELEMENT_TYPE,
            raster.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_set<T: Element>(high1: T, low1: T, low2: T) -> ImageSet {
        let mut images = ImageSet::new();
        images.insert("high", 1, Raster::from_elem(5, 5, 1, high1));
        images.insert("low", 1, Raster::from_elem(5, 5, 1, low1));
        images.insert("low", 2, Raster::from_elem(5, 5, 1, low2));
        images
    }

    #[test]
    fn test_predict_allocates_output_of_prediction_area() {
        let images = constant_set::<u16>(100, 110, 130);
        let mut options = StarfmOptions::single_pair(1);
        options.win_size = 3;
        options.prediction_area = Some(Rectangle::new(1, 2, 3, 2));

        let mut fusor = StarfmFusor::new(&images, options).unwrap();
        assert!(fusor.output().is_none());
        fusor.predict(2, None).unwrap();

        let output = fusor.output().unwrap();
        assert_eq!(output.width(), 3);
        assert_eq!(output.height(), 2);
        assert_eq!(output.element_type(), ElementType::U16);
        let typed = output.as_raster::<u16>().unwrap();
        assert!(typed.array().iter().all(|&v| v == 120));
    }

    #[test]
    fn test_failed_validation_keeps_output() {
        let images = constant_set::<u8>(10, 10, 20);
        let mut fusor = StarfmFusor::new(&images, StarfmOptions::single_pair(1)).unwrap();
        fusor.set_output(Raster::<u8>::from_elem(5, 5, 1, 42).into());

        assert!(matches!(fusor.predict(7, None), Err(FusionError::NotFound(_))));
        let output = fusor.output().unwrap().as_raster::<u8>().unwrap();
        assert_eq!(output.get(0, 0, 0), 42);
    }

    #[test]
    fn test_process_options_rejects_invalid() {
        let images = constant_set::<u8>(10, 10, 20);
        let mut fusor = StarfmFusor::new(&images, StarfmOptions::single_pair(1)).unwrap();

        let mut invalid = StarfmOptions::single_pair(1);
        invalid.number_classes = 0.0;
        assert!(fusor.process_options(invalid).is_err());
        assert_eq!(fusor.options().number_classes, 4.0);

        assert!(matches!(
            StarfmFusor::new(&images, StarfmOptions::default()),
            Err(FusionError::Configuration(_))
        ));
    }

    #[test]
    fn test_mismatching_output_is_reallocated() {
        let images = constant_set::<f32>(0.5, 0.25, 0.75);
        let mut fusor = StarfmFusor::new(&images, StarfmOptions::single_pair(1)).unwrap();
        fusor.set_output(Raster::<u8>::from_elem(2, 2, 1, 9).into());

        fusor.predict(2, None).unwrap();
        let output = fusor.take_output().unwrap();
        assert_eq!(output.type_name(), "f32x1");
        assert_eq!(output.as_raster::<f32>().unwrap().get(4, 4, 0), 1.0);
        assert!(fusor.output().is_none());
    }
}
