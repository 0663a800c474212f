use crate::core::statistics::channel_std_dev;
use crate::core::window::clipped_window;
use crate::types::{mask_allows, Element, Rectangle};
use ndarray::{s, Array2, Array3, ArrayView3, ArrayViewMut3, Zip};

/// Per-pair rasters over the sample area, promoted to `f64`
#[derive(Debug, Clone)]
pub struct PairData {
    /// High resolution image at the pair date
    pub high: Array3<f64>,
    /// `high + low2 - low`: the candidate contribution
    pub local_value: Array3<f64>,
    /// `|low - low2|`
    pub temporal_diff: Array3<f64>,
    /// `|low - high|`
    pub spectral_diff: Array3<f64>,
    /// Global class tolerance per channel
    pub tolerance: Vec<f64>,
}

impl PairData {
    /// Derive the per-pair rasters from views cropped to the sample area
    pub fn new<T: Element>(
        high: &ArrayView3<'_, T>,
        low: &ArrayView3<'_, T>,
        low2: &ArrayView3<'_, T>,
        tolerance: Vec<f64>,
    ) -> Self {
        let high = high.mapv(|v| v.as_f64());
        let low = low.mapv(|v| v.as_f64());
        let low2 = low2.mapv(|v| v.as_f64());

        let mut local_value = Array3::zeros(high.dim());
        let mut temporal_diff = Array3::zeros(high.dim());
        let mut spectral_diff = Array3::zeros(high.dim());
        Zip::from(&mut local_value)
            .and(&mut temporal_diff)
            .and(&mut spectral_diff)
            .and(&high)
            .and(&low)
            .and(&low2)
            .for_each(|lv, dt, ds, &h, &l1, &l2| {
                *lv = h + l2 - l1;
                *dt = (l1 - l2).abs();
                *ds = (l1 - h).abs();
            });

        Self {
            high,
            local_value,
            temporal_diff,
            spectral_diff,
            tolerance,
        }
    }
}

/// Class tolerance from a standard deviation: `2 * stddev / number_classes`
pub fn class_tolerance(std_dev: f64, number_classes: f64) -> f64 {
    2.0 * std_dev / number_classes
}

/// Run-constant parameters of the candidate search
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub half_window: usize,
    pub number_classes: f64,
    pub use_local_tol: bool,
    pub use_strict_filtering: bool,
    /// Temporal difference is used for weighting in this run
    pub use_temp_diff: bool,
    pub log_scale_factor: f64,
    pub sigma_dt: f64,
    pub sigma_ds: f64,
    pub sigma_combined: f64,
    pub data_range: Option<(f64, f64)>,
}

impl SearchParams {
    /// Combine temporal and spectral uncertainties into the difference thresholds
    pub fn uncertainties(sigma_t: f64, sigma_s: f64) -> (f64, f64, f64) {
        let sigma_dt = sigma_t * std::f64::consts::SQRT_2;
        let sigma_ds = (sigma_t * sigma_t + sigma_s * sigma_s).sqrt();
        let sigma_combined = (sigma_ds * sigma_ds + sigma_dt * sigma_dt).sqrt();
        (sigma_dt, sigma_ds, sigma_combined)
    }

    /// Weight of one accepted candidate
    pub fn candidate_weight(&self, dt: f64, ds: f64, spatial: f64) -> f64 {
        let dt = if self.use_temp_diff { dt } else { 0.0 };
        if self.log_scale_factor > 0.0 {
            let k = self.log_scale_factor;
            return 1.0 / ((2.0 + dt * k).ln() * (2.0 + ds * k).ln() * spatial);
        }

        let combined = (1.0 + dt) * (1.0 + ds);
        if combined >= self.sigma_combined {
            1.0 / (spatial * combined)
        } else {
            1.0
        }
    }

    /// Validity test against the center thresholds
    pub fn rejects(&self, dt: f64, ds: f64, dt_center: f64, ds_center: f64) -> bool {
        if self.use_strict_filtering {
            dt >= dt_center || ds >= ds_center
        } else {
            dt >= dt_center && ds >= ds_center
        }
    }
}

/// Weighted moving-window prediction for all unresolved pixels.
///
/// `sample` and `prediction` are in image coordinates; the pair rasters and
/// `mask` cover `sample`, while `resolved` and `output` cover `prediction`.
#[allow(clippy::too_many_arguments)]
pub fn predict_window<T: Element>(
    pairs: &[PairData],
    distance_weights: &Array2<f64>,
    sample: &Rectangle,
    prediction: &Rectangle,
    mask: Option<&ArrayView3<'_, u8>>,
    resolved: Option<&Array3<bool>>,
    params: &SearchParams,
    output: &mut ArrayViewMut3<'_, T>,
) {
    let channels = output.dim().2;
    let half = params.half_window;
    let local_sample = Rectangle::from_size(sample.width, sample.height);
    let mut fallbacks = 0usize;
    let mut predicted = 0usize;

    for out_y in 0..prediction.height {
        for out_x in 0..prediction.width {
            // center in sample-area coordinates
            let cx = prediction.x + out_x - sample.x;
            let cy = prediction.y + out_y - sample.y;
            let window = clipped_window(cx, cy, half, &local_sample);

            for c in 0..channels {
                if resolved.map_or(false, |r| r[[out_y, out_x, c]]) {
                    continue;
                }
                if let Some(m) = mask {
                    if !mask_allows(m, cy, cx, c) {
                        continue;
                    }
                }

                let value = match predict_value(pairs, distance_weights, &window, cx, cy, c, mask, params) {
                    Some(v) => v,
                    None => {
                        fallbacks += 1;
                        pairs.iter().map(|p| p.local_value[[cy, cx, c]]).sum::<f64>() / pairs.len() as f64
                    }
                };

                let value = match params.data_range {
                    Some((min, max)) => value.clamp(min, max),
                    None => value,
                };
                output[[out_y, out_x, c]] = T::saturate_from_f64(value);
                predicted += 1;
            }
        }
    }

    log::debug!(
        "Candidate search predicted {} pixel values ({} without candidates)",
        predicted,
        fallbacks
    );
}

/// Weighted estimate at `(cx, cy)` for channel `c`, or `None` without any candidate
#[allow(clippy::too_many_arguments)]
fn predict_value(
    pairs: &[PairData],
    distance_weights: &Array2<f64>,
    window: &Rectangle,
    cx: usize,
    cy: usize,
    c: usize,
    mask: Option<&ArrayView3<'_, u8>>,
    params: &SearchParams,
) -> Option<f64> {
    let half = params.half_window;

    // the tighter of the pairs' thresholds wins
    let dt_center = pairs
        .iter()
        .map(|p| p.temporal_diff[[cy, cx, c]] + params.sigma_dt)
        .fold(f64::INFINITY, f64::min);
    let ds_center = pairs
        .iter()
        .map(|p| p.spectral_diff[[cy, cx, c]] + params.sigma_ds)
        .fold(f64::INFINITY, f64::min);

    let window_mask = mask.map(|m| {
        m.slice(s![
            window.y..window.bottom(),
            window.x..window.right(),
            ..
        ])
    });

    let mut has_candidate = false;
    let mut sum_weights = 0.0;
    let mut weighted_sum = 0.0;

    for pair in pairs {
        let center_high = pair.high[[cy, cx, c]];
        let tolerance = if params.use_local_tol {
            let window_high = pair
                .high
                .slice(s![window.y..window.bottom(), window.x..window.right(), ..]);
            class_tolerance(
                channel_std_dev(&window_high, window_mask.as_ref(), c),
                params.number_classes,
            )
        } else {
            pair.tolerance[c]
        };

        for wy in window.y..window.bottom() {
            for wx in window.x..window.right() {
                if let Some(m) = mask {
                    if !mask_allows(m, wy, wx, c) {
                        continue;
                    }
                }

                if (center_high - pair.high[[wy, wx, c]]).abs() >= tolerance {
                    continue;
                }

                let dt = pair.temporal_diff[[wy, wx, c]];
                let ds = pair.spectral_diff[[wy, wx, c]];
                if params.rejects(dt, ds, dt_center, ds_center) {
                    continue;
                }

                has_candidate = true;
                let spatial = distance_weights[[wy + half - cy, wx + half - cx]];
                let weight = params.candidate_weight(dt, ds, spatial);
                sum_weights += weight;
                weighted_sum += weight * pair.local_value[[wy, wx, c]];
            }
        }
    }

    if has_candidate {
        Some(weighted_sum / sum_weights)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::window::compute_distance_weights;
    use crate::types::Raster;
    use approx::assert_relative_eq;

    fn params(half_window: usize) -> SearchParams {
        let (sigma_dt, sigma_ds, sigma_combined) = SearchParams::uncertainties(1.0, 1.0);
        SearchParams {
            half_window,
            number_classes: 4.0,
            use_local_tol: false,
            use_strict_filtering: true,
            use_temp_diff: false,
            log_scale_factor: 0.0,
            sigma_dt,
            sigma_ds,
            sigma_combined,
            data_range: None,
        }
    }

    #[test]
    fn test_uncertainty_combination() {
        let (dt, ds, combined) = SearchParams::uncertainties(3.0, 4.0);
        assert_relative_eq!(dt, 3.0 * 2f64.sqrt());
        assert_relative_eq!(ds, 5.0);
        assert_relative_eq!(combined, 43f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_filtering_modes() {
        let mut p = params(1);
        assert!(p.rejects(2.0, 0.5, 1.0, 1.0));
        assert!(!p.rejects(0.5, 0.5, 1.0, 1.0));
        p.use_strict_filtering = false;
        assert!(!p.rejects(2.0, 0.5, 1.0, 1.0));
        assert!(p.rejects(2.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_candidate_weights() {
        let mut p = params(1);
        // (1 + 0) * (1 + 0) < sigma_combined = 2
        assert_relative_eq!(p.candidate_weight(0.0, 0.0, 1.4), 1.0);
        assert_relative_eq!(p.candidate_weight(0.0, 3.0, 1.5), 1.0 / 6.0);
        // temporal difference ignored unless enabled
        assert_relative_eq!(p.candidate_weight(5.0, 3.0, 1.5), 1.0 / 6.0);
        p.use_temp_diff = true;
        assert_relative_eq!(p.candidate_weight(1.0, 3.0, 1.5), 1.0 / 12.0);

        p.log_scale_factor = 2.0;
        let expected = 1.0 / ((2.0f64 + 2.0).ln() * (2.0f64 + 6.0).ln() * 1.5);
        assert_relative_eq!(p.candidate_weight(1.0, 3.0, 1.5), expected);
    }

    #[test]
    fn test_single_pixel_window_yields_local_value() {
        let high = Raster::<u8>::from_fn(3, 3, 1, |x, y, _| (10 + x + 3 * y) as u8);
        let low = Raster::<u8>::from_fn(3, 3, 1, |x, _, _| (12 + x) as u8);
        let low2 = Raster::<u8>::from_fn(3, 3, 1, |_, y, _| (30 + 2 * y) as u8);

        let pair = PairData::new(&high.view(), &low.view(), &low2.view(), vec![class_tolerance(2.0, 4.0)]);
        let area = high.rect();
        let mut out = Raster::<u8>::new(3, 3, 1);
        predict_window(
            &[pair],
            &compute_distance_weights(1),
            &area,
            &area,
            None,
            None,
            &params(0),
            &mut out.crop_mut(&area).unwrap(),
        );

        for y in 0..3 {
            for x in 0..3 {
                let expected = (10 + x + 3 * y) + (30 + 2 * y) - (12 + x);
                assert_eq!(out.get(x, y, 0) as usize, expected);
            }
        }
    }

    #[test]
    fn test_similar_neighbours_are_weighted() {
        // the left neighbour is a different class; the right one passes only the temporal test
        let high = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [50.0, 10.0, 13.0][x]);
        let low = Raster::<f32>::from_elem(3, 1, 1, 10.0);
        let low2 = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [14.0, 12.0, 11.0][x]);

        let pair = PairData::new(&high.view(), &low.view(), &low2.view(), vec![5.0]);
        let area = high.rect();
        let target = Rectangle::new(1, 0, 1, 1);
        let weights = compute_distance_weights(3);

        let mut lenient = params(1);
        lenient.use_strict_filtering = false;
        let mut out = Raster::<f32>::new(3, 1, 1);
        predict_window(
            &[pair.clone()],
            &weights,
            &area,
            &target,
            None,
            None,
            &lenient,
            &mut out.crop_mut(&target).unwrap(),
        );

        // center: local value 12, weight 1; right: local value 14, ds = 3
        let w = 1.0 / ((2.0 / 3.0 + 1.0) * 4.0);
        let expected = (12.0 + w * 14.0) / (1.0 + w);
        assert_relative_eq!(out.get(1, 0, 0) as f64, expected, epsilon = 1e-5);
        assert_eq!(out.get(0, 0, 0), 0.0);

        predict_window(
            &[pair],
            &weights,
            &area,
            &target,
            None,
            None,
            &params(1),
            &mut out.crop_mut(&target).unwrap(),
        );
        assert_relative_eq!(out.get(1, 0, 0), 12.0);
    }

    #[test]
    fn test_masked_neighbours_are_not_candidates() {
        // same layout as above: lenient filtering would accept the right neighbour
        let high = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [50.0, 10.0, 13.0][x]);
        let low = Raster::<f32>::from_elem(3, 1, 1, 10.0);
        let low2 = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [14.0, 12.0, 11.0][x]);
        let pair = PairData::new(&high.view(), &low.view(), &low2.view(), vec![5.0]);
        let mask = Raster::<u8>::from_fn(3, 1, 1, |x, _, _| if x == 2 { 0 } else { 255 });

        let area = high.rect();
        let target = Rectangle::new(1, 0, 1, 1);
        let mut lenient = params(1);
        lenient.use_strict_filtering = false;

        let mut out = Raster::<f32>::new(3, 1, 1);
        predict_window(
            &[pair],
            &compute_distance_weights(3),
            &area,
            &target,
            Some(&mask.view()),
            None,
            &lenient,
            &mut out.crop_mut(&target).unwrap(),
        );
        assert_relative_eq!(out.get(1, 0, 0), 12.0);
    }

    #[test]
    fn test_double_pair_uses_tighter_center_thresholds() {
        let low2 = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [50.0, 20.0, 50.0][x]);

        // center dt = ds = 0, neighbours far off in time; center local value 20
        let high_a = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [10.0, 20.0, 10.0][x]);
        let low_a = high_a.clone();
        // center dt = ds = 5; right neighbour dt = ds = 3 only passes the looser thresholds
        let high_b = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [10.0, 30.0, 50.0][x]);
        let low_b = Raster::<f32>::from_fn(3, 1, 1, |x, _, _| [10.0, 25.0, 47.0][x]);

        let pair_a = PairData::new(&high_a.view(), &low_a.view(), &low2.view(), vec![100.0]);
        let pair_b = PairData::new(&high_b.view(), &low_b.view(), &low2.view(), vec![100.0]);

        let area = low2.rect();
        let target = Rectangle::new(1, 0, 1, 1);
        let mut out = Raster::<f32>::new(3, 1, 1);
        predict_window(
            &[pair_b, pair_a],
            &compute_distance_weights(3),
            &area,
            &target,
            None,
            None,
            &params(1),
            &mut out.crop_mut(&target).unwrap(),
        );

        // only pair A's center survives thresholds of sqrt(2)
        assert_relative_eq!(out.get(1, 0, 0), 20.0);
    }

    #[test]
    fn test_double_pair_without_candidates_averages_centers() {
        let high_a = Raster::<f32>::from_elem(3, 1, 1, 10.0);
        let high_b = Raster::<f32>::from_elem(3, 1, 1, 11.0);
        let low = Raster::<f32>::from_elem(3, 1, 1, 12.0);
        let low2 = Raster::<f32>::from_elem(3, 1, 1, 20.0);

        // zero tolerance rejects every location, the center included
        let pair_a = PairData::new(&high_a.view(), &low.view(), &low2.view(), vec![0.0]);
        let pair_b = PairData::new(&high_b.view(), &low.view(), &low2.view(), vec![0.0]);

        let area = low.rect();
        let mut out = Raster::<f32>::new(3, 1, 1);
        predict_window(
            &[pair_a, pair_b],
            &compute_distance_weights(3),
            &area,
            &area,
            None,
            None,
            &params(1),
            &mut out.crop_mut(&area).unwrap(),
        );

        for x in 0..3 {
            assert_relative_eq!(out.get(x, 0, 0), 18.5);
        }
    }

    #[test]
    fn test_resolved_and_masked_pixels_are_skipped() {
        let high = Raster::<u8>::from_elem(2, 1, 1, 10);
        let low = Raster::<u8>::from_elem(2, 1, 1, 12);
        let low2 = Raster::<u8>::from_elem(2, 1, 1, 20);
        let pair = PairData::new(&high.view(), &low.view(), &low2.view(), vec![1.0]);

        let mut resolved = Array3::from_elem((1, 2, 1), false);
        resolved[[0, 0, 0]] = true;
        let mask = Raster::<u8>::from_elem(2, 1, 1, 255);

        let area = high.rect();
        let mut out = Raster::<u8>::from_elem(2, 1, 1, 7);
        predict_window(
            &[pair],
            &compute_distance_weights(3),
            &area,
            &area,
            Some(&mask.view()),
            Some(&resolved),
            &params(1),
            &mut out.crop_mut(&area).unwrap(),
        );

        assert_eq!(out.get(0, 0, 0), 7);
        assert_eq!(out.get(1, 0, 0), 18);
    }
}
