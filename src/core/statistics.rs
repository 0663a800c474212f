use crate::types::{mask_allows, Element};
use ndarray::ArrayView3;

/// Per-channel mean and population standard deviation of `view`.
///
/// Only locations where `mask` allows the channel are counted; a single-channel
/// mask applies to all channels. Channels without valid samples yield `(0, 0)`.
pub fn mean_std_dev<T: Element>(view: &ArrayView3<'_, T>, mask: Option<&ArrayView3<'_, u8>>) -> Vec<(f64, f64)> {
    let (rows, cols, channels) = view.dim();
    (0..channels)
        .map(|c| {
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            let mut count = 0usize;
            for r in 0..rows {
                for col in 0..cols {
                    if let Some(m) = mask {
                        if !mask_allows(m, r, col, c) {
                            continue;
                        }
                    }
                    let v = view[[r, col, c]].as_f64();
                    sum += v;
                    sum_sq += v * v;
                    count += 1;
                }
            }
            if count == 0 {
                return (0.0, 0.0);
            }
            let mean = sum / count as f64;
            let variance = (sum_sq / count as f64) - mean * mean;
            (mean, variance.max(0.0).sqrt())
        })
        .collect()
}

/// Standard deviation of one channel of `view`, honouring `mask`
pub fn channel_std_dev(view: &ArrayView3<'_, f64>, mask: Option<&ArrayView3<'_, u8>>, channel: usize) -> f64 {
    let (rows, cols, _) = view.dim();
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for r in 0..rows {
        for c in 0..cols {
            if mask.map_or(true, |m| mask_allows(m, r, c, channel)) {
                let v = view[[r, c, channel]];
                sum += v;
                sum_sq += v * v;
                count += 1;
            }
        }
    }
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    ((sum_sq / count as f64) - mean * mean).max(0.0).sqrt()
}
