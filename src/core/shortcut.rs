use crate::types::{mask_allows, Element};
use ndarray::{Array3, ArrayView3, ArrayViewMut3};

/// One reference pair cropped to the prediction area
#[derive(Debug, Clone, Copy)]
pub struct PairView<'a, T> {
    pub high: ArrayView3<'a, T>,
    pub low: ArrayView3<'a, T>,
}

/// Resolve pixels whose spectral or temporal difference is exactly zero.
///
/// All views cover the prediction area. Rules apply in this order, later ones
/// overwriting the value but never clearing the resolved flag:
/// 1. per pair, `low == high`: copy `low2`
/// 2. per pair, `low == low2`: copy the pair's `high`
/// 3. with two pairs and both temporal differences zero: mean of both `high`
///
/// Returns the resolved flags per pixel and channel.
pub fn copy_on_zero_diff<T: Element>(
    pairs: &[PairView<'_, T>],
    low2: &ArrayView3<'_, T>,
    mask: Option<&ArrayView3<'_, u8>>,
    output: &mut ArrayViewMut3<'_, T>,
) -> Array3<bool> {
    let (rows, cols, channels) = output.dim();
    let mut resolved = Array3::from_elem((rows, cols, channels), false);
    let mut copied = 0usize;

    for r in 0..rows {
        for col in 0..cols {
            for c in 0..channels {
                if let Some(m) = mask {
                    if !mask_allows(m, r, col, c) {
                        continue;
                    }
                }

                let l2 = low2[[r, col, c]];
                let mut zero_temporal = 0;
                for pair in pairs {
                    let h = pair.high[[r, col, c]];
                    let l1 = pair.low[[r, col, c]];

                    if (l1.as_f64() - h.as_f64()).abs() == 0.0 {
                        output[[r, col, c]] = l2;
                        resolved[[r, col, c]] = true;
                    }

                    if (l1.as_f64() - l2.as_f64()).abs() == 0.0 {
                        output[[r, col, c]] = h;
                        resolved[[r, col, c]] = true;
                        zero_temporal += 1;
                    }
                }

                if pairs.len() == 2 && zero_temporal == 2 {
                    let mean = (pairs[0].high[[r, col, c]].as_f64() + pairs[1].high[[r, col, c]].as_f64()) / 2.0;
                    output[[r, col, c]] = T::saturate_from_f64(mean);
                }

                if resolved[[r, col, c]] {
                    copied += 1;
                }
            }
        }
    }

    log::debug!(
        "Zero-difference shortcut resolved {} of {} pixel values",
        copied,
        rows * cols * channels
    );
    resolved
}
