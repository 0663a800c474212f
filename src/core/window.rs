use crate::types::Rectangle;
use ndarray::Array2;

/// Region that has to be read to predict `prediction_area`: the area grown by
/// half a window on each side and clipped to the image.
pub fn find_sample_area(full: &Rectangle, prediction_area: &Rectangle, win_size: usize) -> Rectangle {
    prediction_area.expand(win_size / 2).intersect(full)
}

/// Window around `(x, y)` (image coordinates) clipped to `bounds`
pub fn clipped_window(x: usize, y: usize, half_window: usize, bounds: &Rectangle) -> Rectangle {
    Rectangle::new(x, y, 1, 1).expand(half_window).intersect(bounds)
}

/// Spatial distance decay table for a `win_size x win_size` window.
///
/// Entry at offset `(x, y)` from the center is `2 * sqrt(x² + y²) / win_size + 1`.
/// Only one octant is evaluated; the other seven are mirrored.
pub fn compute_distance_weights(win_size: usize) -> Array2<f64> {
    let center = win_size / 2;
    let mut weights = Array2::zeros((win_size, win_size));

    for y in 0..=center {
        for x in y..=center {
            let dist = 2.0 * ((x * x + y * y) as f64).sqrt() / win_size as f64 + 1.0;

            for (dx, dy) in [(x, y), (y, x)] {
                for (col, row) in [
                    (center + dx, center + dy),
                    (center - dx, center + dy),
                    (center + dx, center - dy),
                    (center - dx, center - dy),
                ] {
                    weights[[row, col]] = dist;
                }
            }
        }
    }

    weights
}
