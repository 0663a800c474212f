//! STARFM fusion engine

pub mod options;
pub mod validate;
pub mod window;
pub mod statistics;
pub mod shortcut;
pub mod predict;
pub mod starfm;
pub mod parallel;

// Re-export main types
pub use options::{StarfmOptions, TempDiffWeighting};
pub use validate::{check_input_images, InputImages};
pub use window::{compute_distance_weights, find_sample_area};
pub use statistics::mean_std_dev;
pub use shortcut::{copy_on_zero_diff, PairView};
pub use predict::{PairData, SearchParams};
pub use starfm::StarfmFusor;
pub use parallel::{predict_parallel, split_into_bands};
