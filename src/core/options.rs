use crate::types::{FusionError, FusionResult, Rectangle};
use serde::{Deserialize, Serialize};

/// When the temporal difference contributes to candidate weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempDiffWeighting {
    /// Temporal difference is ignored for weighting
    Disable,
    /// Temporal difference is always used
    Enable,
    /// Temporal difference is used only with two reference pairs
    OnDoublePair,
}

impl TempDiffWeighting {
    /// Resolve the setting for a concrete run
    pub fn is_enabled(self, double_pair: bool) -> bool {
        match self {
            TempDiffWeighting::Disable => false,
            TempDiffWeighting::Enable => true,
            TempDiffWeighting::OnDoublePair => double_pair,
        }
    }
}

/// STARFM prediction options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarfmOptions {
    /// Date of the first reference pair (required)
    pub date1: Option<i32>,
    /// Date of the second reference pair; enables double-pair mode
    pub date3: Option<i32>,
    /// Resolution tag of the high resolution images
    pub high_tag: String,
    /// Resolution tag of the low resolution images
    pub low_tag: String,
    /// Moving window size in pixels (must be odd)
    pub win_size: usize,
    /// Number of classes used for the similarity tolerance (>= 1)
    pub number_classes: f64,
    /// Region to predict; `None` predicts the full image
    pub prediction_area: Option<Rectangle>,
    /// Temporal uncertainty sigma_t, in image units
    pub temporal_uncertainty: f64,
    /// Spectral uncertainty sigma_s, in image units
    pub spectral_uncertainty: f64,
    /// Relative uncertainty used by the ESTARFM regression
    pub uncertainty_factor: f64,
    /// Use window-local instead of global statistics for the class tolerance
    pub use_local_tol: bool,
    /// ESTARFM regression weighting; carried for compatibility
    pub use_quality_weighted_regression: bool,
    /// Require candidates to pass both the temporal and the spectral test
    pub use_strict_filtering: bool,
    pub use_temp_diff_for_weights: TempDiffWeighting,
    /// Log-scale factor for the weights; values <= 0 select the linear formula
    pub log_scale_factor: f64,
    /// Copy source values directly where spectral or temporal difference is zero
    pub do_copy_on_zero_diff: bool,
    /// Valid output value range; predictions are clamped into it
    pub data_range: Option<(f64, f64)>,
}

impl Default for StarfmOptions {
    fn default() -> Self {
        Self {
            date1: None,
            date3: None,
            high_tag: "high".to_string(),
            low_tag: "low".to_string(),
            win_size: 51,
            number_classes: 4.0,
            prediction_area: None,
            temporal_uncertainty: 1.0,
            spectral_uncertainty: 1.0,
            uncertainty_factor: 0.002,
            use_local_tol: false,
            use_quality_weighted_regression: false,
            use_strict_filtering: true,
            use_temp_diff_for_weights: TempDiffWeighting::OnDoublePair,
            log_scale_factor: 0.0,
            do_copy_on_zero_diff: true,
            data_range: None,
        }
    }
}

impl StarfmOptions {
    /// Options for a single reference pair at `date1`
    pub fn single_pair(date1: i32) -> Self {
        Self {
            date1: Some(date1),
            ..Self::default()
        }
    }

    /// Options for two reference pairs at `date1` and `date3`
    pub fn double_pair(date1: i32, date3: i32) -> Self {
        Self {
            date1: Some(date1),
            date3: Some(date3),
            ..Self::default()
        }
    }

    /// Set the window size, rejecting even values
    pub fn set_win_size(&mut self, win_size: usize) -> FusionResult<()> {
        if win_size % 2 == 0 {
            return Err(FusionError::InvalidArgument(format!(
                "Window size must be odd, got {}",
                win_size
            )));
        }
        self.win_size = win_size;
        Ok(())
    }

    /// Set the number of classes, rejecting values below one
    pub fn set_number_classes(&mut self, number_classes: f64) -> FusionResult<()> {
        if !(number_classes >= 1.0) {
            return Err(FusionError::InvalidArgument(format!(
                "Number of classes must be at least 1, got {}",
                number_classes
            )));
        }
        self.number_classes = number_classes;
        Ok(())
    }

    /// First pair date, failing if it was never set
    pub fn date1(&self) -> FusionResult<i32> {
        self.date1.ok_or_else(|| {
            FusionError::Configuration("The date of the first input pair (date1) has not been set".to_string())
        })
    }

    pub fn is_double_pair(&self) -> bool {
        self.date3.is_some()
    }

    pub fn half_window(&self) -> usize {
        self.win_size / 2
    }

    /// Check all invariants of the option set
    pub fn validate(&self) -> FusionResult<()> {
        self.date1()?;

        if self.high_tag == self.low_tag {
            return Err(FusionError::Configuration(format!(
                "The resolution tags for the input pairs have to be different. You chose '{}' for both",
                self.high_tag
            )));
        }

        if self.win_size % 2 == 0 {
            return Err(FusionError::Configuration(format!(
                "Window size must be odd, got {}",
                self.win_size
            )));
        }

        if !(self.number_classes >= 1.0) {
            return Err(FusionError::Configuration(format!(
                "Number of classes must be at least 1, got {}",
                self.number_classes
            )));
        }

        if let Some((min, max)) = self.data_range {
            if !(min <= max) {
                return Err(FusionError::Configuration(format!(
                    "Invalid data range [{}, {}]",
                    min, max
                )));
            }
        }

        if self.temporal_uncertainty < 0.0 || self.spectral_uncertainty < 0.0 {
            return Err(FusionError::Configuration(format!(
                "Uncertainties must not be negative (temporal {}, spectral {})",
                self.temporal_uncertainty, self.spectral_uncertainty
            )));
        }

        if let Some(date3) = self.date3 {
            if Some(date3) == self.date1 {
                log::warn!("Both input pairs use date {}; double-pair mode gains nothing", date3);
            }
        }

        Ok(())
    }
}
