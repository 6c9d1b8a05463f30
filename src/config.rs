//! Run configuration.
//!
//! Every field has a default taken from [`crate::defaults`]; callers
//! usually start from `Config::default()` and override what they need.

use crate::defaults;
use crate::types::Color;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Destination canvas the map is fitted onto.
    pub canvas: Canvas,
    pub densify: DensifyConfig,
    pub calibration: CalibrationConfig,
    /// Replace a canvas-sized filled path with a plain rectangle.
    pub replace_background: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            densify: DensifyConfig::default(),
            calibration: CalibrationConfig::default(),
            replace_background: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: defaults::CANVAS_WIDTH,
            height: defaults::CANVAS_HEIGHT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensifyConfig {
    pub max_segment_length: f64,
}

impl Default for DensifyConfig {
    fn default() -> Self {
        Self {
            max_segment_length: defaults::MAX_SEGMENT_LENGTH,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationConfig {
    /// Fewer sampled vertices than this aborts the run.
    pub min_points: usize,

    /// Stroke color identifying the equator reference segment.
    pub marker_color: Color,
    /// Largest y difference between the marker's endpoints.
    pub marker_tolerance: f64,

    /// Fit the vertical scale and shear from meridians when available.
    pub fit_meridians: bool,
    /// `id` of the group holding the meridian paths.
    pub meridian_group_id: String,
    pub meridian_segment_length: f64,
    pub min_meridian_points: usize,
    /// A meridian whose closest vertex is further than this from the
    /// equator is assumed not to cross it.
    pub crossing_threshold: f64,
    /// Samples closer than this to the equator carry no vertical
    /// information and are skipped.
    pub equator_band: f64,
    pub max_samples_per_meridian: usize,
    pub min_samples_per_meridian: usize,
    pub min_meridians: usize,
    /// The residual is finite only with more successful samples than this.
    pub min_residual_samples: usize,

    /// `scale_y` is swept over `[scale_x / factor, scale_x * factor]`.
    pub scale_y_sweep_factor: f64,
    pub scale_y_sweep_intervals: usize,
    /// Sweep points either side of the best one bracketing the refinement.
    pub scale_y_refine_window: usize,
    pub scale_y_iterations: usize,
    /// Shear is searched over `[-shear_range, shear_range]`.
    pub shear_range: f64,
    pub shear_iterations: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_points: defaults::MIN_SAMPLE_POINTS,
            marker_color: Color::Rgb(255, 0, 0),
            marker_tolerance: defaults::MARKER_LEVEL_TOLERANCE,
            fit_meridians: true,
            meridian_group_id: defaults::MERIDIAN_GROUP_ID.to_string(),
            meridian_segment_length: defaults::MERIDIAN_SEGMENT_LENGTH,
            min_meridian_points: defaults::MIN_MERIDIAN_POINTS,
            crossing_threshold: defaults::EQUATOR_CROSSING_THRESHOLD,
            equator_band: defaults::EQUATOR_BAND,
            max_samples_per_meridian: defaults::MAX_SAMPLES_PER_MERIDIAN,
            min_samples_per_meridian: defaults::MIN_SAMPLES_PER_MERIDIAN,
            min_meridians: defaults::MIN_MERIDIANS,
            min_residual_samples: defaults::MIN_RESIDUAL_SAMPLES,
            scale_y_sweep_factor: defaults::SCALE_Y_SWEEP_FACTOR,
            scale_y_sweep_intervals: defaults::SCALE_Y_SWEEP_INTERVALS,
            scale_y_refine_window: defaults::SCALE_Y_REFINE_WINDOW,
            scale_y_iterations: defaults::SCALE_Y_ITERATIONS,
            shear_range: defaults::SHEAR_RANGE,
            shear_iterations: defaults::SHEAR_ITERATIONS,
        }
    }
}
