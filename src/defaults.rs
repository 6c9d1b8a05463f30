//! Default sizes and tuning constants.

/// Output canvas, in pixels.
pub const CANVAS_WIDTH: f64 = 1800.0;
pub const CANVAS_HEIGHT: f64 = 900.0;

/// Longest straight segment produced when densifying map paths.
pub const MAX_SEGMENT_LENGTH: f64 = 2.0;
/// Coarser densification used when sampling meridians for calibration.
pub const MERIDIAN_SEGMENT_LENGTH: f64 = 6.0;
pub const MIN_CURVE_STEPS: usize = 4;
pub const MIN_ARC_STEPS: usize = 8;

/// Upper bound on the pieces one segment is split into.
pub const MAX_DENSIFY_STEPS: usize = 100_000;

/// A closing segment is emitted only if the pen is further than this from
/// the subpath start.
pub const CLOSE_TOLERANCE: f64 = 1e-9;

/// Fewer sampled vertices than this and the drawing cannot be calibrated.
pub const MIN_SAMPLE_POINTS: usize = 10;

/// Reference-line detection.
pub const MARKER_LEVEL_TOLERANCE: f64 = 1e-3;

/// Meridian-based fitting.
pub const MERIDIAN_GROUP_ID: &str = "Längengrade";
pub const MIN_MERIDIAN_POINTS: usize = 8;
pub const EQUATOR_CROSSING_THRESHOLD: f64 = 8.0;
pub const EQUATOR_BAND: f64 = 20.0;
pub const MAX_SAMPLES_PER_MERIDIAN: usize = 60;
pub const MIN_SAMPLES_PER_MERIDIAN: usize = 6;
pub const MIN_MERIDIANS: usize = 3;
pub const MIN_RESIDUAL_SAMPLES: usize = 50;

/// Vertical scale search: log-spaced sweep over `[s/4, 4s]`, then golden
/// section refinement around the best sweep point.
pub const SCALE_Y_SWEEP_FACTOR: f64 = 4.0;
pub const SCALE_Y_SWEEP_INTERVALS: usize = 40;
pub const SCALE_Y_REFINE_WINDOW: usize = 2;
pub const SCALE_Y_ITERATIONS: usize = 40;

/// Shear search range (both signs) and golden section iterations.
pub const SHEAR_RANGE: f64 = 0.05;
pub const SHEAR_ITERATIONS: usize = 50;

/// A filled path whose box covers at least this fraction of the canvas in
/// both dimensions is treated as the background.
pub const BACKGROUND_COVERAGE: f64 = 0.97;

/// Bound on the number of `<use>` clones made in one document.
pub const MAX_USE_INSTANCES: usize = 10_000;
