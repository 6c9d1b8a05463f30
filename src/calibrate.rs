//! Recover how an unknown projection was rendered into the drawing.
//!
//! The rendering is modelled as an anisotropic affine map from unit
//! projection space to device space:
//!
//! ```text
//! x = origin.x + scale_x * u + shear_x * (y - origin.y)
//! y = origin.y + scale_y * v
//! ```
//!
//! Two strategies find `origin` and `scale_x`: the drawn equator marker
//! (exact) and the bounding box of all geometry (approximate). After a
//! marker hit, meridian lines refine `scale_y` and `shear_x` by
//! minimizing the longitude drift along each meridian.

use crate::config::CalibrationConfig;
use crate::densify::densify;
use crate::doc::{Element, parse_points};
use crate::errors::{Error, FitError};
use crate::log::{debug, info};
use crate::path::{PathCommand, to_absolute};
use crate::projection::Projection;
use crate::types::{BBox, Color, DevicePoint, UnitPoint, wrap180};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationParams {
    /// Device position of the projection's origin (0°, 0°).
    pub origin: DevicePoint,
    pub scale_x: f64,
    pub scale_y: f64,
    pub shear_x: f64,
}

impl CalibrationParams {
    pub fn isotropic(origin: DevicePoint, scale: f64) -> Self {
        Self {
            origin,
            scale_x: scale,
            scale_y: scale,
            shear_x: 0.0,
        }
    }

    /// Undo the rendering: device space to unit-projection space.
    pub fn to_unit(&self, p: DevicePoint) -> UnitPoint {
        let dy = p.y - self.origin.y;
        UnitPoint::new(
            (p.x - self.origin.x - self.shear_x * dy) / self.scale_x,
            dy / self.scale_y,
        )
    }

    /// Apply the rendering: unit-projection space to device space.
    pub fn to_device(&self, u: UnitPoint) -> DevicePoint {
        let dy = self.scale_y * u.y();
        DevicePoint::new(
            self.origin.x + self.scale_x * u.x() + self.shear_x * dy,
            self.origin.y + dy,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationSource {
    EquatorMarker,
    BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub params: CalibrationParams,
    pub source: CalibrationSource,
    /// Whether `scale_y` was fitted from meridians (otherwise it equals
    /// `scale_x`).
    pub meridian_fit: bool,
}

/// Run the full calibration: marker, else bounding box; then meridian
/// refinement if the marker was found.
///
/// Fails only if fewer than `config.min_points` vertices were sampled or
/// the bounding box itself is degenerate.
pub fn calibrate<P: Projection>(
    root: &Element,
    points: &[DevicePoint],
    projection: &P,
    config: &CalibrationConfig,
) -> Result<Calibration, Error> {
    if points.len() < config.min_points {
        return Err(Error::InsufficientPoints {
            found: points.len(),
            required: config.min_points,
        });
    }

    let params = match from_equator_marker(root, projection, config) {
        Ok(params) => params,
        Err(reason) => {
            debug!(%reason, "falling back to bounding box calibration");
            let params = from_bounding_box(points, projection)?;
            info!(
                origin_x = params.origin.x,
                origin_y = params.origin.y,
                scale = params.scale_x,
                "calibrated from bounding box"
            );
            return Ok(Calibration {
                params,
                source: CalibrationSource::BoundingBox,
                meridian_fit: false,
            });
        }
    };
    info!(
        origin_x = params.origin.x,
        origin_y = params.origin.y,
        scale_x = params.scale_x,
        "calibrated from equator marker"
    );

    if !config.fit_meridians {
        return Ok(Calibration {
            params,
            source: CalibrationSource::EquatorMarker,
            meridian_fit: false,
        });
    }

    let (params, meridian_fit) = match MeridianFit::collect(root, &params, projection, config) {
        Ok(fit) => fit.refine(params),
        Err(reason) => {
            debug!(%reason, "no meridian refinement, keeping isotropic scale");
            (params, false)
        }
    };

    Ok(Calibration {
        params,
        source: CalibrationSource::EquatorMarker,
        meridian_fit,
    })
}

/// All vertices of `path`, `polygon` and `polyline` elements below
/// `root`, control points included.
pub fn sample_points(root: &Element) -> Vec<DevicePoint> {
    let mut points = Vec::new();
    for element in root.descendants() {
        if element.is("path") {
            if let Some(d) = element.attr("d") {
                points.extend(to_absolute(d).vertices());
            }
        } else if element.is("polygon") || element.is("polyline") {
            if let Some(raw) = element.attr("points") {
                points.extend(parse_points(raw));
            }
        }
    }
    points
}

// ============================================================================
// Strategy A: the equator marker
// ============================================================================

/// Find the equator marker: a path stroked in the marker color whose data
/// starts with a level `M x y L x y` segment. The segment spans
/// longitudes -180° to 180°, which fixes the origin and `scale_x`.
pub fn from_equator_marker<P: Projection>(
    root: &Element,
    projection: &P,
    config: &CalibrationConfig,
) -> Result<CalibrationParams, FitError> {
    let half_width = projection.full_width().ok_or(FitError::DegenerateProjection)? / 2.0;

    for element in root.descendants().filter(|e| e.is("path")) {
        let Some(stroke) = element.style_property("stroke") else {
            continue;
        };
        if stroke.parse::<Color>().ok().as_ref() != Some(&config.marker_color) {
            continue;
        }
        let Some(d) = element.attr("d") else {
            continue;
        };
        let path = to_absolute(d);
        let (a, b) = match path.commands() {
            [PathCommand::MoveTo(a), PathCommand::LineTo(b), ..] => (*a, *b),
            _ => continue,
        };
        if !a.is_finite() || !b.is_finite() || (a.y - b.y).abs() > config.marker_tolerance {
            continue;
        }

        let (left, right) = (a.x.min(b.x), a.x.max(b.x));
        let scale = (right - left) / (2.0 * half_width);
        if !scale.is_finite() || scale <= 0.0 {
            continue;
        }
        return Ok(CalibrationParams::isotropic(
            DevicePoint::new((left + right) / 2.0, a.y),
            scale,
        ));
    }

    Err(FitError::NoMarker)
}

// ============================================================================
// Strategy B: bounding box
// ============================================================================

/// Assume the drawing's extent is the projection's full width, centred.
pub fn from_bounding_box<P: Projection>(
    points: &[DevicePoint],
    projection: &P,
) -> Result<CalibrationParams, FitError> {
    let full_width = projection.full_width().ok_or(FitError::DegenerateProjection)?;
    let bbox = BBox::from_points(points.iter().copied());
    if bbox.is_empty() {
        return Err(FitError::TooFewSamples);
    }
    let scale = bbox.width() / full_width;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(FitError::NonFiniteScale);
    }
    Ok(CalibrationParams::isotropic(bbox.center(), scale))
}

// ============================================================================
// Meridian refinement
// ============================================================================

/// A drawn line of constant longitude.
#[derive(Clone, Debug, PartialEq)]
pub struct Meridian {
    /// Longitude where the line crosses the equator.
    pub reference_lon: f64,
    /// Vertices away from the equator.
    pub samples: Vec<DevicePoint>,
}

/// Meridians plus everything needed to score candidate parameters.
pub struct MeridianFit<'a, P> {
    meridians: Vec<Meridian>,
    projection: &'a P,
    config: &'a CalibrationConfig,
}

impl<'a, P: Projection> MeridianFit<'a, P> {
    /// Gather usable meridians from the configured group.
    ///
    /// Only `origin` and `scale_x` of `params` are used: the reference
    /// longitude comes from the vertex nearest the equator, where shear
    /// and `scale_y` have no effect.
    pub fn collect(
        root: &Element,
        params: &CalibrationParams,
        projection: &'a P,
        config: &'a CalibrationConfig,
    ) -> Result<Self, FitError> {
        let group = root
            .find_by_id(&config.meridian_group_id)
            .ok_or(FitError::NoMeridianGroup)?;

        let meridians: Vec<Meridian> = group
            .descendants()
            .filter(|e| e.is("path"))
            .filter_map(|e| e.attr("d"))
            .filter_map(|d| meridian(d, params, projection, config))
            .collect();

        if meridians.len() < config.min_meridians {
            return Err(FitError::TooFewMeridians {
                found: meridians.len(),
                required: config.min_meridians,
            });
        }
        debug!(count = meridians.len(), "collected meridians");

        Ok(Self {
            meridians,
            projection,
            config,
        })
    }

    pub fn meridians(&self) -> &[Meridian] {
        &self.meridians
    }

    /// Mean squared longitude drift (degrees²) of all samples under
    /// `params`, or infinity with too few successful inversions.
    pub fn residual(&self, params: &CalibrationParams) -> f64 {
        if !params.scale_y.is_finite() || params.scale_y <= 0.0 || !params.shear_x.is_finite() {
            return f64::INFINITY;
        }

        let mut sum = 0.0;
        let mut n = 0usize;
        for meridian in &self.meridians {
            for &sample in &meridian.samples {
                let Some(lonlat) = self.projection.inverse(params.to_unit(sample)) else {
                    continue;
                };
                let drift = wrap180(lonlat.lon - meridian.reference_lon);
                sum += drift * drift;
                n += 1;
            }
        }

        if n > self.config.min_residual_samples {
            sum / n as f64
        } else {
            f64::INFINITY
        }
    }

    /// Best `scale_y` for fixed origin, `scale_x` and `shear_x`.
    ///
    /// A log-spaced sweep over `[scale_x / factor, factor * scale_x]`
    /// brackets the minimum; golden section search refines it between the
    /// sweep points `scale_y_refine_window` steps either side of the best
    /// one.
    pub fn fit_scale_y(&self, params: &CalibrationParams) -> Result<f64, FitError> {
        let intervals = self.config.scale_y_sweep_intervals.max(1);
        let factor = self.config.scale_y_sweep_factor;
        let min = params.scale_x / factor;
        let max = params.scale_x * factor;
        if !min.is_finite() || min <= 0.0 {
            return Err(FitError::NonFiniteScale);
        }
        let candidate = |i: usize| min * (max / min).powf(i as f64 / intervals as f64);
        let score = |scale_y: f64| self.residual(&CalibrationParams { scale_y, ..*params });

        let mut best = (0, f64::INFINITY);
        for i in 0..=intervals {
            let value = score(candidate(i));
            if value < best.1 {
                best = (i, value);
            }
        }
        if !best.1.is_finite() {
            return Err(FitError::TooFewSamples);
        }

        let window = self.config.scale_y_refine_window;
        let lo = candidate(best.0.saturating_sub(window));
        let hi = candidate((best.0 + window).min(intervals));
        let (scale_y, value) = golden_section(score, lo, hi, self.config.scale_y_iterations);
        if !value.is_finite() {
            return Err(FitError::TooFewSamples);
        }
        Ok(scale_y)
    }

    /// Best `shear_x` in `[-shear_range, shear_range]` for fixed scales.
    pub fn fit_shear_x(&self, params: &CalibrationParams) -> Result<f64, FitError> {
        let range = self.config.shear_range;
        let score = |shear_x: f64| self.residual(&CalibrationParams { shear_x, ..*params });
        let (shear_x, value) = golden_section(score, -range, range, self.config.shear_iterations);
        if !value.is_finite() {
            return Err(FitError::TooFewSamples);
        }
        Ok(shear_x)
    }

    /// `scale_y`, then `shear_x`, then `scale_y` again with the shear in
    /// place. A stage that fails keeps the previous value. The flag
    /// reports whether any `scale_y` fit succeeded.
    pub fn refine(&self, params: CalibrationParams) -> (CalibrationParams, bool) {
        let mut params = params;
        let mut fitted = false;

        match self.fit_scale_y(&params) {
            Ok(scale_y) => {
                params.scale_y = scale_y;
                fitted = true;
            }
            Err(reason) => {
                debug!(%reason, "scale_y fit failed");
            }
        }
        match self.fit_shear_x(&params) {
            Ok(shear_x) => params.shear_x = shear_x,
            Err(reason) => {
                debug!(%reason, "shear_x fit failed");
            }
        }
        match self.fit_scale_y(&params) {
            Ok(scale_y) => {
                params.scale_y = scale_y;
                fitted = true;
            }
            Err(reason) => {
                debug!(%reason, "scale_y refit failed");
            }
        }

        info!(
            scale_x = params.scale_x,
            scale_y = params.scale_y,
            shear_x = params.shear_x,
            "fitted meridians"
        );
        (params, fitted)
    }
}

fn meridian<P: Projection>(
    d: &str,
    params: &CalibrationParams,
    projection: &P,
    config: &CalibrationConfig,
) -> Option<Meridian> {
    let points: Vec<DevicePoint> = densify(&to_absolute(d), config.meridian_segment_length)
        .vertices()
        .filter(|p| p.is_finite())
        .collect();
    if points.len() < config.min_meridian_points {
        return None;
    }

    let nearest = points
        .iter()
        .copied()
        .min_by(|a, b| (a.y - params.origin.y).abs().total_cmp(&(b.y - params.origin.y).abs()))?;
    if (nearest.y - params.origin.y).abs() > config.crossing_threshold {
        return None;
    }
    let u = (nearest.x - params.origin.x) / params.scale_x;
    let reference_lon = projection.inverse(UnitPoint::new(u, 0.0))?.lon;

    let step = (points.len() / config.max_samples_per_meridian.max(1)).max(1);
    let samples: Vec<DevicePoint> = points
        .iter()
        .step_by(step)
        .filter(|p| (p.y - params.origin.y).abs() >= config.equator_band)
        .take(config.max_samples_per_meridian)
        .copied()
        .collect();
    if samples.len() < config.min_samples_per_meridian {
        return None;
    }

    Some(Meridian {
        reference_lon,
        samples,
    })
}

/// Golden section search for a minimum of `f` on `[lo, hi]` with a fixed
/// number of iterations. Returns the better interior point and its value.
pub fn golden_section(
    f: impl Fn(f64) -> f64,
    lo: f64,
    hi: f64,
    iterations: usize,
) -> (f64, f64) {
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (lo, hi);
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    for _ in 0..iterations {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = f(d);
        }
    }

    if fc < fd { (c, fc) } else { (d, fd) }
}
