//! Replace curves and long segments by short straight pieces.
//!
//! A projection bends straight device-space lines, so every segment is
//! subdivided before reprojection. Output contains only `MoveTo`,
//! `LineTo` and `Close`.

use crate::defaults;
use crate::path::{Path, PathCommand};
use crate::types::DevicePoint;

/// Subdivide `path` so no emitted segment is (much) longer than
/// `max_segment_length`.
///
/// - lines: `max(1, ceil(d / max))` equal steps
/// - quadratic and cubic curves: sampled at `max(4, ceil(L / max))`
///   parameter steps, where `L` is the control polygon length plus chord
/// - arcs: the chord from start to end, `max(8, 2 ceil(d / max))` steps
/// - close: a closing segment is subdivided like a line when the pen is
///   away from the subpath start
///
/// A non-positive or non-finite limit yields the minimum step counts. No
/// segment is split into more than [`defaults::MAX_DENSIFY_STEPS`] pieces.
pub fn densify(path: &Path, max_segment_length: f64) -> Path {
    let max = if max_segment_length.is_finite() && max_segment_length > 0.0 {
        max_segment_length
    } else {
        f64::INFINITY
    };

    let mut out = Path::new();
    let mut current = DevicePoint::ZERO;
    let mut start = DevicePoint::ZERO;

    for command in path {
        match *command {
            PathCommand::MoveTo(p) => {
                out.push(PathCommand::MoveTo(p));
                current = p;
                start = p;
            }
            PathCommand::LineTo(p) => {
                let n = steps(current.distance(p), max, 1);
                emit(&mut out, n, |t| current.lerp(p, t));
                current = p;
            }
            PathCommand::CubicTo { c1, c2, end } => {
                let len = current.distance(c1) + c1.distance(c2) + c2.distance(end)
                    + current.distance(end);
                let n = steps(len, max, defaults::MIN_CURVE_STEPS);
                let p0 = current;
                emit(&mut out, n, |t| cubic(p0, c1, c2, end, t));
                current = end;
            }
            PathCommand::QuadTo { c1, end } => {
                let len = current.distance(c1) + c1.distance(end) + current.distance(end);
                let n = steps(len, max, defaults::MIN_CURVE_STEPS);
                let p0 = current;
                emit(&mut out, n, |t| quad(p0, c1, end, t));
                current = end;
            }
            PathCommand::ArcTo { end, .. } => {
                // Sampled along the chord; the true arc shape is not used.
                let n = (steps(current.distance(end), max, 1) * 2)
                    .clamp(defaults::MIN_ARC_STEPS, defaults::MAX_DENSIFY_STEPS);
                emit(&mut out, n, |t| current.lerp(end, t));
                current = end;
            }
            PathCommand::Close => {
                if current.distance(start) > defaults::CLOSE_TOLERANCE {
                    let n = steps(current.distance(start), max, 1);
                    emit(&mut out, n, |t| current.lerp(start, t));
                }
                out.push(PathCommand::Close);
                current = start;
            }
        }
    }

    out
}

fn steps(length: f64, max: f64, min: usize) -> usize {
    let n = (length / max).ceil();
    if !n.is_finite() || n <= 0.0 {
        return min;
    }
    if n > defaults::MAX_DENSIFY_STEPS as f64 {
        crate::log::warn!(length, "segment too long to densify fully, capping steps");
        return defaults::MAX_DENSIFY_STEPS;
    }
    (n as usize).max(min)
}

/// Push `LineTo(at(j / n))` for `j = 1..=n`.
fn emit(out: &mut Path, n: usize, at: impl Fn(f64) -> DevicePoint) {
    for j in 1..=n {
        out.push(PathCommand::LineTo(at(j as f64 / n as f64)));
    }
}

fn cubic(p0: DevicePoint, p1: DevicePoint, p2: DevicePoint, p3: DevicePoint, t: f64) -> DevicePoint {
    let mt = 1.0 - t;
    p0 * (mt * mt * mt) + p1 * (3.0 * mt * mt * t) + p2 * (3.0 * mt * t * t) + p3 * (t * t * t)
}

fn quad(p0: DevicePoint, p1: DevicePoint, p2: DevicePoint, t: f64) -> DevicePoint {
    let mt = 1.0 - t;
    p0 * (mt * mt) + p1 * (2.0 * mt * t) + p2 * (t * t)
}
