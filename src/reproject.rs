//! Move calibrated geometry from the source projection into the
//! destination projection.
//!
//! Every vertex goes device → unit source → lon/lat → destination device.
//! Vertices that fail to invert lift the pen; so do jumps wider than half
//! the canvas, which is how the antimeridian shows up after remapping.

use crate::calibrate::CalibrationParams;
use crate::config::Canvas;
use crate::defaults;
use crate::doc::{Element, parse_points};
use crate::path::{Path, PathCommand, to_absolute};
use crate::projection::{Projection, Scaled};
use crate::types::{DevicePoint, LonLat};

pub struct Reprojector<S, D> {
    params: CalibrationParams,
    source: S,
    destination: Scaled<D>,
    canvas: Canvas,
}

impl<S: Projection, D: Projection> Reprojector<S, D> {
    pub fn new(params: CalibrationParams, source: S, destination: Scaled<D>, canvas: Canvas) -> Self {
        Self {
            params,
            source,
            destination,
            canvas,
        }
    }

    /// Device point of the drawing to geographic coordinates.
    pub fn inverse(&self, p: DevicePoint) -> Option<LonLat> {
        let unit = self.params.to_unit(p);
        if !unit.is_finite() {
            return None;
        }
        self.source.inverse(unit).filter(|ll| ll.is_finite())
    }

    /// Geographic coordinates to a destination canvas point.
    pub fn forward(&self, lonlat: LonLat) -> Option<DevicePoint> {
        self.destination.forward(lonlat)
    }

    pub fn map_point(&self, p: DevicePoint) -> Option<DevicePoint> {
        self.inverse(p).and_then(|ll| self.forward(ll))
    }

    /// Remap every command endpoint of an absolute, densified path.
    ///
    /// Output contains `MoveTo`, `LineTo` and `Close` only. A `MoveTo`
    /// always starts a new subpath, as does any vertex following a failed
    /// one or a seam crossing. `Close` is kept only when the subpath was
    /// never split, since after a split the output subpath no longer
    /// starts where the source one did.
    pub fn remap_path(&self, path: &Path) -> Path {
        let seam = self.canvas.width / 2.0;
        let mut out = Path::new();
        let mut last: Option<DevicePoint> = None;
        let mut split = false;

        for command in path {
            match command {
                PathCommand::Close => {
                    if last.is_some() && !split {
                        out.push(PathCommand::Close);
                    }
                    last = None;
                    split = true;
                }
                PathCommand::MoveTo(p) => {
                    last = self.map_point(*p);
                    split = last.is_none();
                    if let Some(q) = last {
                        out.push(PathCommand::MoveTo(q));
                    }
                }
                _ => {
                    let Some(q) = command.end_point().and_then(|p| self.map_point(p)) else {
                        last = None;
                        split = true;
                        continue;
                    };
                    match last {
                        Some(prev) if (q.x - prev.x).abs() <= seam => {
                            out.push(PathCommand::LineTo(q));
                        }
                        _ => {
                            out.push(PathCommand::MoveTo(q));
                            split = true;
                        }
                    }
                    last = Some(q);
                }
            }
        }

        drop_empty_subpaths(out)
    }

    /// Reproject an `image`'s top-left and bottom-right corners and resize
    /// it to the box they span. Returns `false` (leaving the element as
    /// is) if either corner fails.
    pub fn reposition_image(&self, image: &mut Element) -> bool {
        let x = image.attr_f64("x").unwrap_or(0.0);
        let y = image.attr_f64("y").unwrap_or(0.0);
        let w = image.attr_f64("width").unwrap_or(0.0);
        let h = image.attr_f64("height").unwrap_or(0.0);

        let (Some(a), Some(b)) = (
            self.map_point(DevicePoint::new(x, y)),
            self.map_point(DevicePoint::new(x + w, y + h)),
        ) else {
            crate::log::debug!(x, y, "image corner failed to reproject");
            return false;
        };

        image.set_attr("x", a.x.min(b.x));
        image.set_attr("y", a.y.min(b.y));
        image.set_attr("width", (b.x - a.x).abs());
        image.set_attr("height", (b.y - a.y).abs());
        image.remove_attr("transform");
        true
    }

    /// Reproject a single anchor point stored in attributes `x`/`y`.
    pub fn reposition_anchor(&self, element: &mut Element, x: &str, y: &str) -> bool {
        let p = DevicePoint::new(
            element.attr_f64(x).unwrap_or(0.0),
            element.attr_f64(y).unwrap_or(0.0),
        );
        let Some(q) = self.map_point(p) else {
            return false;
        };
        element.set_attr(x, q.x);
        element.set_attr(y, q.y);
        true
    }
}

/// Remove subpaths that never got a second vertex.
fn drop_empty_subpaths(path: Path) -> Path {
    let commands: Vec<PathCommand> = path.into_iter().collect();
    let mut out = Path::new();
    for (i, command) in commands.iter().enumerate() {
        match command {
            PathCommand::MoveTo(_)
                if !matches!(commands.get(i + 1), Some(PathCommand::LineTo(_))) => {}
            PathCommand::Close if !matches!(out.commands().last(), Some(PathCommand::LineTo(_))) => {}
            _ => out.push(*command),
        }
    }
    out
}

/// The `path` equivalent of a `polygon` or `polyline`, with the same
/// non-geometric attributes. `None` if it has no points.
pub fn polygon_to_path(element: &Element) -> Option<Element> {
    let points = parse_points(element.attr("points")?);
    let (first, rest) = points.split_first()?;

    let mut path = Path::new();
    path.push(PathCommand::MoveTo(*first));
    for p in rest {
        path.push(PathCommand::LineTo(*p));
    }
    if element.is("polygon") {
        path.push(PathCommand::Close);
    }

    let name = match element.name.rsplit_once(':') {
        Some((prefix, _)) => format!("{prefix}:path"),
        None => "path".to_string(),
    };
    let mut replacement = Element::new(name);
    element.copy_attributes_to(&mut replacement, &["points", "transform"]);
    replacement.set_attr("d", path);
    Some(replacement)
}

/// Size the root to the destination canvas.
pub fn set_viewport(root: &mut Element, canvas: Canvas) {
    root.set_attr("viewBox", format!("0 0 {} {}", canvas.width, canvas.height));
    root.set_attr("width", canvas.width);
    root.set_attr("height", canvas.height);
}

/// Replace the largest filled path covering (almost) the whole canvas
/// with an exact canvas-sized `rect`. Returns whether one was replaced.
pub fn replace_background(root: &mut Element, canvas: Canvas) -> bool {
    let mut best: Option<(Vec<usize>, f64)> = None;
    find_background(root, canvas, &mut Vec::new(), &mut best);
    let Some((trail, _)) = best else {
        return false;
    };
    let Some(node) = node_at_mut(root, &trail) else {
        return false;
    };

    let fill = node.style_property("fill").unwrap_or_default().to_string();
    let mut rect = Element::new("rect")
        .with_attr("x", 0)
        .with_attr("y", 0)
        .with_attr("width", canvas.width)
        .with_attr("height", canvas.height);
    node.copy_attributes_to(
        &mut rect,
        &["d", "transform", "x", "y", "width", "height"],
    );
    if rect.attr("fill").is_none_or(|f| f == "none") {
        rect.set_attr("fill", fill);
    }
    *node = rect;
    true
}

fn is_filled(element: &Element) -> bool {
    element
        .style_property("fill")
        .is_some_and(|fill| !fill.is_empty() && fill != "none")
}

fn find_background(
    node: &Element,
    canvas: Canvas,
    trail: &mut Vec<usize>,
    best: &mut Option<(Vec<usize>, f64)>,
) {
    if node.is("path") && is_filled(node) {
        if let Some(d) = node.attr("d") {
            let bbox = to_absolute(d).bbox();
            let coverage = defaults::BACKGROUND_COVERAGE;
            if !bbox.is_empty()
                && bbox.width() >= canvas.width * coverage
                && bbox.height() >= canvas.height * coverage
            {
                let area = bbox.width() * bbox.height();
                if best.as_ref().is_none_or(|(_, a)| area > *a) {
                    *best = Some((trail.clone(), area));
                }
            }
        }
    }
    for (i, child) in node.children.iter().enumerate() {
        trail.push(i);
        find_background(child, canvas, trail, best);
        trail.pop();
    }
}

fn node_at_mut<'a>(root: &'a mut Element, trail: &[usize]) -> Option<&'a mut Element> {
    trail
        .iter()
        .try_fold(root, |node, &i| node.children.get_mut(i))
}
