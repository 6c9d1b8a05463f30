//! Flatten SVG map drawings and move them from one map projection to
//! another.
//!
//! Two entry points operate on an owned [`Element`] tree:
//!
//! - [`flatten`] bakes every `transform` into absolute geometry;
//! - [`reproject`] calibrates how the drawing's projection was rendered
//!   and redraws every path in plate carrée on a fixed canvas.
//!
//! Reading and writing the document is left to the caller.

use pest_derive::Parser;

pub mod affine;
pub mod calibrate;
pub mod config;
pub mod defaults;
pub mod densify;
pub mod doc;
pub mod errors;
pub mod flatten;
pub mod log;
pub mod path;
pub mod projection;
pub mod reproject;
pub mod types;

pub use affine::AffineMatrix;
pub use calibrate::{Calibration, CalibrationParams, CalibrationSource};
pub use config::Config;
pub use doc::Element;
pub use errors::{Error, FitError};
pub use path::{Path, PathCommand};
pub use projection::{Equirectangular, Projection, ProjectionKind, Scaled, Wagner7};

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct GeometryParser;

/// What a [`reproject`] run did.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub calibration: Calibration,
    /// Paths whose data was rewritten.
    pub paths: usize,
    /// Paths left with no drawable segment (their data is now empty).
    pub emptied_paths: usize,
    pub images: usize,
    /// Circles and text anchors moved.
    pub anchors: usize,
    /// Elements that could not be repositioned and were left as they were.
    pub skipped: usize,
    pub background_replaced: bool,
}

fn check_root(root: &Element) -> Result<(), Error> {
    if root.is("svg") {
        Ok(())
    } else {
        Err(Error::NoRoot {
            found: root.name.clone(),
        })
    }
}

/// Resolve `<use>` references and bake every transform into the
/// geometry. Afterwards no element carries a `transform` attribute.
pub fn flatten(root: &mut Element) -> Result<(), Error> {
    check_root(root)?;
    flatten::flatten(root);
    Ok(())
}

/// Reproject a flattened Wagner VII drawing onto the configured plate
/// carrée canvas.
pub fn reproject(root: &mut Element, config: &Config) -> Result<Report, Error> {
    let destination = Scaled::plate(config.canvas.width, config.canvas.height);
    reproject_with(root, config, Wagner7, destination)
}

/// Reproject a flattened drawing made with `source` into `destination`.
///
/// Polygons and polylines become paths, the source rendering is
/// calibrated, then every path is densified and remapped. Images,
/// circles and text anchors are moved, the root is resized to the
/// canvas, and optionally the background is replaced.
pub fn reproject_with<S: Projection, D: Projection>(
    root: &mut Element,
    config: &Config,
    source: S,
    destination: Scaled<D>,
) -> Result<Report, Error> {
    check_root(root)?;

    root.for_each_mut(&mut |element| {
        if element.is("polygon") || element.is("polyline") {
            if let Some(path) = reproject::polygon_to_path(element) {
                *element = path;
            }
        }
    });

    let points = calibrate::sample_points(root);
    let calibration = calibrate::calibrate(root, &points, &source, &config.calibration)?;
    let reprojector =
        reproject::Reprojector::new(calibration.params, source, destination, config.canvas);

    let mut report = Report {
        calibration,
        paths: 0,
        emptied_paths: 0,
        images: 0,
        anchors: 0,
        skipped: 0,
        background_replaced: false,
    };

    root.for_each_mut(&mut |element| {
        let kind = element.local_name().to_ascii_lowercase();
        match kind.as_str() {
            "path" => {
                let Some(d) = element.attr("d") else {
                    return;
                };
                let dense = densify::densify(&path::to_absolute(d), config.densify.max_segment_length);
                let remapped = reprojector.remap_path(&dense);
                if remapped.is_empty() {
                    report.emptied_paths += 1;
                }
                element.set_attr("d", remapped);
                element.remove_attr("transform");
                report.paths += 1;
            }
            "image" => {
                if reprojector.reposition_image(element) {
                    report.images += 1;
                } else {
                    report.skipped += 1;
                }
            }
            // Text positioned only by its children has no anchor to move.
            "text" if !element.has_attr("x") && !element.has_attr("y") => {}
            "circle" | "text" => {
                let (x, y) = if kind == "circle" { ("cx", "cy") } else { ("x", "y") };
                if reprojector.reposition_anchor(element, x, y) {
                    report.anchors += 1;
                } else {
                    report.skipped += 1;
                }
            }
            _ => {}
        }
    });

    reproject::set_viewport(root, config.canvas);
    if config.replace_background {
        report.background_replaced = reproject::replace_background(root, config.canvas);
    }

    log::info!(
        paths = report.paths,
        emptied = report.emptied_paths,
        images = report.images,
        anchors = report.anchors,
        skipped = report.skipped,
        "reprojected drawing"
    );
    Ok(report)
}
