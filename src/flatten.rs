//! Bake nested transforms into absolute geometry.
//!
//! After [`flatten`] no element carries a `transform` attribute and all
//! geometry is expressed in root coordinates:
//!
//! - `<use>` references are replaced by clones of their targets;
//! - `rect`, `line` and `ellipse` are replaced by equivalent `path`s;
//! - `path` data is made absolute and transformed;
//! - `polygon`/`polyline` points, `circle` centres, `text` anchors and
//!   `image` boxes are moved.
//!
//! Circle radii and arc radii are not scaled, so results are exact only
//! under similarity transforms.

use std::collections::{HashMap, HashSet};

use glam::{DVec2, dvec2};

use crate::affine::AffineMatrix;
use crate::defaults;
use crate::doc::{Element, format_points, parse_points};
use crate::path::{Path, PathCommand, to_absolute};
use crate::types::BBox;

/// Attributes that describe a primitive's geometry and are not copied
/// onto the path that replaces it.
const PRIMITIVE_GEOMETRY: &[&str] = &[
    "x", "y", "width", "height", "x1", "y1", "x2", "y2", "cx", "cy", "rx", "ry", "transform",
];

/// Attributes of a `<use>` that are not inherited by its clone.
const USE_OWN: &[&str] = &["x", "y", "width", "height", "href", "xlink:href", "transform", "id"];

/// Resolve instancing references, then bake every transform into the
/// geometry below `root`.
pub fn flatten(root: &mut Element) {
    let resolved = resolve_uses(root);
    if resolved > 0 {
        crate::log::debug!(resolved, "resolved use references");
    }
    flatten_node(root, AffineMatrix::IDENTITY);
}

/// The matrix mapping `node`'s local coordinates to root coordinates.
pub fn effective_matrix(parent: AffineMatrix, node: &Element) -> AffineMatrix {
    match node.attr("transform") {
        Some(text) => parent.compose(AffineMatrix::parse(text)),
        None => parent,
    }
}

fn flatten_node(node: &mut Element, parent: AffineMatrix) {
    let matrix = effective_matrix(parent, node);

    for child in &mut node.children {
        flatten_node(child, matrix);
    }

    match node.local_name().to_ascii_lowercase().as_str() {
        "path" => {
            if let Some(d) = node.attr("d") {
                let path = to_absolute(d).transform(matrix);
                node.set_attr("d", path);
            }
        }
        "polygon" | "polyline" => {
            if let Some(raw) = node.attr("points") {
                let points: Vec<DVec2> =
                    parse_points(raw).into_iter().map(|p| matrix.apply(p)).collect();
                node.set_attr("points", format_points(&points));
            }
        }
        "circle" => move_anchor(node, matrix, "cx", "cy"),
        "text" => {
            if node.has_attr("x") || node.has_attr("y") {
                move_anchor(node, matrix, "x", "y");
            }
        }
        "image" => bake_image_box(node, matrix),
        "rect" | "line" | "ellipse" => {
            if let Some(replacement) = primitive_to_path(node, matrix) {
                *node = replacement;
            }
        }
        _ => {}
    }

    node.remove_attr("transform");
}

fn move_anchor(node: &mut Element, matrix: AffineMatrix, x: &str, y: &str) {
    if matrix.is_identity() {
        return;
    }
    let p = dvec2(node.attr_f64(x).unwrap_or(0.0), node.attr_f64(y).unwrap_or(0.0));
    let moved = matrix.apply(p);
    node.set_attr(x, moved.x);
    node.set_attr(y, moved.y);
}

/// Replace an image's box with the axis-aligned box of its transformed
/// corners.
fn bake_image_box(node: &mut Element, matrix: AffineMatrix) {
    if matrix.is_identity() {
        return;
    }
    let x = node.attr_f64("x").unwrap_or(0.0);
    let y = node.attr_f64("y").unwrap_or(0.0);
    let w = node.attr_f64("width").unwrap_or(0.0);
    let h = node.attr_f64("height").unwrap_or(0.0);
    let bbox = BBox::from_points(
        [dvec2(x, y), dvec2(x + w, y), dvec2(x + w, y + h), dvec2(x, y + h)]
            .map(|p| matrix.apply(p)),
    );
    node.set_attr("x", bbox.min.x);
    node.set_attr("y", bbox.min.y);
    node.set_attr("width", bbox.width());
    node.set_attr("height", bbox.height());
}

/// Synthesize the path equivalent of a `rect`, `line` or `ellipse`, in
/// root coordinates. Non-geometric attributes are carried over.
pub fn primitive_to_path(node: &Element, matrix: AffineMatrix) -> Option<Element> {
    let num = |name: &str| node.attr_f64(name).unwrap_or(0.0);
    let t = |x: f64, y: f64| matrix.apply(dvec2(x, y));

    let path: Path = match node.local_name().to_ascii_lowercase().as_str() {
        "rect" => {
            let (x, y, w, h) = (num("x"), num("y"), num("width"), num("height"));
            [
                PathCommand::MoveTo(t(x, y)),
                PathCommand::LineTo(t(x + w, y)),
                PathCommand::LineTo(t(x + w, y + h)),
                PathCommand::LineTo(t(x, y + h)),
                PathCommand::Close,
            ]
            .into_iter()
            .collect()
        }
        "line" => [
            PathCommand::MoveTo(t(num("x1"), num("y1"))),
            PathCommand::LineTo(t(num("x2"), num("y2"))),
        ]
        .into_iter()
        .collect(),
        "ellipse" => {
            let (cx, cy, rx, ry) = (num("cx"), num("cy"), num("rx"), num("ry"));
            let left = t(cx - rx, cy);
            let right = t(cx + rx, cy);
            let half = |end| PathCommand::ArcTo {
                rx,
                ry,
                x_rotation: 0.0,
                large_arc: true,
                sweep: false,
                end,
            };
            [PathCommand::MoveTo(left), half(right), half(left), PathCommand::Close]
                .into_iter()
                .collect()
        }
        _ => return None,
    };

    let mut replacement = Element::new(renamed(node, "path"));
    node.copy_attributes_to(&mut replacement, PRIMITIVE_GEOMETRY);
    replacement.set_attr("d", path);
    Some(replacement)
}

/// `tag` with `node`'s namespace prefix, if any.
fn renamed(node: &Element, tag: &str) -> String {
    match node.name.rsplit_once(':') {
        Some((prefix, _)) => format!("{prefix}:{tag}"),
        None => tag.to_string(),
    }
}

// ============================================================================
// Instancing references
// ============================================================================

/// Replace every `<use>` below `root` with a clone of the element it
/// references. Returns the number of references handled.
///
/// Clones are expanded recursively, so references inside them resolve
/// too. A reference to an element that is already being expanded (a
/// cycle), to a missing id, or beyond [`defaults::MAX_USE_INSTANCES`]
/// clones is dropped. Clones carry no `id` attributes.
pub fn resolve_uses(root: &mut Element) -> usize {
    if !root.descendants().any(|e| e.is("use")) {
        return 0;
    }
    let wanted: HashSet<&str> = root
        .descendants()
        .filter(|e| e.is("use"))
        .filter_map(local_ref)
        .collect();

    let mut targets: HashMap<String, Element> = HashMap::new();
    for element in root.descendants() {
        if let Some(id) = element.id().filter(|id| wanted.contains(id)) {
            targets
                .entry(id.to_string())
                .or_insert_with(|| element.clone());
        }
    }

    let mut expander = UseExpander {
        targets,
        active: Vec::new(),
        handled: 0,
        instances: 0,
    };
    expander.expand(root);
    expander.handled
}

fn local_ref(node: &Element) -> Option<&str> {
    node.href()?.trim().strip_prefix('#')
}

struct UseExpander {
    /// Referenced elements as they were before any expansion.
    targets: HashMap<String, Element>,
    /// Ids of the elements enclosing the node being expanded.
    active: Vec<String>,
    handled: usize,
    instances: usize,
}

impl UseExpander {
    fn expand(&mut self, node: &mut Element) {
        let own_id = node.id().map(str::to_string);
        if let Some(id) = &own_id {
            self.active.push(id.clone());
        }

        let children = std::mem::take(&mut node.children);
        node.children = children
            .into_iter()
            .filter_map(|mut child| {
                if child.is("use") {
                    self.handled += 1;
                    self.instantiate(&child)
                } else {
                    self.expand(&mut child);
                    Some(child)
                }
            })
            .collect();

        if own_id.is_some() {
            self.active.pop();
        }
    }

    /// Clone the target of `use_node`, prefixed with `translate(x, y)` and
    /// the reference's own transform, and expand it.
    fn instantiate(&mut self, use_node: &Element) -> Option<Element> {
        let href = use_node.href().unwrap_or_default();
        let Some(id) = local_ref(use_node) else {
            crate::log::warn!(href, "dropping use element with unresolvable reference");
            return None;
        };
        if self.active.iter().any(|active| active == id) {
            crate::log::warn!(href, "dropping use element that references itself");
            return None;
        }
        if self.instances >= defaults::MAX_USE_INSTANCES {
            crate::log::warn!(href, "too many use instances, dropping reference");
            return None;
        }
        let Some(mut clone) = self.targets.get(id).cloned() else {
            crate::log::warn!(href, "dropping use element with unresolvable reference");
            return None;
        };
        self.instances += 1;

        let x = use_node.attr_f64("x").unwrap_or(0.0);
        let y = use_node.attr_f64("y").unwrap_or(0.0);
        let mut transforms = Vec::new();
        if x != 0.0 || y != 0.0 {
            transforms.push(format!("translate({x},{y})"));
        }
        if let Some(own) = use_node.attr("transform") {
            transforms.push(own.to_string());
        }
        if let Some(inner) = clone.attr("transform") {
            transforms.push(inner.to_string());
        }
        if !transforms.is_empty() {
            clone.set_attr("transform", transforms.join(" "));
        }

        // Presentation attributes on the reference are inherited by the clone
        // unless the clone sets them itself.
        for (k, v) in use_node.attributes() {
            if !USE_OWN.contains(&k) && !clone.has_attr(k) {
                clone.set_attr(k, v);
            }
        }

        self.active.push(id.to_string());
        self.expand(&mut clone);
        self.active.pop();

        clone.for_each_mut(&mut |element| {
            element.remove_attr("id");
        });
        Some(clone)
    }
}
