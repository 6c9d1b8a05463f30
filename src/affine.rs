//! 2D affine matrices and the SVG `transform` attribute syntax.
//!
//! A matrix is the SVG six-tuple `(a, b, c, d, e, f)`:
//!
//! ```text
//! | a c e |
//! | b d f |
//! | 0 0 1 |
//! ```
//!
//! Internally this is a [`DAffine2`] with `x_axis = (a, b)`,
//! `y_axis = (c, d)` and `translation = (e, f)`.

use std::ops::Mul;

use glam::{DAffine2, DMat2, DVec2};
use pest::Parser;
use pest::iterators::Pair;

use crate::types::DevicePoint;
use crate::{GeometryParser, Rule};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineMatrix(DAffine2);

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix(DAffine2::IDENTITY);

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        AffineMatrix(DAffine2::from_cols_array(&[a, b, c, d, e, f]))
    }

    /// The matrix as `[a, b, c, d, e, f]`.
    pub fn to_array(self) -> [f64; 6] {
        self.0.to_cols_array()
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `deg` degrees (clockwise on screen, since y points down).
    pub fn rotate(deg: f64) -> Self {
        let (sin, cos) = deg.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `translate(cx, cy) · rotate(deg) · translate(-cx, -cy)`
    pub fn rotate_about(deg: f64, cx: f64, cy: f64) -> Self {
        Self::translate(cx, cy) * Self::rotate(deg) * Self::translate(-cx, -cy)
    }

    pub fn skew_x(deg: f64) -> Self {
        Self::new(1.0, 0.0, deg.to_radians().tan(), 1.0, 0.0, 0.0)
    }

    pub fn skew_y(deg: f64) -> Self {
        Self::new(1.0, deg.to_radians().tan(), 0.0, 1.0, 0.0, 0.0)
    }

    /// Apply `local` first, then `self`.
    pub fn compose(self, local: AffineMatrix) -> AffineMatrix {
        AffineMatrix(self.0 * local.0)
    }

    /// Linear part times `p`, plus translation.
    pub fn apply(self, p: DevicePoint) -> DevicePoint {
        self.0.transform_point2(p)
    }

    /// The linear part only (no translation), e.g. for vectors.
    pub fn apply_vector(self, v: DVec2) -> DVec2 {
        self.0.transform_vector2(v)
    }

    pub fn linear(self) -> DMat2 {
        self.0.matrix2
    }

    pub fn is_identity(self) -> bool {
        self.0 == DAffine2::IDENTITY
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Parse an SVG transform list.
    ///
    /// Functions compose left to right in the order written. Unknown or
    /// malformed functions contribute the identity; parsing never fails.
    pub fn parse(text: &str) -> AffineMatrix {
        let Ok(mut pairs) = GeometryParser::parse(Rule::transform_list, text) else {
            crate::log::warn!(transform = text, "unparsable transform list");
            return Self::IDENTITY;
        };
        let Some(list) = pairs.next() else {
            return Self::IDENTITY;
        };

        list.into_inner()
            .filter(|pair| pair.as_rule() == Rule::transform_fn)
            .map(parse_function)
            .fold(Self::IDENTITY, |acc, m| acc * m)
    }
}

impl Mul for AffineMatrix {
    type Output = AffineMatrix;

    fn mul(self, rhs: AffineMatrix) -> AffineMatrix {
        self.compose(rhs)
    }
}

fn parse_function(pair: Pair<Rule>) -> AffineMatrix {
    let mut name = "";
    let mut args = Vec::new();
    let mut malformed = false;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::fn_name => name = inner.as_str(),
            Rule::fn_args => {
                for arg in inner.into_inner() {
                    match arg.as_str().parse::<f64>() {
                        Ok(v) if arg.as_rule() == Rule::number && v.is_finite() => args.push(v),
                        _ => malformed = true,
                    }
                }
            }
            _ => {}
        }
    }

    if malformed {
        crate::log::warn!(function = name, "malformed transform arguments, using identity");
        return AffineMatrix::IDENTITY;
    }

    let matrix = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("matrix", &[a, b, c, d, e, f]) => Some(AffineMatrix::new(a, b, c, d, e, f)),
        ("translate", &[tx]) => Some(AffineMatrix::translate(tx, 0.0)),
        ("translate", &[tx, ty]) => Some(AffineMatrix::translate(tx, ty)),
        ("scale", &[s]) => Some(AffineMatrix::scale(s, s)),
        ("scale", &[sx, sy]) => Some(AffineMatrix::scale(sx, sy)),
        ("rotate", &[deg]) => Some(AffineMatrix::rotate(deg)),
        ("rotate", &[deg, cx, cy]) => Some(AffineMatrix::rotate_about(deg, cx, cy)),
        ("skewx", &[deg]) => Some(AffineMatrix::skew_x(deg)),
        ("skewy", &[deg]) => Some(AffineMatrix::skew_y(deg)),
        _ => None,
    };

    matrix.unwrap_or_else(|| {
        crate::log::warn!(
            function = name,
            arity = args.len(),
            "unrecognized transform function, using identity"
        );
        AffineMatrix::IDENTITY
    })
}
