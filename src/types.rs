//! Strongly-typed coordinates for the three spaces the pipeline works in.
//!
//! - Device space: the drawing's own coordinates, y grows downward. Plain
//!   [`DVec2`] (aliased as [`DevicePoint`]).
//! - Unit-projection space: output of a projection at scale 1 around the
//!   origin, same y orientation as device space. [`UnitPoint`].
//! - Geographic space: longitude/latitude in degrees. [`LonLat`].
//!
//! Conversions between spaces only happen through a projection or a
//! calibration, never by reinterpreting a value.

use std::fmt;
use std::str::FromStr;

use glam::DVec2;

/// A point in the drawing's coordinate space.
pub type DevicePoint = DVec2;

/// A point in unit-projection space.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[repr(transparent)]
pub struct UnitPoint(pub DVec2);

impl UnitPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        UnitPoint(DVec2::new(x, y))
    }

    #[inline]
    pub fn x(self) -> f64 {
        self.0.x
    }

    #[inline]
    pub fn y(self) -> f64 {
        self.0.y
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

/// Geographic coordinates in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    #[inline]
    pub fn new(lon: f64, lat: f64) -> Self {
        LonLat { lon, lat }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

/// Wrap an angle in degrees into `[-180, 180]`, mapping `-180` to `180`.
pub fn wrap180(deg: f64) -> f64 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Axis-aligned bounding box in device space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: DevicePoint,
    pub max: DevicePoint,
}

impl Default for BBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BBox {
    /// An empty box that any point will expand.
    pub fn new() -> Self {
        BBox {
            min: DVec2::splat(f64::INFINITY),
            max: DVec2::splat(f64::NEG_INFINITY),
        }
    }

    pub fn from_points<I: IntoIterator<Item = DevicePoint>>(points: I) -> Self {
        let mut bbox = BBox::new();
        for p in points {
            bbox.include(p);
        }
        bbox
    }

    /// Expand to cover `p`. Non-finite points are ignored.
    pub fn include(&mut self, p: DevicePoint) {
        if !p.is_finite() {
            return;
        }
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> DevicePoint {
        (self.min + self.max) * 0.5
    }
}

/// Simple color model for matching stroke and fill values.
#[derive(Clone, Debug, PartialEq)]
pub enum Color {
    None,
    Rgb(u8, u8, u8),
    /// Anything we don't interpret (gradients, `currentColor`, ...)
    Raw(String),
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::None => write!(f, "none"),
            Color::Rgb(r, g, b) => write!(f, "rgb({},{},{})", r, g, b),
            Color::Raw(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for Color {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_color(s))
    }
}

fn parse_color(s: &str) -> Color {
    let s = s.trim();
    if s.eq_ignore_ascii_case("none") {
        return Color::None;
    }

    if let Some(inner) = s.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if let [r, g, b] = parts.as_slice() {
            if let (Ok(r), Ok(g), Ok(b)) = (r.parse::<u8>(), g.parse::<u8>(), b.parse::<u8>()) {
                return Color::Rgb(r, g, b);
            }
        }
        return Color::Raw(s.to_string());
    }

    if let Some(hex) = s.strip_prefix('#').filter(|h| h.is_ascii()) {
        let channel = |h: &str| u8::from_str_radix(h, 16).ok();
        match hex.len() {
            6 => {
                if let (Some(r), Some(g), Some(b)) =
                    (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]))
                {
                    return Color::Rgb(r, g, b);
                }
            }
            3 => {
                // #abc -> #aabbcc
                if let (Some(r), Some(g), Some(b)) =
                    (channel(&hex[0..1]), channel(&hex[1..2]), channel(&hex[2..3]))
                {
                    return Color::Rgb(r * 17, g * 17, b * 17);
                }
            }
            _ => {}
        }
        return Color::Raw(s.to_string());
    }

    match s.to_ascii_lowercase().as_str() {
        "black" => Color::Rgb(0, 0, 0),
        "white" => Color::Rgb(255, 255, 255),
        "red" => Color::Rgb(255, 0, 0),
        "lime" => Color::Rgb(0, 255, 0),
        "green" => Color::Rgb(0, 128, 0),
        "blue" => Color::Rgb(0, 0, 255),
        "yellow" => Color::Rgb(255, 255, 0),
        "cyan" | "aqua" => Color::Rgb(0, 255, 255),
        "magenta" | "fuchsia" => Color::Rgb(255, 0, 255),
        "gray" | "grey" => Color::Rgb(128, 128, 128),
        _ => Color::Raw(s.to_string()),
    }
}
