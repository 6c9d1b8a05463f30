//! SVG path data: parsing to absolute commands and serialization.
//!
//! [`to_absolute`] accepts the full command set (`M L H V C S Q T A Z`,
//! absolute and relative, with implicit repeats) and produces a [`Path`]
//! containing only absolute `MoveTo`, `LineTo`, `CubicTo`, `QuadTo`,
//! `ArcTo` and `Close`. Shorthand curves are expanded, `H`/`V` become
//! `LineTo`.
//!
//! Malformed data is truncated: everything up to the first unparsable
//! token or incomplete operand group is kept.

use std::fmt;

use glam::DVec2;
use pest::Parser;

use crate::affine::AffineMatrix;
use crate::types::{BBox, DevicePoint};
use crate::{GeometryParser, Rule};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(DevicePoint),
    LineTo(DevicePoint),
    CubicTo {
        c1: DevicePoint,
        c2: DevicePoint,
        end: DevicePoint,
    },
    QuadTo {
        c1: DevicePoint,
        end: DevicePoint,
    },
    /// Radii, rotation and flags are carried through unchanged by every
    /// coordinate transform; only `end` moves.
    ArcTo {
        rx: f64,
        ry: f64,
        x_rotation: f64,
        large_arc: bool,
        sweep: bool,
        end: DevicePoint,
    },
    Close,
}

impl PathCommand {
    /// The point the pen ends at, if the command has one of its own.
    pub fn end_point(&self) -> Option<DevicePoint> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(p),
            PathCommand::CubicTo { end, .. }
            | PathCommand::QuadTo { end, .. }
            | PathCommand::ArcTo { end, .. } => Some(end),
            PathCommand::Close => None,
        }
    }

    /// Every coordinate pair of the command, control points first.
    pub fn points(&self) -> Vec<DevicePoint> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => vec![p],
            PathCommand::CubicTo { c1, c2, end } => vec![c1, c2, end],
            PathCommand::QuadTo { c1, end } => vec![c1, end],
            PathCommand::ArcTo { end, .. } => vec![end],
            PathCommand::Close => Vec::new(),
        }
    }

    /// Map every coordinate pair through `f`.
    pub fn map_points(self, mut f: impl FnMut(DevicePoint) -> DevicePoint) -> PathCommand {
        match self {
            PathCommand::MoveTo(p) => PathCommand::MoveTo(f(p)),
            PathCommand::LineTo(p) => PathCommand::LineTo(f(p)),
            PathCommand::CubicTo { c1, c2, end } => PathCommand::CubicTo {
                c1: f(c1),
                c2: f(c2),
                end: f(end),
            },
            PathCommand::QuadTo { c1, end } => PathCommand::QuadTo {
                c1: f(c1),
                end: f(end),
            },
            PathCommand::ArcTo {
                rx,
                ry,
                x_rotation,
                large_arc,
                sweep,
                end,
            } => PathCommand::ArcTo {
                rx,
                ry,
                x_rotation,
                large_arc,
                sweep,
                end: f(end),
            },
            PathCommand::Close => PathCommand::Close,
        }
    }
}

/// An ordered sequence of absolute path commands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: PathCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Apply `matrix` to every coordinate pair. Arc radii and rotation are
    /// not adjusted.
    pub fn transform(&self, matrix: AffineMatrix) -> Path {
        if matrix.is_identity() {
            return self.clone();
        }
        self.commands
            .iter()
            .map(|cmd| cmd.map_points(|p| matrix.apply(p)))
            .collect()
    }

    /// All coordinate pairs, control points included.
    pub fn vertices(&self) -> impl Iterator<Item = DevicePoint> + '_ {
        self.commands.iter().flat_map(|cmd| cmd.points())
    }

    pub fn bbox(&self) -> BBox {
        BBox::from_points(self.vertices())
    }
}

impl FromIterator<PathCommand> for Path {
    fn from_iter<I: IntoIterator<Item = PathCommand>>(iter: I) -> Self {
        Path {
            commands: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Path {
    type Item = PathCommand;
    type IntoIter = std::vec::IntoIter<PathCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathCommand;
    type IntoIter = std::slice::Iter<'a, PathCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// Avoid emitting `-0`.
fn num(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

impl fmt::Display for PathCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PathCommand::MoveTo(p) => write!(f, "M {} {}", num(p.x), num(p.y)),
            PathCommand::LineTo(p) => write!(f, "L {} {}", num(p.x), num(p.y)),
            PathCommand::CubicTo { c1, c2, end } => write!(
                f,
                "C {} {} {} {} {} {}",
                num(c1.x),
                num(c1.y),
                num(c2.x),
                num(c2.y),
                num(end.x),
                num(end.y)
            ),
            PathCommand::QuadTo { c1, end } => write!(
                f,
                "Q {} {} {} {}",
                num(c1.x),
                num(c1.y),
                num(end.x),
                num(end.y)
            ),
            PathCommand::ArcTo {
                rx,
                ry,
                x_rotation,
                large_arc,
                sweep,
                end,
            } => write!(
                f,
                "A {} {} {} {} {} {} {}",
                num(rx),
                num(ry),
                num(x_rotation),
                u8::from(large_arc),
                u8::from(sweep),
                num(end.x),
                num(end.y)
            ),
            PathCommand::Close => write!(f, "Z"),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

/// Serialize to path data: one command letter followed by its absolute
/// operands, per command.
pub fn serialize(path: &Path) -> String {
    path.to_string()
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token<'a> {
    Command(char),
    /// The parsed value and its source text.
    Number(f64, &'a str),
    Junk,
}

fn tokenize(raw: &str) -> Vec<Token<'_>> {
    let Ok(mut pairs) = GeometryParser::parse(Rule::path_data, raw) else {
        return vec![Token::Junk];
    };
    let Some(data) = pairs.next() else {
        return Vec::new();
    };

    data.into_inner()
        .filter_map(|pair| match pair.as_rule() {
            Rule::command => pair.as_str().chars().next().map(Token::Command),
            Rule::number => {
                let text = pair.as_str();
                Some(match text.parse::<f64>() {
                    Ok(v) if v.is_finite() => Token::Number(v, text),
                    _ => Token::Junk,
                })
            }
            Rule::junk => Some(Token::Junk),
            _ => None,
        })
        .collect()
}

/// The kind of the previous segment, for shorthand curve reflection.
#[derive(Clone, Copy, Debug)]
enum Previous {
    Other,
    Cubic { ctrl: DVec2 },
    Quad { ctrl: DVec2 },
}

/// Parser state threaded through every command.
#[derive(Debug)]
struct Cursor {
    current: DVec2,
    subpath_start: DVec2,
    previous: Previous,
}

impl Cursor {
    fn new() -> Self {
        Cursor {
            current: DVec2::ZERO,
            subpath_start: DVec2::ZERO,
            previous: Previous::Other,
        }
    }

    fn point(&self, relative: bool, x: f64, y: f64) -> DVec2 {
        let p = DVec2::new(x, y);
        if relative { self.current + p } else { p }
    }

    /// Apply one operand group of `letter` and return the absolute command.
    fn apply(&mut self, letter: char, ops: &[f64]) -> PathCommand {
        let relative = letter.is_ascii_lowercase();
        let (command, previous) = match (letter.to_ascii_uppercase(), ops) {
            ('M', &[x, y]) => {
                let p = self.point(relative, x, y);
                self.subpath_start = p;
                (PathCommand::MoveTo(p), Previous::Other)
            }
            ('L', &[x, y]) => (PathCommand::LineTo(self.point(relative, x, y)), Previous::Other),
            ('H', &[x]) => {
                let x = if relative { self.current.x + x } else { x };
                (PathCommand::LineTo(DVec2::new(x, self.current.y)), Previous::Other)
            }
            ('V', &[y]) => {
                let y = if relative { self.current.y + y } else { y };
                (PathCommand::LineTo(DVec2::new(self.current.x, y)), Previous::Other)
            }
            ('C', &[x1, y1, x2, y2, x, y]) => {
                let c2 = self.point(relative, x2, y2);
                let cmd = PathCommand::CubicTo {
                    c1: self.point(relative, x1, y1),
                    c2,
                    end: self.point(relative, x, y),
                };
                (cmd, Previous::Cubic { ctrl: c2 })
            }
            ('S', &[x2, y2, x, y]) => {
                let c1 = match self.previous {
                    Previous::Cubic { ctrl } => 2.0 * self.current - ctrl,
                    _ => self.current,
                };
                let c2 = self.point(relative, x2, y2);
                let cmd = PathCommand::CubicTo {
                    c1,
                    c2,
                    end: self.point(relative, x, y),
                };
                (cmd, Previous::Cubic { ctrl: c2 })
            }
            ('Q', &[x1, y1, x, y]) => {
                let c1 = self.point(relative, x1, y1);
                let cmd = PathCommand::QuadTo {
                    c1,
                    end: self.point(relative, x, y),
                };
                (cmd, Previous::Quad { ctrl: c1 })
            }
            ('T', &[x, y]) => {
                let c1 = match self.previous {
                    Previous::Quad { ctrl } => 2.0 * self.current - ctrl,
                    _ => self.current,
                };
                let cmd = PathCommand::QuadTo {
                    c1,
                    end: self.point(relative, x, y),
                };
                (cmd, Previous::Quad { ctrl: c1 })
            }
            ('A', &[rx, ry, x_rotation, large_arc, sweep, x, y]) => {
                let cmd = PathCommand::ArcTo {
                    rx,
                    ry,
                    x_rotation,
                    large_arc: large_arc != 0.0,
                    sweep: sweep != 0.0,
                    end: self.point(relative, x, y),
                };
                (cmd, Previous::Other)
            }
            _ => {
                self.current = self.subpath_start;
                self.previous = Previous::Other;
                return PathCommand::Close;
            }
        };

        if let Some(end) = command.end_point() {
            self.current = end;
        }
        self.previous = previous;
        command
    }
}

/// Number of operands one repetition of `letter` consumes.
fn arity(letter: char) -> usize {
    match letter.to_ascii_uppercase() {
        'M' | 'L' | 'T' => 2,
        'H' | 'V' => 1,
        'C' => 6,
        'S' | 'Q' => 4,
        'A' => 7,
        _ => 0,
    }
}

/// Read `n` numbers starting at `*i`, advancing `*i` only on success.
fn operands(tokens: &[Token<'_>], i: &mut usize, n: usize) -> Option<Vec<f64>> {
    let ops: Vec<f64> = tokens[*i..]
        .iter()
        .take(n)
        .map_while(|t| match t {
            Token::Number(v, _) => Some(*v),
            _ => None,
        })
        .collect();
    if ops.len() < n {
        return None;
    }
    *i += n;
    Some(ops)
}

/// Read one arc operand group starting at `*i`, advancing `*i` only on
/// success.
///
/// The two flags are single `0`/`1` characters and may run into the
/// following operand without a separator (`a5 5 0 1110 0`), which the
/// tokenizer reads as one number. Such a token is split here.
fn arc_operands(tokens: &[Token<'_>], i: &mut usize) -> Option<Vec<f64>> {
    let mut at = *i;
    let mut rest: Option<&str> = None;
    let mut ops = Vec::with_capacity(7);

    for slot in 0..7 {
        let text = match rest.take() {
            Some(text) => text,
            None => match tokens.get(at)? {
                Token::Number(_, text) => {
                    at += 1;
                    *text
                }
                _ => return None,
            },
        };
        if slot == 3 || slot == 4 {
            let (flag, tail) = text.split_at_checked(1)?;
            ops.push(match flag {
                "0" => 0.0,
                "1" => 1.0,
                _ => return None,
            });
            rest = (!tail.is_empty()).then_some(tail);
        } else {
            ops.push(text.parse::<f64>().ok().filter(|v| v.is_finite())?);
        }
    }

    *i = at;
    Some(ops)
}

/// Parse path data into absolute commands.
pub fn to_absolute(raw: &str) -> Path {
    let tokens = tokenize(raw);
    let mut cursor = Cursor::new();
    let mut path = Path::new();
    let mut active: Option<char> = None;
    let mut i = 0;

    while i < tokens.len() {
        let letter = match tokens[i] {
            Token::Command(c) => {
                i += 1;
                if c.eq_ignore_ascii_case(&'z') {
                    path.push(cursor.apply(c, &[]));
                    active = None;
                    continue;
                }
                c
            }
            Token::Number(..) => match active {
                Some(c) => c,
                None => break,
            },
            Token::Junk => break,
        };

        let ops = if letter.eq_ignore_ascii_case(&'a') {
            arc_operands(&tokens, &mut i)
        } else {
            operands(&tokens, &mut i, arity(letter))
        };
        let Some(ops) = ops else {
            break;
        };

        path.push(cursor.apply(letter, &ops));

        // Extra coordinate pairs after a moveto are implicit linetos.
        active = Some(match letter {
            'M' => 'L',
            'm' => 'l',
            other => other,
        });
    }

    if i < tokens.len() {
        crate::log::debug!(
            raw,
            kept = path.len(),
            "path data truncated at unparsable token"
        );
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;
    use insta::assert_snapshot;

    fn abs(raw: &str) -> String {
        to_absolute(raw).to_string()
    }

    #[test]
    fn absolute_commands_pass_through() {
        assert_snapshot!(abs("M 10 20 L 30 40 Z"), @"M 10 20 L 30 40 Z");
    }

    #[test]
    fn relative_commands_accumulate() {
        assert_snapshot!(abs("m10 10 l5 0 0 5 -5 0z"), @"M 10 10 L 15 10 L 15 15 L 10 15 Z");
    }

    #[test]
    fn implicit_pairs_after_moveto_are_lines() {
        assert_snapshot!(abs("M0 0 10 0 10 10"), @"M 0 0 L 10 0 L 10 10");
        assert_snapshot!(abs("m1 1 2 2"), @"M 1 1 L 3 3");
    }

    #[test]
    fn horizontal_and_vertical_become_lines() {
        assert_snapshot!(abs("M 1 2 H 5 V 7 h -2 v -3"), @"M 1 2 L 5 2 L 5 7 L 3 7 L 3 4");
    }

    #[test]
    fn compact_number_syntax() {
        assert_snapshot!(abs("M1.5.5L-1-2"), @"M 1.5 0.5 L -1 -2");
        assert_snapshot!(abs("M1e1,2E-1"), @"M 10 0.2");
    }

    #[test]
    fn smooth_cubic_reflects_previous_control() {
        assert_snapshot!(
            abs("M 0 0 C 0 10 10 10 10 0 S 20 -10 20 0"),
            @"M 0 0 C 0 10 10 10 10 0 C 10 -10 20 -10 20 0"
        );
    }

    #[test]
    fn smooth_cubic_after_line_uses_current_point() {
        assert_snapshot!(abs("M 0 0 L 5 5 S 10 10 15 5"), @"M 0 0 L 5 5 C 5 5 10 10 15 5");
    }

    #[test]
    fn smooth_cubic_after_quad_does_not_reflect() {
        assert_snapshot!(abs("M 0 0 Q 5 5 10 0 S 15 5 20 0"), @"M 0 0 Q 5 5 10 0 C 10 0 15 5 20 0");
    }

    #[test]
    fn smooth_quad_chain_reflects() {
        assert_snapshot!(
            abs("M 0 0 Q 5 5 10 0 T 20 0 t 10 0"),
            @"M 0 0 Q 5 5 10 0 Q 15 -5 20 0 Q 25 5 30 0"
        );
    }

    #[test]
    fn smooth_quad_after_cubic_does_not_reflect() {
        assert_snapshot!(abs("M 0 0 C 1 1 2 2 3 3 T 6 3"), @"M 0 0 C 1 1 2 2 3 3 Q 3 3 6 3");
    }

    #[test]
    fn relative_cubic_offsets_share_the_start_point() {
        assert_snapshot!(abs("M 10 10 c 1 2 3 4 5 6"), @"M 10 10 C 11 12 13 14 15 16");
    }

    #[test]
    fn arcs_keep_radii_and_flags() {
        assert_snapshot!(abs("M 0 0 a 5 7 30 1 0 10 0"), @"M 0 0 A 5 7 30 1 0 10 0");
    }

    #[test]
    fn arc_flags_without_separators() {
        assert_snapshot!(abs("M0 0 a5 5 0 1110 0"), @"M 0 0 A 5 5 0 1 1 10 0");
        assert_snapshot!(abs("M0 0 a5 5 0 01-3 4"), @"M 0 0 A 5 5 0 0 1 -3 4");
        assert_snapshot!(abs("M0 0 A5,5,0,0,1.5.5"), @"M 0 0 A 5 5 0 0 1 0.5 0.5");
        assert_snapshot!(abs("M0 0 a1 1 0 11 2 2 1 1 0 002 0"), @"M 0 0 A 1 1 0 1 1 2 2 A 1 1 0 0 0 4 2");
    }

    #[test]
    fn arc_flags_must_be_binary() {
        assert_snapshot!(abs("M 0 0 L 1 1 A 5 5 0 2 0 10 0"), @"M 0 0 L 1 1");
        assert_snapshot!(abs("M 0 0 A 5 5 0 1.0 0 10 0"), @"M 0 0");
    }

    #[test]
    fn close_returns_to_subpath_start() {
        assert_snapshot!(abs("M 10 10 l 5 0 z m 1 1 l 1 0"), @"M 10 10 L 15 10 Z M 11 11 L 12 11");
    }

    #[test]
    fn truncates_at_bad_data() {
        assert_snapshot!(abs("M 0 0 L 1 1 L 2 # 3 3"), @"M 0 0 L 1 1");
        assert_snapshot!(abs("M 0 0 L 5"), @"M 0 0");
        assert_snapshot!(abs("10 10 L 5 5"), @"");
    }

    #[test]
    fn to_absolute_is_idempotent() {
        for raw in [
            "m10 10 l5 0 0 5z",
            "M0 0 c 1 2 3 4 5 6 s 1 1 2 2 q 1 1 2 0 t 2 0 a 4 4 0 0 1 3 3 h 4 v 4 Z",
            "M 1e2 -3.5 L .5 .25",
        ] {
            let once = to_absolute(raw);
            let twice = to_absolute(&serialize(&once));
            assert_eq!(once, twice, "{raw}");
        }
    }

    #[test]
    fn transform_moves_arc_endpoint_only() {
        let path = to_absolute("M 0 0 A 5 5 0 0 1 10 0");
        let moved = path.transform(AffineMatrix::scale(2.0, 3.0));
        assert_eq!(
            moved.commands()[1],
            PathCommand::ArcTo {
                rx: 5.0,
                ry: 5.0,
                x_rotation: 0.0,
                large_arc: false,
                sweep: true,
                end: dvec2(20.0, 0.0),
            }
        );
    }

    #[test]
    fn vertices_include_control_points() {
        let path = to_absolute("M 0 0 Q 5 10 10 0 Z");
        let vertices: Vec<_> = path.vertices().collect();
        assert_eq!(vertices, vec![dvec2(0.0, 0.0), dvec2(5.0, 10.0), dvec2(10.0, 0.0)]);
        assert_eq!(path.bbox().max, dvec2(10.0, 10.0));
    }
}
