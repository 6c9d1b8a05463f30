//! Owned document tree.
//!
//! This is the boundary type between the geometry pipeline and whatever
//! XML library the caller uses: elements with ordered attributes and
//! children, plus lookup by `id`. The pipeline mutates it in place and
//! replaces nodes by assignment (`*node = replacement`).

use glam::DVec2;

use crate::types::DevicePoint;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Tag name without any namespace prefix, e.g. `path` for `svg:path`.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Numeric attribute value; accepts a trailing `px`.
    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        let raw = self.attr(name)?.trim();
        let raw = raw.strip_suffix("px").unwrap_or(raw);
        raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// The `href` of an instancing reference, plain or `xlink:`.
    pub fn href(&self) -> Option<&str> {
        self.attr("href").or_else(|| self.attr("xlink:href"))
    }

    /// A presentation property, from the attribute of that name or else
    /// from the `style` declarations.
    pub fn style_property(&self, key: &str) -> Option<&str> {
        if let Some(direct) = self.attr(key) {
            return Some(direct.trim());
        }
        self.attr("style")?.split(';').find_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            (k.trim() == key).then(|| v.trim())
        })
    }

    /// Copy every attribute not listed in `skip` onto `target`.
    pub fn copy_attributes_to(&self, target: &mut Element, skip: &[&str]) {
        for (k, v) in self.attributes() {
            if !skip.contains(&k) {
                target.set_attr(k, v);
            }
        }
    }

    /// Pre-order traversal starting at (and including) `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.descendants().find(|e| e.id() == Some(id))
    }

    /// Visit `self` and every descendant, parents before children.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parse a `points` attribute (`x,y x,y ...`). A trailing odd number is
/// ignored; parsing stops at the first non-number.
pub fn parse_points(raw: &str) -> Vec<DevicePoint> {
    let numbers: Vec<f64> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map_while(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    numbers
        .chunks_exact(2)
        .map(|pair| DVec2::new(pair[0], pair[1]))
        .collect()
}

pub fn format_points(points: &[DevicePoint]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    fn sample() -> Element {
        Element::new("svg")
            .with_child(
                Element::new("g")
                    .with_attr("id", "outer")
                    .with_child(Element::new("path").with_attr("id", "inner")),
            )
            .with_child(Element::new("rect").with_attr("id", "last"))
    }

    #[test]
    fn attributes_keep_order_on_update() {
        let mut e = Element::new("path").with_attr("d", "M 0 0").with_attr("fill", "red");
        e.set_attr("d", "M 1 1");
        let names: Vec<_> = e.attributes().map(|(k, _)| k).collect();
        assert_eq!(names, ["d", "fill"]);
        assert_eq!(e.attr("d"), Some("M 1 1"));
        assert_eq!(e.remove_attr("d").as_deref(), Some("M 1 1"));
        assert!(!e.has_attr("d"));
    }

    #[test]
    fn descendants_are_pre_order() {
        let doc = sample();
        let names: Vec<_> = doc.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["svg", "g", "path", "rect"]);
    }

    #[test]
    fn find_by_id_searches_the_whole_tree() {
        let doc = sample();
        assert_eq!(doc.find_by_id("inner").map(|e| e.name.as_str()), Some("path"));
        assert!(doc.find_by_id("missing").is_none());
    }

    #[test]
    fn style_property_prefers_attribute() {
        let e = Element::new("path")
            .with_attr("style", "fill:none; stroke : rgb(255,0,0)");
        assert_eq!(e.style_property("stroke"), Some("rgb(255,0,0)"));
        assert_eq!(e.style_property("fill"), Some("none"));
        assert_eq!(e.clone().with_attr("fill", "blue").style_property("fill"), Some("blue"));
        assert_eq!(e.style_property("opacity"), None);
    }

    #[test]
    fn namespaced_names() {
        let e = Element::new("svg:path").with_attr("xlink:href", "#a");
        assert!(e.is("path"));
        assert_eq!(e.href(), Some("#a"));
    }

    #[test]
    fn numeric_attributes() {
        let e = Element::new("rect").with_attr("x", " 12.5px").with_attr("y", "abc");
        assert_eq!(e.attr_f64("x"), Some(12.5));
        assert_eq!(e.attr_f64("y"), None);
        assert_eq!(e.attr_f64("width"), None);
    }

    #[test]
    fn points_round_trip() {
        let points = parse_points("0,0 10,0\n10 , 10 7");
        assert_eq!(points, vec![dvec2(0.0, 0.0), dvec2(10.0, 0.0), dvec2(10.0, 10.0)]);
        assert_eq!(format_points(&points), "0,0 10,0 10,10");
    }
}
