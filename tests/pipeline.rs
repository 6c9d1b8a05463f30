//! Flatten and reproject a synthetic Wagner VII drawing whose rendering
//! parameters are known.

use glam::DVec2;
use mapflat::types::LonLat;
use mapflat::{
    CalibrationParams, CalibrationSource, Config, Element, Path, PathCommand, Projection, Wagner7,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the drawing was rendered, before the outer group's translation.
fn truth() -> CalibrationParams {
    CalibrationParams {
        origin: DVec2::new(400.0, 250.0),
        scale_x: 60.0,
        scale_y: 66.0,
        shear_x: 0.0,
    }
}

const GROUP_OFFSET: DVec2 = DVec2::new(50.0, 20.0);

fn render(lon: f64, lat: f64) -> DVec2 {
    truth().to_device(Wagner7.forward(LonLat::new(lon, lat)).unwrap())
}

fn polyline(points: impl IntoIterator<Item = DVec2>, close: bool) -> String {
    let mut path: Path = points
        .into_iter()
        .enumerate()
        .map(|(i, p)| if i == 0 { PathCommand::MoveTo(p) } else { PathCommand::LineTo(p) })
        .collect();
    if close {
        path.push(PathCommand::Close);
    }
    path.to_string()
}

fn drawing() -> Element {
    let edge = 179.9;
    let pole = 89.9;
    // Clockwise around the outline, just inside its edge.
    let east = (-899..=899).map(|i| render(edge, -f64::from(i) / 10.0));
    let south = (-1799..=1799).map(|i| render(-f64::from(i) / 10.0, -pole));
    let west = (-899..=899).map(|i| render(-edge, f64::from(i) / 10.0));
    let north = (-1799..=1799).map(|i| render(f64::from(i) / 10.0, pole));
    let ocean = Element::new("path")
        .with_attr("id", "ocean")
        .with_attr("fill", "#9cf")
        .with_attr("d", polyline(east.chain(south).chain(west).chain(north), true));

    let marker = Element::new("path")
        .with_attr("stroke", "red")
        .with_attr("d", polyline([render(-180.0, 0.0), render(180.0, 0.0)], false));

    let mut meridians = Element::new("g").with_attr("id", "Längengrade");
    for lon in (-150..=150).step_by(30) {
        let points = (-40..=40).map(|j| render(f64::from(lon), f64::from(j) * 2.0));
        meridians
            .children
            .push(Element::new("path").with_attr("stroke", "#777").with_attr("d", polyline(points, false)));
    }

    let coast = [(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 20.0)]
        .map(|(lon, lat)| render(lon, lat))
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
    let coast = Element::new("polygon")
        .with_attr("points", coast)
        .with_attr("fill", "tan");

    let center = render(0.0, 0.0);
    let city = Element::new("circle")
        .with_attr("cx", center.x)
        .with_attr("cy", center.y)
        .with_attr("r", 2);

    let label_at = render(30.0, 0.0);
    let label = Element::new("text")
        .with_attr("x", label_at.x)
        .with_attr("y", label_at.y);

    let top_left = render(-10.0, 10.0);
    let bottom_right = render(10.0, -10.0);
    let inset = Element::new("image")
        .with_attr("x", top_left.x)
        .with_attr("y", top_left.y)
        .with_attr("width", bottom_right.x - top_left.x)
        .with_attr("height", bottom_right.y - top_left.y);

    let layer = Element::new("g")
        .with_attr("transform", format!("translate({} {})", GROUP_OFFSET.x, GROUP_OFFSET.y))
        .with_child(ocean)
        .with_child(marker)
        .with_child(meridians)
        .with_child(coast)
        .with_child(city)
        .with_child(label)
        .with_child(inset);

    Element::new("svg")
        .with_attr("viewBox", "0 0 900 500")
        .with_child(layer)
}

fn close(a: DVec2, b: DVec2, tolerance: f64) -> bool {
    (a - b).length() <= tolerance
}

#[test]
fn flatten_then_reproject() {
    init_tracing();

    let mut doc = drawing();
    mapflat::flatten(&mut doc).unwrap();
    assert!(!doc.descendants().any(|e| e.has_attr("transform")));

    let report = mapflat::reproject(&mut doc, &Config::default()).unwrap();

    let calibration = report.calibration;
    assert_eq!(calibration.source, CalibrationSource::EquatorMarker);
    assert!(calibration.meridian_fit);
    let params = calibration.params;
    assert!(close(params.origin, truth().origin + GROUP_OFFSET, 1e-6), "{params:?}");
    assert!((params.scale_x / truth().scale_x - 1.0).abs() < 1e-3, "{params:?}");
    assert!((params.scale_y / truth().scale_y - 1.0).abs() < 1e-2, "{params:?}");
    assert!(params.shear_x.abs() < 1e-2, "{params:?}");

    assert_eq!(report.paths, 14);
    assert_eq!(report.images, 1);
    assert_eq!(report.anchors, 2);
    assert!(report.background_replaced);

    assert_eq!(doc.attr("viewBox"), Some("0 0 1800 900"));
    assert_eq!(doc.attr("width"), Some("1800"));

    let layer = &doc.children[0];
    let background = &layer.children[0];
    assert!(background.is("rect"));
    assert_eq!(background.id(), Some("ocean"));
    assert_eq!(background.attr("fill"), Some("#9cf"));

    // Plate carrée on 1800x900: 5 px per degree, origin at the centre.
    let plate = |lon: f64, lat: f64| DVec2::new(900.0 + 5.0 * lon, 450.0 - 5.0 * lat);

    let coast = &layer.children[3];
    assert!(coast.is("path"));
    assert_eq!(coast.attr("fill"), Some("tan"));
    let coast_path = mapflat::path::to_absolute(coast.attr("d").unwrap());
    let Some(PathCommand::MoveTo(first)) = coast_path.commands().first().copied() else {
        panic!("coast has no moveto: {coast_path}");
    };
    assert!(close(first, plate(10.0, 10.0), 2.0), "{first}");
    assert_eq!(coast_path.commands().last(), Some(&PathCommand::Close));

    let city = &layer.children[4];
    let city_at = DVec2::new(city.attr_f64("cx").unwrap(), city.attr_f64("cy").unwrap());
    assert!(close(city_at, plate(0.0, 0.0), 1e-6), "{city_at}");

    let label = &layer.children[5];
    let label_at = DVec2::new(label.attr_f64("x").unwrap(), label.attr_f64("y").unwrap());
    assert!(close(label_at, plate(30.0, 0.0), 1e-6), "{label_at}");

    let inset = &layer.children[6];
    assert!((inset.attr_f64("x").unwrap() - 850.0).abs() < 2.0);
    assert!((inset.attr_f64("y").unwrap() - 400.0).abs() < 2.0);
    assert!((inset.attr_f64("width").unwrap() - 100.0).abs() < 2.0);
    assert!((inset.attr_f64("height").unwrap() - 100.0).abs() < 2.0);
}

#[test]
fn meridians_stay_vertical_after_reprojection() {
    let mut doc = drawing();
    mapflat::flatten(&mut doc).unwrap();
    mapflat::reproject(&mut doc, &Config::default()).unwrap();

    let meridians = doc.find_by_id("Längengrade").unwrap();
    for (meridian, lon) in meridians.children.iter().zip((-150..=150).step_by(30)) {
        let path = mapflat::path::to_absolute(meridian.attr("d").unwrap());
        let expected_x = 900.0 + 5.0 * f64::from(lon);
        for p in path.vertices() {
            assert!((p.x - expected_x).abs() < 1.5, "meridian {lon}: {p}");
        }
    }
}

#[test]
fn without_marker_falls_back_to_bounding_box() {
    let mut doc = drawing();
    // Drop the marker.
    doc.children[0].children.remove(1);
    mapflat::flatten(&mut doc).unwrap();

    let config = Config {
        replace_background: false,
        ..Config::default()
    };
    let report = mapflat::reproject(&mut doc, &config).unwrap();
    assert_eq!(report.calibration.source, CalibrationSource::BoundingBox);
    assert!(!report.calibration.meridian_fit);
    assert!(!report.background_replaced);
    let params = report.calibration.params;
    assert_eq!(params.scale_x, params.scale_y);
    // The ocean spans nearly the full width, so the estimate is close.
    assert!((params.scale_x / truth().scale_x - 1.0).abs() < 1e-2, "{params:?}");
}

#[test]
fn text_without_anchor_is_left_alone() {
    let mut doc = drawing();
    doc.children[0].children.push(Element::new("text").with_attr("font-size", 12));
    mapflat::flatten(&mut doc).unwrap();

    let report = mapflat::reproject(&mut doc, &Config::default()).unwrap();
    assert_eq!(report.anchors, 2);
    assert_eq!(report.skipped, 0);

    let text = doc.children[0].children.last().unwrap();
    assert!(text.is("text"));
    assert!(!text.has_attr("x"));
    assert!(!text.has_attr("y"));
}

#[test]
fn rejects_non_svg_root() {
    let mut doc = Element::new("html");
    assert!(matches!(
        mapflat::reproject(&mut doc, &Config::default()),
        Err(mapflat::Error::NoRoot { .. })
    ));
}
