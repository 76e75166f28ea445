#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn margin() -> PlotMargin {
    PlotMargin { top: 0.05, left: 0.1, bottom: 0.15, right: 0.05 }
}

// --- Point ---

#[test]
fn point_new() {
    let p = Point::new(3.0, 4.0);
    assert_eq!(p.x, 3.0);
    assert_eq!(p.y, 4.0);
}

#[test]
fn point_offset() {
    let p = Point::new(1.0, 2.0).offset(-1.0, 3.0);
    assert_eq!(p, Point::new(0.0, 5.0));
}

// --- PlotRect ---

#[test]
fn plot_rect_without_margin_covers_canvas() {
    let mapper = CoordMapper::new(600.0, 400.0, PlotMargin::default());
    let rect = mapper.plot_rect();
    assert_eq!(rect.left, 0.0);
    assert_eq!(rect.top, 0.0);
    assert_eq!(rect.width(), 600.0);
    assert_eq!(rect.height(), 400.0);
}

#[test]
fn plot_rect_applies_margin_fractions() {
    let mapper = CoordMapper::new(1000.0, 1000.0, margin());
    let rect = mapper.plot_rect();
    assert!(approx_eq(rect.left, 100.0));
    assert!(approx_eq(rect.top, 50.0));
    assert!(approx_eq(rect.right, 950.0));
    assert!(approx_eq(rect.bottom, 850.0));
}

#[test]
fn plot_rect_contains_boundary() {
    let rect = PlotRect { left: 0.0, top: 0.0, right: 10.0, bottom: 10.0 };
    assert!(rect.contains(Point::new(0.0, 10.0)));
    assert!(rect.contains(Point::new(5.0, 5.0)));
    assert!(!rect.contains(Point::new(10.5, 5.0)));
    assert!(!rect.contains(Point::new(5.0, -0.1)));
}

// --- Mapping ---

#[test]
fn plot_origin_maps_to_bottom_left_of_plot_rect() {
    let mapper = CoordMapper::new(1000.0, 1000.0, margin());
    let p = mapper.plot_point_to_point(Point::new(0.0, 0.0));
    assert!(point_approx_eq(p, Point::new(100.0, 850.0)));
}

#[test]
fn plot_unit_corner_maps_to_top_right_of_plot_rect() {
    let mapper = CoordMapper::new(1000.0, 1000.0, margin());
    let p = mapper.plot_point_to_point(Point::new(1.0, 1.0));
    assert!(point_approx_eq(p, Point::new(950.0, 50.0)));
}

#[test]
fn y_axis_is_flipped() {
    let mapper = CoordMapper::new(100.0, 100.0, PlotMargin::default());
    let low = mapper.plot_point_to_point(Point::new(0.5, 0.25));
    let high = mapper.plot_point_to_point(Point::new(0.5, 0.75));
    assert!(low.y > high.y);
}

#[test]
fn canvas_to_plot_round_trip() {
    let mapper = CoordMapper::new(900.0, 700.0, margin());
    let rect = mapper.plot_rect();
    for i in 0..=10 {
        for j in 0..=10 {
            let p = Point::new(
                rect.left + rect.width() * f64::from(i) / 10.0,
                rect.top + rect.height() * f64::from(j) / 10.0,
            );
            let back = mapper.plot_point_to_point(mapper.point_to_plot_point(p));
            assert!(point_approx_eq(p, back), "{p:?} -> {back:?}");
        }
    }
}

#[test]
fn plot_to_canvas_round_trip() {
    let mapper = CoordMapper::new(640.0, 480.0, margin());
    let p = Point::new(250.0 / 600.0, 350.0 / 600.0);
    let back = mapper.point_to_plot_point(mapper.plot_point_to_point(p));
    assert!(point_approx_eq(p, back));
}

#[test]
fn default_mapper_uses_default_canvas_size() {
    let mapper = CoordMapper::default();
    assert_eq!(mapper.width, crate::consts::DEFAULT_CANVAS_SIZE);
    assert_eq!(mapper.height, crate::consts::DEFAULT_CANVAS_SIZE);
    assert_eq!(mapper.margin, PlotMargin::default());
}
