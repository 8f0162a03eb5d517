//! Coverage rasterizer for glyph outlines
//!
//! Outlines arrive as `kurbo` paths in image space (y down). They are
//! flattened to line segments and scan-converted with the non-zero winding
//! rule at `SUPERSAMPLE × SUPERSAMPLE` samples per pixel.

use image::{GrayImage, Luma};
use kurbo::{BezPath, PathEl, Point};

/// Subsamples per pixel along each axis
pub const SUPERSAMPLE: usize = 4;

/// Maximum distance, in pixels, between a curve and its flattened polyline
pub const FLATTEN_TOLERANCE: f64 = 0.05;

/// Directed line segment
#[derive(Clone, Copy, Debug)]
struct Edge {
    p0: Point,
    p1: Point,
}

impl Edge {
    /// Crossing of the scanline `y` as (x, direction), half-open in y
    fn crossing(&self, y: f64) -> Option<(f64, i32)> {
        let (y0, y1) = (self.p0.y, self.p1.y);
        if (y0 <= y && y < y1) || (y1 <= y && y < y0) {
            let t = (y - y0) / (y1 - y0);
            let x = self.p0.x + t * (self.p1.x - self.p0.x);
            Some((x, if y0 < y1 { 1 } else { -1 }))
        } else {
            None
        }
    }
}

fn close(edges: &mut Vec<Edge>, from: Point, to: Point) {
    if from != to {
        edges.push(Edge { p0: from, p1: to });
    }
}

/// Flatten `path` into closed edge loops
///
/// Open subpaths are closed implicitly, as fill rules require.
fn edges(path: &BezPath) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut start = Point::ZERO;
    let mut current = Point::ZERO;

    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            close(&mut edges, current, start);
            start = p;
            current = p;
        }
        PathEl::LineTo(p) => {
            close(&mut edges, current, p);
            current = p;
        }
        PathEl::ClosePath => {
            close(&mut edges, current, start);
            current = start;
        }
        // flatten only emits lines
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    close(&mut edges, current, start);
    edges
}

/// Black-on-white `width × height` image of `path`
pub(crate) fn rasterize(path: &BezPath, width: u32, height: u32) -> GrayImage {
    let edges = edges(path);
    let (w, h) = (width as usize, height as usize);
    let step = 1.0 / SUPERSAMPLE as f64;
    let mut coverage = vec![0u16; w * h];
    let mut crossings: Vec<(f64, i32)> = Vec::new();

    for sy in 0..h * SUPERSAMPLE {
        let y = (sy as f64 + 0.5) * step;
        crossings.clear();
        crossings.extend(edges.iter().filter_map(|e| e.crossing(y)));
        if crossings.is_empty() {
            continue;
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let row = &mut coverage[(sy / SUPERSAMPLE) * w..][..w];
        let mut winding = 0;
        let mut next = 0;
        for sx in 0..w * SUPERSAMPLE {
            let x = (sx as f64 + 0.5) * step;
            while next < crossings.len() && crossings[next].0 <= x {
                winding += crossings[next].1;
                next += 1;
            }
            if winding != 0 {
                row[sx / SUPERSAMPLE] += 1;
            }
        }
    }

    let full = (SUPERSAMPLE * SUPERSAMPLE) as f32;
    GrayImage::from_fn(width, height, |x, y| {
        let c = f32::from(coverage[y as usize * w + x as usize]) / full;
        Luma([255 - (c * 255.0).round() as u8])
    })
}
