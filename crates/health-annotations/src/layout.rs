//! Annotation Layout
//!
//! Places annotation boxes on a chart canvas so that no two boxes overlap.
//! Each box is tried right, left, above and below its marker and then
//! diagonally toward the canvas center. If all of those fail it falls back to
//! the nearest free spot along the canvas edges, and finally to a stack down
//! the right edge that wraps to the left edge.

use chrono::NaiveDate;
use health_core::LayoutConfig;
use serde::{Deserialize, Serialize};

use crate::models::HealthAnnotation;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned box, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Open-interval overlap: boxes that only touch do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x > self.x && p.x < self.right() && p.y > self.y && p.y < self.bottom()
    }

    /// Point on or inside the box nearest to `p`
    pub fn closest_point(&self, p: &Point) -> Point {
        Point::new(p.x.clamp(self.x, self.right()), p.y.clamp(self.y, self.bottom()))
    }

    pub fn distance_to(&self, p: &Point) -> f64 {
        self.closest_point(p).distance(p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    Right,
    Left,
    Above,
    Below,
    DiagonalTowardCenter,
    EdgeScan,
    Stacked,
}

/// Final placement of one annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBounds {
    pub annotation_id: String,
    pub rect: Rect,
    /// Marker position of the annotated data point
    pub anchor: Point,
    /// Point on the box nearest to the anchor
    pub attach: Point,
    pub strategy: PlacementStrategy,
    pub needs_leader: bool,
    /// Elbow polyline from anchor to attach point; empty without a leader
    pub leader_path: Vec<Point>,
}

struct StackCursor {
    on_left: bool,
    next_y: f64,
}

pub struct AnnotationLayoutManager {
    config: LayoutConfig,
    canvas: Rect,
}

impl AnnotationLayoutManager {
    pub fn new(config: LayoutConfig, width: f64, height: f64) -> Self {
        Self {
            config,
            canvas: Rect::new(0.0, 0.0, width, height),
        }
    }

    pub fn canvas(&self) -> Rect {
        self.canvas
    }

    /// Place every annotation, highest priority (then most recent) first.
    ///
    /// `to_screen` maps a data point to canvas coordinates. The output is in
    /// placement order.
    pub fn optimize_layout<F>(&self, annotations: &[HealthAnnotation], to_screen: F) -> Vec<AnnotationBounds>
    where
        F: Fn(NaiveDate, f64) -> Point,
    {
        let mut order: Vec<&HealthAnnotation> = annotations.iter().collect();
        order.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.date.cmp(&a.date)));

        let mut placed: Vec<AnnotationBounds> = Vec::with_capacity(order.len());
        let mut cursor = StackCursor {
            on_left: false,
            next_y: self.config.margin,
        };

        for annotation in order {
            let anchor = to_screen(annotation.date, annotation.value);
            let rects: Vec<Rect> = placed.iter().map(|b| b.rect).collect();

            // A marker on top of an earlier one would hide behind its box
            let co_located = placed
                .iter()
                .any(|b| b.anchor.distance(&anchor) <= self.config.marker_size);

            let direct = if co_located {
                None
            } else {
                self.direct_placement(&anchor, &rects)
            };

            let (rect, strategy) = match direct {
                Some(found) => found,
                None => match self.edge_scan(&anchor, &rects) {
                    Some(rect) => (rect, PlacementStrategy::EdgeScan),
                    None => (self.stack(&mut cursor, &rects), PlacementStrategy::Stacked),
                },
            };

            placed.push(self.bounds(annotation, anchor, rect, strategy));
        }

        placed
    }

    fn fits(&self, rect: &Rect, placed: &[Rect]) -> bool {
        self.canvas.contains_rect(rect) && !placed.iter().any(|r| r.intersects(rect))
    }

    fn direct_placement(&self, anchor: &Point, placed: &[Rect]) -> Option<(Rect, PlacementStrategy)> {
        let w = self.config.annotation_width;
        let h = self.config.annotation_height;
        let offset = self.config.marker_size + self.config.margin;

        let center = self.canvas.center();
        let toward_right = center.x >= anchor.x;
        let toward_bottom = center.y >= anchor.y;
        let diagonal = Rect::new(
            if toward_right { anchor.x + offset } else { anchor.x - offset - w },
            if toward_bottom { anchor.y + offset } else { anchor.y - offset - h },
            w,
            h,
        );

        [
            (Rect::new(anchor.x + offset, anchor.y - h / 2.0, w, h), PlacementStrategy::Right),
            (Rect::new(anchor.x - offset - w, anchor.y - h / 2.0, w, h), PlacementStrategy::Left),
            (Rect::new(anchor.x - w / 2.0, anchor.y - offset - h, w, h), PlacementStrategy::Above),
            (Rect::new(anchor.x - w / 2.0, anchor.y + offset, w, h), PlacementStrategy::Below),
            (diagonal, PlacementStrategy::DiagonalTowardCenter),
        ]
        .into_iter()
        .find(|(rect, _)| self.fits(rect, placed))
    }

    /// Closest free slot sampled along the four canvas edges
    fn edge_scan(&self, anchor: &Point, placed: &[Rect]) -> Option<Rect> {
        let w = self.config.annotation_width;
        let h = self.config.annotation_height;
        let m = self.config.margin;
        let samples = self.config.edge_samples.max(1);
        let max_x = (self.canvas.width - m - w).max(m);
        let max_y = (self.canvas.height - m - h).max(m);

        let mut candidates = Vec::with_capacity(samples * 4);
        for k in 0..samples {
            let t = (k as f64 + 0.5) / samples as f64;
            let x = (t * self.canvas.width - w / 2.0).clamp(m, max_x);
            let y = (t * self.canvas.height - h / 2.0).clamp(m, max_y);
            candidates.push(Rect::new(x, m, w, h));
            candidates.push(Rect::new(x, self.canvas.height - m - h, w, h));
            candidates.push(Rect::new(m, y, w, h));
            candidates.push(Rect::new(self.canvas.width - m - w, y, w, h));
        }

        candidates
            .into_iter()
            .filter(|r| !r.contains_point(anchor))
            .filter(|r| r.distance_to(anchor) <= self.config.max_leader_length)
            .filter(|r| self.fits(r, placed))
            .min_by(|a, b| a.distance_to(anchor).total_cmp(&b.distance_to(anchor)))
    }

    /// Next free slot down the right edge, then the left edge
    fn stack(&self, cursor: &mut StackCursor, placed: &[Rect]) -> Rect {
        let w = self.config.annotation_width;
        let h = self.config.annotation_height;
        let m = self.config.margin;

        loop {
            if cursor.next_y + h > self.canvas.height - m {
                if cursor.on_left {
                    break;
                }
                cursor.on_left = true;
                cursor.next_y = m;
                continue;
            }

            let x = if cursor.on_left {
                m
            } else {
                self.canvas.width - m - w
            };
            let rect = Rect::new(x, cursor.next_y, w, h);
            cursor.next_y += h + m;
            if !placed.iter().any(|r| r.intersects(&rect)) {
                return rect;
            }
        }

        tracing::warn!(
            "Canvas full after {} placements, overlapping annotation in top-right slot",
            placed.len()
        );
        Rect::new(self.canvas.width - m - w, m, w, h)
    }

    fn bounds(
        &self,
        annotation: &HealthAnnotation,
        anchor: Point,
        rect: Rect,
        strategy: PlacementStrategy,
    ) -> AnnotationBounds {
        let attach = rect.closest_point(&anchor);
        let needs_leader = anchor.distance(&attach) > 3.0 * self.config.marker_size;
        let leader_path = if needs_leader {
            vec![anchor, Point::new(attach.x, anchor.y), attach]
        } else {
            Vec::new()
        };

        AnnotationBounds {
            annotation_id: annotation.id.clone(),
            rect,
            anchor,
            attach,
            strategy,
            needs_leader,
            leader_path,
        }
    }
}
