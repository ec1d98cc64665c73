use crate::pipeline::types::FaceCenter;
use opencv::core::Rect;

pub fn rect_area(rect: &Rect) -> i64 {
    rect.width as i64 * rect.height as i64
}

/// Largest rectangle by area. On ties the first maximal rectangle wins,
/// so the detector's own ordering decides.
pub fn largest_rect(rects: &[Rect]) -> Option<Rect> {
    let mut best: Option<Rect> = None;
    for rect in rects {
        match best {
            Some(current) if rect_area(rect) <= rect_area(&current) => {}
            _ => best = Some(*rect),
        }
    }
    best
}

/// Integer center of a rectangle, truncating odd sizes.
pub fn rect_center(rect: &Rect) -> FaceCenter {
    FaceCenter {
        x: rect.x + rect.width / 2,
        y: rect.y + rect.height / 2,
    }
}

pub fn euclidean_distance(a: FaceCenter, b: FaceCenter) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Intersect a rectangle with the `width` x `height` image bounds.
/// Returns `None` when nothing of it lies inside the image.
pub fn clamp_rect(rect: &Rect, width: i32, height: i32) -> Option<Rect> {
    let x1 = rect.x.max(0);
    let y1 = rect.y.max(0);
    let x2 = (rect.x + rect.width).min(width);
    let y2 = (rect.y + rect.height).min(height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
}
