use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Screen-space rectangle. Sizes stay signed so that floating resize deltas
/// can be applied without intermediate casts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect { x, y, width, height }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    /// A rectangle of the same size centered inside `outer`.
    pub fn centered_in(&self, outer: &Rect) -> Rect {
        Rect {
            x: outer.x + (outer.width - self.width) / 2,
            y: outer.y + (outer.height - self.height) / 2,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(0, 0, 100, 50);
        assert!(r.contains(0, 0));
        assert!(r.contains(99, 49));
        assert!(!r.contains(100, 0));
        assert!(!r.contains(0, 50));
        assert!(!r.contains(-1, 10));
    }

    #[test]
    fn center_of_offset_rect() {
        let r = Rect::new(100, 200, 50, 30);
        assert_eq!(r.center(), Point { x: 125, y: 215 });
    }

    #[test]
    fn centered_in_larger_rect() {
        let outer = Rect::new(0, 0, 1000, 800);
        let inner = Rect::new(5, 5, 200, 100);
        let centered = inner.centered_in(&outer);
        assert_eq!(centered, Rect::new(400, 350, 200, 100));
    }
}
