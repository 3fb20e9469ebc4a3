//! Tile rectangles and the row-major tile walk shared by the reader, the
//! writer and the alpha compositor.

/// Tile edge used when the host does not suggest a usable size.
pub const DEFAULT_TILE_SIZE: u32 = 1024;

/// Half-open pixel rectangle, `top..bottom` x `left..right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl TileRect {
    pub fn rows(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn columns(&self) -> u32 {
        self.right - self.left
    }
}

/// Resolves a host tile suggestion, falling back to [`DEFAULT_TILE_SIZE`]
/// for non-positive values.
pub fn resolve_tile_size(suggested_width: i32, suggested_height: i32) -> (u32, u32) {
    let pick = |value: i32| {
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_TILE_SIZE)
    };
    (pick(suggested_width), pick(suggested_height))
}

/// Lazily yields the tiles covering a `width` x `height` image, top-to-bottom
/// then left-to-right. The last row and column are clipped to the image.
///
/// Restarting the walk means building a new iterator; the type is `Clone`
/// so a walk can also be replayed from any point.
#[derive(Debug, Clone)]
pub struct TileIterator {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    y: u32,
    x: u32,
}

impl TileIterator {
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            y: 0,
            x: 0,
        }
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Number of tiles the full walk produces.
    pub fn tile_count(&self) -> u64 {
        let across = u64::from(self.width.div_ceil(self.tile_width));
        let down = u64::from(self.height.div_ceil(self.tile_height));
        across * down
    }
}

impl Iterator for TileIterator {
    type Item = TileRect;

    fn next(&mut self) -> Option<TileRect> {
        if self.width == 0 || self.y >= self.height {
            return None;
        }

        let rows = self.tile_height.min(self.height - self.y);
        let columns = self.tile_width.min(self.width - self.x);
        let rect = TileRect {
            top: self.y,
            left: self.x,
            bottom: self.y + rows,
            right: self.x + columns,
        };

        self.x += columns;
        if self.x >= self.width {
            self.x = 0;
            self.y += rows;
        }

        Some(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_by_ten_in_fours_clips_last_row_and_column() {
        let tiles: Vec<TileRect> = TileIterator::new(10, 10, 4, 4).collect();
        assert_eq!(tiles.len(), 9);

        let widths: Vec<u32> = tiles.iter().take(3).map(TileRect::columns).collect();
        let heights: Vec<u32> = tiles.iter().step_by(3).map(TileRect::rows).collect();
        assert_eq!(widths, vec![4, 4, 2]);
        assert_eq!(heights, vec![4, 4, 2]);

        assert_eq!(tiles[0], TileRect { top: 0, left: 0, bottom: 4, right: 4 });
        assert_eq!(tiles[8], TileRect { top: 8, left: 8, bottom: 10, right: 10 });
    }

    #[test]
    fn walk_is_row_major() {
        let lefts: Vec<(u32, u32)> = TileIterator::new(5, 4, 2, 2)
            .map(|rect| (rect.top, rect.left))
            .collect();
        assert_eq!(lefts, vec![(0, 0), (0, 2), (0, 4), (2, 0), (2, 2), (2, 4)]);
    }

    #[test]
    fn tile_count_matches_walk() {
        let walk = TileIterator::new(1000, 37, 256, 16);
        assert_eq!(walk.tile_count(), walk.clone().count() as u64);
    }

    #[test]
    fn empty_image_yields_nothing() {
        assert_eq!(TileIterator::new(0, 10, 4, 4).count(), 0);
        assert_eq!(TileIterator::new(10, 0, 4, 4).count(), 0);
    }

    #[test]
    fn non_positive_suggestion_defaults() {
        assert_eq!(resolve_tile_size(0, -5), (1024, 1024));
        assert_eq!(resolve_tile_size(256, 0), (256, 1024));
        assert_eq!(resolve_tile_size(64, 128), (64, 128));
    }
}
