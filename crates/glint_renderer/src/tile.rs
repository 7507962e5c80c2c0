//! Tile partitioning and the pull-based work queue.
//!
//! The image is cut into rectangular tiles once at render start; tiles
//! partition the image exactly (no overlap, full coverage) and are the
//! unit of parallel work. The queue hands each tile to at most one
//! worker and tracks completion with atomic counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    /// Width in pixels (edge tiles may be narrower than the tile size)
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Position of this tile in the queue
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Total number of pixels in this tile.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Whether the pixel (x, y) falls inside this tile.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Cut a width x height image into a grid of tiles.
///
/// Every pixel belongs to exactly one tile; tiles on the right and
/// bottom edges shrink to fit.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let mut tiles = Vec::new();
    let mut index = 0;

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(Tile::new(x, y, tw, th, index));
            index += 1;
            x += tile_size;
        }
        y += tile_size;
    }

    tiles
}

/// Progress snapshot for an external UI/CLI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub tiles_done: usize,
    pub tiles_total: usize,
}

/// Thread-safe pull-based list of pending tiles.
///
/// Workers `pop` until the queue underruns, which is the normal
/// termination signal rather than an error. `clear` discards unclaimed
/// tiles for cancellation; tiles already claimed run to completion.
pub struct WorkQueue {
    tiles: Vec<Tile>,
    /// Claim cursor; fetch_add guarantees each tile goes to one worker
    next: AtomicUsize,
    /// Tiles successfully claimed (pops that returned a tile)
    claimed: AtomicUsize,
    /// Tiles marked complete
    done: AtomicUsize,
    /// Rays cast per tile, recorded at completion
    ray_casts: Vec<AtomicU64>,
    /// Wakes the coordinator's bounded wait on every completion
    quiescent: Condvar,
    quiescent_lock: Mutex<()>,
}

impl WorkQueue {
    pub fn new(tiles: Vec<Tile>) -> Self {
        let ray_casts = tiles.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            tiles,
            next: AtomicUsize::new(0),
            claimed: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            ray_casts,
            quiescent: Condvar::new(),
            quiescent_lock: Mutex::new(()),
        }
    }

    /// Claim the next tile. Returns `None` once the queue is drained or
    /// cleared; concurrent callers never receive the same tile.
    pub fn pop(&self) -> Option<Tile> {
        // Count the claim before taking an index so a claimed tile is
        // never invisible to `is_quiescent`. A failed pop backs the
        // count out, which can only delay quiescence, not fake it.
        self.claimed.fetch_add(1, Ordering::AcqRel);
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        if index >= self.tiles.len() {
            self.claimed.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(self.tiles[index])
    }

    /// Record a finished tile and its ray count, waking any waiter.
    pub fn mark_complete(&self, tile_index: usize, rays_cast: u64) {
        self.ray_casts[tile_index].store(rays_cast, Ordering::Relaxed);
        self.done.fetch_add(1, Ordering::AcqRel);

        let _guard = self.quiescent_lock.lock().expect("queue lock poisoned");
        self.quiescent.notify_all();
    }

    /// Discard all unclaimed tiles. In-flight tiles still complete.
    pub fn clear(&self) {
        self.next.fetch_max(self.tiles.len(), Ordering::AcqRel);
    }

    pub fn jobs_total(&self) -> usize {
        self.tiles.len()
    }

    pub fn jobs_done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    /// Read-only snapshot for progress reporting.
    pub fn progress(&self) -> Progress {
        Progress {
            tiles_done: self.jobs_done(),
            tiles_total: self.jobs_total(),
        }
    }

    /// Rays recorded against a completed tile.
    pub fn tile_ray_casts(&self, tile_index: usize) -> u64 {
        self.ray_casts[tile_index].load(Ordering::Relaxed)
    }

    /// True when no tile is claimable and none is still in flight.
    /// After an uncancelled run this implies done == total.
    pub fn is_quiescent(&self) -> bool {
        let nothing_left = self.next.load(Ordering::Acquire) >= self.tiles.len();
        nothing_left && self.jobs_done() == self.claimed.load(Ordering::Acquire)
    }

    /// Block until the queue is quiescent or `timeout` elapses.
    /// Returns whether quiescence was reached. Bounded waiting only;
    /// completions wake it early.
    pub fn wait_quiescent(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.quiescent_lock.lock().expect("queue lock poisoned");
        loop {
            if self.is_quiescent() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return self.is_quiescent();
            }
            let (g, _timed_out) = self
                .quiescent
                .wait_timeout(guard, deadline - now)
                .expect("queue lock poisoned");
            guard = g;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_generate_tiles_exact_fit() {
        let tiles = generate_tiles(128, 128, 64);
        assert_eq!(tiles.len(), 4); // 2x2 grid

        let total_pixels: u32 = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_generate_tiles_partial_fit() {
        let tiles = generate_tiles(100, 70, 64);
        assert_eq!(tiles.len(), 4);

        let total_pixels: u32 = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total_pixels, 100 * 70);
    }

    #[test]
    fn test_partition_covers_every_pixel_once() {
        let (w, h) = (37, 23);
        let tiles = generate_tiles(w, h, 8);

        for y in 0..h {
            for x in 0..w {
                let owners = tiles.iter().filter(|t| t.contains(x, y)).count();
                assert_eq!(owners, 1, "pixel ({x},{y}) owned by {owners} tiles");
            }
        }
    }

    #[test]
    fn test_pop_hands_out_each_tile_once() {
        let queue = Arc::new(WorkQueue::new(generate_tiles(64, 64, 8)));
        let total = queue.jobs_total();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(tile) = queue.pop() {
                    seen.push(tile.index);
                }
                seen
            }));
        }

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();

        assert_eq!(all.len(), total);
        all.dedup();
        assert_eq!(all.len(), total, "a tile was claimed twice");
    }

    #[test]
    fn test_clear_stops_new_claims() {
        let queue = WorkQueue::new(generate_tiles(64, 64, 8));
        let first = queue.pop().unwrap();

        queue.clear();
        assert!(queue.pop().is_none());

        // The in-flight tile may still be completed
        queue.mark_complete(first.index, 42);
        assert_eq!(queue.jobs_done(), 1);
        assert_eq!(queue.tile_ray_casts(first.index), 42);
        assert!(queue.is_quiescent());
    }

    #[test]
    fn test_wait_quiescent() {
        let queue = WorkQueue::new(generate_tiles(8, 8, 8)); // single tile
        assert!(!queue.is_quiescent());
        assert!(!queue.wait_quiescent(Duration::from_millis(10)));

        let tile = queue.pop().unwrap();
        queue.mark_complete(tile.index, 1);
        assert!(queue.pop().is_none());
        assert!(queue.wait_quiescent(Duration::from_millis(10)));
        assert_eq!(queue.progress(), Progress { tiles_done: 1, tiles_total: 1 });
    }
}
