//! Render session: fixed thread pool, progress polling, cancellation.
//!
//! A session owns a set of worker threads created once at start. Each
//! worker pulls tiles from the shared queue until it underruns, renders
//! them against the immutable scene, and blits results into the shared
//! framebuffer (tiles are disjoint, so the blit lock is only held for
//! the copy). The coordinator polls with a bounded wait and may cancel
//! cooperatively: cancellation clears unclaimed tiles, in-flight tiles
//! finish, and `wait` joins every worker before the framebuffer and
//! stats are released. Workers hold their own `Arc<Scene>` clones, so
//! scene geometry cannot be freed while any of them still traverses it.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::camera::Camera;
use crate::framebuffer::{Framebuffer, RowOrder};
use crate::integrator::RayCounter;
use crate::renderer::render_tile;
use crate::scene::Scene;
use crate::tile::{generate_tiles, Progress, WorkQueue, DEFAULT_TILE_SIZE};

/// Scheduler configuration for [`start_render`].
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub tile_size: u32,
    pub worker_count: usize,
    pub row_order: RowOrder,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            worker_count: 8,
            row_order: RowOrder::TopDown,
        }
    }
}

/// Errors rejecting a render before any thread is spawned.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image resolution must be non-zero, got {width}x{height}")]
    ZeroResolution { width: u32, height: u32 },

    #[error("tile size must be non-zero")]
    ZeroTileSize,

    #[error("worker count must be non-zero")]
    ZeroWorkers,

    #[error("failed to spawn render worker")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Result of polling a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    InProgress(Progress),
    Complete,
}

/// Counters describing a finished (or cancelled) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub rays_cast: u64,
    pub tiles_rendered: usize,
    pub tiles_total: usize,
}

/// The framebuffer and stats handed back once all workers have exited.
pub struct RenderOutput {
    pub framebuffer: Framebuffer,
    pub stats: RenderStats,
}

/// Handle to an in-flight render.
pub struct RenderSession {
    queue: Arc<WorkQueue>,
    framebuffer: Arc<Mutex<Framebuffer>>,
    rays: Arc<RayCounter>,
    workers: Vec<JoinHandle<()>>,
}

/// Partition the image, spawn the worker pool, and return immediately.
///
/// The scene is shared read-only; the camera is copied into each
/// worker. Build-time validation failures are returned before any
/// thread exists.
pub fn start_render(
    camera: Camera,
    scene: Arc<Scene>,
    options: RenderOptions,
) -> Result<RenderSession, RenderError> {
    let settings = camera.settings;
    if settings.width == 0 || settings.height == 0 {
        return Err(RenderError::ZeroResolution {
            width: settings.width,
            height: settings.height,
        });
    }
    if options.tile_size == 0 {
        return Err(RenderError::ZeroTileSize);
    }
    if options.worker_count == 0 {
        return Err(RenderError::ZeroWorkers);
    }

    let tiles = generate_tiles(settings.width, settings.height, options.tile_size);
    let queue = Arc::new(WorkQueue::new(tiles));
    let framebuffer = Arc::new(Mutex::new(Framebuffer::with_row_order(
        settings.width,
        settings.height,
        options.row_order,
    )));
    let rays = Arc::new(RayCounter::new());

    log::info!(
        "render started: {}x{}, {} tiles, {} workers",
        settings.width,
        settings.height,
        queue.jobs_total(),
        options.worker_count
    );

    let mut workers = Vec::with_capacity(options.worker_count);
    for i in 0..options.worker_count {
        let queue = Arc::clone(&queue);
        let framebuffer = Arc::clone(&framebuffer);
        let rays = Arc::clone(&rays);
        let scene = Arc::clone(&scene);

        let handle = thread::Builder::new()
            .name(format!("glint-worker-{i}"))
            .spawn(move || worker_loop(camera, &scene, &queue, &framebuffer, &rays))
            .map_err(RenderError::WorkerSpawn)?;
        workers.push(handle);
    }

    Ok(RenderSession {
        queue,
        framebuffer,
        rays,
        workers,
    })
}

/// Pull tiles until the queue underruns; that is the normal exit.
fn worker_loop(
    camera: Camera,
    scene: &Scene,
    queue: &WorkQueue,
    framebuffer: &Mutex<Framebuffer>,
    rays: &RayCounter,
) {
    while let Some(tile) = queue.pop() {
        let tile_rays = RayCounter::new();
        let colors = render_tile(&camera, scene, &tile, &tile_rays);

        framebuffer
            .lock()
            .expect("framebuffer lock poisoned")
            .write_tile(&tile, &colors);

        let cast = tile_rays.get();
        rays.add(cast);
        queue.mark_complete(tile.index, cast);
        log::trace!("tile {} done, {} rays", tile.index, cast);
    }
}

impl RenderSession {
    /// Wait up to `timeout` for the render to finish.
    ///
    /// A bounded condvar wait, not a spin loop; tile completions wake
    /// it early. `Complete` also covers a cancelled render whose
    /// in-flight tiles have drained.
    pub fn poll(&self, timeout: Duration) -> RenderStatus {
        if self.queue.wait_quiescent(timeout) {
            RenderStatus::Complete
        } else {
            RenderStatus::InProgress(self.queue.progress())
        }
    }

    /// Request cooperative cancellation: unclaimed tiles are dropped,
    /// tiles already claimed run to completion.
    pub fn cancel(&self) {
        log::info!("render cancelled at {:?}", self.queue.progress());
        self.queue.clear();
    }

    /// Tiles completed / total, for progress display.
    pub fn progress(&self) -> Progress {
        self.queue.progress()
    }

    /// Rays cast so far across all workers (primary, shadow, and
    /// reflection rays).
    pub fn total_rays_cast(&self) -> u64 {
        self.rays.get()
    }

    /// Rays recorded against one completed tile.
    pub fn tile_ray_casts(&self, tile_index: usize) -> u64 {
        self.queue.tile_ray_casts(tile_index)
    }

    /// Join every worker and hand back the framebuffer and stats.
    ///
    /// This is the only way the buffer leaves the session, so no
    /// worker can still be writing when the caller gets it.
    pub fn wait(mut self) -> RenderOutput {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("render worker panicked");
            }
        }

        let stats = RenderStats {
            rays_cast: self.rays.get(),
            tiles_rendered: self.queue.jobs_done(),
            tiles_total: self.queue.jobs_total(),
        };
        log::info!(
            "render finished: {}/{} tiles, {} rays",
            stats.tiles_rendered,
            stats.tiles_total,
            stats.rays_cast
        );

        // All workers are joined, so this session holds the only
        // reference.
        let framebuffer = Arc::try_unwrap(self.framebuffer)
            .ok()
            .expect("framebuffer still shared after join")
            .into_inner()
            .expect("framebuffer lock poisoned");

        RenderOutput { framebuffer, stats }
    }
}
