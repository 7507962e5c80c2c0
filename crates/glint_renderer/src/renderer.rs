//! Pixel and tile rendering.
//!
//! `render_tile` is the unit of work both schedulers share: the
//! session's thread pool and the one-shot rayon path below distribute
//! the same tiles and produce identical buffers.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;

use glint_math::Vec3;

use crate::camera::Camera;
use crate::framebuffer::Framebuffer;
use crate::integrator::{trace, RayCounter};
use crate::scene::Scene;
use crate::tile::{generate_tiles, Tile};

/// Color of a single pixel.
///
/// With anti-aliasing enabled this averages `samples_per_pixel`
/// jittered rays; disabled, it casts exactly one ray through the pixel
/// center and the RNG is never touched.
pub fn render_pixel(
    camera: &Camera,
    scene: &Scene,
    x: u32,
    y: u32,
    rng: &mut dyn RngCore,
    rays: &RayCounter,
) -> Vec3 {
    let settings = &camera.settings;

    if !settings.anti_aliasing || settings.samples_per_pixel <= 1 {
        let ray = camera.primary_ray(x, y);
        return trace(scene, ray, settings.bounce_limit, rays);
    }

    let mut color = Vec3::ZERO;
    for _ in 0..settings.samples_per_pixel {
        let ray = camera.sample_ray(x, y, rng);
        color += trace(scene, ray, settings.bounce_limit, rays);
    }
    color / settings.samples_per_pixel as f32
}

/// Render one tile to a row-major color buffer.
///
/// The jitter RNG is seeded from the tile's position, not from the
/// worker or claim order, so output is bit-identical for any worker
/// count.
pub fn render_tile(camera: &Camera, scene: &Scene, tile: &Tile, rays: &RayCounter) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(((tile.y as u64) << 32) | tile.x as u64);
    let mut colors = Vec::with_capacity(tile.pixel_count() as usize);

    for local_y in 0..tile.height {
        for local_x in 0..tile.width {
            let color = render_pixel(
                camera,
                scene,
                tile.x + local_x,
                tile.y + local_y,
                &mut rng,
                rays,
            );
            colors.push(color);
        }
    }

    colors
}

/// One-shot render over rayon's thread pool.
///
/// Convenience for callers that do not need progress polling or
/// cancellation; uses the same tile partition as a render session, so
/// the output matches. Returns the framebuffer and total rays cast.
pub fn render(camera: &Camera, scene: &Scene, tile_size: u32) -> (Framebuffer, u64) {
    let settings = &camera.settings;
    let tiles = generate_tiles(settings.width, settings.height, tile_size);
    let rays = RayCounter::new();

    let rendered: Vec<(Tile, Vec<Vec3>)> = tiles
        .par_iter()
        .map(|tile| (*tile, render_tile(camera, scene, tile, &rays)))
        .collect();

    let mut framebuffer = Framebuffer::new(settings.width, settings.height);
    for (tile, colors) in &rendered {
        framebuffer.write_tile(tile, colors);
    }

    (framebuffer, rays.get())
}
