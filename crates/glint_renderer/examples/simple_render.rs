//! Simple ray tracer example.
//!
//! Renders two spheres over a ground plane with a session-based
//! render, prints progress while polling, and saves a PNG.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use glint_renderer::{
    start_render, Camera, Material, RenderOptions, RenderSettings, RenderStatus, SceneBuilder,
    Vec3,
};

fn main() -> Result<()> {
    env_logger::init();

    println!("Glint Ray Tracer - Simple Example");
    println!("=================================");

    let start = Instant::now();
    let scene = Arc::new(build_scene());
    println!("Scene built in {:?}", start.elapsed());

    let settings = RenderSettings {
        width: 1280,
        height: 720,
        samples_per_pixel: 5,
        anti_aliasing: true,
        bounce_limit: 5,
    };
    let camera = Camera::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -0.3, -1.0), 1.0, settings);

    println!(
        "Rendering {}x{} @ {} spp...",
        settings.width, settings.height, settings.samples_per_pixel
    );

    let start = Instant::now();
    let session = start_render(camera, scene, RenderOptions::default())?;

    // Poll at ~30 Hz until the pool drains
    loop {
        match session.poll(Duration::from_millis(33)) {
            RenderStatus::InProgress(progress) => {
                print!("\rTiles: {}/{}", progress.tiles_done, progress.tiles_total);
            }
            RenderStatus::Complete => break,
        }
    }
    println!();

    let output = session.wait();
    println!("Rendered in {:?}", start.elapsed());
    println!("Total rays cast: {}", output.stats.rays_cast);

    let filename = "output.png";
    output.framebuffer.to_image().save(filename)?;
    println!("Saved to {}", filename);

    Ok(())
}

fn build_scene() -> glint_renderer::Scene {
    let skybox = Material::new(Vec3::new(0.3, 0.4, 0.5), Vec3::new(0.2, 0.3, 0.4), 0.3);
    let mut builder = SceneBuilder::new(skybox);

    let green = builder.add_material(Material::new(Vec3::ZERO, Vec3::new(0.2, 0.8, 0.2), 0.3));
    let blue = builder.add_material(Material::new(Vec3::ZERO, Vec3::new(0.4, 0.8, 0.9), 0.9));
    let ground = builder.add_material(Material::new(Vec3::ZERO, Vec3::splat(0.5), 0.0));

    builder.add_sphere(Vec3::new(-1.0, 1.0, -7.0), 1.0, green);
    builder.add_sphere(Vec3::new(1.0, 1.0, -7.0), 1.0, blue);
    builder.add_plane(Vec3::Y, 0.0, ground);

    builder.add_light(Vec3::new(-2.0, 2.0, -2.0), Vec3::new(1.0, 0.4, 0.4));
    builder.add_light(Vec3::new(2.0, 3.0, -2.0), Vec3::new(0.4, 1.0, 0.4));

    builder.build()
}
