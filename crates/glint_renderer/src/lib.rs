//! Glint - tile-parallel CPU ray tracing.
//!
//! An offline Whitted-style ray tracer:
//! - Spheres, planes, and KD-tree accelerated triangle meshes
//! - Point lights with shadow rays and bounded recursive reflection
//! - The image is cut into tiles pulled by a fixed pool of worker
//!   threads, with progress polling and cooperative cancellation
//!
//! Window handling, mesh file parsing, and image encoding all live
//! outside this crate; it only fills pixel buffers.

mod camera;
mod framebuffer;
mod integrator;
mod kdtree;
mod primitive;
mod renderer;
mod scene;
mod session;
mod tile;

pub use camera::{Camera, RenderSettings};
pub use framebuffer::{color_to_rgba, Framebuffer, RowOrder};
pub use integrator::{trace, RayCounter};
pub use kdtree::{intersect_mesh_linear, KdBuildOptions, KdTree, MeshHit};
pub use primitive::{intersect_triangle_culled, Hit, Plane, Sphere, TriangleHit, TOLERANCE};
pub use renderer::{render, render_pixel, render_tile};
pub use scene::{Model, PointLight, Scene, SceneBuilder};
pub use session::{
    start_render, RenderError, RenderOptions, RenderOutput, RenderSession, RenderStats,
    RenderStatus,
};
pub use tile::{generate_tiles, Progress, Tile, WorkQueue, DEFAULT_TILE_SIZE};

/// Re-export the material and mesh types scenes are assembled from
pub use glint_core::{Face, Material, MaterialId, MaterialTable, TriangleMesh};

/// Re-export Vec3 and common math types from glint_math
pub use glint_math::{Aabb, Interval, Ray, Vec3};
