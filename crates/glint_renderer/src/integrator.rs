//! Shading: direct lighting plus bounded recursive reflection.
//!
//! The blend is Whitted-style and deliberately ad hoc (no energy
//! conservation): each surface contributes
//!
//! ```text
//! local    = ambient + sum over visible lights of
//!            diffuse * light_color * cos(theta) / (1 + d^2)
//! radiance = local + specularity * radiance(reflected ray)
//! ```
//!
//! implemented as an iterative loop with an explicit remaining-bounce
//! counter and a running specularity weight, so recursion depth is an
//! invariant rather than a stack hazard. Paths terminate with the
//! scene's skybox color on a miss, or after the bounce limit.

use std::sync::atomic::{AtomicU64, Ordering};

use glint_math::{reflect, Interval, Ray, Vec3};

use crate::primitive::TOLERANCE;
use crate::scene::Scene;

/// Session-scoped counter of every ray cast (primary, shadow, and
/// reflection). Relaxed increments; only read for reporting.
#[derive(Debug, Default)]
pub struct RayCounter {
    count: AtomicU64,
}

impl RayCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Radiance seen along `ray`. `bounce_limit` is the number of
/// reflection bounces allowed after the primary hit.
pub fn trace(scene: &Scene, ray: Ray, bounce_limit: u32, rays: &RayCounter) -> Vec3 {
    let mut color = Vec3::ZERO;
    let mut weight = 1.0f32;
    let mut current = ray;

    for bounce in 0..=bounce_limit {
        rays.add(1);

        let Some(hit) = scene.intersect(&current, Interval::new(TOLERANCE, f32::INFINITY)) else {
            color += weight * scene.background();
            break;
        };

        let material = scene.materials.get(hit.material);
        let mut local = material.ambient;

        for light in &scene.lights {
            let to_light = light.position - hit.point;
            let distance = to_light.length();
            if distance <= TOLERANCE {
                continue;
            }
            let light_dir = to_light / distance;

            let cos_theta = hit.normal.dot(light_dir);
            if cos_theta <= 0.0 {
                continue;
            }

            // Shadow ray; offset along the normal to avoid re-hitting
            // the surface we are shading.
            rays.add(1);
            let shadow = Ray::new(hit.point + hit.normal * TOLERANCE, light_dir);
            if scene.occluded(&shadow, distance) {
                continue;
            }

            let attenuation = 1.0 / (1.0 + distance * distance);
            local += material.diffuse * light.color * cos_theta * attenuation;
        }

        color += weight * local;

        if material.specularity <= 0.0 || bounce == bounce_limit {
            break;
        }
        weight *= material.specularity;
        current = Ray::new(
            hit.point + hit.normal * TOLERANCE,
            reflect(current.direction, hit.normal),
        );
    }

    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneBuilder;
    use glint_core::Material;

    fn sky() -> Material {
        Material::new(Vec3::new(0.3, 0.4, 0.5), Vec3::new(0.2, 0.3, 0.4), 0.0)
    }

    #[test]
    fn test_miss_returns_background() {
        let scene = SceneBuilder::new(sky()).build();
        let rays = RayCounter::new();

        let color = trace(&scene, Ray::new(Vec3::ZERO, Vec3::Z), 5, &rays);
        assert_eq!(color, scene.background());
        assert_eq!(rays.get(), 1);
    }

    #[test]
    fn test_unlit_hit_is_ambient_only() {
        let mut builder = SceneBuilder::new(sky());
        let mat = builder.add_material(Material::new(Vec3::new(0.1, 0.2, 0.3), Vec3::ONE, 0.0));
        builder.add_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, mat);
        let scene = builder.build();
        let rays = RayCounter::new();

        let color = trace(&scene, Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)), 0, &rays);
        assert!((color - Vec3::new(0.1, 0.2, 0.3)).length() < 1e-6);
    }

    #[test]
    fn test_light_adds_diffuse_term() {
        let mut builder = SceneBuilder::new(sky());
        let mat = builder.add_material(Material::new(Vec3::ZERO, Vec3::ONE, 0.0));
        builder.add_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, mat);
        builder.add_light(Vec3::new(0.0, 0.0, 0.0), Vec3::ONE);
        let scene = builder.build();
        let rays = RayCounter::new();

        let color = trace(&scene, Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)), 0, &rays);
        // Head-on light: cos(theta) = 1 at distance 4
        let expected = 1.0 / (1.0 + 16.0);
        assert!((color.x - expected).abs() < 1e-3, "got {color}");
        // Primary ray plus one shadow ray
        assert_eq!(rays.get(), 2);
    }

    #[test]
    fn test_occluded_light_contributes_nothing() {
        // Primary ray hits the big sphere at (0,0,-4); the shadow ray
        // toward the light passes through the blocker at (0,1.5,-2.5),
        // which sits clear of the primary ray itself.
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let build = |with_blocker: bool| {
            let mut builder = SceneBuilder::new(sky());
            let mat = builder.add_material(Material::new(Vec3::ZERO, Vec3::ONE, 0.0));
            builder.add_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, mat);
            if with_blocker {
                builder.add_sphere(Vec3::new(0.0, 1.5, -2.5), 0.3, mat);
            }
            builder.add_light(Vec3::new(0.0, 3.0, -1.0), Vec3::ONE);
            builder.build()
        };

        let rays = RayCounter::new();
        let lit = trace(&build(false), ray, 0, &rays);
        let shadowed = trace(&build(true), ray, 0, &rays);

        assert!(lit.x > 0.0);
        assert_eq!(shadowed, Vec3::ZERO);
    }

    #[test]
    fn test_bounce_limit_zero_casts_no_reflection() {
        let mut builder = SceneBuilder::new(sky());
        let mirror = builder.add_material(Material::new(Vec3::ZERO, Vec3::ONE, 1.0));
        builder.add_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, mirror);
        let scene = builder.build();
        let rays = RayCounter::new();

        trace(&scene, Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)), 0, &rays);
        assert_eq!(rays.get(), 1);
    }

    #[test]
    fn test_reflection_picks_up_background() {
        let mut builder = SceneBuilder::new(sky());
        let mirror = builder.add_material(Material::new(Vec3::ZERO, Vec3::ZERO, 0.5));
        builder.add_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, mirror);
        let scene = builder.build();
        let rays = RayCounter::new();

        let color = trace(&scene, Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)), 3, &rays);
        // Head-on reflection bounces straight back and escapes, so the
        // path ends on the skybox weighted by specularity.
        assert!((color - 0.5 * scene.background()).length() < 1e-5);
        assert_eq!(rays.get(), 2);
    }
}
