//! Camera for ray generation.
//!
//! The camera looks along -Z in its own basis (right-handed, matching
//! OpenGL conventions); the basis is derived from a facing vector by
//! crossing against world up.

use glint_math::{Ray, Vec3};
use rand::{Rng, RngCore};

/// Per-render settings the camera carries.
#[derive(Clone, Copy, Debug)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Jittered rays averaged per pixel when anti-aliasing is on
    pub samples_per_pixel: u32,
    /// Off means exactly one ray through each pixel center
    pub anti_aliasing: bool,
    /// Maximum reflection depth before a path terminates
    pub bounce_limit: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            samples_per_pixel: 5,
            anti_aliasing: false,
            bounce_limit: 5,
        }
    }
}

/// Eye position plus the orthonormal basis spanning the image plane.
/// Immutable during rendering.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub settings: RenderSettings,

    eye: Vec3,
    /// Center of the image plane, one unit along the facing direction
    frame_center: Vec3,
    camera_x: Vec3,
    camera_y: Vec3,

    /// Width of the image plane at unit distance; the plane height is
    /// h_fov / aspect
    h_fov: f32,
    aspect: f32,
}

impl Camera {
    /// Create a camera at `eye` looking along `facing`.
    ///
    /// `facing` need not be normalized. When it is (anti)parallel to
    /// world up the basis falls back to world Z as up.
    pub fn new(eye: Vec3, facing: Vec3, h_fov: f32, settings: RenderSettings) -> Self {
        let facing = facing.normalize();
        let world_up = Vec3::Y;

        let camera_z = -facing;
        let mut camera_x = world_up.cross(camera_z);
        if camera_x.length_squared() < 1e-8 {
            // Looking straight up or down
            camera_x = Vec3::Z.cross(camera_z);
        }
        let camera_x = camera_x.normalize();
        let camera_y = camera_z.cross(camera_x).normalize();

        Self {
            settings,
            eye,
            frame_center: eye + facing,
            camera_x,
            camera_y,
            h_fov,
            aspect: settings.width as f32 / settings.height as f32,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Ray through the center of pixel (x, y); y runs top to bottom.
    pub fn primary_ray(&self, x: u32, y: u32) -> Ray {
        self.ray_through(
            (x as f32 + 0.5) / self.settings.width as f32,
            (y as f32 + 0.5) / self.settings.height as f32,
        )
    }

    /// Ray through a jittered position inside pixel (x, y).
    pub fn sample_ray(&self, x: u32, y: u32, rng: &mut dyn RngCore) -> Ray {
        self.ray_through(
            (x as f32 + rng.gen::<f32>()) / self.settings.width as f32,
            (y as f32 + rng.gen::<f32>()) / self.settings.height as f32,
        )
    }

    /// Ray through normalized image coordinates (sx, sy) in [0, 1),
    /// measured from the top-left corner.
    fn ray_through(&self, sx: f32, sy: f32) -> Ray {
        let offset_x = (sx - 0.5) * self.h_fov;
        let offset_y = (0.5 - sy) * self.h_fov / self.aspect;
        let target = self.frame_center + self.camera_x * offset_x + self.camera_y * offset_y;
        Ray::new(self.eye, (target - self.eye).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_4x4() -> RenderSettings {
        RenderSettings {
            width: 4,
            height: 4,
            samples_per_pixel: 1,
            anti_aliasing: false,
            bounce_limit: 0,
        }
    }

    #[test]
    fn test_center_ray_points_along_facing() {
        let camera = Camera::new(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -1.0),
            1.0,
            RenderSettings {
                width: 3,
                height: 3,
                ..settings_4x4()
            },
        );

        let ray = camera.primary_ray(1, 1);
        assert_eq!(ray.origin, Vec3::ZERO);
        assert!((ray.direction - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_rays_are_normalized_and_deterministic() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.3, -0.2, -1.0), 1.0, settings_4x4());

        for y in 0..4 {
            for x in 0..4 {
                let a = camera.primary_ray(x, y);
                let b = camera.primary_ray(x, y);
                assert_eq!(a, b);
                assert!((a.direction.length() - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_image_orientation() {
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 1.0, settings_4x4());

        // Top row looks up, left column looks left
        assert!(camera.primary_ray(0, 0).direction.y > 0.0);
        assert!(camera.primary_ray(0, 3).direction.y < 0.0);
        assert!(camera.primary_ray(0, 0).direction.x < 0.0);
        assert!(camera.primary_ray(3, 0).direction.x > 0.0);
    }

    #[test]
    fn test_vertical_facing_has_valid_basis() {
        let camera = Camera::new(Vec3::ZERO, Vec3::Y, 1.0, settings_4x4());
        let ray = camera.primary_ray(1, 1);
        assert!(ray.direction.is_finite());
    }
}
