//! Analytic primitives and ray intersection routines.
//!
//! All tests share [`TOLERANCE`]; using one constant everywhere keeps
//! secondary rays from re-hitting the surface they left (shadow acne).

use glint_core::MaterialId;
use glint_math::{Interval, Ray, Vec3};

/// Shared floating-point tolerance for intersection tests. Also the
/// minimum parametric distance for secondary rays.
pub const TOLERANCE: f32 = 1e-4;

/// Record of the nearest ray/surface intersection.
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    /// Parametric distance along the ray
    pub t: f32,
    /// World-space intersection point
    pub point: Vec3,
    /// Unit surface normal, flipped to face against the ray
    pub normal: Vec3,
    /// Material of the surface that was hit
    pub material: MaterialId,
    /// Barycentric/UV coordinates where the surface has them
    pub u: f32,
    pub v: f32,
}

/// A sphere described by center and radius.
#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub material: MaterialId,
}

impl Sphere {
    /// Solve |O + tD - C|^2 = r^2 for the smallest root inside `ray_t`.
    ///
    /// Requires a normalized ray direction so that t is a distance.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let oc = self.center - ray.origin;
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Nearest root first, fall back to the far one when the origin
        // is inside the sphere.
        let mut root = h - sqrtd;
        if !ray_t.surrounds(root) {
            root = h + sqrtd;
            if !ray_t.surrounds(root) {
                return None;
            }
        }
        Some(root)
    }

    /// Unit normal at a surface point.
    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        (point - self.center) / self.radius
    }
}

/// An infinite plane: points p with dot(normal, p) == distance.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Signed distance from the origin along the normal
    pub distance: f32,
    pub material: MaterialId,
}

impl Plane {
    /// Solve dot(N, O + tD) = d. Near-parallel rays never hit.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < TOLERANCE {
            return None;
        }
        let t = (self.distance - self.normal.dot(ray.origin)) / denom;
        ray_t.surrounds(t).then_some(t)
    }
}

/// Barycentric result of a ray/triangle test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

/// Culled Möller-Trumbore ray/triangle intersection.
///
/// The intersection point is `(1-u-v)*a + u*b + v*c`. Rays whose
/// determinant is below [`TOLERANCE`] are rejected outright, so
/// back-facing and near-grazing triangles never hit. That trades
/// double-sided surfaces for one fewer branch in the hot path.
#[inline]
pub fn intersect_triangle_culled(
    ray: &Ray,
    a: Vec3,
    b: Vec3,
    c: Vec3,
    ray_t: Interval,
) -> Option<TriangleHit> {
    let ab = b - a;
    let ac = c - a;

    let pvec = ray.direction.cross(ac);
    let det = ab.dot(pvec);
    if det < TOLERANCE {
        return None;
    }
    let det_inv = 1.0 / det;

    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * det_inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(ab);
    let v = ray.direction.dot(qvec) * det_inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = ac.dot(qvec) * det_inv;
    ray_t.surrounds(t).then_some(TriangleHit { t, u, v })
}
