//! Scene aggregation and nearest-hit queries.
//!
//! A [`Scene`] owns every renderable for a frame: the material table,
//! analytic spheres and planes, point lights, and triangle-mesh models
//! with their KD-trees. It is assembled single-threaded through
//! [`SceneBuilder`] and immutable for the duration of rendering, so
//! workers query it without locks.

use glint_core::{Material, MaterialId, MaterialTable, TriangleMesh};
use glint_math::{Aabb, Interval, Ray, Vec3};

use crate::kdtree::{KdBuildOptions, KdTree};
use crate::primitive::{Hit, Plane, Sphere};

/// A point light with no falloff radius; attenuation is by distance.
#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
}

/// A triangle mesh plus the acceleration structure built over it.
pub struct Model {
    pub mesh: TriangleMesh,
    pub kd_tree: KdTree,
    pub bounds: Aabb,
}

/// Everything the integrator can see. Read-only while rendering.
pub struct Scene {
    pub materials: MaterialTable,
    pub spheres: Vec<Sphere>,
    pub planes: Vec<Plane>,
    pub lights: Vec<PointLight>,
    pub models: Vec<Model>,
}

impl Scene {
    /// Color returned when a ray escapes the scene: the skybox
    /// material's ambient color (material slot 0).
    pub fn background(&self) -> Vec3 {
        self.materials.skybox().ambient
    }

    /// Nearest hit across every primitive kind, or `None` on a miss.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut closest = ray_t.max;

        for sphere in &self.spheres {
            let t_range = Interval::new(ray_t.min, closest);
            if let Some(t) = sphere.intersect(ray, t_range) {
                let point = ray.at(t);
                let normal = sphere.normal_at(point);
                closest = t;
                best = Some(Hit {
                    t,
                    point,
                    normal: face_against(normal, ray),
                    material: sphere.material,
                    u: 0.0,
                    v: 0.0,
                });
            }
        }

        for plane in &self.planes {
            let t_range = Interval::new(ray_t.min, closest);
            if let Some(t) = plane.intersect(ray, t_range) {
                closest = t;
                best = Some(Hit {
                    t,
                    point: ray.at(t),
                    normal: face_against(plane.normal, ray),
                    material: plane.material,
                    u: 0.0,
                    v: 0.0,
                });
            }
        }

        for model in &self.models {
            let t_range = Interval::new(ray_t.min, closest);
            if let Some(mesh_hit) = model.kd_tree.intersect(&model.mesh, ray, t_range) {
                closest = mesh_hit.t;
                best = Some(Hit {
                    t: mesh_hit.t,
                    point: ray.at(mesh_hit.t),
                    normal: model_normal(model, &mesh_hit),
                    material: model.mesh.material,
                    u: mesh_hit.u,
                    v: mesh_hit.v,
                });
            }
        }

        best
    }

    /// Any-hit query for shadow rays: is something within `max_t`?
    pub fn occluded(&self, ray: &Ray, max_t: f32) -> bool {
        self.intersect(ray, Interval::new(crate::primitive::TOLERANCE, max_t))
            .is_some()
    }
}

/// Flip `normal` so it faces against the ray direction.
#[inline]
fn face_against(normal: Vec3, ray: &Ray) -> Vec3 {
    if normal.dot(ray.direction) > 0.0 {
        -normal
    } else {
        normal
    }
}

/// Shading normal for a mesh hit: barycentric interpolation of the
/// vertex normals when the mesh has them, otherwise the geometric
/// face normal. Culled intersection guarantees the face fronts the ray.
fn model_normal(model: &Model, hit: &crate::kdtree::MeshHit) -> Vec3 {
    let mesh = &model.mesh;
    let face = &mesh.faces[hit.face as usize];

    if !mesh.normals.is_empty() {
        let na = mesh.normals[face.normals[0] as usize];
        let nb = mesh.normals[face.normals[1] as usize];
        let nc = mesh.normals[face.normals[2] as usize];
        let n = (1.0 - hit.u - hit.v) * na + hit.u * nb + hit.v * nc;
        if let Some(n) = n.try_normalize() {
            return n;
        }
    }

    let [a, b, c] = mesh.triangle(hit.face as usize);
    (b - a).cross(c - a).normalize()
}

/// Accumulates scene content, validates it, and builds acceleration
/// structures. Invalid primitives are logged and skipped rather than
/// failing the build.
pub struct SceneBuilder {
    materials: MaterialTable,
    spheres: Vec<Sphere>,
    planes: Vec<Plane>,
    lights: Vec<PointLight>,
    meshes: Vec<TriangleMesh>,
    kd_options: KdBuildOptions,
}

impl SceneBuilder {
    /// Start a scene; `skybox` becomes material slot 0.
    pub fn new(skybox: Material) -> Self {
        Self {
            materials: MaterialTable::new(skybox),
            spheres: Vec::new(),
            planes: Vec::new(),
            lights: Vec::new(),
            meshes: Vec::new(),
            kd_options: KdBuildOptions::default(),
        }
    }

    /// Override the KD-tree construction limits for subsequent meshes.
    pub fn kd_options(mut self, options: KdBuildOptions) -> Self {
        self.kd_options = options;
        self
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.add(material)
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material: MaterialId) -> &mut Self {
        self.spheres.push(Sphere {
            center,
            radius,
            material,
        });
        self
    }

    pub fn add_plane(&mut self, normal: Vec3, distance: f32, material: MaterialId) -> &mut Self {
        self.planes.push(Plane {
            normal,
            distance,
            material,
        });
        self
    }

    pub fn add_light(&mut self, position: Vec3, color: Vec3) -> &mut Self {
        self.lights.push(PointLight { position, color });
        self
    }

    pub fn add_mesh(&mut self, mesh: TriangleMesh) -> &mut Self {
        self.meshes.push(mesh);
        self
    }

    /// Validate primitives, build one KD-tree per mesh, and freeze the
    /// scene. Build-time only; never called while rendering.
    pub fn build(self) -> Scene {
        let spheres: Vec<Sphere> = self
            .spheres
            .into_iter()
            .filter(|s| {
                if s.radius <= 0.0 {
                    log::warn!("skipping sphere with non-positive radius {}", s.radius);
                    return false;
                }
                true
            })
            .collect();

        let planes: Vec<Plane> = self
            .planes
            .into_iter()
            .filter_map(|mut p| {
                match p.normal.try_normalize() {
                    Some(n) => {
                        p.normal = n;
                        Some(p)
                    }
                    None => {
                        log::warn!("skipping plane with zero-length normal");
                        None
                    }
                }
            })
            .collect();

        let models: Vec<Model> = self
            .meshes
            .into_iter()
            .filter_map(|mut mesh| {
                mesh.remove_degenerate_faces();
                if mesh.face_count() == 0 {
                    log::warn!("skipping mesh with no valid faces");
                    return None;
                }
                let kd_tree = KdTree::build(&mesh, &self.kd_options);
                let bounds = kd_tree.bounds();
                Some(Model {
                    mesh,
                    kd_tree,
                    bounds,
                })
            })
            .collect();

        log::debug!(
            "scene built: {} materials, {} spheres, {} planes, {} lights, {} models",
            self.materials.len(),
            spheres.len(),
            planes.len(),
            self.lights.len(),
            models.len()
        );

        Scene {
            materials: self.materials,
            spheres,
            planes,
            lights: self.lights,
            models,
        }
    }
}
