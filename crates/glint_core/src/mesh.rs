//! Triangle mesh representation.
//!
//! A mesh owns flat vertex/normal/tex-coord buffers plus a face list of
//! index triples into them, the layout OBJ-style loaders naturally
//! produce. One material is shared by the whole mesh.

use glam::Vec2;
use glint_math::{Aabb, Vec3};
use thiserror::Error;

use crate::material::MaterialId;

/// Errors produced while validating mesh buffers.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh has no faces")]
    Empty,

    #[error("face {face} references vertex {index} but the mesh has {count} vertices")]
    VertexIndexOutOfRange { face: usize, index: u32, count: usize },

    #[error("face {face} references normal {index} but the mesh has {count} normals")]
    NormalIndexOutOfRange { face: usize, index: u32, count: usize },
}

/// Index triples for one triangle.
///
/// `normals` and `tex_coords` index their own buffers; when a buffer is
/// empty those indices are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub vertices: [u32; 3],
    pub normals: [u32; 3],
    pub tex_coords: [u32; 3],
}

impl Face {
    /// A face indexing only vertex positions.
    pub fn from_vertices(a: u32, b: u32, c: u32) -> Self {
        Self {
            vertices: [a, b, c],
            ..Default::default()
        }
    }
}

/// Indexed triangle mesh with one shared material.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub faces: Vec<Face>,
    pub material: MaterialId,
}

impl TriangleMesh {
    /// Create a mesh, validating that every face index is in range.
    pub fn new(
        vertices: Vec<Vec3>,
        normals: Vec<Vec3>,
        tex_coords: Vec<Vec2>,
        faces: Vec<Face>,
        material: MaterialId,
    ) -> Result<Self, MeshError> {
        if faces.is_empty() {
            return Err(MeshError::Empty);
        }

        for (i, face) in faces.iter().enumerate() {
            for &v in &face.vertices {
                if v as usize >= vertices.len() {
                    return Err(MeshError::VertexIndexOutOfRange {
                        face: i,
                        index: v,
                        count: vertices.len(),
                    });
                }
            }
            if !normals.is_empty() {
                for &n in &face.normals {
                    if n as usize >= normals.len() {
                        return Err(MeshError::NormalIndexOutOfRange {
                            face: i,
                            index: n,
                            count: normals.len(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            vertices,
            normals,
            tex_coords,
            faces,
            material,
        })
    }

    /// Mesh with positions and faces only, no shading normals.
    pub fn from_positions(
        vertices: Vec<Vec3>,
        faces: Vec<Face>,
        material: MaterialId,
    ) -> Result<Self, MeshError> {
        Self::new(vertices, Vec::new(), Vec::new(), faces, material)
    }

    /// Number of triangles.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// The three corner positions of a face.
    #[inline]
    pub fn triangle(&self, face: usize) -> [Vec3; 3] {
        let f = &self.faces[face];
        [
            self.vertices[f.vertices[0] as usize],
            self.vertices[f.vertices[1] as usize],
            self.vertices[f.vertices[2] as usize],
        ]
    }

    /// Centroid of a face, used for KD split candidates.
    pub fn face_centroid(&self, face: usize) -> Vec3 {
        let [a, b, c] = self.triangle(face);
        (a + b + c) / 3.0
    }

    /// Bounding box of a single face.
    pub fn face_bounds(&self, face: usize) -> Aabb {
        let [a, b, c] = self.triangle(face);
        let mut bounds = Aabb::from_points(a, b);
        bounds.grow(c);
        bounds
    }

    /// Bounding box over all vertices.
    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for v in &self.vertices {
            bounds.grow(*v);
        }
        bounds
    }

    /// True if a face has (near) zero area and can never be hit.
    pub fn face_is_degenerate(&self, face: usize) -> bool {
        let [a, b, c] = self.triangle(face);
        (b - a).cross(c - a).length_squared() < f32::EPSILON
    }

    /// Drop faces with zero area, returning how many were removed.
    ///
    /// Degenerate faces would otherwise feed NaN normals into shading;
    /// skipping them at build time is a recoverable condition, not an
    /// error.
    pub fn remove_degenerate_faces(&mut self) -> usize {
        let before = self.faces.len();
        let vertices = std::mem::take(&mut self.vertices);
        self.faces.retain(|f| {
            let a = vertices[f.vertices[0] as usize];
            let b = vertices[f.vertices[1] as usize];
            let c = vertices[f.vertices[2] as usize];
            (b - a).cross(c - a).length_squared() >= f32::EPSILON
        });
        self.vertices = vertices;

        let removed = before - self.faces.len();
        if removed > 0 {
            log::warn!("skipped {removed} degenerate face(s) of {before}");
        }
        removed
    }

    /// Move the mesh so its bounding box is centered on `new_center`.
    pub fn translate_to(&mut self, new_center: Vec3) {
        let translation = new_center - self.bounds().centroid();
        for v in &mut self.vertices {
            *v += translation;
        }
    }

    /// Uniformly rescale the mesh so its largest axis extent equals
    /// `new_max_extent`.
    pub fn resize_scale(&mut self, new_max_extent: f32) {
        let extent = self.bounds().extent();
        let max_extent = extent.x.max(extent.y).max(extent.z);
        if max_extent <= 0.0 {
            log::warn!("resize_scale on a mesh with no extent, leaving it unchanged");
            return;
        }
        let factor = new_max_extent / max_extent;
        for v in &mut self.vertices {
            *v *= factor;
        }
    }
}
