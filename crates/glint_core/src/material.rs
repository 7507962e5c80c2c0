//! Materials and the index-based material table.
//!
//! Primitives never hold material pointers; they carry a [`MaterialId`]
//! into the scene's [`MaterialTable`]. The table is append-only during
//! scene setup and immutable once rendering starts, so an id stays valid
//! for the lifetime of the scene.

use glint_math::Vec3;

/// A simple surface description: ambient base color, diffuse/reflective
/// color, and a specularity scalar in [0, 1] weighting the reflected
/// contribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Color emitted regardless of lighting
    pub ambient: Vec3,
    /// Color scattered from direct light
    pub diffuse: Vec3,
    /// Weight of the mirror-reflected contribution, clamped to [0, 1]
    pub specularity: f32,
}

impl Material {
    /// Create a new material. Specularity outside [0, 1] is clamped.
    pub fn new(ambient: Vec3, diffuse: Vec3, specularity: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specularity: specularity.clamp(0.0, 1.0),
        }
    }
}

/// Handle into a [`MaterialTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(u32);

impl MaterialId {
    /// Slot 0 is reserved for the skybox/background material.
    pub const SKYBOX: MaterialId = MaterialId(0);

    /// The table index this id refers to.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordered collection of materials owned by the scene.
///
/// The first entry is always the skybox material, so the table is never
/// empty and `MaterialId::SKYBOX` is always valid.
#[derive(Clone, Debug)]
pub struct MaterialTable {
    materials: Vec<Material>,
}

impl MaterialTable {
    /// Create a table seeded with the skybox material.
    pub fn new(skybox: Material) -> Self {
        Self {
            materials: vec![skybox],
        }
    }

    /// Append a material, returning its handle.
    pub fn add(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    /// Look up a material by id.
    ///
    /// Ids are only handed out by `add`, so an out-of-range id is a
    /// programming error; this panics rather than returning an option.
    pub fn get(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    /// The skybox/background material.
    pub fn skybox(&self) -> &Material {
        &self.materials[MaterialId::SKYBOX.index()]
    }

    /// Number of materials, including the skybox.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Always false: the skybox slot is present from construction.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
