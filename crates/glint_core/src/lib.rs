//! Glint Core - renderer-agnostic scene data.
//!
//! This crate provides:
//!
//! - **Materials**: [`Material`] values held in a [`MaterialTable`] and
//!   referenced by index through [`MaterialId`]
//! - **Geometry**: [`TriangleMesh`] with vertex/normal/tex-coord buffers
//!   and indexed faces, plus bounds and placement utilities
//!
//! Mesh loading (OBJ and friends) lives outside this crate; loaders hand
//! over populated buffers and the render core treats them as opaque data.

pub mod material;
pub mod mesh;

// Re-export commonly used types
pub use material::{Material, MaterialId, MaterialTable};
pub use mesh::{Face, MeshError, TriangleMesh};
