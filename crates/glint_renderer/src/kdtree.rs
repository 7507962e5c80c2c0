//! KD-tree acceleration structure over a triangle mesh.
//!
//! Built once per model with a binned surface-area-heuristic split
//! policy, then traversed iteratively front-to-back with an explicit
//! stack. The tree is immutable during rendering.

use glint_core::TriangleMesh;
use glint_math::{Aabb, Interval, Ray};

use crate::primitive::{intersect_triangle_culled, TOLERANCE};

/// Number of candidate-split bins per axis for the SAH sweep.
const SAH_BINS: usize = 16;

/// Construction limits for [`KdTree::build`].
#[derive(Clone, Debug)]
pub struct KdBuildOptions {
    /// Subdivide until a node holds at most this many faces
    pub max_faces_per_leaf: usize,
    /// Hard recursion cap; reaching it forces a leaf regardless of size
    pub max_depth: u32,
}

impl Default for KdBuildOptions {
    fn default() -> Self {
        Self {
            max_faces_per_leaf: 64,
            max_depth: 32,
        }
    }
}

enum KdNode {
    Internal {
        axis: usize,
        split: f32,
        left: u32,
        right: u32,
    },
    Leaf {
        faces: Vec<u32>,
    },
}

/// Nearest hit against a mesh: parametric distance, barycentrics, and
/// the face index that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub face: u32,
}

/// Binary spatial partition over a mesh's face list.
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: u32,
    bounds: Aabb,
    max_depth: u32,
}

impl KdTree {
    /// Build a tree over every face of `mesh`.
    ///
    /// Splits are chosen by minimizing
    /// `SA(left) * N(left) + SA(right) * N(right)`; a split that leaves
    /// one side empty or costs more than not splitting forces a leaf.
    /// A face whose bounds straddle the chosen plane is referenced from
    /// both children, so traversal finds it from either side.
    pub fn build(mesh: &TriangleMesh, options: &KdBuildOptions) -> Self {
        let faces: Vec<u32> = (0..mesh.face_count() as u32).collect();
        let bounds = mesh.bounds();

        let mut nodes = Vec::new();
        let mut max_depth = 0;
        let root = build_node(&mut nodes, mesh, faces, bounds, 0, options, &mut max_depth);

        log::debug!(
            "kd-tree built: {} faces, {} nodes, depth {}",
            mesh.face_count(),
            nodes.len(),
            max_depth
        );

        Self {
            nodes,
            root,
            bounds,
            max_depth,
        }
    }

    /// Bounding box of the whole tree.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Deepest node level reached during construction.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Total node count.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Capacity of the traversal stack, derived from the built tree's
    /// depth: at most one far child is deferred per level on the way
    /// down, so `max_depth + 1` entries can never overflow.
    pub fn traversal_stack_capacity(&self) -> usize {
        self.max_depth as usize + 1
    }

    /// Find the nearest face hit by `ray` within `ray_t`.
    ///
    /// Standard front-to-back traversal: the near child is visited
    /// first and the far child is deferred on the stack; deferred
    /// subtrees whose entry distance lies beyond the best hit so far
    /// are discarded without being visited. A ray missing the root
    /// bounds short-circuits.
    pub fn intersect(&self, mesh: &TriangleMesh, ray: &Ray, ray_t: Interval) -> Option<MeshHit> {
        let (t_enter, t_exit) = self.bounds.intersect(ray, ray_t)?;

        let mut stack: Vec<(u32, f32, f32)> = Vec::with_capacity(self.traversal_stack_capacity());
        let mut best: Option<MeshHit> = None;
        let mut closest = ray_t.max;

        let mut node = self.root;
        let mut t_min = t_enter;
        let mut t_max = t_exit;

        'traverse: loop {
            match &self.nodes[node as usize] {
                KdNode::Internal {
                    axis,
                    split,
                    left,
                    right,
                } => {
                    let origin = ray.origin[*axis];
                    let dir = ray.direction[*axis];

                    let (near, far) = if origin < *split {
                        (*left, *right)
                    } else {
                        (*right, *left)
                    };

                    if dir == 0.0 {
                        // Parallel to the split plane: stays on one side
                        node = near;
                        continue 'traverse;
                    }

                    let t_plane = (*split - origin) / dir;
                    if t_plane >= t_max || t_plane < 0.0 {
                        node = near;
                    } else if t_plane <= t_min {
                        node = far;
                    } else {
                        stack.push((far, t_plane, t_max));
                        node = near;
                        t_max = t_plane;
                    }
                }

                KdNode::Leaf { faces } => {
                    for &face in faces {
                        let [a, b, c] = mesh.triangle(face as usize);
                        let leaf_t = Interval::new(ray_t.min, closest);
                        if let Some(hit) = intersect_triangle_culled(ray, a, b, c, leaf_t) {
                            closest = hit.t;
                            best = Some(MeshHit {
                                t: hit.t,
                                u: hit.u,
                                v: hit.v,
                                face,
                            });
                        }
                    }

                    // Resume the nearest deferred subtree that could
                    // still hold a closer hit.
                    loop {
                        match stack.pop() {
                            Some((n, tn, tx)) => {
                                if tn > closest {
                                    continue;
                                }
                                node = n;
                                t_min = tn;
                                t_max = tx.min(closest);
                                continue 'traverse;
                            }
                            None => return best,
                        }
                    }
                }
            }
        }
    }
}

/// Linear scan over every face, kept as the reference the tree is
/// checked against.
pub fn intersect_mesh_linear(mesh: &TriangleMesh, ray: &Ray, ray_t: Interval) -> Option<MeshHit> {
    let mut best: Option<MeshHit> = None;
    let mut closest = ray_t.max;

    for face in 0..mesh.face_count() {
        let [a, b, c] = mesh.triangle(face);
        let t_range = Interval::new(ray_t.min, closest);
        if let Some(hit) = intersect_triangle_culled(ray, a, b, c, t_range) {
            closest = hit.t;
            best = Some(MeshHit {
                t: hit.t,
                u: hit.u,
                v: hit.v,
                face: face as u32,
            });
        }
    }
    best
}

fn build_node(
    nodes: &mut Vec<KdNode>,
    mesh: &TriangleMesh,
    faces: Vec<u32>,
    bounds: Aabb,
    depth: u32,
    options: &KdBuildOptions,
    max_depth_out: &mut u32,
) -> u32 {
    *max_depth_out = (*max_depth_out).max(depth);

    let wants_split = faces.len() > options.max_faces_per_leaf && depth < options.max_depth;
    if wants_split {
        if let Some((axis, split)) = choose_split_sah(mesh, &faces, &bounds) {
            // Partition by face bounds, not centroid: a face straddling
            // the plane goes into both children so a ray confined to
            // either side still reaches it.
            let mut left_faces = Vec::new();
            let mut right_faces = Vec::new();
            for &f in &faces {
                let face_bounds = mesh.face_bounds(f as usize);
                if face_bounds.min[axis] <= split {
                    left_faces.push(f);
                }
                if face_bounds.max[axis] >= split {
                    right_faces.push(f);
                }
            }

            // A one-sided partition, or one where every face straddles
            // the plane, means the heuristic separated nothing; fall
            // through to a leaf.
            let separates = !left_faces.is_empty()
                && !right_faces.is_empty()
                && (left_faces.len() < faces.len() || right_faces.len() < faces.len());
            if separates {
                let mut left_bounds = bounds;
                left_bounds.max[axis] = split;
                let mut right_bounds = bounds;
                right_bounds.min[axis] = split;

                let left = build_node(
                    nodes,
                    mesh,
                    left_faces,
                    left_bounds,
                    depth + 1,
                    options,
                    max_depth_out,
                );
                let right = build_node(
                    nodes,
                    mesh,
                    right_faces,
                    right_bounds,
                    depth + 1,
                    options,
                    max_depth_out,
                );

                nodes.push(KdNode::Internal {
                    axis,
                    split,
                    left,
                    right,
                });
                return (nodes.len() - 1) as u32;
            }
        }
    }

    if depth >= options.max_depth && faces.len() > options.max_faces_per_leaf {
        log::warn!(
            "kd leaf forced at depth {} with {} faces (target {})",
            depth,
            faces.len(),
            options.max_faces_per_leaf
        );
    }

    nodes.push(KdNode::Leaf { faces });
    (nodes.len() - 1) as u32
}

/// Pick the axis and position minimizing the SAH cost, or `None` when
/// no candidate beats leaving the node unsplit.
///
/// Faces straddling a candidate plane end up in both children, so the
/// per-side counts are taken from where each face's bounds enter and
/// exit the bin range and may sum past the face total.
fn choose_split_sah(mesh: &TriangleMesh, faces: &[u32], node_bounds: &Aabb) -> Option<(usize, f32)> {
    // Candidate positions come from binned face centroids.
    let mut centroid_bounds = Aabb::EMPTY;
    for &f in faces {
        centroid_bounds.grow(mesh.face_centroid(f as usize));
    }

    let leaf_cost = node_bounds.surface_area() * faces.len() as f32;
    let mut best: Option<(usize, f32)> = None;
    let mut best_cost = leaf_cost;

    for axis in 0..3 {
        let c_min = centroid_bounds.min[axis];
        let c_max = centroid_bounds.max[axis];
        if c_max - c_min <= TOLERANCE {
            // Zero centroid spread (e.g. coincident faces): splitting
            // here cannot separate anything.
            continue;
        }
        let scale = SAH_BINS as f32 / (c_max - c_min);
        // Float-to-int casts saturate, so values below c_min land in
        // bin 0 and values past c_max clamp to the last bin.
        let bin_for = |x: f32| (((x - c_min) * scale) as usize).min(SAH_BINS - 1);

        let mut entries = [0usize; SAH_BINS];
        let mut exits = [0usize; SAH_BINS];
        let mut bin_bounds = [Aabb::EMPTY; SAH_BINS];
        for &f in faces {
            let face_bounds = mesh.face_bounds(f as usize);
            let lo = bin_for(face_bounds.min[axis]);
            let hi = bin_for(face_bounds.max[axis]);
            entries[lo] += 1;
            exits[hi] += 1;
            bin_bounds[lo] = bin_bounds[lo].union(&face_bounds);
            bin_bounds[hi] = bin_bounds[hi].union(&face_bounds);
        }

        // Suffix sweep: surface area of bins i..SAH_BINS
        let mut right_area = [0.0f32; SAH_BINS];
        let mut acc = Aabb::EMPTY;
        for i in (1..SAH_BINS).rev() {
            acc = acc.union(&bin_bounds[i]);
            right_area[i] = acc.surface_area();
        }

        // Prefix sweep over the SAH_BINS - 1 interior boundaries. A
        // face overlaps the left side once its bounds have entered, and
        // the right side until its bounds have exited.
        let mut left_acc = Aabb::EMPTY;
        let mut left_count = 0usize;
        let mut exited = 0usize;
        for i in 0..SAH_BINS - 1 {
            left_acc = left_acc.union(&bin_bounds[i]);
            left_count += entries[i];
            exited += exits[i];
            let right_count = faces.len() - exited;
            if left_count == 0 || right_count == 0 {
                continue;
            }

            let cost =
                left_acc.surface_area() * left_count as f32 + right_area[i + 1] * right_count as f32;
            if cost < best_cost {
                best_cost = cost;
                let position = c_min + (i + 1) as f32 / SAH_BINS as f32 * (c_max - c_min);
                best = Some((axis, position));
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::{Face, MaterialId, TriangleMesh};
    use glint_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// A bumpy n x n grid of quads spanning x,z in [0, n], winding
    /// chosen so rays from above see front faces.
    fn grid_mesh(n: u32) -> TriangleMesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let y = ((i * 31 + j * 17) % 7) as f32 * 0.1;
                vertices.push(Vec3::new(i as f32, y, j as f32));
            }
        }

        let idx = |i: u32, j: u32| j * (n + 1) + i;
        let mut faces = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let (a, b, c, d) = (idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1));
                faces.push(Face::from_vertices(a, c, b));
                faces.push(Face::from_vertices(a, d, c));
            }
        }

        TriangleMesh::from_positions(vertices, faces, MaterialId::SKYBOX).unwrap()
    }

    fn forward_t() -> Interval {
        Interval::new(TOLERANCE, f32::INFINITY)
    }

    #[test]
    fn test_build_small_mesh_is_single_leaf() {
        let mesh = grid_mesh(2);
        let tree = KdTree::build(&mesh, &KdBuildOptions::default());

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.max_depth(), 0);
    }

    #[test]
    fn test_build_subdivides_large_mesh() {
        let mesh = grid_mesh(16); // 512 faces
        let options = KdBuildOptions {
            max_faces_per_leaf: 16,
            max_depth: 32,
        };
        let tree = KdTree::build(&mesh, &options);

        assert!(tree.node_count() > 1);
        assert!(tree.max_depth() > 0);
        assert!(tree.traversal_stack_capacity() > tree.max_depth() as usize);
    }

    #[test]
    fn test_coincident_faces_terminate() {
        // 100 copies of the same triangle: zero centroid spread, so the
        // build must force a leaf instead of recursing forever.
        let vertices = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)];
        let faces = vec![Face::from_vertices(0, 1, 2); 100];
        let mesh = TriangleMesh::from_positions(vertices, faces, MaterialId::SKYBOX).unwrap();

        let options = KdBuildOptions {
            max_faces_per_leaf: 4,
            max_depth: 8,
        };
        let tree = KdTree::build(&mesh, &options);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_root_miss_short_circuits() {
        let mesh = grid_mesh(4);
        let tree = KdTree::build(&mesh, &KdBuildOptions::default());

        let ray = Ray::new(Vec3::new(-10.0, 5.0, -10.0), Vec3::new(0.0, 1.0, 0.0));
        assert!(tree.intersect(&mesh, &ray, forward_t()).is_none());
    }

    #[test]
    fn test_traversal_matches_linear_scan() {
        let mesh = grid_mesh(16);
        let options = KdBuildOptions {
            max_faces_per_leaf: 8,
            max_depth: 32,
        };
        let tree = KdTree::build(&mesh, &options);

        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = 0;
        for _ in 0..500 {
            let origin = Vec3::new(
                rng.gen_range(-1.0..17.0),
                rng.gen_range(3.0..6.0),
                rng.gen_range(-1.0..17.0),
            );
            let direction = Vec3::new(
                rng.gen_range(-0.3..0.3),
                -1.0,
                rng.gen_range(-0.3..0.3),
            )
            .normalize();
            let ray = Ray::new(origin, direction);

            let from_tree = tree.intersect(&mesh, &ray, forward_t());
            let from_scan = intersect_mesh_linear(&mesh, &ray, forward_t());

            match (from_tree, from_scan) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert_eq!(a.face, b.face);
                    assert!((a.t - b.t).abs() < 1e-5);
                    hits += 1;
                }
                (a, b) => panic!("tree {a:?} disagrees with linear scan {b:?}"),
            }
        }
        // The ray distribution is aimed at the grid; most should hit.
        assert!(hits > 300, "only {hits} of 500 rays hit the grid");
    }

    #[test]
    fn test_face_straddling_split_found_from_either_side() {
        // Three small triangles clustered at low x and one long face
        // reaching out to x=8. Any split plane the build picks lands
        // between the cluster and the far tip, so the long face must be
        // referenced from both children or rays over its far end miss.
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(1.0, 0.0, 2.0),
            Vec3::new(1.0, 0.0, 4.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(2.0, 0.0, 4.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 2.0),
            Vec3::new(8.0, 0.0, 1.0),
        ];
        let faces = vec![
            Face::from_vertices(0, 1, 2),
            Face::from_vertices(3, 4, 5),
            Face::from_vertices(6, 7, 8),
            Face::from_vertices(9, 10, 11),
        ];
        let mesh = TriangleMesh::from_positions(vertices, faces, MaterialId::SKYBOX).unwrap();

        let options = KdBuildOptions {
            max_faces_per_leaf: 1,
            max_depth: 16,
        };
        let tree = KdTree::build(&mesh, &options);
        assert!(tree.node_count() > 1, "build refused to split");

        let down = Vec3::new(0.0, -1.0, 0.0);
        for origin in [
            Vec3::new(7.5, 1.0, 1.0), // far tip of the long face
            Vec3::new(5.0, 1.0, 1.0), // middle of the long face
            Vec3::new(0.4, 1.0, 0.3), // inside the cluster
            Vec3::new(3.0, 1.0, 4.0), // between, hits nothing
        ] {
            let ray = Ray::new(origin, down);
            let from_tree = tree.intersect(&mesh, &ray, forward_t());
            let from_scan = intersect_mesh_linear(&mesh, &ray, forward_t());
            assert_eq!(from_tree, from_scan, "ray from {origin} disagrees");
        }

        // The far-tip ray in particular must land on the long face.
        let tip = tree
            .intersect(&mesh, &Ray::new(Vec3::new(7.5, 1.0, 1.0), down), forward_t())
            .unwrap();
        assert_eq!(tip.face, 3);
        assert!((tip.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_traversal_from_inside_bounds() {
        let mesh = grid_mesh(8);
        let tree = KdTree::build(
            &mesh,
            &KdBuildOptions {
                max_faces_per_leaf: 4,
                max_depth: 32,
            },
        );

        // Origin inside the root box, pointing down
        let ray = Ray::new(Vec3::new(4.1, 0.5, 4.1), Vec3::new(0.0, -1.0, 0.0));
        let from_tree = tree.intersect(&mesh, &ray, forward_t());
        let from_scan = intersect_mesh_linear(&mesh, &ray, forward_t());
        assert_eq!(from_tree, from_scan);
    }
}
