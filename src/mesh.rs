//! Collaborator contracts with the mesh/geometry layer.
//!
//! The matrix subsystem never walks the mesh itself; geometry injects the
//! sparsity pattern at initialization and, for linelet construction, an
//! adjacency view with edge weights. The weight of an edge is the
//! area-over-volume measure `0.5 * area * (1/vol_i + 1/vol_j)` computed by
//! the mesh side; large values flag directions of strong anisotropy.

use crate::config::BoundaryKind;

/// Node-adjacency view of the local partition.
pub trait MeshGraph {
    fn n_points(&self) -> usize;

    /// Nodes owned by this partition; the rest are halo.
    fn n_point_domain(&self) -> usize;

    fn neighbors(&self, i: usize) -> &[usize];

    /// Anisotropy weight of edge `(i, j)`; 0 if the nodes are not adjacent.
    fn edge_weight(&self, i: usize, j: usize) -> f64;

    /// Points on markers of the given boundary kinds, in marker order.
    /// These seed the linelets.
    fn seed_points(&self, kinds: &[BoundaryKind]) -> Vec<usize>;
}

/// Plain adjacency-list mesh view, suitable for injection from a mesh
/// adapter or for building small meshes by hand.
#[derive(Debug, Clone)]
pub struct AdjacencyMesh {
    n_point_domain: usize,
    neighbors: Vec<Vec<usize>>,
    weights: Vec<Vec<f64>>,
    markers: Vec<(BoundaryKind, Vec<usize>)>,
}

impl AdjacencyMesh {
    /// `weights[i][k]` is the edge weight towards `neighbors[i][k]`.
    pub fn new(n_point_domain: usize, neighbors: Vec<Vec<usize>>, weights: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(neighbors.len(), weights.len());
        Self { n_point_domain, neighbors, weights, markers: Vec::new() }
    }

    /// Uniform-weight variant, handy when anisotropy is not under test.
    pub fn with_uniform_weights(n_point_domain: usize, neighbors: Vec<Vec<usize>>) -> Self {
        let weights = neighbors.iter().map(|n| vec![1.0; n.len()]).collect();
        Self::new(n_point_domain, neighbors, weights)
    }

    /// Register a boundary marker and the points on it.
    pub fn add_marker(&mut self, kind: BoundaryKind, points: Vec<usize>) {
        self.markers.push((kind, points));
    }
}

impl MeshGraph for AdjacencyMesh {
    fn n_points(&self) -> usize {
        self.neighbors.len()
    }

    fn n_point_domain(&self) -> usize {
        self.n_point_domain
    }

    fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    fn edge_weight(&self, i: usize, j: usize) -> f64 {
        match self.neighbors[i].iter().position(|&n| n == j) {
            Some(k) => self.weights[i][k],
            None => 0.0,
        }
    }

    fn seed_points(&self, kinds: &[BoundaryKind]) -> Vec<usize> {
        let mut seeds = Vec::new();
        for (kind, points) in &self.markers {
            if kinds.contains(kind) {
                seeds.extend_from_slice(points);
            }
        }
        seeds
    }
}
