//! Raw sphere tessellation.
//!
//! The world builder only consumes [`RawMesh`]: tile centres plus adjacency by
//! array position. [`GeodesicMesh`] produces one by subdividing an icosahedron;
//! each vertex of the subdivided solid is a tile (hexagons, plus the twelve
//! icosahedron corners as pentagons).

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshConfig {
    pub radius: f64,
    pub divisions: u32,
    /// Shrink factor in (0, 1] applied to tile polygons when they are drawn.
    /// Centres and adjacency do not depend on it, so [`RawMesh`] ignores it.
    pub tile_size: f64,
}

impl MeshConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(Error::Mesh(format!("radius must be positive, got {}", self.radius)));
        }
        if self.divisions == 0 {
            return Err(Error::Mesh("divisions must be at least 1".into()));
        }
        if !(self.tile_size > 0.0 && self.tile_size <= 1.0) {
            return Err(Error::Mesh(format!(
                "tile_size must be in (0, 1], got {}",
                self.tile_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTile {
    /// Centre point on the sphere of the configured radius.
    pub center: [f64; 3],
    /// Indices into [`RawMesh::tiles`].
    pub neighbors: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub tiles: Vec<RawTile>,
}

pub trait MeshSource: Send + Sync {
    fn generate(&self, config: &MeshConfig) -> Result<RawMesh>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeodesicMesh;

/// Identity of a subdivision vertex that is shared between faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VertexKey {
    Corner(usize),
    Edge { low: usize, high: usize, step: u32 },
    Face { face: usize, i: u32, j: u32 },
}

const FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn icosahedron() -> [[f64; 3]; 12] {
    let t = (1.0 + 5f64.sqrt()) / 2.0;
    [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
}

struct Builder {
    radius: f64,
    index: HashMap<VertexKey, usize>,
    centers: Vec<[f64; 3]>,
    edges: Vec<BTreeSet<usize>>,
}

impl Builder {
    fn vertex(&mut self, key: VertexKey, point: [f64; 3]) -> usize {
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }
        let [x, y, z] = point;
        let scale = self.radius / (x * x + y * y + z * z).sqrt();
        let id = self.centers.len();
        self.centers.push([x * scale, y * scale, z * scale]);
        self.edges.push(BTreeSet::new());
        self.index.insert(key, id);
        id
    }

    fn link(&mut self, a: usize, b: usize) {
        if a != b {
            self.edges[a].insert(b);
            self.edges[b].insert(a);
        }
    }
}

fn key_for(face: usize, corners: [usize; 3], n: u32, i: u32, j: u32) -> VertexKey {
    let weights = [(corners[0], n - i - j), (corners[1], i), (corners[2], j)];
    let present: Vec<(usize, u32)> = weights.into_iter().filter(|(_, w)| *w > 0).collect();
    match present.as_slice() {
        [(corner, _)] => VertexKey::Corner(*corner),
        [(a, wa), (b, wb)] => {
            let (low, high, step) = if a < b { (*a, *b, *wa) } else { (*b, *a, *wb) };
            VertexKey::Edge { low, high, step }
        }
        _ => VertexKey::Face { face, i, j },
    }
}

impl MeshSource for GeodesicMesh {
    fn generate(&self, config: &MeshConfig) -> Result<RawMesh> {
        config.validate()?;
        let n = config.divisions;
        let corners = icosahedron();
        let expected = 10 * (n as usize) * (n as usize) + 2;
        let mut builder = Builder {
            radius: config.radius,
            index: HashMap::with_capacity(expected),
            centers: Vec::with_capacity(expected),
            edges: Vec::with_capacity(expected),
        };

        for (face, tri) in FACES.iter().enumerate() {
            let [a, b, c] = [corners[tri[0]], corners[tri[1]], corners[tri[2]]];
            let mut grid: HashMap<(u32, u32), usize> = HashMap::new();
            for i in 0..=n {
                for j in 0..=(n - i) {
                    let wa = (n - i - j) as f64 / n as f64;
                    let wb = i as f64 / n as f64;
                    let wc = j as f64 / n as f64;
                    let point = [
                        a[0] * wa + b[0] * wb + c[0] * wc,
                        a[1] * wa + b[1] * wb + c[1] * wc,
                        a[2] * wa + b[2] * wb + c[2] * wc,
                    ];
                    let id = builder.vertex(key_for(face, *tri, n, i, j), point);
                    grid.insert((i, j), id);
                }
            }
            for i in 0..n {
                for j in 0..(n - i) {
                    let p = grid[&(i, j)];
                    let q = grid[&(i + 1, j)];
                    let r = grid[&(i, j + 1)];
                    builder.link(p, q);
                    builder.link(q, r);
                    builder.link(r, p);
                }
            }
        }

        if builder.centers.len() != expected {
            return Err(Error::Mesh(format!(
                "expected {expected} tiles, built {}",
                builder.centers.len()
            )));
        }

        let tiles = builder
            .centers
            .into_iter()
            .zip(builder.edges)
            .map(|(center, edges)| RawTile {
                center,
                neighbors: edges.into_iter().collect(),
            })
            .collect();
        Ok(RawMesh { tiles })
    }
}
