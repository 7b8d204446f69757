/// Facet records and the owned mesh buffer
use nalgebra::{Point3, Vector3};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crate::error::{LoadError, Result};

/// One triangular surface element: normal, three vertices and the attribute word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Facet {
    pub normal: Vector3<f32>,
    pub vertices: [Point3<f32>; 3],
    /// Binary "attribute byte count" field; always 0 for ASCII input.
    pub attribute: u16,
}

impl Facet {
    pub fn new(normal: Vector3<f32>, vertices: [Point3<f32>; 3], attribute: u16) -> Self {
        Self {
            normal,
            vertices,
            attribute,
        }
    }

    /// Build a facet from the twelve floats of a binary record
    pub fn from_floats(values: [f32; 12], attribute: u16) -> Self {
        Self {
            normal: Vector3::new(values[0], values[1], values[2]),
            vertices: [
                Point3::new(values[3], values[4], values[5]),
                Point3::new(values[6], values[7], values[8]),
                Point3::new(values[9], values[10], values[11]),
            ],
            attribute,
        }
    }

    /// The twelve floats in binary record order: normal, then v1, v2, v3.
    #[rustfmt::skip]
    pub fn to_floats(&self) -> [f32; 12] {
        let [a, b, c] = self.vertices;
        [
            self.normal.x, self.normal.y, self.normal.z,
            a.x, a.y, a.z,
            b.x, b.y, b.z,
            c.x, c.y, c.z,
        ]
    }

    /// Calculate the unit normal implied by the vertex winding.
    ///
    /// Returns `None` for degenerate facets.
    pub fn face_normal(&self) -> Option<Vector3<f32>> {
        let [v0, v1, v2] = self.vertices;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        edge1.cross(&edge2).try_normalize(f32::EPSILON)
    }

    pub fn area(&self) -> f32 {
        let [v0, v1, v2] = self.vertices;
        (v1 - v0).cross(&(v2 - v0)).norm() * 0.5
    }

    pub fn centroid(&self) -> Point3<f32> {
        let [v0, v1, v2] = self.vertices;
        Point3::from((v0.coords + v1.coords + v2.coords) / 3.0)
    }
}

/// The facets of one loaded file, in file order.
///
/// Storage is shared between clones and never resized after construction,
/// so a borrowed slice stays valid for as long as any clone is alive.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffer {
    facets: Arc<[Facet]>,
}

impl MeshBuffer {
    /// Wrap a facet list. A mesh must contain at least one facet.
    pub fn new(facets: Vec<Facet>) -> Result<Self> {
        if facets.is_empty() {
            return Err(LoadError::EmptyMesh);
        }
        Ok(Self {
            facets: facets.into(),
        })
    }

    pub fn as_slice(&self) -> &[Facet] {
        &self.facets
    }

    pub fn surface_area(&self) -> f32 {
        self.facets.iter().map(Facet::area).sum()
    }

    /// Axis-aligned bounding box as (min, max) corners.
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        let first = self.facets[0].vertices[0];
        self.facets
            .iter()
            .flat_map(|facet| facet.vertices.iter())
            .fold((first, first), |(min, max), v| (min.inf(v), max.sup(v)))
    }

    /// Write the mesh to `path` as binary STL.
    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::binary::save(path, &self.facets)
    }

    /// Write the mesh to `path` as ASCII STL under the given solid name.
    pub fn save_ascii<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<()> {
        crate::ascii::save(path, name, &self.facets)
    }
}

impl Deref for MeshBuffer {
    type Target = [Facet];

    fn deref(&self) -> &[Facet] {
        &self.facets
    }
}

impl AsRef<[Facet]> for MeshBuffer {
    fn as_ref(&self) -> &[Facet] {
        &self.facets
    }
}
