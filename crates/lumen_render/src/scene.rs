//! Scene graph: nodes, materials, camera.
//!
//! Each node owns its triangles through a private BVH. The scene is
//! validated once at construction; during a render pass it is read-only
//! and shared behind an `Arc`, so mutations go through copy-on-write in
//! the controller.

use lumen_math::{Aabb, Interval, Ray, Vec3, EPS};
use thiserror::Error;

use crate::{Bvh, Triangle};

/// Scene construction and mutation failures.
#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("scene contains no nodes")]
    Empty,

    #[error("node {node} references material {mat_index}, but only {count} materials exist")]
    MaterialIndex {
        node: usize,
        mat_index: usize,
        count: usize,
    },

    #[error("camera target coincides with its position")]
    CameraDegenerate,

    #[error("camera up vector is collinear with the view direction")]
    CameraUpCollinear,

    #[error("camera field of view or aspect ratio is not positive")]
    CameraBadLens,
}

/// Physically-based surface description, linear RGB.
///
/// `emission` is pre-multiplied by the light strength by whichever
/// loader produced the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub albedo: Vec3,
    pub emission: Vec3,
    pub metallic: f32,
    pub roughness: f32,
}

impl Material {
    pub fn diffuse(name: &str, albedo: Vec3) -> Self {
        Self {
            name: name.to_string(),
            albedo,
            emission: Vec3::ZERO,
            metallic: 0.0,
            roughness: 1.0,
        }
    }

    pub fn emissive(name: &str, emission: Vec3) -> Self {
        Self {
            name: name.to_string(),
            albedo: Vec3::ZERO,
            emission,
            metallic: 0.0,
            roughness: 1.0,
        }
    }
}

/// Pinhole camera. `fov` is the vertical field of view in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pos: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect_ratio: f32,
}

impl Camera {
    fn validate(&self) -> Result<(), SceneError> {
        let forward = self.target - self.pos;
        if forward.length_squared() <= EPS {
            return Err(SceneError::CameraDegenerate);
        }
        if forward.normalize().cross(self.up).length_squared() <= EPS {
            return Err(SceneError::CameraUpCollinear);
        }
        if self.fov <= 0.0 || self.aspect_ratio <= 0.0 {
            return Err(SceneError::CameraBadLens);
        }
        Ok(())
    }
}

/// A named group of triangles sharing one material assignment.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub mat_index: usize,
    bounds: Aabb,
    bvh: Bvh,
}

impl SceneNode {
    pub fn new(name: &str, mat_index: usize, triangles: Vec<Triangle>) -> Self {
        let bvh = Bvh::build(&triangles);
        Self {
            name: name.to_string(),
            mat_index,
            bounds: bvh.bounds(),
            bvh,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangles(&self) -> &[Triangle] {
        self.bvh.primitives()
    }

    /// Rebuild the BVH and bounding box from the current primitives.
    pub fn rebuild(&mut self) {
        self.bvh = Bvh::build(self.bvh.primitives());
        self.bounds = self.bvh.bounds();
    }
}

/// Result of the nearest-hit query: the triangle and the material
/// resolved through the owning node.
pub struct SceneHit<'a> {
    pub t: f32,
    pub triangle: &'a Triangle,
    pub material: &'a Material,
}

/// A validated collection of nodes, materials, and one camera.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    materials: Vec<Material>,
    camera: Camera,
}

impl Scene {
    pub fn new(
        camera: Camera,
        materials: Vec<Material>,
        nodes: Vec<SceneNode>,
    ) -> Result<Self, SceneError> {
        if nodes.is_empty() {
            return Err(SceneError::Empty);
        }
        for (i, node) in nodes.iter().enumerate() {
            if node.mat_index >= materials.len() {
                return Err(SceneError::MaterialIndex {
                    node: i,
                    mat_index: node.mat_index,
                    count: materials.len(),
                });
            }
        }
        camera.validate()?;
        Ok(Self {
            nodes,
            materials,
            camera,
        })
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Nearest hit across all nodes.
    ///
    /// Each node's bounding box is slab-tested against the best hit so
    /// far before its BVH is descended, so distant nodes are rejected
    /// with a single test. Ties go to the smaller t.
    pub fn intersect(&self, ray: &Ray, t: Interval) -> Option<SceneHit<'_>> {
        let mut closest = t.max;
        let mut hit: Option<(&Triangle, usize)> = None;

        for node in &self.nodes {
            if node.bounds.hit(ray, Interval::new(t.min, closest)).is_none() {
                continue;
            }
            if let Some((t_hit, tri)) = node.bvh.intersect(ray, Interval::new(t.min, closest)) {
                if t_hit < closest {
                    closest = t_hit;
                    hit = Some((tri, node.mat_index));
                }
            }
        }

        hit.map(|(triangle, mat_index)| SceneHit {
            t: closest,
            triangle,
            material: &self.materials[mat_index],
        })
    }

    /// Shift every primitive of a node and rebuild its BVH.
    pub fn translate_node(&mut self, node_idx: usize, delta: Vec3) {
        let node = &mut self.nodes[node_idx];
        for tri in node.bvh.primitives_mut() {
            tri.a += delta;
            tri.b += delta;
            tri.c += delta;
        }
        node.rebuild();
    }

    /// Reassign a node's material. No geometry changes, no rebuild.
    pub fn set_node_material(&mut self, node_idx: usize, mat_index: usize) -> Result<(), SceneError> {
        if mat_index >= self.materials.len() {
            return Err(SceneError::MaterialIndex {
                node: node_idx,
                mat_index,
                count: self.materials.len(),
            });
        }
        self.nodes[node_idx].mat_index = mat_index;
        Ok(())
    }

    /// Replace a material definition in place.
    pub fn set_material(&mut self, mat_index: usize, material: Material) {
        self.materials[mat_index] = material;
    }
}
