//! The scene the rendering host owns.
//!
//! Owners never reach for a global scene: every mutation goes through a
//! [`Scene`] they were handed explicitly. [`SceneGraph`] is a flat in-memory
//! implementation that hosts can render from directly.

use std::collections::BTreeMap;

use crate::{data_structures::instance::Instance, resources::Handle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// A drawable mesh: one geometry, one material per geometry group.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshNode {
    pub label: String,
    pub geometry: Handle,
    pub materials: Vec<Handle>,
    pub transform: Instance,
}

pub trait Scene {
    fn add_mesh(&mut self, node: MeshNode) -> NodeId;

    /// Remove a mesh. Returns `None` if it was not part of the scene.
    fn remove_mesh(&mut self, id: NodeId) -> Option<MeshNode>;

    fn mesh(&self, id: NodeId) -> Option<&MeshNode>;

    /// Returns `false` if the mesh is not part of the scene.
    fn set_transform(&mut self, id: NodeId, transform: Instance) -> bool;

    /// Returns `false` if the mesh is not part of the scene.
    fn set_materials(&mut self, id: NodeId, materials: Vec<Handle>) -> bool;
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, MeshNode>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Meshes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &MeshNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }
}

impl Scene for SceneGraph {
    fn add_mesh(&mut self, node: MeshNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn remove_mesh(&mut self, id: NodeId) -> Option<MeshNode> {
        self.nodes.remove(&id)
    }

    fn mesh(&self, id: NodeId) -> Option<&MeshNode> {
        self.nodes.get(&id)
    }

    fn set_transform(&mut self, id: NodeId, transform: Instance) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    fn set_materials(&mut self, id: NodeId, materials: Vec<Handle>) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.materials = materials;
                true
            }
            None => false,
        }
    }
}
