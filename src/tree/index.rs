//! Directory index: the sorted directory tree of one namespace.
//!
//! Every operation either fully applies or leaves the tree untouched. `mvdir`
//! is the only operation that needs active compensation: the detached subtree
//! is held as a local value and put back where it came from if the
//! destination cannot take it.

use crate::error::{ApiError, StorageError};
use crate::tree::node::DirectoryNode;
use crate::tree::path::AbsolutePath;
use crate::types::DirectoryId;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIndex {
    root: DirectoryNode,
}

impl Default for DirectoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryIndex {
    /// Index holding only an empty root
    pub fn new() -> Self {
        Self {
            root: DirectoryNode::root(),
        }
    }

    /// Wrap an existing tree, re-sorting children and rejecting duplicate segments.
    pub fn from_root(mut root: DirectoryNode) -> Result<Self, ApiError> {
        root.segment.clear();
        root.normalize()?;
        Ok(Self { root })
    }

    /// Deserialize the persisted form of a namespace.
    pub fn from_json(blob: &str) -> Result<Self, ApiError> {
        let root: DirectoryNode = serde_json::from_str(blob)
            .map_err(|e| ApiError::StorageError(StorageError::Serialization(e)))?;
        Self::from_root(root)
    }

    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string(&self.root)
            .map_err(|e| ApiError::StorageError(StorageError::Serialization(e)))
    }

    pub fn root(&self) -> &DirectoryNode {
        &self.root
    }

    pub fn into_root(self) -> DirectoryNode {
        self.root
    }

    /// Return the node at `path`, creating every missing segment on the way.
    ///
    /// Segments that already exist keep their identifiers, so calling this
    /// twice with the same path changes nothing the second time.
    pub fn mkdir(&mut self, path: &AbsolutePath) -> &DirectoryNode {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = current.child_or_insert(segment);
        }
        current
    }

    pub fn get_subtree(&self, path: &AbsolutePath) -> Result<&DirectoryNode, ApiError> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = current
                .child(segment)
                .ok_or_else(|| ApiError::PathNotFound(path.to_string()))?;
        }
        Ok(current)
    }

    fn node_mut(&mut self, path: &AbsolutePath) -> Result<&mut DirectoryNode, ApiError> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = current
                .child_mut(segment)
                .ok_or_else(|| ApiError::PathNotFound(path.to_string()))?;
        }
        Ok(current)
    }

    /// Detach the subtree at `path` and hand it back as one unit.
    pub fn rmdir(&mut self, path: &AbsolutePath) -> Result<DirectoryNode, ApiError> {
        let (parent_path, name) = split_parent(path)?;
        self.node_mut(&parent_path)?
            .remove_child(name)
            .ok_or_else(|| ApiError::PathNotFound(path.to_string()))
    }

    /// Move the subtree at `old` so that it lives at `new`.
    ///
    /// Fails with `PathNotFound` when the parent of `new` is missing and with
    /// `PathAlreadyExists` when `new` is taken. In both cases the subtree is
    /// restored at `old` under its original segment.
    pub fn mvdir(&mut self, old: &AbsolutePath, new: &AbsolutePath) -> Result<(), ApiError> {
        let (old_parent, _) = split_parent(old)?;
        let (new_parent, new_name) = split_parent(new)?;

        let mut detached = self.rmdir(old)?;
        let original_segment = std::mem::replace(&mut detached.segment, new_name.to_string());

        let outcome = match self.node_mut(&new_parent) {
            Ok(parent) => parent
                .insert_child(detached)
                .map_err(|node| (node, ApiError::PathAlreadyExists(new.to_string()))),
            Err(err) => Err((detached, err)),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err((mut node, err)) => {
                node.segment = original_segment;
                self.restore(&old_parent, node)?;
                Err(err)
            }
        }
    }

    fn restore(&mut self, parent: &AbsolutePath, node: DirectoryNode) -> Result<(), ApiError> {
        self.node_mut(parent)?.insert_child(node).map_err(|node| {
            ApiError::StorageError(StorageError::CorruptTree(format!(
                "rollback collided with existing segment '{}' under {}",
                node.segment, parent
            )))
        })
    }

    /// Pre-order traversal of every directory below the root.
    pub fn walk<F>(&self, visit: F)
    where
        F: FnMut(&DirectoryNode),
    {
        self.root.walk(visit)
    }

    /// Identifiers of every live directory, the root included.
    pub fn live_ids(&self) -> HashSet<DirectoryId> {
        self.root.subtree_ids().into_iter().collect()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Absolute path of every directory below the root, in pre-order.
    pub fn paths(&self) -> Vec<AbsolutePath> {
        let mut out = Vec::new();
        collect_paths(&self.root, &AbsolutePath::root(), &mut out);
        out
    }

    /// Absolute path of the directory with identifier `id`.
    pub fn path_of(&self, id: &DirectoryId) -> Option<AbsolutePath> {
        find_path(&self.root, id, &AbsolutePath::root())
    }
}

fn split_parent(path: &AbsolutePath) -> Result<(AbsolutePath, &str), ApiError> {
    match (path.parent(), path.name()) {
        (Some(parent), Some(name)) => Ok((parent, name)),
        _ => Err(ApiError::RootRemoval),
    }
}

fn collect_paths(node: &DirectoryNode, at: &AbsolutePath, out: &mut Vec<AbsolutePath>) {
    for child in &node.children {
        let path = at.child(&child.segment);
        out.push(path.clone());
        collect_paths(child, &path, out);
    }
}

fn find_path(node: &DirectoryNode, id: &DirectoryId, at: &AbsolutePath) -> Option<AbsolutePath> {
    if node.id == *id {
        return Some(at.clone());
    }
    node.children
        .iter()
        .find_map(|child| find_path(child, id, &at.child(&child.segment)))
}
