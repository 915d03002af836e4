//! Directory node type and sibling ordering

use crate::error::{ApiError, StorageError};
use crate::types::DirectoryId;
use serde::{Deserialize, Serialize};

/// One directory of a namespace.
///
/// `children` is kept sorted by `segment` with no duplicate segments, so
/// every child lookup is a binary search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub id: DirectoryId,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            id: DirectoryId::new(),
            segment: segment.into(),
            children: Vec::new(),
        }
    }

    /// Empty root node
    pub fn root() -> Self {
        Self::new(String::new())
    }

    pub(crate) fn search(&self, segment: &str) -> Result<usize, usize> {
        self.children
            .binary_search_by(|child| child.segment.as_str().cmp(segment))
    }

    pub fn child(&self, segment: &str) -> Option<&DirectoryNode> {
        self.search(segment).ok().map(|i| &self.children[i])
    }

    pub fn child_mut(&mut self, segment: &str) -> Option<&mut DirectoryNode> {
        match self.search(segment) {
            Ok(i) => Some(&mut self.children[i]),
            Err(_) => None,
        }
    }

    /// Return the child named `segment`, creating it at its sorted position if absent.
    pub(crate) fn child_or_insert(&mut self, segment: &str) -> &mut DirectoryNode {
        let i = match self.search(segment) {
            Ok(i) => i,
            Err(i) => {
                self.children.insert(i, DirectoryNode::new(segment));
                i
            }
        };
        &mut self.children[i]
    }

    /// Insert an existing subtree at its sorted position.
    ///
    /// On a segment collision the subtree is handed back untouched.
    pub(crate) fn insert_child(&mut self, node: DirectoryNode) -> Result<(), DirectoryNode> {
        match self.search(&node.segment) {
            Ok(_) => Err(node),
            Err(i) => {
                self.children.insert(i, node);
                Ok(())
            }
        }
    }

    pub(crate) fn remove_child(&mut self, segment: &str) -> Option<DirectoryNode> {
        self.search(segment).ok().map(|i| self.children.remove(i))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal of every descendant; the receiver itself is not visited.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&DirectoryNode),
    {
        self.walk_inner(&mut visit);
    }

    fn walk_inner<F>(&self, visit: &mut F)
    where
        F: FnMut(&DirectoryNode),
    {
        for child in &self.children {
            visit(child);
            child.walk_inner(visit);
        }
    }

    /// Identifier of this node followed by the identifiers of all descendants.
    pub fn subtree_ids(&self) -> Vec<DirectoryId> {
        let mut ids = vec![self.id];
        self.walk(|node| ids.push(node.id));
        ids
    }

    /// Number of nodes in this subtree, the receiver included.
    pub fn node_count(&self) -> usize {
        let mut count = 1;
        self.walk(|_| count += 1);
        count
    }

    /// Sort children recursively and reject duplicate sibling segments.
    pub(crate) fn normalize(&mut self) -> Result<(), ApiError> {
        self.children.sort_by(|a, b| a.segment.cmp(&b.segment));
        for pair in self.children.windows(2) {
            if pair[0].segment == pair[1].segment {
                return Err(ApiError::StorageError(StorageError::CorruptTree(format!(
                    "duplicate segment '{}' under directory {}",
                    pair[0].segment, self.id
                ))));
            }
        }
        for child in &mut self.children {
            if child.segment.is_empty() {
                return Err(ApiError::StorageError(StorageError::CorruptTree(format!(
                    "directory {} has an empty segment",
                    child.id
                ))));
            }
            child.normalize()?;
        }
        Ok(())
    }
}
