use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::feature::{Attributes, FeatureNode};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Invariant violations raised by [`AnnotationSet`].
///
/// These indicate programmer errors: ingesters are expected to disambiguate
/// identifiers before inserting nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An identifier is already registered in some collection.
    DuplicateIdentifier(String),
    /// No node carries the requested identifier.
    NotFound(String),
    /// The node exists but is a leaf and cannot own children.
    NotAParent(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateIdentifier(id) => write!(f, "duplicate identifier '{id}'"),
            StoreError::NotFound(id) => write!(f, "no feature with identifier '{id}'"),
            StoreError::NotAParent(id) => write!(f, "feature '{id}' cannot own children"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Collections registered on every new store.
const DEFAULT_COLLECTIONS: [&str; 4] = ["gene", "transcript", "CDS", "UTR"];

/// A registry of feature collections keyed by feature type.
///
/// Every node is reachable both through its type collection and through a
/// flat identifier index, so lookups never scan the collections. Collections
/// keep insertion order.
///
/// The store is a plain, unsynchronized value; callers sharing one across
/// threads must serialize access themselves.
///
/// # Example
///
/// ```
/// use annoset::feature::{BaseFeature, ParentFeature};
/// use annoset::store::AnnotationSet;
///
/// let mut set = AnnotationSet::new();
/// set.add_node(ParentFeature::new("t1", "chr1", "transcript")).unwrap();
/// set.add_node(BaseFeature::new("c1", "chr1", 10, 90, "CDS")).unwrap();
/// set.add_child("t1", "c1").unwrap();
///
/// assert_eq!(set.coords("t1"), Some((10, 90)));
/// assert!(set.lookup("c1").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct AnnotationSet {
    nodes: Vec<FeatureNode>,
    index: HashMap<String, usize>,
    collections: BTreeMap<String, Vec<usize>>,
}

impl Default for AnnotationSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationSet {
    /// Creates a store with empty gene, transcript, CDS and UTR collections.
    pub fn new() -> Self {
        let mut set = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            collections: BTreeMap::new(),
        };
        for feature_type in DEFAULT_COLLECTIONS {
            set.ensure_collection(feature_type);
        }
        set
    }

    /// Registers an empty collection for `feature_type` if none exists.
    pub fn ensure_collection(&mut self, feature_type: &str) {
        if !self.collections.contains_key(feature_type) {
            self.collections.insert(feature_type.to_string(), Vec::new());
        }
    }

    /// Registers a node under its feature-type collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateIdentifier`] if the identifier is
    /// already used anywhere in the store.
    pub fn add_node<N: Into<FeatureNode>>(&mut self, node: N) -> StoreResult<()> {
        let node = node.into();
        if self.index.contains_key(node.id()) {
            return Err(StoreError::DuplicateIdentifier(node.id().to_string()));
        }

        let slot = self.nodes.len();
        self.index.insert(node.id().to_string(), slot);
        self.collections
            .entry(node.feature_type().to_string())
            .or_default()
            .push(slot);
        self.nodes.push(node);
        Ok(())
    }

    /// Returns `true` if any collection holds `id`.
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns `true` if `id` is registered in the `feature_type` collection.
    pub fn contains_in(&self, feature_type: &str, id: &str) -> bool {
        self.get(id)
            .is_some_and(|node| node.feature_type() == feature_type)
    }

    /// Returns the node registered under `id`.
    #[inline]
    pub fn get(&self, id: &str) -> Option<&FeatureNode> {
        self.index.get(id).map(|&slot| &self.nodes[slot])
    }

    /// Returns the node registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no collection holds `id`.
    pub fn lookup(&self, id: &str) -> StoreResult<&FeatureNode> {
        self.get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Mutable access for crate internals; identifiers and types must not change.
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut FeatureNode> {
        match self.index.get(id) {
            Some(&slot) => Some(&mut self.nodes[slot]),
            None => None,
        }
    }

    /// Returns the attribute map of a node for editing.
    pub fn attributes_mut(&mut self, id: &str) -> StoreResult<&mut Attributes> {
        self.get_mut(id)
            .map(FeatureNode::attributes_mut)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Appends `child` to the child list of `parent`.
    ///
    /// # Errors
    ///
    /// Fails if either identifier is unknown or `parent` is a leaf.
    pub fn add_child(&mut self, parent: &str, child: &str) -> StoreResult<()> {
        if !self.contains(child) {
            return Err(StoreError::NotFound(child.to_string()));
        }
        let node = self
            .get_mut(parent)
            .ok_or_else(|| StoreError::NotFound(parent.to_string()))?;
        node.as_parent_mut()
            .ok_or_else(|| StoreError::NotAParent(parent.to_string()))?
            .push_child(child);
        Ok(())
    }

    /// Sets the parent field of a node.
    pub fn set_parent(&mut self, id: &str, parent: Option<String>) -> StoreResult<()> {
        self.get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .set_parent(parent);
        Ok(())
    }

    /// Iterates over the nodes of one collection, in insertion order.
    pub fn collection<'a>(&'a self, feature_type: &str) -> impl Iterator<Item = &'a FeatureNode> {
        self.collections
            .get(feature_type)
            .into_iter()
            .flatten()
            .map(move |&slot| &self.nodes[slot])
    }

    /// Returns `true` if a collection (possibly empty) exists for `feature_type`.
    pub fn has_collection(&self, feature_type: &str) -> bool {
        self.collections.contains_key(feature_type)
    }

    /// Iterates over the registered feature types.
    pub fn feature_types(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Returns the per-type collections as identifier lists.
    pub fn collections_by_type(&self) -> BTreeMap<&str, Vec<&str>> {
        self.collections
            .iter()
            .map(|(feature_type, slots)| {
                let ids = slots.iter().map(|&slot| self.nodes[slot].id()).collect();
                (feature_type.as_str(), ids)
            })
            .collect()
    }

    /// Iterates over every node, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureNode> {
        self.nodes.iter()
    }

    /// Returns the number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the store holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the span of a feature.
    ///
    /// Leaves report their own coordinates; parents report the min/max over
    /// all leaf descendants. Returns `None` for unknown identifiers and for
    /// parents without any leaf below them.
    pub fn coords(&self, id: &str) -> Option<(u64, u64)> {
        let mut span: Option<(u64, u64)> = None;
        let mut seen = HashSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            match self.get(current) {
                Some(FeatureNode::Base(leaf)) => {
                    let (start, end) = leaf.coords;
                    span = Some(match span {
                        Some((lo, hi)) => (lo.min(start), hi.max(end)),
                        None => (start, end),
                    });
                }
                Some(FeatureNode::Parent(parent)) => {
                    stack.extend(parent.child_list.iter().map(String::as_str));
                }
                None => {}
            }
        }

        span
    }

    /// Returns the distinct sequence region identifiers, sorted.
    pub fn all_sequence_region_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|node| node.seqid())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns a new store holding copies of the nodes on `seqid`.
    ///
    /// Every collection of the source store is present in the subset, even
    /// when empty.
    pub fn subset_by_sequence_region(&self, seqid: &str) -> AnnotationSet {
        let mut subset = AnnotationSet {
            nodes: Vec::new(),
            index: HashMap::new(),
            collections: self
                .collections
                .keys()
                .map(|feature_type| (feature_type.clone(), Vec::new()))
                .collect(),
        };

        for node in self.nodes.iter().filter(|node| node.seqid() == seqid) {
            // ids are already unique
            let slot = subset.nodes.len();
            subset.index.insert(node.id().to_string(), slot);
            subset
                .collections
                .entry(node.feature_type().to_string())
                .or_default()
                .push(slot);
            subset.nodes.push(node.clone());
        }

        subset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{BaseFeature, ParentFeature};

    #[test]
    fn new_store_registers_default_collections() {
        let set = AnnotationSet::new();
        let types: Vec<_> = set.feature_types().collect();
        assert_eq!(types, vec!["CDS", "UTR", "gene", "transcript"]);
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_identifier_across_collections_is_rejected() {
        let mut set = AnnotationSet::new();
        set.add_node(ParentFeature::new("x", "chr1", "gene")).unwrap();
        let err = set
            .add_node(BaseFeature::new("x", "chr1", 1, 2, "CDS"))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateIdentifier("x".into()));
    }

    #[test]
    fn leaf_cannot_adopt_children() {
        let mut set = AnnotationSet::new();
        set.add_node(BaseFeature::new("a", "chr1", 1, 2, "CDS")).unwrap();
        set.add_node(BaseFeature::new("b", "chr1", 3, 4, "CDS")).unwrap();
        assert_eq!(
            set.add_child("a", "b").unwrap_err(),
            StoreError::NotAParent("a".into())
        );
    }

    #[test]
    fn coords_survive_cycles() {
        let mut set = AnnotationSet::new();
        set.add_node(ParentFeature::new("p", "chr1", "gene").with_children(vec!["q".into()]))
            .unwrap();
        set.add_node(
            ParentFeature::new("q", "chr1", "transcript")
                .with_children(vec!["p".into(), "c".into()]),
        )
        .unwrap();
        set.add_node(BaseFeature::new("c", "chr1", 7, 3, "CDS")).unwrap();
        assert_eq!(set.coords("p"), Some((3, 7)));
    }
}
