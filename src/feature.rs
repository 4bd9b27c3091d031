use std::collections::BTreeMap;

use crate::strand::Strand;

/// Free-form attributes carried by every feature node.
///
/// Keys are kept sorted so that re-emitted attribute columns are stable.
pub type Attributes = BTreeMap<String, String>;

/// Attribute names that are stored or emitted as dedicated columns and are
/// never re-emitted as free-form `key=value` pairs.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "ID", "Parent", "id", "parent", "type", "seqid", "coords", "strand", "score", "source", "phase",
];

/// Returns `true` if `key` belongs to the reserved attribute set.
#[inline]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&key)
}

/// Leaf annotation: CDS, UTR, match_part or any other terminal feature.
///
/// Coordinates are 1-based, inclusive and always stored low-to-high
/// regardless of strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseFeature {
    /// Identifier, unique within the owning store.
    pub id: String,
    /// Sequence region (scaffold, contig, chromosome) identifier.
    pub seqid: String,
    /// `(min, max)` of the record endpoints.
    pub coords: (u64, u64),
    /// Canonical feature type.
    pub feature_type: String,
    /// Strand of the feature.
    pub strand: Strand,
    /// Parent identifier, if any.
    pub parent: Option<String>,
    /// Free-form attributes from the source record.
    pub attributes: Attributes,
}

impl BaseFeature {
    /// Creates a leaf feature, normalizing the coordinate pair.
    ///
    /// # Example
    ///
    /// ```
    /// use annoset::feature::BaseFeature;
    ///
    /// let cds = BaseFeature::new("cds1", "chr1", 200, 100, "CDS");
    /// assert_eq!(cds.coords, (100, 200));
    /// ```
    pub fn new(
        id: impl Into<String>,
        seqid: impl Into<String>,
        start: u64,
        end: u64,
        feature_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            seqid: seqid.into(),
            coords: (start.min(end), start.max(end)),
            feature_type: feature_type.into(),
            strand: Strand::Unknown,
            parent: None,
            attributes: Attributes::new(),
        }
    }

    /// Sets the strand.
    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = strand;
        self
    }

    /// Sets the parent identifier.
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    /// Replaces the attribute map.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns the feature length in bases.
    #[inline]
    pub fn len(&self) -> u64 {
        self.coords.1 - self.coords.0 + 1
    }

    /// Always `false`; a leaf spans at least one base.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Internal annotation node: gene, transcript, match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentFeature {
    /// Identifier, unique within the owning store.
    pub id: String,
    /// Sequence region identifier.
    pub seqid: String,
    /// Canonical feature type.
    pub feature_type: String,
    /// Strand of the feature.
    pub strand: Strand,
    /// Ordered child identifiers.
    pub child_list: Vec<String>,
    /// Parent identifier, if any.
    pub parent: Option<String>,
    /// Free-form attributes from the source record.
    pub attributes: Attributes,
}

impl ParentFeature {
    /// Creates an internal node without children.
    pub fn new(
        id: impl Into<String>,
        seqid: impl Into<String>,
        feature_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            seqid: seqid.into(),
            feature_type: feature_type.into(),
            strand: Strand::Unknown,
            child_list: Vec::new(),
            parent: None,
            attributes: Attributes::new(),
        }
    }

    /// Sets the strand.
    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = strand;
        self
    }

    /// Sets the parent identifier.
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    /// Sets the initial children.
    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.child_list = children;
        self
    }

    /// Replaces the attribute map.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Appends a child identifier unless it is already linked.
    pub fn push_child(&mut self, child: &str) {
        if !self.child_list.iter().any(|c| c == child) {
            self.child_list.push(child.to_string());
        }
    }
}

/// A node of the annotation hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureNode {
    /// A leaf feature.
    Base(BaseFeature),
    /// An internal feature.
    Parent(ParentFeature),
}

impl FeatureNode {
    /// Returns the identifier.
    pub fn id(&self) -> &str {
        match self {
            FeatureNode::Base(f) => &f.id,
            FeatureNode::Parent(f) => &f.id,
        }
    }

    /// Returns the sequence region identifier.
    pub fn seqid(&self) -> &str {
        match self {
            FeatureNode::Base(f) => &f.seqid,
            FeatureNode::Parent(f) => &f.seqid,
        }
    }

    /// Returns the feature type tag.
    pub fn feature_type(&self) -> &str {
        match self {
            FeatureNode::Base(f) => &f.feature_type,
            FeatureNode::Parent(f) => &f.feature_type,
        }
    }

    /// Returns the strand.
    pub fn strand(&self) -> Strand {
        match self {
            FeatureNode::Base(f) => f.strand,
            FeatureNode::Parent(f) => f.strand,
        }
    }

    /// Returns the parent identifier, if set.
    pub fn parent(&self) -> Option<&str> {
        match self {
            FeatureNode::Base(f) => f.parent.as_deref(),
            FeatureNode::Parent(f) => f.parent.as_deref(),
        }
    }

    /// Sets the parent identifier.
    pub fn set_parent(&mut self, parent: Option<String>) {
        match self {
            FeatureNode::Base(f) => f.parent = parent,
            FeatureNode::Parent(f) => f.parent = parent,
        }
    }

    /// Returns the attribute map.
    pub fn attributes(&self) -> &Attributes {
        match self {
            FeatureNode::Base(f) => &f.attributes,
            FeatureNode::Parent(f) => &f.attributes,
        }
    }

    /// Returns the attribute map mutably.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            FeatureNode::Base(f) => &mut f.attributes,
            FeatureNode::Parent(f) => &mut f.attributes,
        }
    }

    /// Returns a single attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes().get(key).map(String::as_str)
    }

    /// Iterates over the attributes that are not reserved column names.
    pub fn free_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes()
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the children of a parent node, or an empty slice for leaves.
    pub fn children(&self) -> &[String] {
        match self {
            FeatureNode::Base(_) => &[],
            FeatureNode::Parent(f) => &f.child_list,
        }
    }

    /// Returns the stored coordinates of a leaf.
    ///
    /// Parent coordinates are derived from descendants, see
    /// [`AnnotationSet::coords`](crate::store::AnnotationSet::coords).
    pub fn base_coords(&self) -> Option<(u64, u64)> {
        match self {
            FeatureNode::Base(f) => Some(f.coords),
            FeatureNode::Parent(_) => None,
        }
    }

    /// Returns `true` for leaf nodes.
    pub fn is_base(&self) -> bool {
        matches!(self, FeatureNode::Base(_))
    }

    /// Returns the leaf variant.
    pub fn as_base(&self) -> Option<&BaseFeature> {
        match self {
            FeatureNode::Base(f) => Some(f),
            FeatureNode::Parent(_) => None,
        }
    }

    /// Returns the internal variant.
    pub fn as_parent(&self) -> Option<&ParentFeature> {
        match self {
            FeatureNode::Parent(f) => Some(f),
            FeatureNode::Base(_) => None,
        }
    }

    /// Returns the internal variant mutably.
    pub fn as_parent_mut(&mut self) -> Option<&mut ParentFeature> {
        match self {
            FeatureNode::Parent(f) => Some(f),
            FeatureNode::Base(_) => None,
        }
    }
}

impl From<BaseFeature> for FeatureNode {
    fn from(feature: BaseFeature) -> Self {
        FeatureNode::Base(feature)
    }
}

impl From<ParentFeature> for FeatureNode {
    fn from(feature: ParentFeature) -> Self {
        FeatureNode::Parent(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_attributes_skip_reserved_names() {
        let mut attributes = Attributes::new();
        attributes.insert("score".into(), "12".into());
        attributes.insert("source".into(), "maker".into());
        attributes.insert("Name".into(), "abc".into());
        let node: FeatureNode = BaseFeature::new("a", "chr1", 5, 1, "CDS")
            .with_attributes(attributes)
            .into();

        let free: Vec<_> = node.free_attributes().collect();
        assert_eq!(free, vec![("Name", "abc")]);
        assert_eq!(node.base_coords(), Some((1, 5)));
    }

    #[test]
    fn push_child_does_not_duplicate() {
        let mut gene = ParentFeature::new("g", "chr1", "gene");
        gene.push_child("t1");
        gene.push_child("t1");
        gene.push_child("t2");
        assert_eq!(gene.child_list, vec!["t1", "t2"]);
    }
}
