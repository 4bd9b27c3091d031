//! Feature hierarchies and the ingestion engine shared by every format reader.
//!
//! A [`Hierarchy`] is a leaf-to-root chain of feature types, e.g.
//! `[CDS, UTR] -> transcript -> gene` or `match_part -> match`, plus rename
//! rules mapping raw record types onto the canonical level names. Format
//! readers turn lines into [`FeatureRecord`]s and push them through an
//! [`Ingestion`], which:
//!
//! 1. derives an identifier from the parent when a record has none
//!    (`parent-type0`, `parent-type1`, ... per `(parent, type)` pair),
//! 2. renames colliding identifiers to `id_1`, `id_2`, ...,
//! 3. creates a leaf or parent node depending on the record's level,
//! 4. links children to parents, deferring links whose parent has not been
//!    seen yet, and
//! 5. on [`Ingestion::finish`], resolves deferred links and synthesizes the
//!    missing ancestors of orphaned leaves (`parent-transcript`, `parent`).
//!
//! References that still cannot be resolved are reported as
//! [`UnresolvedReference`] warnings.

use std::collections::HashMap;
use std::fmt;

use crate::feature::{Attributes, BaseFeature, FeatureNode, ParentFeature};
use crate::reader::{ReaderError, ReaderResult};
use crate::store::AnnotationSet;
use crate::strand::Strand;

/// An ordered leaf-to-root chain of feature types.
///
/// # Example
///
/// ```
/// use annoset::hierarchy::Hierarchy;
///
/// let genes = Hierarchy::new(["CDS", "UTR"])
///     .parent("transcript")
///     .parent("gene")
///     .rename("mRNA", "transcript")
///     .rename("five_prime_UTR", "UTR");
///
/// assert_eq!(genes.canonical("mRNA"), "transcript");
/// assert_eq!(genes.top(), Some("gene"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    leaves: Vec<String>,
    parents: Vec<String>,
    renames: HashMap<String, String>,
}

impl Hierarchy {
    /// Creates a hierarchy whose leaf level holds `leaves`.
    pub fn new<I, S>(leaves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            leaves: leaves.into_iter().map(Into::into).collect(),
            parents: Vec::new(),
            renames: HashMap::new(),
        }
    }

    /// Appends the next level above the current top.
    pub fn parent(mut self, feature_type: impl Into<String>) -> Self {
        self.parents.push(feature_type.into());
        self
    }

    /// Maps a raw record type onto a canonical level name.
    pub fn rename(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.renames.insert(raw.into(), canonical.into());
        self
    }

    /// `[CDS, UTR] -> transcript -> gene`, accepting `mRNA` and the
    /// `five_prime_UTR`/`three_prime_UTR` types.
    pub fn gene() -> Self {
        Self::new(["CDS", "UTR"])
            .parent("transcript")
            .parent("gene")
            .rename("mRNA", "transcript")
            .rename("five_prime_UTR", "UTR")
            .rename("three_prime_UTR", "UTR")
    }

    /// `match_part -> match`.
    pub fn matches() -> Self {
        Self::new(["match_part"]).parent("match")
    }

    /// Returns the leaf-level types.
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    /// Returns the ancestor levels, nearest first.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Returns the root level, if the hierarchy has one.
    pub fn top(&self) -> Option<&str> {
        self.parents.last().map(String::as_str)
    }

    /// Returns the canonical name of a raw type.
    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.renames.get(raw).map(String::as_str).unwrap_or(raw)
    }

    fn is_leaf(&self, feature_type: &str) -> bool {
        self.leaves.iter().any(|leaf| leaf == feature_type)
    }

    fn is_parent(&self, feature_type: &str) -> bool {
        self.parents.iter().any(|level| level == feature_type)
    }
}

/// How a record is placed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Level<'a> {
    /// Leaf of a hierarchy, with the ancestor chain above it.
    Leaf {
        feature_type: String,
        chain: &'a [String],
    },
    /// Internal level of a hierarchy.
    Parent { feature_type: String },
    /// Outside every hierarchy: stored as a leaf without ancestor synthesis.
    Free { feature_type: String },
    /// Dropped.
    Ignored,
}

/// Hierarchies, ignored types and type replacements used by an ingestion.
///
/// The default is the GFF3 configuration: the gene hierarchy
/// `[CDS, UTR] -> transcript -> gene`, the alignment hierarchy
/// `match_part -> match`, `exon` records ignored and `protein_match` /
/// `expressed_sequence_match` read as `match`.
///
/// # Example
///
/// ```
/// use annoset::hierarchy::{Hierarchy, IngestOptions};
///
/// let options = IngestOptions::empty()
///     .hierarchy(Hierarchy::new(["CDS"]).parent("transcript").parent("gene"))
///     .ignore("exon");
/// ```
#[derive(Debug, Clone)]
pub struct IngestOptions {
    hierarchies: Vec<Hierarchy>,
    ignore: Vec<String>,
    replacements: Vec<(String, String)>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::gff3()
    }
}

impl IngestOptions {
    /// Creates the GFF3 configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// No hierarchies, nothing ignored: every record becomes a free leaf.
    pub fn empty() -> Self {
        Self {
            hierarchies: Vec::new(),
            ignore: Vec::new(),
            replacements: Vec::new(),
        }
    }

    /// The GFF3 configuration.
    pub fn gff3() -> Self {
        Self::empty()
            .hierarchy(Hierarchy::gene())
            .hierarchy(Hierarchy::matches())
            .ignore("exon")
            .replace("protein_match", "match")
            .replace("expressed_sequence_match", "match")
    }

    /// The GTF configuration: the gene hierarchy with the GTF spellings of
    /// UTRs, and `exon`, `start_codon`, `stop_codon` records ignored.
    pub fn gtf() -> Self {
        Self::empty()
            .hierarchy(
                Hierarchy::gene()
                    .rename("5UTR", "UTR")
                    .rename("3UTR", "UTR")
                    .rename("five_prime_utr", "UTR")
                    .rename("three_prime_utr", "UTR"),
            )
            .ignore("exon")
            .ignore("start_codon")
            .ignore("stop_codon")
    }

    /// Adds a hierarchy. Earlier hierarchies win when types overlap.
    pub fn hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchies.push(hierarchy);
        self
    }

    /// Removes all hierarchies.
    pub fn clear_hierarchies(mut self) -> Self {
        self.hierarchies.clear();
        self
    }

    /// Drops records of this type.
    pub fn ignore(mut self, feature_type: impl Into<String>) -> Self {
        self.ignore.push(feature_type.into());
        self
    }

    /// Stops dropping any record type.
    pub fn clear_ignore(mut self) -> Self {
        self.ignore.clear();
        self
    }

    /// Rewrites a raw record type before classification.
    pub fn replace(mut self, raw: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.replacements.push((raw.into(), replacement.into()));
        self
    }

    /// Returns the configured hierarchies.
    pub fn hierarchies(&self) -> &[Hierarchy] {
        &self.hierarchies
    }

    /// Applies the type replacements.
    pub(crate) fn replaced<'a>(&'a self, raw: &'a str) -> &'a str {
        self.replacements
            .iter()
            .find(|(from, _)| from == raw)
            .map(|(_, to)| to.as_str())
            .unwrap_or(raw)
    }

    /// Returns how far above the leaves a parent-level type sits (0 for the
    /// nearest ancestor level).
    pub(crate) fn parent_depth(&self, feature_type: &str) -> Option<usize> {
        self.hierarchies.iter().find_map(|hierarchy| {
            let canonical = hierarchy.canonical(feature_type);
            hierarchy.parents().iter().position(|level| level == canonical)
        })
    }

    /// Places a (replaced) record type in the configured hierarchies.
    pub(crate) fn classify(&self, feature_type: &str) -> Level<'_> {
        for hierarchy in &self.hierarchies {
            let canonical = hierarchy.canonical(feature_type);
            if hierarchy.is_leaf(canonical) {
                return Level::Leaf {
                    feature_type: canonical.to_string(),
                    chain: hierarchy.parents(),
                };
            }
            if hierarchy.is_parent(canonical) {
                return Level::Parent {
                    feature_type: canonical.to_string(),
                };
            }
        }

        if self.ignore.iter().any(|ignored| ignored == feature_type) {
            return Level::Ignored;
        }

        Level::Free {
            feature_type: feature_type.to_string(),
        }
    }
}

/// One parsed input record, before it is placed in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    /// 1-based line number in the source, for diagnostics.
    pub line: usize,
    /// Sequence region identifier.
    pub seqid: String,
    /// Raw record type.
    pub feature_type: String,
    /// First coordinate as written in the record.
    pub start: u64,
    /// Second coordinate as written in the record.
    pub end: u64,
    /// Strand column.
    pub strand: Strand,
    /// Declared identifier.
    pub id: Option<String>,
    /// Declared parent identifier.
    pub parent: Option<String>,
    /// Explicit identifiers for the ancestor levels, nearest first, used
    /// instead of the `parent-level` naming rule when ancestors have to be
    /// synthesized.
    pub ancestors: Option<Vec<String>>,
    /// Free-form attributes, including `source`, `score` and `phase`.
    pub attributes: Attributes,
}

impl FeatureRecord {
    /// Creates a record with no identifiers and no attributes.
    pub fn new(
        line: usize,
        seqid: impl Into<String>,
        feature_type: impl Into<String>,
        start: u64,
        end: u64,
    ) -> Self {
        Self {
            line,
            seqid: seqid.into(),
            feature_type: feature_type.into(),
            start,
            end,
            strand: Strand::Unknown,
            id: None,
            parent: None,
            ancestors: None,
            attributes: Attributes::new(),
        }
    }
}

/// Why a reference could not be linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// No node carries the parent identifier.
    Missing,
    /// The parent identifier names a leaf.
    NotAParent,
    /// A synthesized ancestor name is taken by a node of another type.
    TypeConflict {
        /// The expected hierarchy level.
        expected: String,
        /// The type of the existing node.
        found: String,
    },
}

/// A parent reference that was still dangling when ingestion finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// The node declaring the reference.
    pub child: String,
    /// The identifier it refers to.
    pub parent: String,
    /// Why the link was not made.
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            UnresolvedReason::Missing => {
                write!(f, "'{}' refers to missing parent '{}'", self.child, self.parent)
            }
            UnresolvedReason::NotAParent => write!(
                f,
                "'{}' refers to '{}', which is a leaf feature",
                self.child, self.parent
            ),
            UnresolvedReason::TypeConflict { expected, found } => write!(
                f,
                "'{}' needs a {expected} named '{}', but that identifier is a {found}",
                self.child, self.parent
            ),
        }
    }
}

/// Summary of one ingestion call.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Records stored as nodes.
    pub records: usize,
    /// Records dropped because their type is ignored.
    pub ignored: usize,
    /// Ancestor nodes created for orphaned leaves.
    pub synthesized: usize,
    /// `(declared, stored)` identifier pairs for renamed collisions.
    pub renamed: Vec<(String, String)>,
    /// Malformed records that were skipped.
    pub skipped: Vec<ReaderError>,
    /// References that could not be linked.
    pub unresolved: Vec<UnresolvedReference>,
}

impl IngestReport {
    /// Returns `true` when nothing was skipped or left unresolved.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.unresolved.is_empty()
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: IngestReport) {
        self.records += other.records;
        self.ignored += other.ignored;
        self.synthesized += other.synthesized;
        self.renamed.extend(other.renamed);
        self.skipped.extend(other.skipped);
        self.unresolved.extend(other.unresolved);
    }
}

#[derive(Debug)]
struct PendingLink {
    child: String,
    parent: String,
}

#[derive(Debug)]
struct PendingLeaf {
    id: String,
    parent: String,
    chain: Vec<String>,
    ancestors: Option<Vec<String>>,
}

/// Transient state of one ingestion call into an [`AnnotationSet`].
///
/// Identifier counters live here rather than in the store, so numbering
/// restarts with every call; collisions with earlier calls are still caught
/// by the store lookup.
///
/// # Example
///
/// ```
/// use annoset::hierarchy::{FeatureRecord, IngestOptions, Ingestion};
/// use annoset::store::AnnotationSet;
///
/// let mut set = AnnotationSet::new();
/// let options = IngestOptions::gff3();
/// let mut ingestion = Ingestion::new(&mut set, &options);
///
/// let mut cds = FeatureRecord::new(1, "chr1", "CDS", 100, 200);
/// cds.parent = Some("geneA".to_string());
/// ingestion.push(cds).unwrap();
/// let report = ingestion.finish().unwrap();
///
/// assert_eq!(report.synthesized, 2);
/// assert!(set.contains_in("transcript", "geneA-transcript"));
/// assert!(set.contains_in("gene", "geneA"));
/// ```
pub struct Ingestion<'a> {
    set: &'a mut AnnotationSet,
    options: &'a IngestOptions,
    generated: HashMap<String, usize>,
    collisions: HashMap<String, usize>,
    pending_links: Vec<PendingLink>,
    pending_leaves: Vec<PendingLeaf>,
    report: IngestReport,
}

impl<'a> Ingestion<'a> {
    /// Starts an ingestion into `set`.
    pub fn new(set: &'a mut AnnotationSet, options: &'a IngestOptions) -> Self {
        Self {
            set,
            options,
            generated: HashMap::new(),
            collisions: HashMap::new(),
            pending_links: Vec::new(),
            pending_leaves: Vec::new(),
            report: IngestReport::default(),
        }
    }

    /// Returns the store being filled.
    pub fn set(&self) -> &AnnotationSet {
        &*self.set
    }

    /// Records a malformed line.
    ///
    /// Fatal errors are returned instead of being recorded.
    pub fn skip(&mut self, err: ReaderError) -> ReaderResult<()> {
        if !err.is_recoverable() {
            return Err(err);
        }
        log::warn!("skipping record: {err}");
        self.report.skipped.push(err);
        Ok(())
    }

    /// Places one record in the store.
    ///
    /// # Errors
    ///
    /// Only store invariant violations are returned; a record without any
    /// identifier is recorded as skipped.
    pub fn push(&mut self, record: FeatureRecord) -> ReaderResult<()> {
        let options = self.options;
        let raw_type = options.replaced(&record.feature_type).to_string();
        let level = options.classify(&raw_type);
        if level == Level::Ignored {
            self.report.ignored += 1;
            return Ok(());
        }

        let id = match (record.id, record.parent.as_deref()) {
            (Some(id), _) => id,
            (None, Some(parent)) => self.generate_id(parent, &raw_type),
            (None, None) => return self.skip(ReaderError::MissingIdentifier { line: record.line }),
        };
        let id = self.disambiguate(id);
        let parent = record.parent;

        match level {
            Level::Leaf {
                feature_type,
                chain,
            } => {
                self.set.ensure_collection(&feature_type);
                for ancestor in chain {
                    self.set.ensure_collection(ancestor);
                }
                let leaf = BaseFeature::new(
                    id.clone(),
                    record.seqid,
                    record.start,
                    record.end,
                    feature_type,
                )
                .with_strand(record.strand)
                .with_parent(parent.clone())
                .with_attributes(record.attributes);
                self.set.add_node(leaf)?;

                if let Some(parent) = parent {
                    match chain.first() {
                        Some(level) if self.set.contains_in(level, &parent) => {
                            self.set.add_child(&parent, &id)?;
                        }
                        Some(_) => self.pending_leaves.push(PendingLeaf {
                            id,
                            parent,
                            chain: chain.to_vec(),
                            ancestors: record.ancestors,
                        }),
                        None => self.link_or_defer(id, parent)?,
                    }
                }
            }
            Level::Parent { feature_type } => {
                self.set.ensure_collection(&feature_type);
                let node = ParentFeature::new(id.clone(), record.seqid, feature_type)
                    .with_strand(record.strand)
                    .with_parent(parent.clone())
                    .with_attributes(record.attributes);
                self.set.add_node(node)?;
                if let Some(parent) = parent {
                    self.link_or_defer(id, parent)?;
                }
            }
            Level::Free { feature_type } => {
                self.set.ensure_collection(&feature_type);
                let leaf =
                    BaseFeature::new(id.clone(), record.seqid, record.start, record.end, feature_type)
                        .with_strand(record.strand)
                        .with_parent(parent.clone())
                        .with_attributes(record.attributes);
                self.set.add_node(leaf)?;
                if let Some(parent) = parent {
                    self.link_or_defer(id, parent)?;
                }
            }
            Level::Ignored => unreachable!("ignored records return early"),
        }

        self.report.records += 1;
        Ok(())
    }

    /// Resolves deferred links, synthesizes missing ancestors and returns the report.
    pub fn finish(mut self) -> ReaderResult<IngestReport> {
        for link in std::mem::take(&mut self.pending_links) {
            match self.set.get(&link.parent) {
                Some(FeatureNode::Parent(_)) => self.set.add_child(&link.parent, &link.child)?,
                Some(FeatureNode::Base(_)) => {
                    self.unresolved(link.child, link.parent, UnresolvedReason::NotAParent)
                }
                None => self.unresolved(link.child, link.parent, UnresolvedReason::Missing),
            }
        }

        for leaf in std::mem::take(&mut self.pending_leaves) {
            self.attach_leaf(leaf)?;
        }

        log::debug!(
            "ingested {} records ({} ignored, {} skipped, {} ancestors synthesized, {} unresolved)",
            self.report.records,
            self.report.ignored,
            self.report.skipped.len(),
            self.report.synthesized,
            self.report.unresolved.len()
        );
        Ok(self.report)
    }

    /// `parent-type0`, `parent-type1`, ... per `(parent, type)` pair.
    fn generate_id(&mut self, parent: &str, feature_type: &str) -> String {
        let base = format!("{parent}-{feature_type}");
        let counter = self.generated.entry(base.clone()).or_insert(0);
        let id = format!("{base}{counter}");
        *counter += 1;
        id
    }

    /// Appends `_N` to identifiers already present in the store.
    fn disambiguate(&mut self, id: String) -> String {
        if !self.set.contains(&id) {
            return id;
        }
        let counter = self.collisions.entry(id.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{id}_{counter}");
            if !self.set.contains(&candidate) {
                log::debug!("identifier '{id}' already used, stored as '{candidate}'");
                self.report.renamed.push((id, candidate.clone()));
                return candidate;
            }
        }
    }

    fn link_or_defer(&mut self, child: String, parent: String) -> ReaderResult<()> {
        match self.set.get(&parent) {
            Some(FeatureNode::Parent(_)) => self.set.add_child(&parent, &child)?,
            _ => self.pending_links.push(PendingLink { child, parent }),
        }
        Ok(())
    }

    fn unresolved(&mut self, child: String, parent: String, reason: UnresolvedReason) {
        let reference = UnresolvedReference {
            child,
            parent,
            reason,
        };
        log::warn!("unresolved reference: {reference}");
        self.report.unresolved.push(reference);
    }

    /// Links an orphaned leaf, creating each missing level above it.
    ///
    /// Walking up the chain, a level is satisfied by the declared parent when
    /// it lives at that level, or by an existing node with the level's name.
    /// Otherwise a node is created at the level and the walk continues from it.
    fn attach_leaf(&mut self, leaf: PendingLeaf) -> ReaderResult<()> {
        let PendingLeaf {
            id,
            parent,
            chain,
            ancestors,
        } = leaf;

        let (seqid, strand) = match self.set.get(&id) {
            Some(node) => (node.seqid().to_string(), node.strand()),
            None => return Ok(()),
        };
        let names = match ancestors {
            Some(names) if names.len() == chain.len() => names,
            _ => ancestor_names(&parent, &chain),
        };

        let mut child = id;
        for (level, name) in chain.iter().zip(names) {
            if self.set.contains_in(level, &parent) {
                self.set.add_child(&parent, &child)?;
                self.set.set_parent(&child, Some(parent))?;
                return Ok(());
            }

            match self.set.get(&name) {
                Some(FeatureNode::Parent(existing)) if existing.feature_type == *level => {
                    self.set.add_child(&name, &child)?;
                    self.set.set_parent(&child, Some(name))?;
                    return Ok(());
                }
                Some(existing) => {
                    let found = existing.feature_type().to_string();
                    self.set.set_parent(&child, Some(name.clone()))?;
                    self.unresolved(
                        child,
                        name,
                        UnresolvedReason::TypeConflict {
                            expected: level.clone(),
                            found,
                        },
                    );
                    return Ok(());
                }
                None => {
                    log::debug!("synthesizing {level} '{name}' above '{child}'");
                    let node = ParentFeature::new(name.clone(), seqid.clone(), level.clone())
                        .with_strand(strand)
                        .with_children(vec![child.clone()]);
                    self.set.add_node(node)?;
                    self.set.set_parent(&child, Some(name.clone()))?;
                    self.report.synthesized += 1;
                    child = name;
                }
            }
        }

        Ok(())
    }
}

/// Names of synthesized ancestors: `parent-level` for every level below the
/// top, and the declared parent itself at the top.
fn ancestor_names(parent: &str, chain: &[String]) -> Vec<String> {
    let top = chain.len().saturating_sub(1);
    chain
        .iter()
        .enumerate()
        .map(|(idx, level)| {
            if idx == top {
                parent.to_string()
            } else {
                format!("{parent}-{level}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(line: usize, id: Option<&str>, parent: Option<&str>, start: u64, end: u64) -> FeatureRecord {
        let mut record = FeatureRecord::new(line, "chr1", "CDS", start, end);
        record.id = id.map(str::to_string);
        record.parent = parent.map(str::to_string);
        record
    }

    #[test]
    fn classify_follows_hierarchies_then_ignore() {
        let options = IngestOptions::gff3();
        assert!(matches!(
            options.classify("mRNA"),
            Level::Parent { ref feature_type } if feature_type == "transcript"
        ));
        assert!(matches!(
            options.classify("three_prime_UTR"),
            Level::Leaf { ref feature_type, .. } if feature_type == "UTR"
        ));
        assert_eq!(options.classify("exon"), Level::Ignored);
        assert!(matches!(options.classify("repeat_region"), Level::Free { .. }));
        assert_eq!(options.replaced("protein_match"), "match");
    }

    #[test]
    fn ancestor_names_follow_chain() {
        let chain = vec!["transcript".to_string(), "gene".to_string()];
        assert_eq!(ancestor_names("g", &chain), vec!["g-transcript", "g"]);
        let single = vec!["match".to_string()];
        assert_eq!(ancestor_names("hit-match", &single), vec!["hit-match"]);
    }

    #[test]
    fn generated_ids_count_per_parent_and_type() {
        let mut set = AnnotationSet::new();
        let options = IngestOptions::gff3();
        let mut ingestion = Ingestion::new(&mut set, &options);
        ingestion.push(leaf(1, None, Some("t1"), 1, 10)).unwrap();
        ingestion.push(leaf(2, None, Some("t1"), 20, 30)).unwrap();
        ingestion.push(leaf(3, None, Some("t2"), 40, 50)).unwrap();
        ingestion.finish().unwrap();

        assert!(set.contains("t1-CDS0"));
        assert!(set.contains("t1-CDS1"));
        assert!(set.contains("t2-CDS0"));
    }

    #[test]
    fn record_without_id_or_parent_is_skipped() {
        let mut set = AnnotationSet::new();
        let options = IngestOptions::gff3();
        let mut ingestion = Ingestion::new(&mut set, &options);
        ingestion.push(leaf(4, None, None, 1, 10)).unwrap();
        let report = ingestion.finish().unwrap();

        assert_eq!(report.records, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line(), Some(4));
        assert!(set.is_empty());
    }

    #[test]
    fn late_parent_record_is_linked() {
        let mut set = AnnotationSet::new();
        let options = IngestOptions::gff3();
        let mut ingestion = Ingestion::new(&mut set, &options);

        ingestion.push(leaf(1, Some("c1"), Some("tx1"), 1, 10)).unwrap();
        let mut transcript = FeatureRecord::new(2, "chr1", "mRNA", 1, 10);
        transcript.id = Some("tx1".into());
        transcript.parent = Some("g1".into());
        ingestion.push(transcript).unwrap();
        let mut gene = FeatureRecord::new(3, "chr1", "gene", 1, 10);
        gene.id = Some("g1".into());
        ingestion.push(gene).unwrap();
        let report = ingestion.finish().unwrap();

        assert!(report.is_clean());
        assert_eq!(report.synthesized, 0);
        assert_eq!(set.lookup("tx1").unwrap().children(), ["c1".to_string()]);
        assert_eq!(set.lookup("g1").unwrap().children(), ["tx1".to_string()]);
        assert_eq!(set.lookup("c1").unwrap().parent(), Some("tx1"));
    }

    #[test]
    fn leaf_declaring_a_gene_gets_an_intermediate_transcript() {
        let mut set = AnnotationSet::new();
        let options = IngestOptions::gff3();
        let mut ingestion = Ingestion::new(&mut set, &options);
        let mut gene = FeatureRecord::new(1, "chr1", "gene", 1, 10);
        gene.id = Some("g1".into());
        ingestion.push(gene).unwrap();
        ingestion.push(leaf(2, Some("c1"), Some("g1"), 1, 10)).unwrap();
        let report = ingestion.finish().unwrap();

        assert_eq!(report.synthesized, 1);
        let transcript = set.lookup("g1-transcript").unwrap();
        assert_eq!(transcript.parent(), Some("g1"));
        assert_eq!(transcript.children(), ["c1".to_string()]);
        assert_eq!(set.lookup("g1").unwrap().children(), ["g1-transcript".to_string()]);
    }

    #[test]
    fn dangling_parent_reference_is_reported() {
        let mut set = AnnotationSet::new();
        let options = IngestOptions::gff3();
        let mut ingestion = Ingestion::new(&mut set, &options);
        let mut transcript = FeatureRecord::new(1, "chr1", "mRNA", 1, 10);
        transcript.id = Some("tx1".into());
        transcript.parent = Some("nowhere".into());
        ingestion.push(transcript).unwrap();
        let report = ingestion.finish().unwrap();

        assert_eq!(
            report.unresolved,
            vec![UnresolvedReference {
                child: "tx1".into(),
                parent: "nowhere".into(),
                reason: UnresolvedReason::Missing,
            }]
        );
    }
}
