//! A genome: its sequence, its annotations and its variants.
//!
//! [`Genome`] ties a [`GenomeSequence`] to an [`AnnotationSet`] so that
//! features can be exported as FASTA, and regions as Apollo GFF3 bundles
//! (long-form GFF3 followed by the region's sequence).

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::blast::BlastOptions;
use crate::feature::FeatureNode;
use crate::gxf::GtfOptions;
use crate::hierarchy::{IngestOptions, IngestReport};
use crate::reader::{read_all, Input, ReaderError};
use crate::sequence::{reverse_complement, translate, GenomeSequence};
use crate::store::{AnnotationSet, StoreError};
use crate::strand::Strand;
use crate::vcf::{read_vcf, VariantSet, VcfSummary};
use crate::writer::{write_longform_gff, WriterError};

/// Result alias for genome operations.
pub type GenomeResult<T> = Result<T, GenomeError>;

/// Errors raised by [`Genome`] operations.
#[derive(Debug)]
pub enum GenomeError {
    /// The operation needs a genome sequence.
    MissingSequence,
    /// The operation needs annotations.
    MissingAnnotations,
    /// The sequence region is not part of the genome sequence.
    UnknownRegion(String),
    /// A feature extends past the end of its sequence region.
    OutOfRange {
        /// The feature.
        id: String,
        /// Its sequence region.
        seqid: String,
        /// The feature end.
        end: u64,
        /// The region length.
        length: u64,
    },
    /// The requested sequence type is neither nucleotide nor protein.
    InvalidSeqType(String),
    /// A feature lookup failed.
    Store(StoreError),
    /// Writing annotations failed.
    Writer(WriterError),
    /// Reading an input failed.
    Reader(ReaderError),
}

impl fmt::Display for GenomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenomeError::MissingSequence => write!(f, "genome has no sequence"),
            GenomeError::MissingAnnotations => write!(f, "genome has no annotations"),
            GenomeError::UnknownRegion(seqid) => {
                write!(f, "sequence region '{seqid}' is not in the genome")
            }
            GenomeError::OutOfRange {
                id,
                seqid,
                end,
                length,
            } => write!(
                f,
                "feature '{id}' ends at {end}, past the end of '{seqid}' ({length} bp)"
            ),
            GenomeError::InvalidSeqType(raw) => write!(
                f,
                "invalid sequence type '{raw}', expected 'nucleotide' or 'protein'"
            ),
            GenomeError::Store(err) => write!(f, "store error: {err}"),
            GenomeError::Writer(err) => write!(f, "writer error: {err}"),
            GenomeError::Reader(err) => write!(f, "reader error: {err}"),
        }
    }
}

impl std::error::Error for GenomeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenomeError::Store(err) => Some(err),
            GenomeError::Writer(err) => Some(err),
            GenomeError::Reader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for GenomeError {
    fn from(err: StoreError) -> Self {
        GenomeError::Store(err)
    }
}

impl From<WriterError> for GenomeError {
    fn from(err: WriterError) -> Self {
        GenomeError::Writer(err)
    }
}

impl From<ReaderError> for GenomeError {
    fn from(err: ReaderError) -> Self {
        GenomeError::Reader(err)
    }
}

/// Kind of sequence extracted for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeqType {
    /// Genomic nucleotides, oriented on the feature strand.
    #[default]
    Nucleotide,
    /// Frame-0 translation of the nucleotide sequence.
    Protein,
}

impl FromStr for SeqType {
    type Err = GenomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nucleotide" | "nuc" | "dna" => Ok(SeqType::Nucleotide),
            "protein" | "prot" | "aa" => Ok(SeqType::Protein),
            _ => Err(GenomeError::InvalidSeqType(s.to_string())),
        }
    }
}

/// A genome sequence with its annotations and variants, each optional.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    sequence: Option<GenomeSequence>,
    annotations: Option<AnnotationSet>,
    variants: Option<VariantSet>,
}

impl Genome {
    /// Creates an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the genome sequence.
    pub fn with_sequence(mut self, sequence: GenomeSequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the annotations.
    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Reads the genome sequence from a multi-FASTA input.
    pub fn from_fasta<I: Into<Input>>(input: I) -> GenomeResult<Self> {
        Ok(Self::new().with_sequence(GenomeSequence::read_fasta(input)?))
    }

    /// Splits an Apollo GFF3 bundle into annotations and sequence.
    ///
    /// The FASTA part starts at a `##FASTA` line or at the first `>` header.
    ///
    /// # Example
    ///
    /// ```
    /// use annoset::genome::Genome;
    ///
    /// let bundle = "chr1\tsrc\tgene\t2\t7\t.\t+\t.\tID=g1\n\
    ///               chr1\tsrc\tmRNA\t2\t7\t.\t+\t.\tID=t1;Parent=g1\n\
    ///               chr1\tsrc\tCDS\t2\t7\t.\t+\t0\tID=c1;Parent=t1\n\
    ///               ##FASTA\n>chr1\nAATGGCCA\n";
    /// let (genome, report) = Genome::from_apollo_gff(bundle).unwrap();
    ///
    /// assert!(report.is_clean());
    /// assert_eq!(genome.feature_sequence("c1").unwrap(), "ATGGCC");
    /// ```
    pub fn from_apollo_gff<I: Into<Input>>(input: I) -> GenomeResult<(Self, IngestReport)> {
        let text = read_all(input)?;
        let split = fasta_offset(&text);
        let (gff, fasta) = text.split_at(split);

        let mut annotations = AnnotationSet::new();
        let report = annotations.read_gff3(Input::Text(gff.to_string()), &IngestOptions::gff3())?;
        let genome = Self::new()
            .with_sequence(GenomeSequence::from_fasta_str(fasta))
            .with_annotations(annotations);
        Ok((genome, report))
    }

    /// The genome sequence, if any.
    pub fn sequence(&self) -> Option<&GenomeSequence> {
        self.sequence.as_ref()
    }

    /// The annotations, if any.
    pub fn annotations(&self) -> Option<&AnnotationSet> {
        self.annotations.as_ref()
    }

    /// Mutable access to the annotations, created on first use.
    pub fn annotations_mut(&mut self) -> &mut AnnotationSet {
        self.annotations.get_or_insert_with(AnnotationSet::new)
    }

    /// The variants, if any.
    pub fn variants(&self) -> Option<&VariantSet> {
        self.variants.as_ref()
    }

    fn require_sequence(&self) -> GenomeResult<&GenomeSequence> {
        self.sequence.as_ref().ok_or(GenomeError::MissingSequence)
    }

    fn require_annotations(&self) -> GenomeResult<&AnnotationSet> {
        self.annotations
            .as_ref()
            .ok_or(GenomeError::MissingAnnotations)
    }

    /// Adds a GFF3 input to the annotations.
    pub fn read_gff3<I: Into<Input>>(
        &mut self,
        input: I,
        options: &IngestOptions,
    ) -> GenomeResult<IngestReport> {
        Ok(self.annotations_mut().read_gff3(input, options)?)
    }

    /// Adds a GTF input to the annotations.
    pub fn read_gtf<I: Into<Input>>(
        &mut self,
        input: I,
        options: &GtfOptions,
    ) -> GenomeResult<IngestReport> {
        Ok(self.annotations_mut().read_gtf(input, options)?)
    }

    /// Adds a CEGMA GFF output to the annotations.
    pub fn read_cegma_gff<I: Into<Input>>(
        &mut self,
        input: I,
        options: &IngestOptions,
    ) -> GenomeResult<IngestReport> {
        Ok(self.annotations_mut().read_cegma_gff(input, options)?)
    }

    /// Adds BLAST hits to the annotations.
    ///
    /// With `find_truncated_locname`, subject identifiers are matched against
    /// the first word of the genome's sequence region names.
    pub fn read_blast_csv<I: Into<Input>>(
        &mut self,
        input: I,
        options: &BlastOptions,
        find_truncated_locname: bool,
    ) -> GenomeResult<IngestReport> {
        let options = match (&self.sequence, find_truncated_locname) {
            (Some(sequence), true) => options
                .clone()
                .sequence_regions(sequence.seqids().map(str::to_string).collect()),
            _ => options.clone(),
        };
        Ok(self.annotations_mut().read_blast_csv(input, &options)?)
    }

    /// Adds an Exonerate report to the annotations.
    pub fn read_exonerate<I: Into<Input>>(&mut self, input: I) -> GenomeResult<IngestReport> {
        Ok(self.annotations_mut().read_exonerate(input)?)
    }

    /// Adds STAR splice junctions to the annotations.
    pub fn read_star_junctions<I: Into<Input>>(&mut self, input: I) -> GenomeResult<IngestReport> {
        Ok(self.annotations_mut().read_star_junctions(input)?)
    }

    /// Adds a VCF input to the variants.
    pub fn read_vcf<I: Into<Input>>(&mut self, input: I) -> GenomeResult<VcfSummary> {
        let variants = self.variants.get_or_insert_with(VariantSet::new);
        Ok(read_vcf(input, variants)?)
    }

    /// Sequence region names.
    ///
    /// Regions come from the genome sequence; with `from_annotations`,
    /// annotated regions missing from the sequence are appended (and
    /// reported).
    pub fn seqids(&self, from_annotations: bool) -> Vec<String> {
        let mut seqids: Vec<String> = self
            .sequence
            .iter()
            .flat_map(|sequence| sequence.seqids().map(str::to_string))
            .collect();

        if from_annotations {
            if let Some(annotations) = &self.annotations {
                for seqid in annotations.all_sequence_region_ids() {
                    if !seqids.contains(&seqid) {
                        if self.sequence.is_some() {
                            log::warn!("annotated region '{seqid}' is not in the genome sequence");
                        }
                        seqids.push(seqid);
                    }
                }
            }
        }
        seqids
    }

    /// One region as FASTA.
    pub fn scaffold_fasta(&self, seqid: &str) -> GenomeResult<String> {
        let seq = self
            .require_sequence()?
            .get(seqid)
            .ok_or_else(|| GenomeError::UnknownRegion(seqid.to_string()))?;
        Ok(format!(">{seqid}\n{seq}\n"))
    }

    /// The whole genome as FASTA; `remove_spaces` keeps only the first word
    /// of each header.
    pub fn genome_fasta(&self, remove_spaces: bool) -> GenomeResult<String> {
        Ok(self.require_sequence()?.to_fasta(remove_spaces))
    }

    /// The nucleotide sequence of a feature, on its own strand.
    ///
    /// Leaves are cut from their region. A parent whose children are all
    /// leaves is spliced: child sequences in coordinate order, reversed on
    /// the `-` strand. Any other parent yields the genomic span it covers.
    pub fn feature_sequence(&self, id: &str) -> GenomeResult<String> {
        let annotations = self.require_annotations()?;
        let node = annotations.lookup(id)?;
        match leaf_children(annotations, node) {
            Some(leaves) => self.spliced(id, node.strand(), leaves),
            None => {
                let (start, end) = annotations
                    .coords(id)
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
                self.region(id, node.seqid(), start, end, node.strand())
            }
        }
    }

    /// FASTA records for a feature.
    ///
    /// Parents whose children are themselves parents produce one record per
    /// descendant with leaf children (one per transcript of a gene); with
    /// `longest`, only the longest record is kept.
    ///
    /// # Example
    ///
    /// ```
    /// use annoset::genome::{Genome, SeqType};
    ///
    /// let bundle = "chr1\tsrc\tgene\t2\t8\t.\t+\t.\tID=g1\n\
    ///               chr1\tsrc\tmRNA\t2\t8\t.\t+\t.\tID=t1;Parent=g1\n\
    ///               chr1\tsrc\tCDS\t2\t4\t.\t+\t0\tID=c1;Parent=t1\n\
    ///               chr1\tsrc\tCDS\t6\t8\t.\t+\t0\tID=c2;Parent=t1\n\
    ///               >chr1\nAATGCGCCAT\n";
    /// let (genome, _) = Genome::from_apollo_gff(bundle).unwrap();
    ///
    /// assert_eq!(genome.feature_fasta("t1", SeqType::Nucleotide, false).unwrap(), ">t1\nATGGCC\n");
    /// assert_eq!(genome.feature_fasta("t1", SeqType::Protein, false).unwrap(), ">t1\nMA\n");
    /// ```
    pub fn feature_fasta(&self, id: &str, seq_type: SeqType, longest: bool) -> GenomeResult<String> {
        let annotations = self.require_annotations()?;
        let mut records = Vec::new();
        self.fasta_records(annotations, id, &mut records)?;

        if longest {
            let mut best: Option<(String, String)> = None;
            for record in records.drain(..) {
                if best.as_ref().map_or(true, |(_, seq)| record.1.len() > seq.len()) {
                    best = Some(record);
                }
            }
            records.extend(best);
        }

        let mut out = String::new();
        for (name, seq) in records {
            let seq = match seq_type {
                SeqType::Nucleotide => seq,
                SeqType::Protein => translate(&seq, 0, Strand::Forward, true),
            };
            out.push('>');
            out.push_str(&name);
            out.push('\n');
            out.push_str(&seq);
            out.push('\n');
        }
        Ok(out)
    }

    /// FASTA of every feature of one type, in collection order.
    pub fn annotation_fasta(
        &self,
        feature_type: &str,
        seq_type: SeqType,
        longest: bool,
    ) -> GenomeResult<String> {
        let annotations = self.require_annotations()?;
        let mut out = String::new();
        for node in annotations.collection(feature_type) {
            out.push_str(&self.feature_fasta(node.id(), seq_type, longest)?);
        }
        Ok(out)
    }

    /// One region as an Apollo bundle: its long-form GFF3, then `##FASTA` and
    /// the region's sequence unless `suppress_fasta` is set.
    pub fn write_apollo_gff(&self, seqid: &str, suppress_fasta: bool) -> GenomeResult<String> {
        let mut out = match &self.annotations {
            Some(annotations) => {
                let subset = annotations.subset_by_sequence_region(seqid);
                let (gff, summary) = write_longform_gff(&subset, false)?;
                if !summary.skipped.is_empty() {
                    log::warn!(
                        "{} subtrees of '{seqid}' could not be written",
                        summary.skipped.len()
                    );
                }
                gff
            }
            None => String::new(),
        };

        if !suppress_fasta {
            out.push_str("##FASTA\n");
            out.push_str(&self.scaffold_fasta(seqid)?);
        }
        Ok(out)
    }

    /// Apollo bundles for every sequence region, as `(seqid, bundle)` pairs.
    ///
    /// Annotation-only regions are included when `suppress_fasta` is set.
    pub fn write_apollo_gff_all(&self, suppress_fasta: bool) -> GenomeResult<Vec<(String, String)>> {
        let seqids = self.seqids(suppress_fasta);

        #[cfg(feature = "rayon")]
        let bundles = seqids
            .into_par_iter()
            .map(|seqid| {
                let bundle = self.write_apollo_gff(&seqid, suppress_fasta)?;
                Ok((seqid, bundle))
            })
            .collect();

        #[cfg(not(feature = "rayon"))]
        let bundles = seqids
            .into_iter()
            .map(|seqid| {
                let bundle = self.write_apollo_gff(&seqid, suppress_fasta)?;
                Ok((seqid, bundle))
            })
            .collect();

        bundles
    }

    fn fasta_records(
        &self,
        annotations: &AnnotationSet,
        id: &str,
        records: &mut Vec<(String, String)>,
    ) -> GenomeResult<()> {
        let node = annotations.lookup(id)?;
        if node.is_base() {
            records.push((id.to_string(), self.feature_sequence(id)?));
            return Ok(());
        }
        if let Some(leaves) = leaf_children(annotations, node) {
            records.push((id.to_string(), self.spliced(id, node.strand(), leaves)?));
            return Ok(());
        }
        for child in node.children() {
            self.fasta_records(annotations, child, records)?;
        }
        Ok(())
    }

    fn spliced(&self, id: &str, strand: Strand, mut leaves: Vec<&FeatureNode>) -> GenomeResult<String> {
        leaves.sort_by_key(|leaf| leaf.base_coords());
        if strand.is_reverse() {
            leaves.reverse();
        }
        let mut seq = String::new();
        for leaf in leaves {
            if let Some((start, end)) = leaf.base_coords() {
                seq.push_str(&self.region(id, leaf.seqid(), start, end, leaf.strand())?);
            }
        }
        Ok(seq)
    }

    fn region(&self, id: &str, seqid: &str, start: u64, end: u64, strand: Strand) -> GenomeResult<String> {
        let seq = self
            .require_sequence()?
            .get(seqid)
            .ok_or_else(|| GenomeError::UnknownRegion(seqid.to_string()))?;
        let length = seq.len() as u64;
        if end > length || start == 0 {
            return Err(GenomeError::OutOfRange {
                id: id.to_string(),
                seqid: seqid.to_string(),
                end,
                length,
            });
        }
        let slice = seq
            .get(start as usize - 1..end as usize)
            .ok_or_else(|| GenomeError::UnknownRegion(seqid.to_string()))?;
        Ok(if strand.is_reverse() {
            reverse_complement(slice)
        } else {
            slice.to_string()
        })
    }
}

/// The children of `node` when it is a parent whose children are all leaves.
/// A leaf itself counts as its own single leaf.
fn leaf_children<'a>(set: &'a AnnotationSet, node: &'a FeatureNode) -> Option<Vec<&'a FeatureNode>> {
    if node.is_base() {
        return Some(vec![node]);
    }
    let children: Vec<&FeatureNode> = node
        .children()
        .iter()
        .filter_map(|child| set.get(child))
        .collect();
    (!children.is_empty() && children.iter().all(|child| child.is_base())).then_some(children)
}

/// Byte offset of the FASTA section of an Apollo bundle.
fn fasta_offset(text: &str) -> usize {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "##FASTA" || trimmed.starts_with('>') {
            return offset;
        }
        offset += line.len();
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = "chr1\tsrc\tgene\t3\t14\t.\t-\t.\tID=g1\n\
                          chr1\tsrc\tmRNA\t3\t14\t.\t-\t.\tID=t1;Parent=g1\n\
                          chr1\tsrc\tCDS\t3\t5\t.\t-\t0\tID=c1;Parent=t1\n\
                          chr1\tsrc\tCDS\t9\t14\t.\t-\t0\tID=c2;Parent=t1\n\
                          ##FASTA\n\
                          >chr1 assembled\n\
                          GGTTAGGGGCCCATGG\n";

    fn genome() -> Genome {
        let (genome, report) = Genome::from_apollo_gff(BUNDLE).unwrap();
        assert!(report.is_clean());
        genome
    }

    #[test]
    fn seq_type_parsing() {
        assert_eq!("Protein".parse::<SeqType>().unwrap(), SeqType::Protein);
        assert!(matches!(
            "rna".parse::<SeqType>(),
            Err(GenomeError::InvalidSeqType(_))
        ));
    }

    #[test]
    fn reverse_transcripts_are_spliced_from_the_three_prime_end() {
        let mut genome = genome();
        genome.sequence = Some(GenomeSequence::from_fasta_str(">chr1\nGGTTAGGGGCCCATGG\n"));
        assert_eq!(genome.feature_sequence("c2").unwrap(), "ATGGGC");
        assert_eq!(genome.feature_sequence("t1").unwrap(), "ATGGGCTAA");
        assert_eq!(
            genome.feature_fasta("g1", SeqType::Protein, false).unwrap(),
            ">t1\nMG*\n"
        );
    }

    #[test]
    fn missing_region_is_reported() {
        let genome = genome();
        assert!(matches!(
            genome.feature_sequence("c1"),
            Err(GenomeError::UnknownRegion(_))
        ));
    }

    #[test]
    fn seqids_include_annotation_only_regions() {
        let genome = genome();
        assert_eq!(genome.seqids(false), ["chr1 assembled"]);
        assert_eq!(genome.seqids(true), ["chr1 assembled", "chr1"]);
    }

    #[test]
    fn apollo_bundle_without_annotations() {
        let genome = Genome::new().with_sequence(GenomeSequence::from_fasta_str(">s\nACGT\n"));
        assert_eq!(genome.write_apollo_gff("s", false).unwrap(), "##FASTA\n>s\nACGT\n");
        assert_eq!(genome.write_apollo_gff("s", true).unwrap(), "");
        assert!(matches!(
            Genome::new().genome_fasta(false),
            Err(GenomeError::MissingSequence)
        ));
    }
}
