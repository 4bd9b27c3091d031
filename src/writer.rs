use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::write::GzEncoder;
#[cfg(feature = "gzip")]
use flate2::Compression as GzCompression;

use crate::feature::{BaseFeature, FeatureNode};
use crate::store::{AnnotationSet, StoreError};
use crate::strand::Strand;

/// Result alias for writer operations.
pub type WriterResult<T> = Result<T, WriterError>;

/// Errors that can occur while writing a store.
#[derive(Debug)]
pub enum WriterError {
    /// An I/O error occurred while writing.
    Io(io::Error),
    /// A gene or transcript has a child the output shape cannot express.
    ///
    /// Collected in [`WriteSummary::skipped`]; the rest of the store is still
    /// written.
    UnsupportedHierarchyShape {
        /// The gene being written.
        gene: String,
        /// The offending child.
        child: String,
        /// The child's feature type.
        child_type: String,
    },
    /// A child identifier does not resolve.
    Store(StoreError),
    /// The requested operation cannot be performed with the current feature set.
    Unsupported(String),
}

impl fmt::Display for WriterError {
    /// Formats the writer error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::Io(err) => write!(f, "write error: {err}"),
            WriterError::UnsupportedHierarchyShape {
                gene,
                child,
                child_type,
            } => write!(
                f,
                "gene '{gene}' has child '{child}' of type '{child_type}'; only CDS/UTR -> transcript -> gene is supported"
            ),
            WriterError::Store(err) => write!(f, "store error: {err}"),
            WriterError::Unsupported(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for WriterError {
    /// Returns the source error, if any.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriterError::Io(err) => Some(err),
            WriterError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WriterError {
    /// Creates a new `WriterError` from an `io::Error`.
    fn from(err: io::Error) -> Self {
        WriterError::Io(err)
    }
}

impl From<StoreError> for WriterError {
    fn from(err: StoreError) -> Self {
        WriterError::Store(err)
    }
}

/// Outcome of a write: number of lines emitted and the subtrees skipped.
#[derive(Debug, Default)]
pub struct WriteSummary {
    /// Lines written.
    pub lines: usize,
    /// Subtrees that could not be expressed in the target format.
    pub skipped: Vec<WriterError>,
}

/// Which leaf lines the GTF writer emits for each transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GtfFeature {
    /// CDS lines only (plus UTRs when kept).
    #[default]
    Cds,
    /// Merged exon lines followed by CDS lines.
    Exon,
}

/// Configuration options for the writers.
///
/// # Example
///
/// ```
/// use annoset::writer::{GtfFeature, WriterOptions};
///
/// let options = WriterOptions::new()
///     .keep_utr_features(true)
///     .gtf_feature(GtfFeature::Exon)
///     .codons(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    keep_utr_features: bool,
    gtf_feature: GtfFeature,
    codons: bool,
}

impl WriterOptions {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits UTR lines next to CDS lines.
    pub fn keep_utr_features(mut self, keep: bool) -> Self {
        self.keep_utr_features = keep;
        self
    }

    /// Selects the GTF leaf lines.
    pub fn gtf_feature(mut self, feature: GtfFeature) -> Self {
        self.gtf_feature = feature;
        self
    }

    /// Emits `start_codon`/`stop_codon` lines in GTF output.
    pub fn codons(mut self, codons: bool) -> Self {
        self.codons = codons;
        self
    }
}

/// A generic writer for emitting an [`AnnotationSet`] into various formats.
///
/// # Example
///
/// ```
/// use annoset::gxf::{read_gff3, Gff};
/// use annoset::hierarchy::IngestOptions;
/// use annoset::writer::{Writer, WriterOptions};
///
/// let gff = "chr1\tsrc\tgene\t1\t90\t.\t+\t.\tID=g1\n\
///            chr1\tsrc\tmRNA\t1\t90\t.\t+\t.\tID=t1;Parent=g1\n\
///            chr1\tsrc\tCDS\t10\t90\t.\t+\t0\tID=c1;Parent=t1\n";
/// let (set, _) = read_gff3(gff, &IngestOptions::gff3()).unwrap();
///
/// let (text, summary) = Writer::<Gff>::to_string(&set, &WriterOptions::new()).unwrap();
/// assert_eq!(summary.lines, 4);
/// assert!(text.contains("\texon\t10\t90\t"));
/// ```
pub struct Writer<F> {
    _marker: PhantomData<F>,
}

impl<F> Writer<F>
where
    F: TargetFormat,
{
    /// Writes the whole store into the target format.
    pub fn from_set<W: Write>(
        set: &AnnotationSet,
        options: &WriterOptions,
        writer: &mut W,
    ) -> WriterResult<WriteSummary> {
        let summary = F::write_set(set, options, writer)?;
        log::debug!(
            "wrote {} {} lines ({} subtrees skipped)",
            summary.lines,
            F::TYPE_NAME,
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Renders the store into a string.
    pub fn to_string(
        set: &AnnotationSet,
        options: &WriterOptions,
    ) -> WriterResult<(String, WriteSummary)> {
        let mut buf = Vec::with_capacity(set.len() * 96);
        let summary = Self::from_set(set, options, &mut buf)?;
        let text = String::from_utf8(buf)
            .map_err(|err| WriterError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
        Ok((text, summary))
    }

    /// Opens a path and writes the store, auto-detecting gzip output from
    /// the `.gz` extension when the `gzip` feature is enabled.
    pub fn to_path<P: AsRef<Path>>(
        path: P,
        set: &AnnotationSet,
        options: &WriterOptions,
    ) -> WriterResult<WriteSummary> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;

        #[cfg(feature = "gzip")]
        let sink: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzEncoder::new(file, GzCompression::fast()))
        } else {
            Box::new(file)
        };

        #[cfg(not(feature = "gzip"))]
        let sink: Box<dyn Write> = {
            if path.extension().is_some_and(|ext| ext == "gz") {
                return Err(WriterError::Unsupported(
                    "enable the `gzip` feature to write gzip outputs".into(),
                ));
            }
            Box::new(file)
        };

        let mut writer = BufWriter::with_capacity(64 * 1024, sink);
        let summary = Self::from_set(set, options, &mut writer)?;
        writer.flush()?;
        Ok(summary)
    }
}

/// Trait implemented by all supported output formats.
pub trait TargetFormat {
    /// Human readable format name (for log messages).
    const TYPE_NAME: &'static str;

    /// Writes a whole store in the target format.
    fn write_set<W: Write>(
        set: &AnnotationSet,
        options: &WriterOptions,
        writer: &mut W,
    ) -> WriterResult<WriteSummary>;
}

impl TargetFormat for crate::gxf::Gff {
    const TYPE_NAME: &'static str = "GFF3";

    /// Writes the long-form (Apollo) GFF3 reconstruction.
    fn write_set<W: Write>(
        set: &AnnotationSet,
        options: &WriterOptions,
        writer: &mut W,
    ) -> WriterResult<WriteSummary> {
        write_longform(set, options, writer)
    }
}

impl TargetFormat for crate::gxf::Gtf {
    const TYPE_NAME: &'static str = "GTF";

    /// Writes one GTF block per transcript.
    fn write_set<W: Write>(
        set: &AnnotationSet,
        options: &WriterOptions,
        writer: &mut W,
    ) -> WriterResult<WriteSummary> {
        write_gtf(set, options, writer)
    }
}

/// Renders a store as long-form GFF3, the shape Apollo imports.
///
/// Shorthand for `Writer::<Gff>::to_string` with only the UTR flag set.
pub fn write_longform_gff(
    set: &AnnotationSet,
    keep_utr_features: bool,
) -> WriterResult<(String, WriteSummary)> {
    let options = WriterOptions::new().keep_utr_features(keep_utr_features);
    Writer::<crate::gxf::Gff>::to_string(set, &options)
}

/// The eight positional columns of a GXF line.
struct Columns<'a> {
    seqid: &'a str,
    source: &'a str,
    feature_type: &'a str,
    start: u64,
    end: u64,
    score: &'a str,
    strand: Strand,
    phase: &'a str,
}

impl<'a> Columns<'a> {
    /// Columns of a node, with its source, score and phase attributes.
    fn of(node: &'a FeatureNode, feature_type: &'a str, (start, end): (u64, u64)) -> Self {
        Self {
            seqid: node.seqid(),
            source: node.attribute("source").unwrap_or("."),
            feature_type,
            start,
            end,
            score: node.attribute("score").unwrap_or("."),
            strand: node.strand(),
            phase: node.attribute("phase").unwrap_or("."),
        }
    }
}

/// A transcript's leaves, keyed by coordinates.
struct TranscriptLeaves<'a> {
    leaves: BTreeMap<(u64, u64), &'a BaseFeature>,
}

impl<'a> TranscriptLeaves<'a> {
    /// Collects the leaves of `transcript`.
    ///
    /// Returns the first child that is not a leaf as an error.
    fn collect(
        set: &'a AnnotationSet,
        gene: &str,
        transcript: &'a FeatureNode,
    ) -> WriterResult<Self> {
        let mut leaves = BTreeMap::new();
        for child in transcript.children() {
            match set.lookup(child)? {
                FeatureNode::Base(leaf) => {
                    leaves.insert(leaf.coords, leaf);
                }
                FeatureNode::Parent(other) => {
                    return Err(WriterError::UnsupportedHierarchyShape {
                        gene: gene.to_string(),
                        child: other.id.clone(),
                        child_type: other.feature_type.clone(),
                    })
                }
            }
        }
        Ok(Self { leaves })
    }

    /// Exons covering the leaves: abutting leaves are merged, and a merged
    /// exon is named after the last leaf it covers.
    fn exons(&self) -> Vec<(u64, u64, &'a BaseFeature)> {
        let mut exons: Vec<(u64, u64, &BaseFeature)> = Vec::with_capacity(self.leaves.len());
        for (&(start, end), &leaf) in &self.leaves {
            match exons.last_mut() {
                Some(last) if last.1 + 1 == start => {
                    last.1 = end;
                    last.2 = leaf;
                }
                _ => exons.push((start, end, leaf)),
            }
        }
        exons
    }

    /// Coding segments as half-open intervals, in coordinate order.
    fn coding(&self) -> Vec<(u64, u64)> {
        self.leaves
            .values()
            .filter(|leaf| leaf.feature_type == "CDS")
            .map(|leaf| (leaf.coords.0.saturating_sub(1), leaf.coords.1))
            .collect()
    }
}

fn write_longform<W: Write>(
    set: &AnnotationSet,
    options: &WriterOptions,
    writer: &mut W,
) -> WriterResult<WriteSummary> {
    let mut summary = WriteSummary::default();

    for matched in set.collection("match") {
        let Some(span) = set.coords(matched.id()) else {
            log::warn!("match '{}' has no parts; not written", matched.id());
            continue;
        };
        let attrs = render_gff_attributes(matched.id(), matched.parent(), matched);
        write_gxf_feature(writer, &Columns::of(matched, "match", span), &attrs)?;
        summary.lines += 1;

        for part_id in matched.children() {
            let part = set.lookup(part_id)?;
            let Some(span) = set.coords(part_id) else {
                continue;
            };
            let parent = part.parent().unwrap_or(matched.id());
            let attrs = render_gff_attributes(part.id(), Some(parent), part);
            write_gxf_feature(writer, &Columns::of(part, part.feature_type(), span), &attrs)?;
            summary.lines += 1;
        }
    }

    for gene in set.collection("gene") {
        let Some(span) = set.coords(gene.id()) else {
            log::warn!("gene '{}' has no CDS or UTR; not written", gene.id());
            continue;
        };
        let attrs = render_gff_attributes(gene.id(), gene.parent(), gene);
        write_gxf_feature(writer, &Columns::of(gene, "gene", span), &attrs)?;
        summary.lines += 1;

        for transcript_id in gene.children() {
            let transcript = set.lookup(transcript_id)?;
            if transcript.feature_type() != "transcript" {
                let err = WriterError::UnsupportedHierarchyShape {
                    gene: gene.id().to_string(),
                    child: transcript.id().to_string(),
                    child_type: transcript.feature_type().to_string(),
                };
                log::warn!("{err}");
                summary.skipped.push(err);
                break;
            }

            let leaves = match TranscriptLeaves::collect(set, gene.id(), transcript) {
                Ok(leaves) => leaves,
                Err(err @ WriterError::UnsupportedHierarchyShape { .. }) => {
                    log::warn!("{err}");
                    summary.skipped.push(err);
                    break;
                }
                Err(err) => return Err(err),
            };
            let Some(span) = set.coords(transcript.id()) else {
                log::warn!("transcript '{}' has no CDS or UTR; not written", transcript.id());
                continue;
            };

            let parent = transcript.parent().unwrap_or(gene.id());
            let attrs = render_gff_attributes(transcript.id(), Some(parent), transcript);
            write_gxf_feature(writer, &Columns::of(transcript, "mRNA", span), &attrs)?;
            summary.lines += 1;

            for (start, end, leaf) in leaves.exons() {
                let parent = leaf.parent.as_deref().unwrap_or(transcript.id());
                let attrs = format!("ID={}-exon;Parent={parent}", leaf.id);
                let columns = Columns {
                    seqid: &leaf.seqid,
                    source: leaf.attributes.get("source").map_or(".", String::as_str),
                    feature_type: "exon",
                    start,
                    end,
                    score: leaf.attributes.get("score").map_or(".", String::as_str),
                    strand: leaf.strand,
                    phase: ".",
                };
                write_gxf_feature(writer, &columns, attrs.as_bytes())?;
                summary.lines += 1;
            }

            for leaf in leaves.leaves.values() {
                if leaf.feature_type != "CDS" && !options.keep_utr_features {
                    continue;
                }
                let node = set.lookup(&leaf.id)?;
                let parent = leaf.parent.as_deref().unwrap_or(transcript.id());
                let attrs = render_gff_attributes(&leaf.id, Some(parent), node);
                write_gxf_feature(
                    writer,
                    &Columns::of(node, &leaf.feature_type, leaf.coords),
                    &attrs,
                )?;
                summary.lines += 1;
            }
        }
    }

    Ok(summary)
}

fn write_gtf<W: Write>(
    set: &AnnotationSet,
    options: &WriterOptions,
    writer: &mut W,
) -> WriterResult<WriteSummary> {
    let mut summary = WriteSummary::default();

    for gene in set.collection("gene") {
        for transcript_id in gene.children() {
            let transcript = set.lookup(transcript_id)?;
            let leaves = if transcript.feature_type() == "transcript" {
                TranscriptLeaves::collect(set, gene.id(), transcript)
            } else {
                Err(WriterError::UnsupportedHierarchyShape {
                    gene: gene.id().to_string(),
                    child: transcript.id().to_string(),
                    child_type: transcript.feature_type().to_string(),
                })
            };
            let leaves = match leaves {
                Ok(leaves) => leaves,
                Err(err @ WriterError::UnsupportedHierarchyShape { .. }) => {
                    log::warn!("{err}");
                    summary.skipped.push(err);
                    break;
                }
                Err(err) => return Err(err),
            };
            let Some(span) = set.coords(transcript.id()) else {
                log::warn!("transcript '{}' has no CDS or UTR; not written", transcript.id());
                continue;
            };

            let ids = [("gene_id", gene.id()), ("transcript_id", transcript.id())];
            let attrs = render_gtf_attributes(&ids, transcript);
            write_gxf_feature(writer, &Columns::of(transcript, "transcript", span), &attrs)?;
            summary.lines += 1;

            if options.gtf_feature == GtfFeature::Exon {
                for (start, end, leaf) in leaves.exons() {
                    let node = set.lookup(&leaf.id)?;
                    let mut columns = Columns::of(node, "exon", (start, end));
                    columns.phase = ".";
                    write_gxf_feature(writer, &columns, &render_gtf_attributes(&ids, node))?;
                    summary.lines += 1;
                }
            }

            let coding = leaves.coding();
            let phases = compute_cds_segments(&coding, transcript.strand());
            let mut phases = phases.iter().map(|(_, _, phase)| phase.to_string());
            for leaf in leaves.leaves.values() {
                let is_cds = leaf.feature_type == "CDS";
                let phase = if is_cds { phases.next() } else { None };
                if !is_cds && !options.keep_utr_features {
                    continue;
                }
                let node = set.lookup(&leaf.id)?;
                let mut columns = Columns::of(node, &leaf.feature_type, leaf.coords);
                if let (".", Some(phase)) = (columns.phase, phase.as_deref()) {
                    columns.phase = phase;
                }
                write_gxf_feature(writer, &columns, &render_gtf_attributes(&ids, node))?;
                summary.lines += 1;
            }

            if options.codons {
                let codons = [
                    ("start_codon", start_codon_interval(&coding, transcript.strand())),
                    ("stop_codon", stop_codon_interval(&coding, transcript.strand())),
                ];
                for (feature_type, interval) in codons {
                    let Some((start, end)) = interval else {
                        continue;
                    };
                    let mut columns = Columns::of(transcript, feature_type, (start + 1, end));
                    columns.score = ".";
                    write_gxf_feature(writer, &columns, &render_gtf_attributes(&ids, transcript))?;
                    summary.lines += 1;
                }
            }
        }
    }

    Ok(summary)
}

/// Computes CDS segments with proper phase information.
///
/// Takes half-open coding intervals sorted by start and returns
/// `(start, end, phase)` tuples, where phase counts the bases to skip before
/// the next codon, walking in transcription order.
///
/// # Examples
///
/// ```ignore
/// use annoset::strand::Strand;
///
/// let coding_exons = vec![(100, 106), (200, 209)]; // 6 + 9 = 15 bases
/// let segments = compute_cds_segments(&coding_exons, Strand::Forward);
/// assert_eq!(segments, vec![(100, 106, 0), (200, 209, 0)]);
/// ```
fn compute_cds_segments(coding_exons: &[(u64, u64)], strand: Strand) -> Vec<(u64, u64, u8)> {
    if coding_exons.is_empty() {
        return Vec::new();
    }

    let mut segments: Vec<(u64, u64)> = coding_exons.to_vec();
    if matches!(strand, Strand::Reverse) {
        segments.reverse();
    }

    let mut results: Vec<(u64, u64, u8)> = Vec::with_capacity(segments.len());
    let mut consumed: u64 = 0;
    for (start, end) in segments {
        let len = end.saturating_sub(start);
        let phase = if len == 0 {
            0
        } else {
            ((3 - (consumed % 3)) % 3) as u8
        };
        consumed += len;
        results.push((start, end, phase));
    }

    if matches!(strand, Strand::Reverse) {
        results.reverse();
    }

    results
}

/// Calculates the start codon interval for the given coding exons.
///
/// Returns a half-open 3-base interval at the 5' end of the coding span,
/// or `None` if there's no space for a start codon.
fn start_codon_interval(coding_exons: &[(u64, u64)], strand: Strand) -> Option<(u64, u64)> {
    let (coding_start, coding_end) = coding_span(coding_exons)?;
    match strand {
        Strand::Forward | Strand::Unknown => {
            let end = (coding_start + 3).min(coding_end);
            (coding_start < end).then_some((coding_start, end))
        }
        Strand::Reverse => {
            let start = coding_end.saturating_sub(3).max(coding_start);
            (start < coding_end).then_some((start, coding_end))
        }
    }
}

/// Calculates the stop codon interval for the given coding exons.
///
/// Returns a half-open 3-base interval at the 3' end of the coding span,
/// or `None` if there's no space for a stop codon.
fn stop_codon_interval(coding_exons: &[(u64, u64)], strand: Strand) -> Option<(u64, u64)> {
    let (coding_start, coding_end) = coding_span(coding_exons)?;
    match strand {
        Strand::Forward | Strand::Unknown => {
            let start = coding_end.saturating_sub(3).max(coding_start);
            (start < coding_end).then_some((start, coding_end))
        }
        Strand::Reverse => {
            let end = (coding_start + 3).min(coding_end);
            (coding_start < end).then_some((coding_start, end))
        }
    }
}

/// Returns the overall span of coding exons.
fn coding_span(coding_exons: &[(u64, u64)]) -> Option<(u64, u64)> {
    let first = coding_exons.first()?;
    let last = coding_exons.last()?;
    Some((first.0, last.1))
}

/// Renders `ID=..;Parent=..;key=value` for a node; reserved attributes
/// are never repeated.
fn render_gff_attributes(id: &str, parent: Option<&str>, node: &FeatureNode) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(b"ID=");
    buf.extend_from_slice(id.as_bytes());
    if let Some(parent) = parent {
        buf.extend_from_slice(b";Parent=");
        buf.extend_from_slice(parent.as_bytes());
    }
    for (key, value) in node.free_attributes() {
        buf.push(b';');
        buf.extend_from_slice(key.as_bytes());
        buf.push(b'=');
        buf.extend_from_slice(value.as_bytes());
    }
    buf
}

/// Renders attribute pairs in GTF format.
///
/// GTF format uses: key "value"; key "value";
/// The grouping identifiers come first, then the node's free attributes.
fn render_gtf_attributes(ids: &[(&str, &str)], node: &FeatureNode) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    let free = node
        .free_attributes()
        .filter(|(key, _)| !ids.iter().any(|(id_key, _)| id_key == key));
    for (key, value) in ids.iter().copied().chain(free) {
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(b" \"");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\"; ");
    }
    while buf.last().is_some_and(|b| *b == b' ') {
        buf.pop();
    }
    buf
}

/// Writes a single GTF/GFF feature line.
///
/// Coordinates are 1-based and inclusive, as required by GTF/GFF.
fn write_gxf_feature<W: Write>(
    writer: &mut W,
    columns: &Columns<'_>,
    attrs: &[u8],
) -> WriterResult<()> {
    writer.write_all(columns.seqid.as_bytes())?;
    writer.write_all(b"\t")?;
    writer.write_all(columns.source.as_bytes())?;
    writer.write_all(b"\t")?;
    writer.write_all(columns.feature_type.as_bytes())?;
    writer.write_all(b"\t")?;
    write_u64(writer, columns.start)?;
    writer.write_all(b"\t")?;
    write_u64(writer, columns.end)?;
    writer.write_all(b"\t")?;
    writer.write_all(columns.score.as_bytes())?;
    writer.write_all(b"\t")?;
    writer.write_all(&[strand_byte(columns.strand)])?;
    writer.write_all(b"\t")?;
    writer.write_all(columns.phase.as_bytes())?;
    writer.write_all(b"\t")?;
    writer.write_all(attrs)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Converts a strand to its single-byte representation.
fn strand_byte(strand: Strand) -> u8 {
    match strand {
        Strand::Forward => b'+',
        Strand::Reverse => b'-',
        Strand::Unknown => b'.',
    }
}

/// Writes a u64 value to the writer as decimal text.
///
/// This is a fast implementation that avoids allocations by using
/// a stack buffer and writing digits from right to left.
fn write_u64<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut buf = [0u8; 20];
    let mut idx = buf.len();
    if value == 0 {
        return writer.write_all(b"0");
    }
    while value > 0 {
        idx -= 1;
        buf[idx] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    writer.write_all(&buf[idx..])
}
