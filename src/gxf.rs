use std::{
    fmt,
    io::{BufRead, Cursor},
};

use memchr::memchr;

use crate::{
    feature::Attributes,
    hierarchy::{FeatureRecord, IngestOptions, IngestReport, Ingestion, Level},
    reader::{
        open_or_wrap_with, read_all, Input, ReaderError, ReaderOptions, ReaderResult,
        RecordLines,
    },
    store::AnnotationSet,
    strand::Strand,
};

/// Marker type for GTF inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gtf;

/// Marker type for GFF3 inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gff;

/// Describes the attribute column of a GXF-like format.
///
/// This trait is implemented by the built-in GXF format types (`Gtf`, `Gff`)
/// and drives both attribute parsing and attribute rendering.
pub trait GxfFormat {
    /// Separator used between keys and values within the attribute column.
    const ATTR_SEPARATOR: u8;
    /// Human readable format name (for error messages).
    const TYPE_NAME: &'static str;
}

impl GxfFormat for Gtf {
    const ATTR_SEPARATOR: u8 = b' ';
    const TYPE_NAME: &'static str = "GTF";
}

impl GxfFormat for Gff {
    const ATTR_SEPARATOR: u8 = b'=';
    const TYPE_NAME: &'static str = "GFF";
}

/// Number of tab-separated columns of a GFF3/GTF record.
pub const GXF_FIELD_COUNT: usize = 9;

/// Configuration options for GTF ingestion.
///
/// GTF records are grouped through attributes rather than `ID`/`Parent`
/// pairs. Leaf records take their identifier from `id_attribute` when set,
/// otherwise `transcript_id-type-start`, otherwise `seqid-type-start`.
/// Transcript and gene records take theirs from the parent and gene
/// attributes.
///
/// # Example
///
/// ```
/// use annoset::gxf::GtfOptions;
///
/// let options = GtfOptions::new()
///     .id_attribute("exon_id")
///     .parent_attribute("transcript_id");
/// ```
#[derive(Debug, Clone)]
pub struct GtfOptions {
    id_attribute: Option<String>,
    parent_attribute: String,
    gene_attribute: String,
    ingest: IngestOptions,
}

impl Default for GtfOptions {
    fn default() -> Self {
        Self {
            id_attribute: None,
            parent_attribute: "transcript_id".to_string(),
            gene_attribute: "gene_id".to_string(),
            ingest: IngestOptions::gtf(),
        }
    }
}

impl GtfOptions {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads leaf identifiers from this attribute.
    pub fn id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(attribute.into());
        self
    }

    /// Overrides the attribute naming the transcript (`transcript_id`).
    pub fn parent_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.parent_attribute = attribute.into();
        self
    }

    /// Overrides the attribute naming the gene (`gene_id`).
    pub fn gene_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.gene_attribute = attribute.into();
        self
    }

    /// Replaces the hierarchy configuration.
    pub fn ingest(mut self, ingest: IngestOptions) -> Self {
        self.ingest = ingest;
        self
    }
}

/// The nine columns of a GXF line, borrowed from the input.
#[derive(Debug, Clone)]
struct GxfRecord<'a> {
    seqid: &'a str,
    source: &'a str,
    feature: &'a str,
    start: u64,
    end: u64,
    score: &'a str,
    strand: Strand,
    phase: &'a str,
    attributes: Vec<(String, String)>,
}

impl<'a> GxfRecord<'a> {
    /// Parses a single line of a GXF file into a `GxfRecord`.
    ///
    /// # Arguments
    ///
    /// * `line` - The raw line, without its terminator.
    /// * `line_number` - The 1-based line number for error reporting.
    fn parse<F: GxfFormat>(line: &'a str, line_number: usize) -> ReaderResult<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != GXF_FIELD_COUNT {
            return Err(ReaderError::unexpected_field_count(
                line_number,
                GXF_FIELD_COUNT,
                fields.len(),
            ));
        }

        let start = parse_coordinate(fields[3], "start", line_number)?;
        let end = parse_coordinate(fields[4], "end", line_number)?;
        let strand = Strand::parse(fields[6], line_number)?;
        let attributes = match fields[8].trim() {
            "" | "." => Vec::new(),
            raw => parse_attributes(raw, F::ATTR_SEPARATOR).map_err(|err| {
                ReaderError::invalid_field(line_number, "attributes", err.to_string())
            })?,
        };

        Ok(Self {
            seqid: fields[0],
            source: fields[1],
            feature: fields[2],
            start,
            end,
            score: fields[5],
            strand,
            phase: fields[7],
            attributes,
        })
    }

    /// Starts a [`FeatureRecord`] carrying the column values every format keeps.
    fn feature_record(&self, line_number: usize) -> FeatureRecord {
        let mut record =
            FeatureRecord::new(line_number, self.seqid, self.feature, self.start, self.end);
        record.strand = self.strand;
        record
            .attributes
            .insert("source".to_string(), self.source.to_string());
        record
            .attributes
            .insert("score".to_string(), self.score.to_string());
        if self.phase != "." {
            record
                .attributes
                .insert("phase".to_string(), self.phase.to_string());
        }
        record
    }
}

/// Parses a 1-based coordinate column.
fn parse_coordinate(raw: &str, field: &'static str, line: usize) -> ReaderResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ReaderError::invalid_field(
            line,
            field,
            "ERROR: coordinates are 1-based, got 0".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(_) => Err(ReaderError::invalid_field(
            line,
            field,
            format!("ERROR: could not parse '{}' as integer", raw),
        )),
    }
}

/// Inserts an attribute, joining repeated keys with commas.
fn push_attribute(attributes: &mut Attributes, key: String, value: String) {
    match attributes.get_mut(&key) {
        Some(existing) => {
            existing.push(',');
            existing.push_str(&value);
        }
        None => {
            attributes.insert(key, value);
        }
    }
}

/// Converts a GFF3 line into a record, pulling out `ID` and `Parent`.
///
/// Only the first of several comma-separated parents is linked.
fn gff3_record(line: &str, line_number: usize) -> ReaderResult<FeatureRecord> {
    let gxf = GxfRecord::parse::<Gff>(line, line_number)?;
    let mut record = gxf.feature_record(line_number);

    for (key, value) in gxf.attributes {
        match key.as_str() {
            "ID" => record.id = Some(value),
            "Parent" => {
                let first = value.split(',').next().unwrap_or_default().to_string();
                record.parent = Some(first);
            }
            _ => push_attribute(&mut record.attributes, key, value),
        }
    }

    Ok(record)
}

/// Returns `true` when the annotation section of a GFF3 file is over.
fn is_fasta_section(line: &str) -> bool {
    line.starts_with("##FASTA") || line.starts_with('>')
}

/// Ingests a GFF3 stream into `set`.
///
/// Malformed lines are collected in the report and skipped; reading stops at
/// a `##FASTA` directive or the first FASTA header.
pub(crate) fn ingest_gff3<R: BufRead>(
    set: &mut AnnotationSet,
    reader: R,
    options: &IngestOptions,
) -> ReaderResult<IngestReport> {
    let mut ingestion = Ingestion::new(set, options);
    let mut lines = RecordLines::new(reader);

    while let Some((line_number, line)) = lines.next_line()? {
        let trimmed = match line {
            Ok(text) => text,
            Err(err) => {
                ingestion.skip(err)?;
                continue;
            }
        };
        if is_fasta_section(trimmed) {
            log::debug!("annotation section ends at line {line_number}");
            break;
        }
        if crate::reader::should_skip(trimmed) {
            continue;
        }

        match gff3_record(trimmed, line_number) {
            Ok(record) => ingestion.push(record)?,
            Err(err) => ingestion.skip(err)?,
        }
    }

    ingestion.finish()
}

/// Resolves the identifier, parent and ancestor names of a GTF line.
fn gtf_record(
    line: &str,
    line_number: usize,
    options: &GtfOptions,
) -> ReaderResult<FeatureRecord> {
    let gxf = GxfRecord::parse::<Gtf>(line, line_number)?;
    let mut record = gxf.feature_record(line_number);
    for (key, value) in gxf.attributes {
        push_attribute(&mut record.attributes, key, value);
    }

    let transcript = record.attributes.get(&options.parent_attribute).cloned();
    let gene = record.attributes.get(&options.gene_attribute).cloned();
    let feature_type = options.ingest.replaced(gxf.feature).to_string();

    let depth = match options.ingest.classify(&feature_type) {
        Level::Parent { .. } => options.ingest.parent_depth(&feature_type),
        _ => None,
    };

    match depth {
        Some(0) if transcript.is_some() => {
            record.id = transcript;
            record.parent = gene;
        }
        Some(1) if gene.is_some() => {
            record.id = gene;
        }
        _ => {
            let explicit = options
                .id_attribute
                .as_ref()
                .and_then(|attribute| record.attributes.get(attribute))
                .cloned();
            record.id = Some(match (explicit, &transcript) {
                (Some(id), _) => id,
                (None, Some(transcript)) => format!("{transcript}-{feature_type}-{}", gxf.start),
                (None, None) => format!("{}-{feature_type}-{}", gxf.seqid, gxf.start),
            });
            if let (Some(transcript), Some(gene)) = (&transcript, &gene) {
                record.ancestors = Some(vec![transcript.clone(), gene.clone()]);
            }
            record.parent = transcript.or(gene);
        }
    }

    Ok(record)
}

/// Ingests a GTF stream into `set`.
pub(crate) fn ingest_gtf<R: BufRead>(
    set: &mut AnnotationSet,
    reader: R,
    options: &GtfOptions,
) -> ReaderResult<IngestReport> {
    let mut ingestion = Ingestion::new(set, &options.ingest);
    let mut lines = RecordLines::new(reader);

    while let Some((line_number, line)) = lines.next_line()? {
        let trimmed = match line {
            Ok(text) => text,
            Err(err) => {
                ingestion.skip(err)?;
                continue;
            }
        };
        if crate::reader::should_skip(trimmed) {
            continue;
        }

        match gtf_record(trimmed, line_number, options) {
            Ok(record) => ingestion.push(record)?,
            Err(err) => ingestion.skip(err)?,
        }
    }

    ingestion.finish()
}

/// Rewrites CEGMA output into GFF3: exon classes become `CDS` and bare KOG
/// identifiers in the attribute column become `Parent` references.
pub fn cegma_to_gff3(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for line in text.lines() {
        if crate::reader::should_skip(line) {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let parent = line
            .split('\t')
            .nth(8)
            .map(str::trim)
            .filter(|attributes| !attributes.is_empty() && !attributes.contains('='))
            .map(|kog| format!("Parent={kog}"));

        let mut fields: Vec<&str> = line.split('\t').collect();
        if let Some(feature) = fields.get_mut(2) {
            if matches!(*feature, "First" | "Internal" | "Terminal" | "Single") {
                *feature = "CDS";
            }
        }
        if let (Some(attributes), Some(parent)) = (fields.get_mut(8), parent.as_deref()) {
            *attributes = parent;
        }
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
    out
}

impl AnnotationSet {
    /// Adds the records of a GFF3 input to the store.
    ///
    /// The input is a path when one exists, literal content otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// use annoset::hierarchy::IngestOptions;
    /// use annoset::store::AnnotationSet;
    ///
    /// let gff = "chr1\tsrc\tgene\t1\t90\t.\t+\t.\tID=g1\n\
    ///            chr1\tsrc\tmRNA\t1\t90\t.\t+\t.\tID=t1;Parent=g1\n\
    ///            chr1\tsrc\tCDS\t10\t90\t.\t+\t0\tID=c1;Parent=t1\n";
    ///
    /// let mut set = AnnotationSet::new();
    /// let report = set.read_gff3(gff, &IngestOptions::gff3()).unwrap();
    /// assert!(report.is_clean());
    /// assert_eq!(set.coords("g1"), Some((10, 90)));
    /// ```
    pub fn read_gff3<I: Into<Input>>(
        &mut self,
        input: I,
        options: &IngestOptions,
    ) -> ReaderResult<IngestReport> {
        self.read_gff3_with(input, options, &ReaderOptions::default())
    }

    /// Like [`AnnotationSet::read_gff3`], with explicit reader options.
    pub fn read_gff3_with<I: Into<Input>>(
        &mut self,
        input: I,
        options: &IngestOptions,
        reader: &ReaderOptions,
    ) -> ReaderResult<IngestReport> {
        let stream = open_or_wrap_with(input, reader)?;
        ingest_gff3(self, stream, options)
    }

    /// Adds the records of a GTF input to the store.
    pub fn read_gtf<I: Into<Input>>(
        &mut self,
        input: I,
        options: &GtfOptions,
    ) -> ReaderResult<IngestReport> {
        self.read_gtf_with(input, options, &ReaderOptions::default())
    }

    /// Like [`AnnotationSet::read_gtf`], with explicit reader options.
    pub fn read_gtf_with<I: Into<Input>>(
        &mut self,
        input: I,
        options: &GtfOptions,
        reader: &ReaderOptions,
    ) -> ReaderResult<IngestReport> {
        let stream = open_or_wrap_with(input, reader)?;
        ingest_gtf(self, stream, options)
    }

    /// Adds the gene models of a CEGMA GFF output to the store.
    pub fn read_cegma_gff<I: Into<Input>>(
        &mut self,
        input: I,
        options: &IngestOptions,
    ) -> ReaderResult<IngestReport> {
        let text = cegma_to_gff3(&read_all(input)?);
        ingest_gff3(self, Cursor::new(text), options)
    }
}

/// Reads a GFF3 input into a new store.
pub fn read_gff3<I: Into<Input>>(
    input: I,
    options: &IngestOptions,
) -> ReaderResult<(AnnotationSet, IngestReport)> {
    let mut set = AnnotationSet::new();
    let report = set.read_gff3(input, options)?;
    Ok((set, report))
}

/// Reads a GTF input into a new store.
pub fn read_gtf<I: Into<Input>>(
    input: I,
    options: &GtfOptions,
) -> ReaderResult<(AnnotationSet, IngestReport)> {
    let mut set = AnnotationSet::new();
    let report = set.read_gtf(input, options)?;
    Ok((set, report))
}

/// Reads a CEGMA GFF output into a new store.
pub fn read_cegma_gff<I: Into<Input>>(
    input: I,
    options: &IngestOptions,
) -> ReaderResult<(AnnotationSet, IngestReport)> {
    let mut set = AnnotationSet::new();
    let report = set.read_cegma_gff(input, options)?;
    Ok((set, report))
}

/// Fast attribute parser that extracts key/value pairs in column order.
///
/// Handles both attribute separators (space for GTF, '=' for GFF), quoted
/// values and flag attributes without a value.
///
/// # Examples
///
/// ```
/// use annoset::gxf::parse_attributes;
///
/// let gtf = parse_attributes("gene_id \"ENSG00000223972\"; gene_name \"DDX11L1\";", b' ').unwrap();
/// assert_eq!(gtf[0], ("gene_id".to_string(), "ENSG00000223972".to_string()));
///
/// let gff = parse_attributes("ID=tx1;Name=Example;", b'=').unwrap();
/// assert_eq!(gff[1], ("Name".to_string(), "Example".to_string()));
/// ```
pub fn parse_attributes(line: &str, sep: u8) -> Result<Vec<(String, String)>, ParseError> {
    let bytes = line.as_bytes();
    let mut trimmed_len = bytes.len();
    while trimmed_len > 0 && matches!(bytes[trimmed_len - 1], b' ' | b'\t' | b'\n' | b'\r') {
        trimmed_len -= 1;
    }
    if trimmed_len == 0 {
        return Err(ParseError::Empty);
    }

    let mut attributes = Vec::with_capacity(8);
    let mut pos = 0usize;

    while pos < trimmed_len {
        while pos < trimmed_len && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b';') {
            pos += 1;
        }
        if pos >= trimmed_len {
            break;
        }
        let key_start = pos;
        let field_end = memchr(b';', &bytes[pos..trimmed_len])
            .map(|semi| pos + semi)
            .unwrap_or(trimmed_len);
        let key_end = match memchr(sep, &bytes[pos..field_end]) {
            Some(sep_pos) => pos + sep_pos,
            None => {
                // flag attribute
                let key = line[key_start..field_end].trim_end();
                if !key.is_empty() {
                    attributes.push((key.to_string(), String::new()));
                }
                pos = field_end + 1;
                continue;
            }
        };
        let key = line[key_start..key_end].trim_end().to_string();
        pos = key_end + 1;
        while pos < trimmed_len && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= trimmed_len {
            attributes.push((key, String::new()));
            break;
        }

        let value;
        if bytes[pos] == b'"' {
            pos += 1;
            match memchr(b'"', &bytes[pos..trimmed_len]) {
                Some(close) => {
                    value = line[pos..pos + close].to_string();
                    pos += close + 1;
                }
                None => {
                    value = line[pos..trimmed_len].to_string();
                    pos = trimmed_len;
                }
            }
        } else {
            match memchr(b';', &bytes[pos..trimmed_len]) {
                Some(semi) => {
                    value = line[pos..pos + semi].trim_end().to_string();
                    pos += semi;
                }
                None => {
                    value = line[pos..trimmed_len].to_string();
                    pos = trimmed_len;
                }
            }
        }
        attributes.push((key, value));

        match memchr(b';', &bytes[pos..trimmed_len]) {
            Some(semi) => pos += semi + 1,
            None => break,
        }
    }

    Ok(attributes)
}

/// Attribute parser error kinds.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Indicates that the attribute string was empty.
    Empty,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "ERROR: empty attribute field"),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_gtf_attributes() {
        let raw = "gene_id \"ENSG00000223972\"; gene_name \"DDX11L1\"; tag \"basic\"; tag \"appris\"";
        let attrs = parse_attributes(raw, b' ').unwrap();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0], ("gene_id".into(), "ENSG00000223972".into()));
        assert_eq!(attrs[1], ("gene_name".into(), "DDX11L1".into()));
        assert_eq!(attrs[3], ("tag".into(), "appris".into()));
    }

    #[test]
    fn parse_gff_attributes() {
        let raw = "ID=tx1;Name=Example;biotype=protein_coding";
        let attrs = parse_attributes(raw, b'=').unwrap();
        assert_eq!(attrs[0], ("ID".into(), "tx1".into()));
        assert_eq!(attrs[1], ("Name".into(), "Example".into()));
        assert_eq!(attrs[2], ("biotype".into(), "protein_coding".into()));
    }

    #[test]
    fn parse_flag_attribute() {
        let attrs = parse_attributes("ID=a;partial;Note=x", b'=').unwrap();
        assert_eq!(attrs[1], ("partial".into(), String::new()));
        assert_eq!(attrs[2], ("Note".into(), "x".into()));
    }

    #[test]
    fn parse_empty_attributes() {
        assert_eq!(parse_attributes("", b' '), Err(ParseError::Empty));
    }

    #[test]
    fn gff3_record_keeps_columns_as_attributes() {
        let record = gff3_record(
            "chr1\tmaker\tCDS\t10\t20\t0.5\t-\t2\tID=c1;Parent=t1,t2;Note=x",
            3,
        )
        .unwrap();
        assert_eq!(record.id.as_deref(), Some("c1"));
        assert_eq!(record.parent.as_deref(), Some("t1"));
        assert_eq!(record.strand, Strand::Reverse);
        assert_eq!(record.attributes["source"], "maker");
        assert_eq!(record.attributes["score"], "0.5");
        assert_eq!(record.attributes["phase"], "2");
        assert_eq!(record.attributes["Note"], "x");
    }

    #[test]
    fn gff3_record_requires_nine_columns() {
        let err = gff3_record("chr1\tsrc\tgene\t1\t10", 5).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::UnexpectedFieldCount {
                line: 5,
                expected: 9,
                actual: 5
            }
        ));
    }

    #[test]
    fn gtf_leaf_ids_derive_from_transcript() {
        let options = GtfOptions::new();
        let record = gtf_record(
            "chr1\tsrc\tCDS\t100\t200\t.\t+\t0\tgene_id \"g1\"; transcript_id \"t1\";",
            1,
            &options,
        )
        .unwrap();
        assert_eq!(record.id.as_deref(), Some("t1-CDS-100"));
        assert_eq!(record.parent.as_deref(), Some("t1"));
        assert_eq!(record.ancestors, Some(vec!["t1".to_string(), "g1".to_string()]));

        let transcript = gtf_record(
            "chr1\tsrc\ttranscript\t100\t200\t.\t+\t.\tgene_id \"g1\"; transcript_id \"t1\";",
            2,
            &options,
        )
        .unwrap();
        assert_eq!(transcript.id.as_deref(), Some("t1"));
        assert_eq!(transcript.parent.as_deref(), Some("g1"));
    }

    #[test]
    fn cegma_lines_are_rewritten() {
        let text = "scaf1\tcegma\tFirst\t10\t50\t12.1\t+\t0\tKOG0001.1\n";
        let gff = cegma_to_gff3(text);
        assert_eq!(
            gff,
            "scaf1\tcegma\tCDS\t10\t50\t12.1\t+\t0\tParent=KOG0001.1\n"
        );
    }
}
