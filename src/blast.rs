//! Tabular (comma-separated, `-outfmt 10`) BLAST hits as `match`/`match_part`
//! alignments.
//!
//! Every hit becomes a leaf named after its query, placed under a synthesized
//! `<query>-match` parent. The columns used are:
//!
//! | column | meaning            | stored as          |
//! |--------|--------------------|--------------------|
//! | 1      | query identifier   | leaf identifier    |
//! | 2      | subject identifier | sequence region    |
//! | 9, 10  | subject start/end  | coordinates/strand |
//! | 11     | e-value            | `evalue` attribute |
//! | 12     | bit score          | `score` attribute  |

use std::collections::HashMap;
use std::io::BufRead;

use crate::hierarchy::{FeatureRecord, Hierarchy, IngestOptions, IngestReport, Ingestion};
use crate::reader::{open_or_wrap, Input, ReaderError, ReaderResult, RecordLines};
use crate::store::AnnotationSet;
use crate::strand::Strand;

/// Number of columns of a BLAST tabular record.
pub const BLAST_FIELD_COUNT: usize = 12;

/// Configuration options for BLAST ingestion.
///
/// # Example
///
/// ```
/// use annoset::blast::BlastOptions;
///
/// let options = BlastOptions::new()
///     .source("blastn")
///     .sequence_regions(vec!["scaffold_1 length=1200".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct BlastOptions {
    hierarchy: Hierarchy,
    source: String,
    sequence_regions: Option<Vec<String>>,
}

impl Default for BlastOptions {
    fn default() -> Self {
        Self {
            hierarchy: Hierarchy::matches(),
            source: "blast".to_string(),
            sequence_regions: None,
        }
    }
}

impl BlastOptions {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the `match_part -> match` hierarchy.
    pub fn hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Sets the `source` attribute stored on every hit.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Full sequence region names to match truncated subject identifiers
    /// against (BLAST keeps only the first word of a FASTA header).
    pub fn sequence_regions(mut self, regions: Vec<String>) -> Self {
        self.sequence_regions = Some(regions);
        self
    }
}

/// Returns the full sequence region name whose first word is `truncated`.
pub fn find_truncated_locname<'a>(truncated: &str, regions: &'a [String]) -> Option<&'a str> {
    regions
        .iter()
        .map(String::as_str)
        .find(|region| region.split_whitespace().next() == Some(truncated))
}

/// Per-call state: query identifier counters.
struct BlastIngestion<'o> {
    options: &'o BlastOptions,
    counters: HashMap<String, usize>,
}

impl<'o> BlastIngestion<'o> {
    /// Picks a free identifier for a hit on `query`: the query itself, then
    /// `query-1`, `query-2`, ...
    fn hit_id(&mut self, set: &AnnotationSet, query: &str) -> String {
        if !set.contains(query) && !self.counters.contains_key(query) {
            self.counters.insert(query.to_string(), 1);
            return query.to_string();
        }
        let counter = self.counters.entry(query.to_string()).or_insert(1);
        loop {
            let candidate = format!("{query}-{counter}");
            *counter += 1;
            if !set.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn record(&mut self, set: &AnnotationSet, line: &str, line_number: usize) -> ReaderResult<FeatureRecord> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < BLAST_FIELD_COUNT {
            return Err(ReaderError::unexpected_field_count(
                line_number,
                BLAST_FIELD_COUNT,
                fields.len(),
            ));
        }

        let start = parse_position(fields[8], "sstart", line_number)?;
        let end = parse_position(fields[9], "send", line_number)?;
        let strand = if start < end {
            Strand::Forward
        } else {
            Strand::Reverse
        };

        let seqid = match &self.options.sequence_regions {
            Some(regions) => find_truncated_locname(fields[1], regions).unwrap_or(fields[1]),
            None => fields[1],
        };

        let leaf_type = self
            .options
            .hierarchy
            .leaves()
            .first()
            .map(String::as_str)
            .unwrap_or("match_part");
        let id = self.hit_id(set, fields[0]);

        let mut record = FeatureRecord::new(line_number, seqid, leaf_type, start, end);
        record.strand = strand;
        record.parent = Some(format!("{id}-match"));
        record.id = Some(id);
        record
            .attributes
            .insert("source".to_string(), self.options.source.clone());
        record
            .attributes
            .insert("evalue".to_string(), fields[10].to_string());
        record
            .attributes
            .insert("score".to_string(), fields[11].to_string());
        Ok(record)
    }
}

fn parse_position(raw: &str, field: &'static str, line: usize) -> ReaderResult<u64> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ReaderError::invalid_field(
            line,
            field,
            "ERROR: subject positions are 1-based, got 0".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(_) => Err(ReaderError::invalid_field(
            line,
            field,
            format!("ERROR: could not parse '{raw}' as integer"),
        )),
    }
}

/// Ingests a BLAST CSV stream into `set`.
pub(crate) fn ingest_blast<R: BufRead>(
    set: &mut AnnotationSet,
    reader: R,
    options: &BlastOptions,
) -> ReaderResult<IngestReport> {
    let ingest = IngestOptions::empty().hierarchy(options.hierarchy.clone());
    let mut state = BlastIngestion {
        options,
        counters: HashMap::new(),
    };
    let mut ingestion = Ingestion::new(set, &ingest);
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

        match state.record(ingestion.set(), trimmed, line_number) {
            Ok(record) => ingestion.push(record)?,
            Err(err) => ingestion.skip(err)?,
        }
    }

    ingestion.finish()
}

impl AnnotationSet {
    /// Adds the hits of a BLAST CSV input to the store.
    ///
    /// # Example
    ///
    /// ```
    /// use annoset::blast::BlastOptions;
    /// use annoset::store::AnnotationSet;
    ///
    /// let csv = "q1,chr2,98.5,200,3,0,1,200,1500,1301,1e-50,350\n";
    /// let mut set = AnnotationSet::new();
    /// set.read_blast_csv(csv, &BlastOptions::new()).unwrap();
    ///
    /// let hit = set.lookup("q1").unwrap();
    /// assert_eq!(hit.base_coords(), Some((1301, 1500)));
    /// assert_eq!(hit.parent(), Some("q1-match"));
    /// ```
    pub fn read_blast_csv<I: Into<Input>>(
        &mut self,
        input: I,
        options: &BlastOptions,
    ) -> ReaderResult<IngestReport> {
        let stream = open_or_wrap(input)?;
        ingest_blast(self, stream, options)
    }
}

/// Reads a BLAST CSV input into a new store.
pub fn read_blast_csv<I: Into<Input>>(
    input: I,
    options: &BlastOptions,
) -> ReaderResult<(AnnotationSet, IngestReport)> {
    let mut set = AnnotationSet::new();
    let report = set.read_blast_csv(input, options)?;
    Ok((set, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HITS: &str = "q1,chr1,99.0,100,1,0,1,100,1000,1099,1e-40,180\n\
                        q1,chr1,97.0,100,3,0,1,100,5099,5000,1e-30,150\n\
                        q2,chr2,90.0,50,5,0,1,50,10,59,1e-5,60\n";

    #[test]
    fn repeated_queries_are_numbered() {
        let mut set = AnnotationSet::new();
        let report = set.read_blast_csv(HITS, &BlastOptions::new()).unwrap();

        assert_eq!(report.records, 3);
        assert!(report.unresolved.is_empty());
        assert!(set.contains_in("match_part", "q1"));
        assert!(set.contains_in("match_part", "q1-1"));
        assert!(set.contains_in("match", "q1-match"));
        assert!(set.contains_in("match", "q1-1-match"));

        let reverse = set.lookup("q1-1").unwrap();
        assert_eq!(reverse.strand(), Strand::Reverse);
        assert_eq!(reverse.base_coords(), Some((5000, 5099)));
        assert_eq!(reverse.attribute("evalue"), Some("1e-30"));
        assert_eq!(reverse.attribute("score"), Some("150"));
    }

    #[test]
    fn short_lines_are_skipped() {
        let mut set = AnnotationSet::new();
        let report = set
            .read_blast_csv("q1,chr1,99.0\n", &BlastOptions::new())
            .unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn truncated_subjects_resolve_to_full_names() {
        let regions = vec!["chr1 assembled".to_string(), "chr2".to_string()];
        assert_eq!(find_truncated_locname("chr1", &regions), Some("chr1 assembled"));
        assert_eq!(find_truncated_locname("chr3", &regions), None);
    }
}
