//! Exonerate alignments (VULGAR lines) as `match`/`match_part` features.

use std::collections::HashMap;
use std::io::Cursor;

use crate::gxf::ingest_gff3;
use crate::hierarchy::{IngestOptions, IngestReport};
use crate::reader::{read_all, Input, ReaderError, ReaderResult};
use crate::store::AnnotationSet;

/// Number of header tokens before the VULGAR triplets.
const VULGAR_HEADER_TOKENS: usize = 9;

const QUERY_HEADER: &str = "         Query: ";
const TARGET_HEADER: &str = "        Target: ";
const VULGAR_PREFIX: &str = "vulgar: ";

/// Converts one tokenized VULGAR alignment into GFF3 lines.
///
/// The tokens are `query qstart qend qstrand target tstart tend tstrand score`
/// followed by `(operation, query length, target length)` triplets. The first
/// line is the `feature_types[0]` alignment named `query-against-target`;
/// every run of `M`, `S`, `G` and `F` operations becomes a `feature_types[1]`
/// part. Any other operation (introns, splice sites, frameshift gaps) ends
/// the current part.
///
/// Target positions walk forward on `+` targets and backward on `-` targets.
///
/// # Example
///
/// ```
/// use annoset::exonerate::vulgar_to_gff;
///
/// let tokens: Vec<&str> = "prot1 0 10 + chr1 100 130 + 50 M 10 30".split_whitespace().collect();
/// let gff = vulgar_to_gff(&tokens, ["match", "match_part"], "exonerate", 1).unwrap();
/// let lines: Vec<&str> = gff.lines().collect();
///
/// assert_eq!(lines.len(), 2);
/// assert!(lines[1].starts_with("chr1\texonerate\tmatch_part\t101\t130\t"));
/// ```
pub fn vulgar_to_gff(
    tokens: &[&str],
    feature_types: [&str; 2],
    source: &str,
    line: usize,
) -> ReaderResult<String> {
    if tokens.len() < VULGAR_HEADER_TOKENS {
        return Err(ReaderError::unexpected_field_count(
            line,
            VULGAR_HEADER_TOKENS,
            tokens.len(),
        ));
    }

    let name = format!("{}-against-{}", tokens[0], tokens[4]);
    let target = tokens[4];
    let target_start = parse_position(tokens[5], "tstart", line)?;
    let target_end = parse_position(tokens[6], "tend", line)?;
    let strand = tokens[7];
    let score = tokens[8];
    let reverse = strand == "-";

    let (mut position, end) = if reverse {
        (target_start, target_end + 1)
    } else {
        (target_start + 1, target_end)
    };

    let [match_type, part_type] = feature_types;
    let mut lines = vec![format!(
        "{target}\t{source}\t{match_type}\t{position}\t{end}\t{score}\t{strand}\t.\tID={name}"
    )];

    let mut part: Option<(i64, i64)> = None;
    let mut part_number = 1usize;
    let mut flush = |span: (i64, i64), lines: &mut Vec<String>| {
        lines.push(format!(
            "{target}\t{source}\t{part_type}\t{}\t{}\t.\t{strand}\t.\tID={name}_{part_type}{part_number};Parent={name}",
            span.0, span.1
        ));
        part_number += 1;
    };

    for triplet in tokens[VULGAR_HEADER_TOKENS..].chunks(3) {
        let operation = triplet[0];
        if matches!(operation, "M" | "S" | "G" | "F") {
            if part.is_none() {
                part = Some((position, position));
            }
        } else if let Some(span) = part.take() {
            flush(span, &mut lines);
        }

        let Some(raw_length) = triplet.get(2) else {
            break;
        };
        let length = parse_position(raw_length, "target length", line)?;
        position += if reverse { -length } else { length };

        if let Some((lo, hi)) = part.as_mut() {
            let reached = if reverse { position + 1 } else { position - 1 };
            *lo = (*lo).min(reached);
            *hi = (*hi).max(reached);
        }
    }
    if let Some(span) = part {
        flush(span, &mut lines);
    }

    Ok(lines.join("\n"))
}

fn parse_position(raw: &str, field: &'static str, line: usize) -> ReaderResult<i64> {
    raw.parse::<i64>().map_err(|_| {
        ReaderError::invalid_field(
            line,
            field,
            format!("ERROR: could not parse '{raw}' as integer"),
        )
    })
}

/// Converts an Exonerate report into GFF3.
///
/// Query and target names come from the alignment headers when present, so
/// that names truncated in the VULGAR line are restored. Repeated
/// query/target pairs get a counter appended to the query name.
pub(crate) fn exonerate_to_gff3(text: &str) -> (String, Vec<ReaderError>) {
    let mut query = String::new();
    let mut target = String::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut lines = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if let Some(rest) = line.strip_prefix(QUERY_HEADER) {
            query = rest.trim_end().to_string();
        } else if let Some(rest) = line.strip_prefix(TARGET_HEADER) {
            target = rest
                .replace(":[revcomp]", "")
                .replace("[revcomp]", "")
                .trim_end()
                .to_string();
        } else if let Some(rest) = line.strip_prefix(VULGAR_PREFIX) {
            let mut tokens: Vec<&str> = rest.split_whitespace().collect();
            if tokens.len() >= VULGAR_HEADER_TOKENS {
                if !query.is_empty() {
                    tokens[0] = &query;
                }
                if !target.is_empty() {
                    tokens[4] = &target;
                }
            }

            let renamed;
            let pair = tokens.first().copied().zip(tokens.get(4).copied());
            if let Some((q, t)) = pair {
                let key = format!("{q}-against-{t}");
                match seen.get_mut(&key) {
                    Some(counter) => {
                        renamed = format!("{q}{counter}");
                        *counter += 1;
                        tokens[0] = &renamed;
                    }
                    None => {
                        seen.insert(key, 1);
                    }
                }
            }

            match vulgar_to_gff(&tokens, ["match", "match_part"], "exonerate", idx + 1) {
                Ok(gff) => lines.push(gff),
                Err(err) => errors.push(err),
            }
        }
    }

    (lines.join("\n"), errors)
}

impl AnnotationSet {
    /// Adds the alignments of an Exonerate report (run with `--showvulgar`)
    /// to the store.
    pub fn read_exonerate<I: Into<Input>>(&mut self, input: I) -> ReaderResult<IngestReport> {
        let text = read_all(input)?;
        let (gff, errors) = exonerate_to_gff3(&text);
        let mut report = ingest_gff3(self, Cursor::new(gff), &IngestOptions::gff3())?;
        for err in errors {
            log::warn!("skipping alignment: {err}");
            report.skipped.push(err);
        }
        Ok(report)
    }
}

/// Reads an Exonerate report into a new store.
pub fn read_exonerate<I: Into<Input>>(input: I) -> ReaderResult<(AnnotationSet, IngestReport)> {
    let mut set = AnnotationSet::new();
    let report = set.read_exonerate(input)?;
    Ok((set, report))
}
