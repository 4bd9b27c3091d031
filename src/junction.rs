//! STAR `SJ.out.tab` splice junctions as two-part `match` features.

use std::io::Cursor;

use crate::gxf::ingest_gff3;
use crate::hierarchy::{IngestOptions, IngestReport};
use crate::reader::{read_all, Input, ReaderError, ReaderResult};
use crate::store::AnnotationSet;

/// Minimum number of columns read from a junction line.
pub const JUNCTION_FIELD_COUNT: usize = 7;

/// Length of the flanks drawn on each side of the intron.
pub const JUNCTION_FLANK: u64 = 20;

/// Converts STAR junctions into GFF3 lines.
///
/// Junction `n` becomes a `StarAlignment_n` match spanning two 20 bp parts
/// that flank the intron. STAR strand codes `0`, `1` and `2` map to `.`, `+`
/// and `-`; column 7 (uniquely mapping reads) is the score. Malformed lines
/// are returned as errors next to the converted ones.
///
/// # Example
///
/// ```
/// use annoset::junction::star_junctions_to_gff;
///
/// let (gff, errors) = star_junctions_to_gff("chr1\t1000\t1500\t1\t1\t0\t12\t0\t30\n");
/// assert!(errors.is_empty());
/// assert!(gff.starts_with("chr1\tstar\tmatch\t979\t1521\t12\t+\t.\tID=StarAlignment_1"));
/// ```
pub fn star_junctions_to_gff(text: &str) -> (String, Vec<ReaderError>) {
    let mut lines = Vec::new();
    let mut errors = Vec::new();
    let mut counter = 1usize;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match junction_lines(line, idx + 1, counter) {
            Ok(gff) => {
                lines.extend(gff);
                counter += 1;
            }
            Err(err) => errors.push(err),
        }
    }

    (lines.join("\n"), errors)
}

fn junction_lines(line: &str, line_number: usize, counter: usize) -> ReaderResult<[String; 3]> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < JUNCTION_FIELD_COUNT {
        return Err(ReaderError::unexpected_field_count(
            line_number,
            JUNCTION_FIELD_COUNT,
            fields.len(),
        ));
    }

    let intron_start = parse_column(fields[1], "intron start", line_number)?;
    let intron_end = parse_column(fields[2], "intron end", line_number)?;
    let strand = match fields[3] {
        "0" => ".",
        "1" => "+",
        "2" => "-",
        other => {
            return Err(ReaderError::invalid_field(
                line_number,
                "strand",
                format!("ERROR: expected STAR strand code 0, 1 or 2, got '{other}'"),
            ))
        }
    };

    let seqid = fields[0];
    let score = fields[6];
    let id = format!("StarAlignment_{counter}");
    let stop1 = intron_start.saturating_sub(1).max(1);
    let start1 = stop1.saturating_sub(JUNCTION_FLANK).max(1);
    let start2 = intron_end + 1;
    let stop2 = start2 + JUNCTION_FLANK;

    Ok([
        format!("{seqid}\tstar\tmatch\t{start1}\t{stop2}\t{score}\t{strand}\t.\tID={id}"),
        format!(
            "{seqid}\tstar\tmatch_part\t{start1}\t{stop1}\t{score}\t{strand}\t.\tID={id}-part1;Parent={id}"
        ),
        format!(
            "{seqid}\tstar\tmatch_part\t{start2}\t{stop2}\t{score}\t{strand}\t.\tID={id}-part2;Parent={id}"
        ),
    ])
}

fn parse_column(raw: &str, field: &'static str, line: usize) -> ReaderResult<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        ReaderError::invalid_field(
            line,
            field,
            format!("ERROR: could not parse '{raw}' as integer"),
        )
    })
}

impl AnnotationSet {
    /// Adds STAR splice junctions to the store as `match`/`match_part` features.
    pub fn read_star_junctions<I: Into<Input>>(&mut self, input: I) -> ReaderResult<IngestReport> {
        let (gff, errors) = star_junctions_to_gff(&read_all(input)?);
        let mut report = ingest_gff3(self, Cursor::new(gff), &IngestOptions::gff3())?;
        for err in errors {
            log::warn!("skipping junction: {err}");
            report.skipped.push(err);
        }
        Ok(report)
    }
}
