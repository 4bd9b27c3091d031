//! Nucleotide sequence services: reverse complement, translation, open
//! reading frames and multi-FASTA genomes.

use std::collections::HashMap;

use crate::reader::{read_all, Input, ReaderError, ReaderResult};
use crate::strand::Strand;

/// Returns the reverse complement of `seq`.
///
/// Case and gaps (`-`) are preserved; `n`/`N` stay as is and any other
/// symbol becomes `n`.
///
/// # Example
///
/// ```
/// use annoset::sequence::reverse_complement;
///
/// assert_eq!(reverse_complement("AtgC-N"), "N-GcaT");
/// ```
pub fn reverse_complement(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|base| match base {
            b'a' => 't',
            b't' => 'a',
            b'g' => 'c',
            b'c' => 'g',
            b'A' => 'T',
            b'T' => 'A',
            b'G' => 'C',
            b'C' => 'G',
            b'N' => 'N',
            b'-' => '-',
            _ => 'n',
        })
        .collect()
}

/// Translates one codon with the standard genetic code. Stops are `*`,
/// unknown codons are `X`.
pub fn translate_codon(codon: &[u8]) -> u8 {
    let [a, b, c] = match codon {
        [a, b, c] => [
            a.to_ascii_uppercase(),
            b.to_ascii_uppercase(),
            c.to_ascii_uppercase(),
        ],
        _ => return b'X',
    };
    let c = if c == b'U' { b'T' } else { c };
    let b = if b == b'U' { b'T' } else { b };
    let a = if a == b'U' { b'T' } else { a };

    match (a, b, c) {
        (b'T', b'T', b'T' | b'C') => b'F',
        (b'T', b'T', b'A' | b'G') => b'L',
        (b'C', b'T', b'T' | b'C' | b'A' | b'G') => b'L',
        (b'A', b'T', b'T' | b'C' | b'A') => b'I',
        (b'A', b'T', b'G') => b'M',
        (b'G', b'T', b'T' | b'C' | b'A' | b'G') => b'V',
        (b'T', b'C', b'T' | b'C' | b'A' | b'G') => b'S',
        (b'C', b'C', b'T' | b'C' | b'A' | b'G') => b'P',
        (b'A', b'C', b'T' | b'C' | b'A' | b'G') => b'T',
        (b'G', b'C', b'T' | b'C' | b'A' | b'G') => b'A',
        (b'T', b'A', b'T' | b'C') => b'Y',
        (b'T', b'A', b'A' | b'G') => b'*',
        (b'C', b'A', b'T' | b'C') => b'H',
        (b'C', b'A', b'A' | b'G') => b'Q',
        (b'A', b'A', b'T' | b'C') => b'N',
        (b'A', b'A', b'A' | b'G') => b'K',
        (b'G', b'A', b'T' | b'C') => b'D',
        (b'G', b'A', b'A' | b'G') => b'E',
        (b'T', b'G', b'T' | b'C') => b'C',
        (b'T', b'G', b'A') => b'*',
        (b'T', b'G', b'G') => b'W',
        (b'C', b'G', b'T' | b'C' | b'A' | b'G') => b'R',
        (b'A', b'G', b'T' | b'C') => b'S',
        (b'A', b'G', b'A' | b'G') => b'R',
        (b'G', b'G', b'T' | b'C' | b'A' | b'G') => b'G',
        _ => b'X',
    }
}

/// Translates `seq` starting at `frame` (0, 1 or 2) on the given strand.
///
/// Reverse-strand translation reads the reverse complement. A trailing
/// partial codon is dropped; sequences shorter than `frame + 3` translate to
/// an empty string. With `trim_x`, a leading `X` is removed.
///
/// # Example
///
/// ```
/// use annoset::sequence::translate;
/// use annoset::strand::Strand;
///
/// assert_eq!(translate("ATGGCCTAA", 0, Strand::Forward, false), "MA*");
/// assert_eq!(translate("TTAGGCCAT", 0, Strand::Reverse, false), "MA*");
/// ```
pub fn translate(seq: &str, frame: usize, strand: Strand, trim_x: bool) -> String {
    let oriented;
    let bytes = if strand.is_reverse() {
        oriented = reverse_complement(seq);
        oriented.as_bytes()
    } else {
        seq.as_bytes()
    };

    if bytes.len() < frame + 3 {
        return String::new();
    }

    let mut protein: String = bytes[frame..]
        .chunks_exact(3)
        .map(|codon| translate_codon(codon) as char)
        .collect();
    if trim_x && protein.starts_with('X') {
        protein.remove(0);
    }
    protein
}

/// Open reading frame search options.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrfOptions {
    from_atg: bool,
}

impl OrfOptions {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only report frames from their first methionine on.
    pub fn from_atg(mut self, yes: bool) -> Self {
        self.from_atg = yes;
        self
    }
}

/// Returns the stop-free peptides of all six frames of `seq`.
///
/// Frames are visited 0, 1, 2 on the reverse strand, then on the forward
/// strand; each translation is split at stop codons. With
/// [`OrfOptions::from_atg`], every peptide is cut to start at its first `M`
/// and peptides without one are dropped.
pub fn orfs(seq: &str, options: OrfOptions) -> Vec<String> {
    let mut peptides = Vec::new();
    for frame in 0..3 {
        for strand in [Strand::Reverse, Strand::Forward] {
            let protein = translate(seq, frame, strand, false);
            for chunk in protein.split('*') {
                if options.from_atg {
                    if let Some(start) = chunk.find('M') {
                        peptides.push(chunk[start..].to_string());
                    }
                } else if !chunk.is_empty() {
                    peptides.push(chunk.to_string());
                }
            }
        }
    }
    peptides
}

/// Returns the longest peptide reported by [`orfs`]; ties keep the first.
///
/// # Example
///
/// ```
/// use annoset::sequence::{longest_orf, OrfOptions};
///
/// let orf = longest_orf("CCATGAAATTTGGGTAA", OrfOptions::new().from_atg(true));
/// assert_eq!(orf.as_deref(), Some("MKFG"));
/// ```
pub fn longest_orf(seq: &str, options: OrfOptions) -> Option<String> {
    orfs(seq, options)
        .into_iter()
        .fold(None, |best: Option<String>, peptide| match best {
            Some(current) if current.len() >= peptide.len() => Some(current),
            _ => Some(peptide),
        })
}

/// The sequences of a genome, keyed by sequence region and kept in FASTA
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenomeSequence {
    records: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl GenomeSequence {
    /// Creates an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses multi-FASTA text. The whole header line (without `>`) is the
    /// sequence region name; sequence lines are concatenated.
    ///
    /// Text before the first header is ignored.
    pub fn from_fasta_str(text: &str) -> Self {
        let mut genome = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if let Some(header) = line.strip_prefix('>') {
                if let Some((seqid, seq)) = current.take() {
                    genome.insert(seqid, seq);
                }
                current = Some((header.trim_end().to_string(), String::new()));
            } else if let Some((_, seq)) = current.as_mut() {
                seq.push_str(line.trim());
            }
        }
        if let Some((seqid, seq)) = current {
            genome.insert(seqid, seq);
        }
        genome
    }

    /// Reads a multi-FASTA input (path, stream or text).
    pub fn read_fasta<I: Into<Input>>(input: I) -> ReaderResult<Self> {
        let genome = Self::from_fasta_str(&read_all(input)?);
        log::debug!("read {} sequence regions", genome.len());
        Ok(genome)
    }

    /// Adds or replaces a sequence region.
    pub fn insert(&mut self, seqid: impl Into<String>, seq: impl Into<String>) {
        let seqid = seqid.into();
        let seq = seq.into();
        match self.index.get(&seqid) {
            Some(&idx) => self.records[idx].1 = seq,
            None => {
                self.index.insert(seqid.clone(), self.records.len());
                self.records.push((seqid, seq));
            }
        }
    }

    /// Returns the sequence of a region.
    pub fn get(&self, seqid: &str) -> Option<&str> {
        self.index
            .get(seqid)
            .map(|&idx| self.records[idx].1.as_str())
    }

    /// Returns `true` if the region exists.
    pub fn contains(&self, seqid: &str) -> bool {
        self.index.contains_key(seqid)
    }

    /// Region names in FASTA order.
    pub fn seqids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(seqid, _)| seqid.as_str())
    }

    /// `(seqid, sequence)` pairs in FASTA order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records
            .iter()
            .map(|(seqid, seq)| (seqid.as_str(), seq.as_str()))
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no regions.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders the genome as FASTA, one sequence line per region. With
    /// `remove_spaces`, headers are cut at their first whitespace.
    pub fn to_fasta(&self, remove_spaces: bool) -> String {
        let mut out = String::new();
        for (seqid, seq) in &self.records {
            let header = if remove_spaces {
                seqid.split_whitespace().next().unwrap_or(seqid)
            } else {
                seqid
            };
            out.push('>');
            out.push_str(header);
            out.push('\n');
            out.push_str(seq);
            out.push('\n');
        }
        out
    }
}

/// Converts FASTA to two-column `header<TAB>sequence` lines.
///
/// # Example
///
/// ```
/// use annoset::sequence::fasta_to_tab;
///
/// let tab = fasta_to_tab(">a\nAC\nGT\n>b\nTT\n").unwrap();
/// assert_eq!(tab, "a\tACGT\nb\tTT\n");
/// ```
pub fn fasta_to_tab<I: Into<Input>>(input: I) -> ReaderResult<String> {
    let text = read_all(input)?;
    if let Some((idx, _)) = text
        .lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .filter(|(_, line)| !line.starts_with('>'))
    {
        return Err(ReaderError::invalid_field(
            idx + 1,
            "header",
            "ERROR: sequence found before the first FASTA header".to_string(),
        ));
    }

    let mut out = String::new();
    for (seqid, seq) in GenomeSequence::from_fasta_str(&text).iter() {
        out.push_str(seqid);
        out.push('\t');
        out.push_str(seq);
        out.push('\n');
    }
    Ok(out)
}

/// Converts two-column `id<TAB>sequence` lines to FASTA.
///
/// # Example
///
/// ```
/// use annoset::sequence::tab_to_fasta;
///
/// assert_eq!(tab_to_fasta("a\tACGT\n").unwrap(), ">a\nACGT\n");
/// assert!(tab_to_fasta("no tab here\n").is_err());
/// ```
pub fn tab_to_fasta<I: Into<Input>>(input: I) -> ReaderResult<String> {
    let text = read_all(input)?;
    let mut out = String::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(id), Some(seq)) = (fields.next(), fields.next()) else {
            return Err(ReaderError::unexpected_field_count(idx + 1, 2, 1));
        };
        out.push('>');
        out.push_str(id);
        out.push('\n');
        out.push_str(seq);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_symbols_complement_to_n() {
        assert_eq!(reverse_complement("ACRT"), "AnGT");
    }

    #[test]
    fn frames_shift_the_reading_start() {
        assert_eq!(translate("AATGGCC", 1, Strand::Forward, false), "MA");
        assert_eq!(translate("AATG", 2, Strand::Forward, false), "");
    }

    #[test]
    fn leading_unknown_codon_is_trimmed() {
        assert_eq!(translate("NNNATG", 0, Strand::Forward, true), "M");
        assert_eq!(translate("NNNATG", 0, Strand::Forward, false), "XM");
    }

    #[test]
    fn orfs_from_atg_drop_peptides_without_methionine() {
        let peptides = orfs("ATGAAATAAGGG", OrfOptions::new().from_atg(true));
        assert!(peptides.iter().all(|p| p.starts_with('M')));
        assert!(peptides.contains(&"MK".to_string()));
    }

    #[test]
    fn fasta_keeps_full_headers_and_order() {
        let genome = GenomeSequence::from_fasta_str(">chr2 second\nAC\nGT\n>chr1\nTTT\n");
        assert_eq!(genome.seqids().collect::<Vec<_>>(), ["chr2 second", "chr1"]);
        assert_eq!(genome.get("chr2 second"), Some("ACGT"));
        assert_eq!(genome.to_fasta(true), ">chr2\nACGT\n>chr1\nTTT\n");
    }

    #[test]
    fn sequence_before_header_is_rejected() {
        let err = fasta_to_tab("ACGT\n>a\nAC\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }
}
