//! VCF variants and per-locus heterozygosity.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::reader::{read_all, Input, ReaderError, ReaderResult};

/// Number of fixed VCF columns before `FORMAT`.
pub const VCF_FIXED_FIELDS: usize = 8;

/// Default window used to split contigs into loci.
pub const DEFAULT_HET_WINDOW: u64 = 10_000;

/// The FORMAT fields of one sample at one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Genotype {
    fields: BTreeMap<String, String>,
}

impl Genotype {
    /// Returns a FORMAT field (`GT`, `DP`, ...).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Returns the `GT` field.
    pub fn gt(&self) -> Option<&str> {
        self.get("GT")
    }

    /// Returns `true` if the called alleles of `GT` are not all the same.
    /// Missing alleles (`.`) are ignored.
    pub fn is_heterozygous(&self) -> bool {
        let Some(gt) = self.gt() else {
            return false;
        };
        let mut alleles = gt.split(['/', '|']).filter(|allele| *allele != ".");
        match alleles.next() {
            Some(first) => alleles.any(|allele| allele != first),
            None => false,
        }
    }
}

/// One VCF data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Sequence region.
    pub seqid: String,
    /// 1-based position.
    pub position: u64,
    /// The `ID` column.
    pub id: String,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternate alleles.
    pub alt_alleles: Vec<String>,
    /// The `QUAL` column.
    pub quality: String,
    /// The `FILTER` column.
    pub filter: String,
    /// The `INFO` column.
    pub info: String,
    /// Index of the header block of the file this variant came from.
    pub header_index: usize,
    /// Per-sample FORMAT fields.
    pub genotypes: BTreeMap<String, Genotype>,
}

/// Variants keyed by `(seqid, position)`, in file order.
///
/// A later variant at the same position replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct VariantSet {
    headers: Vec<Vec<String>>,
    samples: Vec<String>,
    variants: Vec<Variant>,
    index: HashMap<(String, u64), usize>,
}

impl VariantSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// `##` header lines, one block per file read.
    pub fn headers(&self) -> &[Vec<String>] {
        &self.headers
    }

    /// Sample names in column order.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Returns the variant at a position.
    pub fn get(&self, seqid: &str, position: u64) -> Option<&Variant> {
        self.index
            .get(&(seqid.to_string(), position))
            .map(|&idx| &self.variants[idx])
    }

    /// Variants in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Returns `true` if the set has no variants.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Adds or replaces a variant.
    pub fn insert(&mut self, variant: Variant) {
        let key = (variant.seqid.clone(), variant.position);
        match self.index.get(&key) {
            Some(&idx) => self.variants[idx] = variant,
            None => {
                self.index.insert(key, self.variants.len());
                self.variants.push(variant);
            }
        }
    }

    fn add_sample(&mut self, name: &str) {
        if !self.samples.iter().any(|sample| sample == name) {
            self.samples.push(name.to_string());
        }
    }

    /// `(seqid, length)` of every `##contig` header carrying both.
    pub fn contigs(&self) -> Vec<(String, u64)> {
        let mut contigs = Vec::new();
        for line in self.headers.iter().flatten() {
            let Some(body) = line
                .strip_prefix("##contig=<")
                .and_then(|rest| rest.strip_suffix('>'))
            else {
                continue;
            };
            let mut seqid = None;
            let mut length = None;
            for pair in body.split(',') {
                match pair.split_once('=') {
                    Some(("ID", value)) => seqid = Some(value.to_string()),
                    Some(("length", value)) => length = value.parse::<u64>().ok(),
                    _ => {}
                }
            }
            if let (Some(seqid), Some(length)) = (seqid, length) {
                contigs.push((seqid, length));
            }
        }
        contigs
    }
}

/// Summary of a [`read_vcf`] call.
#[derive(Debug, Default)]
pub struct VcfSummary {
    /// Variants stored.
    pub variants: usize,
    /// Malformed data lines.
    pub skipped: Vec<ReaderError>,
}

/// Reads a VCF input into `set`.
///
/// Header lines become a new header block; the `#CHROM` line provides the
/// sample names. Data lines with fewer than eight columns, or an
/// unparseable position, are skipped and reported.
///
/// # Example
///
/// ```
/// use annoset::vcf::{read_vcf, VariantSet};
///
/// let vcf = "##fileformat=VCFv4.2\n\
///            #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
///            chr1\t10\trs1\tA\tG,T\t50\tPASS\t.\tGT:DP\t0/1:12\n";
/// let mut set = VariantSet::new();
/// let summary = read_vcf(vcf, &mut set).unwrap();
///
/// assert_eq!(summary.variants, 1);
/// let variant = set.get("chr1", 10).unwrap();
/// assert_eq!(variant.alt_alleles, ["G", "T"]);
/// assert_eq!(variant.genotypes["s1"].get("DP"), Some("12"));
/// ```
pub fn read_vcf<I: Into<Input>>(input: I, set: &mut VariantSet) -> ReaderResult<VcfSummary> {
    let text = read_all(input)?;
    let header_index = set.headers.len();
    let mut header_lines = Vec::new();
    let mut samples: Vec<String> = Vec::new();
    let mut summary = VcfSummary::default();

    for (idx, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("##") {
            header_lines.push(line.to_string());
            continue;
        }
        if let Some(columns) = line.strip_prefix('#') {
            samples = columns
                .split('\t')
                .skip(VCF_FIXED_FIELDS + 1)
                .map(str::to_string)
                .collect();
            for sample in &samples {
                set.add_sample(sample);
            }
            continue;
        }

        match parse_variant(line, idx + 1, header_index, &samples) {
            Ok(variant) => {
                set.insert(variant);
                summary.variants += 1;
            }
            Err(err) => {
                log::warn!("skipping variant: {err}");
                summary.skipped.push(err);
            }
        }
    }

    set.headers.push(header_lines);
    log::debug!(
        "read {} variants for {} samples",
        summary.variants,
        samples.len()
    );
    Ok(summary)
}

fn parse_variant(
    line: &str,
    line_number: usize,
    header_index: usize,
    samples: &[String],
) -> ReaderResult<Variant> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < VCF_FIXED_FIELDS {
        return Err(ReaderError::unexpected_field_count(
            line_number,
            VCF_FIXED_FIELDS,
            fields.len(),
        ));
    }
    let position = fields[1].parse::<u64>().map_err(|_| {
        ReaderError::invalid_field(
            line_number,
            "position",
            format!("ERROR: could not parse '{}' as integer", fields[1]),
        )
    })?;

    let mut genotypes = BTreeMap::new();
    if let Some(format) = fields.get(VCF_FIXED_FIELDS) {
        let keys: Vec<&str> = format.split(':').collect();
        for (sample, raw) in samples.iter().zip(&fields[VCF_FIXED_FIELDS + 1..]) {
            let fields = keys
                .iter()
                .zip(raw.split(':'))
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            genotypes.insert(sample.clone(), Genotype { fields });
        }
    }

    Ok(Variant {
        seqid: fields[0].to_string(),
        position,
        id: fields[2].to_string(),
        ref_allele: fields[3].to_string(),
        alt_alleles: fields[4].split(',').map(str::to_string).collect(),
        quality: fields[5].to_string(),
        filter: fields[6].to_string(),
        info: fields[7].to_string(),
        header_index,
        genotypes,
    })
}

/// A region heterozygosity is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locus {
    /// A whole sequence region: `seqid,length`.
    Whole {
        /// Sequence region.
        seqid: String,
        /// Region length.
        length: u64,
    },
    /// An inclusive window: `seqid,start,end`.
    Region {
        /// Sequence region.
        seqid: String,
        /// 1-based start.
        start: u64,
        /// Inclusive end.
        end: u64,
    },
}

impl Locus {
    /// Sequence region of the locus.
    pub fn seqid(&self) -> &str {
        match self {
            Locus::Whole { seqid, .. } | Locus::Region { seqid, .. } => seqid,
        }
    }

    /// Number of bases covered.
    pub fn len(&self) -> u64 {
        match self {
            Locus::Whole { length, .. } => *length,
            Locus::Region { start, end, .. } => (end + 1).saturating_sub(*start),
        }
    }

    /// Returns `true` if the locus covers no bases.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn covers(&self, seqid: &str, position: u64) -> bool {
        match self {
            Locus::Whole { seqid: own, .. } => own == seqid,
            Locus::Region {
                seqid: own,
                start,
                end,
            } => own == seqid && (*start..=*end).contains(&position),
        }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locus::Whole { seqid, length } => write!(f, "{seqid},{length}"),
            Locus::Region { seqid, start, end } => write!(f, "{seqid},{start},{end}"),
        }
    }
}

impl FromStr for Locus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();
        let number = |raw: &str| {
            raw.parse::<u64>()
                .map_err(|_| format!("could not parse '{raw}' as integer in locus '{s}'"))
        };
        match fields.as_slice() {
            [seqid, length] => Ok(Locus::Whole {
                seqid: seqid.to_string(),
                length: number(length)?,
            }),
            [seqid, start, end] => Ok(Locus::Region {
                seqid: seqid.to_string(),
                start: number(start)?,
                end: number(end)?,
            }),
            _ => Err(format!(
                "locus '{s}' is neither 'seqid,length' nor 'seqid,start,end'"
            )),
        }
    }
}

/// Splits every `##contig` header of `set` into `window`-sized loci; the last
/// locus of a contig holds the remainder.
pub fn contig_windows(set: &VariantSet, window: u64) -> Vec<Locus> {
    let window = window.max(1);
    let mut loci = Vec::new();
    for (seqid, length) in set.contigs() {
        let chunks = length / window;
        for chunk in 0..chunks {
            loci.push(Locus::Region {
                seqid: seqid.clone(),
                start: 1 + window * chunk,
                end: window * (chunk + 1),
            });
        }
        if window * chunks < length {
            loci.push(Locus::Region {
                seqid,
                start: 1 + window * chunks,
                end: length,
            });
        }
    }
    loci
}

/// Heterozygosity of every sample over one locus.
#[derive(Debug, Clone, PartialEq)]
pub struct HetRow {
    /// The locus.
    pub locus: Locus,
    /// Percent of heterozygous sites per base, in [`VariantSet::samples`] order.
    pub rates: Vec<f64>,
}

impl fmt::Display for HetRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locus)?;
        for rate in &self.rates {
            write!(f, ",{rate}")?;
        }
        Ok(())
    }
}

/// Computes `100 * heterozygous sites / locus length` per sample.
///
/// Without `loci`, the `##contig` headers are split into `window`-sized
/// loci. Duplicate loci are counted once and empty loci are left out.
///
/// # Example
///
/// ```
/// use annoset::vcf::{heterozygosity, read_vcf, Locus, VariantSet};
///
/// let vcf = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\n\
///            chr1\t5\t.\tA\tG\t50\tPASS\t.\tGT\t0/1\t1/1\n";
/// let mut set = VariantSet::new();
/// read_vcf(vcf, &mut set).unwrap();
///
/// let loci = vec!["chr1,1,10".parse::<Locus>().unwrap()];
/// let rows = heterozygosity(&set, Some(&loci), 10_000);
/// assert_eq!(rows[0].to_string(), "chr1,1,10,10,0");
/// ```
pub fn heterozygosity(set: &VariantSet, loci: Option<&[Locus]>, window: u64) -> Vec<HetRow> {
    let loci = match loci {
        Some(loci) => loci.to_vec(),
        None => {
            let loci = contig_windows(set, window);
            if loci.is_empty() {
                log::warn!("no loci given and no ##contig headers to derive them from");
            }
            loci
        }
    };

    let mut seen = HashSet::new();
    let loci: Vec<Locus> = loci
        .into_iter()
        .filter(|locus| !locus.is_empty() && seen.insert(locus.clone()))
        .collect();

    let samples = set.samples();
    let mut counts = vec![vec![0u64; samples.len()]; loci.len()];
    {
        let mut by_seqid: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, locus) in loci.iter().enumerate() {
            by_seqid.entry(locus.seqid()).or_default().push(idx);
        }

        for variant in set.iter() {
            let Some(candidates) = by_seqid.get(variant.seqid.as_str()) else {
                continue;
            };
            for &idx in candidates {
                if !loci[idx].covers(&variant.seqid, variant.position) {
                    continue;
                }
                for (sample_idx, sample) in samples.iter().enumerate() {
                    if variant
                        .genotypes
                        .get(sample)
                        .is_some_and(Genotype::is_heterozygous)
                    {
                        counts[idx][sample_idx] += 1;
                    }
                }
            }
        }
    }

    loci.into_iter()
        .zip(counts)
        .map(|(locus, counts)| {
            let length = locus.len() as f64;
            let rates = counts
                .into_iter()
                .map(|count| 100.0 * count as f64 / length)
                .collect();
            HetRow { locus, rates }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VCF: &str = "##fileformat=VCFv4.2\n\
                       ##contig=<ID=chr1,length=25>\n\
                       #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\tB\n\
                       chr1\t3\t.\tA\tG\t50\tPASS\t.\tGT\t0/1\t0/0\n\
                       chr1\t12\t.\tC\tT\t50\tPASS\t.\tGT\t1|0\t./.\n\
                       chr1\t22\t.\tC\tT\t50\tPASS\t.\tGT\t1/1\t0/1\n\
                       chr1\tx\t.\tC\tT\t50\tPASS\t.\tGT\t1/1\t0/1\n";

    fn variants() -> VariantSet {
        let mut set = VariantSet::new();
        let summary = read_vcf(VCF, &mut set).unwrap();
        assert_eq!(summary.variants, 3);
        assert_eq!(summary.skipped.len(), 1);
        set
    }

    #[test]
    fn genotype_calls() {
        let set = variants();
        assert!(set.get("chr1", 3).unwrap().genotypes["A"].is_heterozygous());
        assert!(!set.get("chr1", 12).unwrap().genotypes["B"].is_heterozygous());
        assert!(!set.get("chr1", 22).unwrap().genotypes["A"].is_heterozygous());
    }

    #[test]
    fn contigs_are_split_into_windows() {
        let set = variants();
        let loci = contig_windows(&set, 10);
        let rendered: Vec<String> = loci.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["chr1,1,10", "chr1,11,20", "chr1,21,25"]);
    }

    #[test]
    fn rates_per_window() {
        let set = variants();
        let rows = heterozygosity(&set, None, 10);
        let rendered: Vec<String> = rows.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["chr1,1,10,10,0", "chr1,11,20,10,0", "chr1,21,25,0,20"]);
    }

    #[test]
    fn whole_loci_and_duplicates() {
        let set = variants();
        let loci: Vec<Locus> = ["chr1,100", "chr1,100", "chr2,5"]
            .iter()
            .map(|raw| raw.parse().unwrap())
            .collect();
        let rows = heterozygosity(&set, Some(&loci), DEFAULT_HET_WINDOW);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rates, [2.0, 1.0]);
        assert_eq!(rows[1].rates, [0.0, 0.0]);
    }

    #[test]
    fn malformed_locus() {
        assert!("chr1".parse::<Locus>().is_err());
        assert!("chr1,a,b".parse::<Locus>().is_err());
    }
}
