//! # annoset
//!
//! A genome annotation model for Rust: reads GFF3, GTF and alignment outputs
//! into one typed feature store, infers the missing parts of gene and match
//! hierarchies, and writes the store back as the long-form GFF3 genome
//! browsers such as Apollo import.
//!
//! ## Overview
//!
//! Every feature is either a **base** feature (it owns coordinates, like a
//! `CDS` or a `match_part`) or a **parent** feature (it owns an ordered list of
//! children and derives its span from them, like a `transcript` or a `gene`).
//! Features live in an [`AnnotationSet`], grouped by type and reachable by
//! identifier.
//!
//! Ingestion is driven by [`Hierarchy`] definitions. The default GFF3 setup
//! knows two of them:
//!
//! - `[CDS, UTR] -> transcript -> gene` (with `mRNA` read as `transcript` and
//!   `five_prime_UTR`/`three_prime_UTR` read as `UTR`)
//! - `match_part -> match`
//!
//! Records without an `ID` get one derived from their parent, duplicated
//! identifiers are renamed, and leaves whose parents never appear get their
//! whole ancestor chain synthesized.
//!
//! ## Features
//!
//! - **Many inputs:** GFF3, GTF, CEGMA GFF, BLAST `-outfmt 10`, Exonerate
//!   VULGAR reports, STAR splice junctions and VCF
//! - **Hierarchy inference:** generated identifiers, collision renaming,
//!   deferred parent linking and parent-chain synthesis
//! - **Long-form GFF3 and GTF writers:** abutting leaves merged into exons,
//!   optional UTR and start/stop codon features
//! - **Sequence services:** feature FASTA extraction, translation, open
//!   reading frames, Apollo GFF3+FASTA bundles
//! - **Compression Support:** gzip, zstd and bzip2 inputs behind features
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! annoset = "0.1"
//!
//! # Optional features
//! annoset = { version = "0.1", features = ["compression", "mmap", "rayon"] }
//! ```
//!
//! ## Basic Usage
//!
//! ### Reading GFF3
//!
//! ```rust
//! use annoset::{read_gff3, IngestOptions};
//!
//! let gff = "chr1\tsrc\tgene\t1\t300\t.\t+\t.\tID=g1\n\
//!            chr1\tsrc\tmRNA\t1\t300\t.\t+\t.\tID=t1;Parent=g1\n\
//!            chr1\tsrc\tCDS\t1\t100\t.\t+\t0\tID=c1;Parent=t1\n\
//!            chr1\tsrc\tCDS\t201\t300\t.\t+\t2\tID=c2;Parent=t1\n";
//!
//! let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();
//! assert!(report.is_clean());
//! assert_eq!(set.coords("g1"), Some((1, 300)));
//! assert_eq!(set.lookup("t1").unwrap().feature_type(), "transcript");
//! ```
//!
//! ### Orphaned leaves
//!
//! A `CDS` pointing at a parent that never shows up is still placed in a
//! complete gene model:
//!
//! ```rust
//! use annoset::{read_gff3, IngestOptions};
//!
//! let (set, report) = read_gff3(
//!     "chr1\tsrc\tCDS\t10\t90\t.\t+\t0\tID=c1;Parent=geneA\n",
//!     &IngestOptions::gff3(),
//! )
//! .unwrap();
//!
//! assert_eq!(report.synthesized, 2);
//! assert!(set.contains_in("transcript", "geneA-transcript"));
//! assert!(set.contains_in("gene", "geneA"));
//! ```
//!
//! ### Writing long-form GFF3
//!
//! ```rust
//! use annoset::{read_gff3, IngestOptions, Writer, WriterOptions};
//! use annoset::gxf::Gff;
//!
//! let (set, _) = read_gff3(
//!     "chr1\tsrc\tCDS\t100\t150\t.\t+\t0\tID=c1;Parent=t1\n\
//!      chr1\tsrc\tCDS\t151\t200\t.\t+\t0\tID=c2;Parent=t1\n",
//!     &IngestOptions::gff3(),
//! )
//! .unwrap();
//!
//! let (gff, _) = Writer::<Gff>::to_string(&set, &WriterOptions::new()).unwrap();
//! assert_eq!(gff.lines().filter(|line| line.contains("\texon\t")).count(), 1);
//! ```
//!
//! ## Advanced Usage
//!
//! ### Custom hierarchies
//!
//! ```rust
//! use annoset::{Hierarchy, IngestOptions};
//!
//! let options = IngestOptions::gff3()
//!     .hierarchy(Hierarchy::new(["repeat_unit"]).parent("repeat_region"))
//!     .ignore("region");
//! ```
//!
//! ### Other inputs
//!
//! ```rust,no_run
//! use annoset::blast::{read_blast_csv, BlastOptions};
//! use annoset::exonerate::read_exonerate;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (hits, _) = read_blast_csv("data/hits.csv", &BlastOptions::new())?;
//!     let (alignments, _) = read_exonerate("data/exonerate.out")?;
//!     println!("{} hits, {} alignment features", hits.len(), alignments.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Genome sequences
//!
//! ```rust,no_run
//! use annoset::{Genome, IngestOptions, SeqType};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut genome = Genome::from_fasta("data/genome.fa")?;
//!     genome.read_gff3("data/genes.gff3", &IngestOptions::gff3())?;
//!
//!     print!("{}", genome.annotation_fasta("transcript", SeqType::Protein, false)?);
//!     for (seqid, bundle) in genome.write_apollo_gff_all(false)? {
//!         std::fs::write(format!("{seqid}.gff3"), bundle)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Malformed records never abort a file: they are collected, with their line
//! numbers, in [`IngestReport::skipped`], and references that could not be
//! resolved are listed in [`IngestReport::unresolved`]. Only I/O failures and
//! store conflicts surface as `Err`.
//!
//! ## Feature Flags
//!
//! - `compression`: Enable gzip support (adds `flate2` dependency)
//! - `zstd`, `bz2`: Enable zstd and bzip2 inputs
//! - `mmap`: Enable memory-mapped file support (adds `memmap2` dependency)
//! - `rayon`: Write per-region Apollo bundles in parallel (adds `rayon` dependency)
//! - `cli`: Build the `annoset` binary
//!
//! ## License
//!
//! See LICENSE file for details.

#![cfg_attr(doc, warn(missing_docs))]

pub mod blast;
pub mod exonerate;
pub mod feature;
pub mod genome;
pub mod gxf;
pub mod hierarchy;
pub mod junction;
pub mod reader;
pub mod sequence;
pub mod store;
pub mod strand;
pub mod vcf;
pub mod writer;

pub use feature::{Attributes, BaseFeature, FeatureNode, ParentFeature};
pub use genome::{Genome, GenomeError, GenomeResult, SeqType};
pub use gxf::{read_cegma_gff, read_gff3, read_gtf, GtfOptions};
pub use hierarchy::{Hierarchy, IngestOptions, IngestReport, UnresolvedReference};
pub use reader::{Input, ReaderError, ReaderMode, ReaderOptions, ReaderResult};
pub use store::{AnnotationSet, StoreError};
pub use strand::Strand;
pub use writer::{WriteSummary, Writer, WriterError, WriterOptions};
