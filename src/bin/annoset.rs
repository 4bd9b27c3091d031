use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use annoset::blast::BlastOptions;
use annoset::genome::{Genome, SeqType};
use annoset::gxf::{Gff, Gtf, GtfOptions};
use annoset::hierarchy::{IngestOptions, IngestReport};
use annoset::reader::read_all;
use annoset::sequence::{fasta_to_tab, longest_orf, orfs, tab_to_fasta, GenomeSequence, OrfOptions};
use annoset::store::AnnotationSet;
use annoset::vcf::{heterozygosity, read_vcf, Locus, VariantSet, DEFAULT_HET_WINDOW};
use annoset::writer::{GtfFeature, Writer, WriterOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn, Level};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    name = "annoset",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, default_value = "info", help = "Log level")]
    level: Level,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild long-form (Apollo) GFF3 from annotations.
    Longform {
        #[clap(flatten)]
        input: AnnotationArgs,
        #[arg(long, help = "Write UTR features next to the merged exons")]
        keep_utr: bool,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Write annotations as GTF.
    Gtf {
        #[clap(flatten)]
        input: AnnotationArgs,
        #[arg(long, help = "Write UTR features")]
        keep_utr: bool,
        #[arg(long, help = "Write merged exons instead of CDS")]
        exon: bool,
        #[arg(long, help = "Write start and stop codon features")]
        codons: bool,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Write one GFF3+FASTA bundle per sequence region.
    Apollo {
        #[arg(long, required = true, help = "Genome FASTA")]
        genome: PathBuf,
        #[clap(flatten)]
        input: AnnotationArgs,
        #[arg(long, help = "Leave the FASTA section out")]
        suppress_fasta: bool,
        #[arg(short, long, required = true, help = "Output directory")]
        outdir: PathBuf,
    },
    /// Extract feature sequences as FASTA.
    Extract {
        #[arg(long, required = true, help = "Genome FASTA")]
        genome: PathBuf,
        #[clap(flatten)]
        input: AnnotationArgs,
        #[arg(short = 't', long, default_value = "transcript", help = "Feature type to extract")]
        feature_type: String,
        #[arg(long, default_value = "nucleotide", help = "nucleotide or protein")]
        seq_type: String,
        #[arg(long, help = "Keep only the longest record per feature")]
        longest: bool,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Convert FASTA to two-column tab.
    Fasta2tab {
        input: PathBuf,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Convert two-column tab to FASTA.
    Tab2fasta {
        input: PathBuf,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Translate the open reading frames of every sequence.
    Orfs {
        input: PathBuf,
        #[arg(long, help = "Start peptides at their first methionine")]
        from_atg: bool,
        #[arg(long, help = "Report only the longest peptide per sequence")]
        longest: bool,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    /// Heterozygosity per locus and sample from a VCF.
    Het {
        input: PathBuf,
        #[arg(long, help = "File with one 'seqid,length' or 'seqid,start,end' locus per line")]
        loci: Option<PathBuf>,
        #[arg(short, long, default_value_t = DEFAULT_HET_WINDOW, help = "Window size for ##contig loci")]
        window: u64,
        #[arg(short, long, help = "Output path (stdout when omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum InputFormat {
    Gff3,
    Gtf,
    Cegma,
    Blast,
    Exonerate,
    Star,
}

#[derive(Args, Debug)]
struct AnnotationArgs {
    #[arg(required = true, help = "Annotation input")]
    annotations: PathBuf,
    #[arg(short, long, value_enum, default_value_t = InputFormat::Gff3, help = "Input format")]
    format: InputFormat,
}

impl AnnotationArgs {
    fn read_into(&self, genome: &mut Genome) -> CliResult<()> {
        let path = self.annotations.as_path();
        let report = match self.format {
            InputFormat::Gff3 => genome.read_gff3(path, &IngestOptions::gff3())?,
            InputFormat::Gtf => genome.read_gtf(path, &GtfOptions::new())?,
            InputFormat::Cegma => genome.read_cegma_gff(path, &IngestOptions::gff3())?,
            InputFormat::Blast => {
                let find_truncated = genome.sequence().is_some();
                genome.read_blast_csv(path, &BlastOptions::new(), find_truncated)?
            }
            InputFormat::Exonerate => genome.read_exonerate(path)?,
            InputFormat::Star => genome.read_star_junctions(path)?,
        };
        log_report(path, &report);
        Ok(())
    }

    fn read(&self) -> CliResult<AnnotationSet> {
        let mut genome = Genome::new();
        self.read_into(&mut genome)?;
        Ok(genome.annotations().cloned().unwrap_or_default())
    }
}

fn log_report(path: &Path, report: &IngestReport) {
    info!(
        "read {} records from {} ({} synthesized, {} renamed)",
        report.records,
        path.display(),
        report.synthesized,
        report.renamed.len()
    );
    if !report.is_clean() {
        warn!(
            "{} records skipped and {} references unresolved",
            report.skipped.len(),
            report.unresolved.len()
        );
    }
}

fn emit(output: Option<&Path>, text: &str) -> CliResult<()> {
    match output {
        Some(path) => fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    simple_logger::init_with_level(cli.level)?;

    match cli.command {
        Command::Longform {
            input,
            keep_utr,
            output,
        } => {
            let set = input.read()?;
            let options = WriterOptions::new().keep_utr_features(keep_utr);
            let summary = match output {
                Some(path) => Writer::<Gff>::to_path(&path, &set, &options)?,
                None => Writer::<Gff>::from_set(&set, &options, &mut io::stdout().lock())?,
            };
            info!("wrote {} lines", summary.lines);
        }
        Command::Gtf {
            input,
            keep_utr,
            exon,
            codons,
            output,
        } => {
            let set = input.read()?;
            let feature = if exon { GtfFeature::Exon } else { GtfFeature::Cds };
            let options = WriterOptions::new()
                .keep_utr_features(keep_utr)
                .gtf_feature(feature)
                .codons(codons);
            let summary = match output {
                Some(path) => Writer::<Gtf>::to_path(&path, &set, &options)?,
                None => Writer::<Gtf>::from_set(&set, &options, &mut io::stdout().lock())?,
            };
            info!("wrote {} lines", summary.lines);
        }
        Command::Apollo {
            genome,
            input,
            suppress_fasta,
            outdir,
        } => {
            let mut genome = Genome::from_fasta(genome.as_path())?;
            input.read_into(&mut genome)?;
            fs::create_dir_all(&outdir)?;
            for (seqid, bundle) in genome.write_apollo_gff_all(suppress_fasta)? {
                let name = seqid.split_whitespace().next().unwrap_or(&seqid);
                fs::write(outdir.join(format!("{name}.gff3")), bundle)?;
            }
        }
        Command::Extract {
            genome,
            input,
            feature_type,
            seq_type,
            longest,
            output,
        } => {
            let seq_type: SeqType = seq_type.parse()?;
            let mut genome = Genome::from_fasta(genome.as_path())?;
            input.read_into(&mut genome)?;
            let fasta = genome.annotation_fasta(&feature_type, seq_type, longest)?;
            emit(output.as_deref(), &fasta)?;
        }
        Command::Fasta2tab { input, output } => {
            emit(output.as_deref(), &fasta_to_tab(input.as_path())?)?;
        }
        Command::Tab2fasta { input, output } => {
            emit(output.as_deref(), &tab_to_fasta(input.as_path())?)?;
        }
        Command::Orfs {
            input,
            from_atg,
            longest,
            output,
        } => {
            let sequences = GenomeSequence::read_fasta(input.as_path())?;
            let options = OrfOptions::new().from_atg(from_atg);
            let mut out = String::new();
            for (seqid, seq) in sequences.iter() {
                let peptides = if longest {
                    longest_orf(seq, options).into_iter().collect()
                } else {
                    orfs(seq, options)
                };
                for (idx, peptide) in peptides.iter().enumerate() {
                    out.push_str(&format!(">{seqid}_orf{}\n{peptide}\n", idx + 1));
                }
            }
            emit(output.as_deref(), &out)?;
        }
        Command::Het {
            input,
            loci,
            window,
            output,
        } => {
            let mut set = VariantSet::new();
            let summary = read_vcf(input.as_path(), &mut set)?;
            info!("read {} variants", summary.variants);

            let loci = match loci {
                Some(path) => Some(
                    read_all(path.as_path())?
                        .lines()
                        .filter(|line| !line.trim().is_empty())
                        .map(str::parse::<Locus>)
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                None => None,
            };

            let mut out = String::from("locus");
            for sample in set.samples() {
                out.push(',');
                out.push_str(sample);
            }
            out.push('\n');
            for row in heterozygosity(&set, loci.as_deref(), window) {
                out.push_str(&row.to_string());
                out.push('\n');
            }
            emit(output.as_deref(), &out)?;
        }
    }

    Ok(())
}
