use std::io::Write;

use annoset::sequence::{
    fasta_to_tab, longest_orf, reverse_complement, tab_to_fasta, translate, GenomeSequence,
    OrfOptions,
};
use annoset::vcf::{heterozygosity, read_vcf, VariantSet};
use annoset::{Genome, GenomeError, IngestOptions, SeqType, Strand};

const GENOME: &str = ">chr1 primary assembly\n\
                      ATGAAACCCGGGTTTTAA\n\
                      CCCCCCCCCC\n\
                      >chr2\n\
                      TTACGCCAT\n";

#[test]
fn reverse_complement_is_an_involution() {
    for seq in ["", "A", "ACGTACGT", "acgtNN-", "GATTACA", "nNAcGt"] {
        assert_eq!(reverse_complement(&reverse_complement(seq)), seq);
    }
}

#[test]
fn translation_length_is_a_third_of_the_sequence() {
    let seq = "ATGAAACCCGGGTTTTAACCCCCCCCCC";
    for frame in 0..3 {
        for strand in [Strand::Forward, Strand::Reverse] {
            let protein = translate(seq, frame, strand, false);
            assert_eq!(protein.len(), (seq.len() - frame) / 3);
        }
    }
    assert_eq!(translate(seq, 0, Strand::Forward, false), "MKPGF*PPP");
}

#[test]
fn longest_orf_spans_both_strands() {
    let forward = longest_orf("ATGAAACCCTAA", OrfOptions::new().from_atg(true));
    assert_eq!(forward.as_deref(), Some("MKP"));

    let reverse = longest_orf(&reverse_complement("ATGAAACCCTAA"), OrfOptions::new().from_atg(true));
    assert_eq!(reverse.as_deref(), Some("MKP"));
}

#[test]
fn fasta_tab_round_trip() {
    let tab = fasta_to_tab(GENOME).unwrap();
    assert_eq!(
        tab,
        "chr1 primary assembly\tATGAAACCCGGGTTTTAACCCCCCCCCC\nchr2\tTTACGCCAT\n"
    );
    let fasta = tab_to_fasta(tab.as_str()).unwrap();
    assert_eq!(
        fasta,
        ">chr1 primary assembly\nATGAAACCCGGGTTTTAACCCCCCCCCC\n>chr2\nTTACGCCAT\n"
    );
}

#[test]
fn genome_fasta_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(GENOME.as_bytes()).unwrap();

    let genome = Genome::from_fasta(file.path()).unwrap();
    assert_eq!(genome.sequence().map(GenomeSequence::len), Some(2));
    assert_eq!(
        genome.genome_fasta(true).unwrap(),
        ">chr1\nATGAAACCCGGGTTTTAACCCCCCCCCC\n>chr2\nTTACGCCAT\n"
    );
    assert_eq!(genome.scaffold_fasta("chr2").unwrap(), ">chr2\nTTACGCCAT\n");
    assert!(matches!(
        genome.scaffold_fasta("chr3"),
        Err(GenomeError::UnknownRegion(_))
    ));
}

#[test]
fn transcript_sequences_and_proteins() {
    let mut genome = Genome::new().with_sequence(GenomeSequence::from_fasta_str(
        ">chr1\nATGAAACCCGGGTTTTAACCCCCCCCCC\n>chr2\nTTACGCCAT\n",
    ));
    let gff = "chr1\tsrc\tCDS\t1\t6\t.\t+\t0\tID=a1;Parent=tA\n\
               chr1\tsrc\tCDS\t13\t18\t.\t+\t0\tID=a2;Parent=tA\n\
               chr2\tsrc\tCDS\t1\t9\t.\t-\t0\tID=b1;Parent=tB\n";
    genome.read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert_eq!(genome.feature_sequence("tA-transcript").unwrap(), "ATGAAATTTTAA");
    assert_eq!(
        genome.feature_fasta("tA", SeqType::Protein, false).unwrap(),
        ">tA-transcript\nMKF*\n"
    );
    assert_eq!(
        genome.annotation_fasta("transcript", SeqType::Nucleotide, false).unwrap(),
        ">tA-transcript\nATGAAATTTTAA\n>tB-transcript\nATGGCGTAA\n"
    );
}

#[test]
fn apollo_bundles_round_trip() {
    let mut genome = Genome::new().with_sequence(GenomeSequence::from_fasta_str(
        ">chr1\nATGAAACCCGGGTTTTAACCCCCCCCCC\n>chr2\nTTACGCCAT\n",
    ));
    genome
        .read_gff3(
            "chr1\tsrc\tCDS\t1\t6\t.\t+\t0\tID=a1;Parent=tA\n",
            &IngestOptions::gff3(),
        )
        .unwrap();

    let bundles = genome.write_apollo_gff_all(false).unwrap();
    assert_eq!(bundles.len(), 2);
    assert_eq!(bundles[1], ("chr2".to_string(), "##FASTA\n>chr2\nTTACGCCAT\n".to_string()));

    let (chr1, report) = Genome::from_apollo_gff(bundles[0].1.as_str()).unwrap();
    assert!(report.is_clean());
    assert_eq!(chr1.feature_sequence("a1").unwrap(), "ATGAAA");
    assert_eq!(chr1.seqids(true), ["chr1"]);
}

#[test]
fn heterozygosity_from_a_vcf_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "##contig=<ID=chr1,length=20>\n\
         #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
         chr1\t4\t.\tA\tG\t50\tPASS\t.\tGT\t0/1\n\
         chr1\t15\t.\tA\tG\t50\tPASS\t.\tGT\t1/1\n"
    )
    .unwrap();

    let mut genome = Genome::new();
    let summary = genome.read_vcf(file.path()).unwrap();
    assert_eq!(summary.variants, 2);

    let mut set = VariantSet::new();
    read_vcf(file.path(), &mut set).unwrap();
    let rows: Vec<String> = heterozygosity(&set, None, 10)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(rows, ["chr1,1,10,10", "chr1,11,20,0"]);
}
