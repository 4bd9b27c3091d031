use std::io::Write;

use annoset::blast::{read_blast_csv, BlastOptions};
use annoset::exonerate::read_exonerate;
use annoset::hierarchy::UnresolvedReason;
use annoset::{
    read_cegma_gff, read_gff3, read_gtf, AnnotationSet, GtfOptions, IngestOptions, ReaderError,
    Strand,
};

#[test]
fn gene_model_is_read_with_canonical_types() {
    let gff = "##gff-version 3\n\
               chr1\tmaker\tgene\t1\t300\t.\t-\t.\tID=g1;Name=alpha\n\
               chr1\tmaker\tmRNA\t1\t300\t.\t-\t.\tID=t1;Parent=g1\n\
               chr1\tmaker\texon\t1\t300\t.\t-\t.\tID=e1;Parent=t1\n\
               chr1\tmaker\tfive_prime_UTR\t251\t300\t.\t-\t.\tID=u1;Parent=t1\n\
               chr1\tmaker\tCDS\t1\t250\t.\t-\t0\tID=c1;Parent=t1\n";
    let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.records, 4);
    assert_eq!(report.ignored, 1);
    assert!(set.contains_in("transcript", "t1"));
    assert!(set.contains_in("UTR", "u1"));
    assert!(!set.contains("e1"));
    assert_eq!(set.lookup("t1").unwrap().children(), ["u1", "c1"]);
    assert_eq!(set.lookup("g1").unwrap().attribute("Name"), Some("alpha"));
    assert_eq!(set.lookup("c1").unwrap().strand(), Strand::Reverse);
    assert_eq!(set.lookup("c1").unwrap().attribute("phase"), Some("0"));
}

#[test]
fn orphan_cds_gets_a_synthesized_gene_model() {
    let (set, report) = read_gff3(
        "chr1\tsrc\tCDS\t10\t90\t.\t+\t0\tID=c1;Parent=geneA\n",
        &IngestOptions::gff3(),
    )
    .unwrap();

    assert_eq!(report.synthesized, 2);
    assert!(report.unresolved.is_empty());
    let transcript = set.lookup("geneA-transcript").unwrap();
    assert_eq!(transcript.feature_type(), "transcript");
    assert_eq!(transcript.parent(), Some("geneA"));
    assert_eq!(transcript.children(), ["c1"]);
    assert_eq!(set.lookup("geneA").unwrap().children(), ["geneA-transcript"]);
    assert_eq!(set.lookup("c1").unwrap().parent(), Some("geneA-transcript"));
    assert_eq!(set.coords("geneA"), Some((10, 90)));
}

#[test]
fn colliding_identifiers_are_renamed() {
    let gff = "chr1\tsrc\tgene\t1\t50\t.\t+\t.\tID=foo\n\
               chr1\tsrc\tgene\t60\t90\t.\t+\t.\tID=foo\n\
               chr1\tsrc\tgene\t95\t99\t.\t+\t.\tID=foo\n";
    let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert!(set.contains("foo"));
    assert!(set.contains("foo_1"));
    assert!(set.contains("foo_2"));
    assert_eq!(
        report.renamed,
        [
            ("foo".to_string(), "foo_1".to_string()),
            ("foo".to_string(), "foo_2".to_string())
        ]
    );
}

#[test]
fn records_without_ids_are_numbered_per_parent() {
    let gff = "chr1\tsrc\tmRNA\t1\t90\t.\t+\t.\tID=t1;Parent=g1\n\
               chr1\tsrc\tCDS\t1\t30\t.\t+\t0\tParent=t1\n\
               chr1\tsrc\tCDS\t61\t90\t.\t+\t0\tParent=t1\n\
               chr1\tsrc\tgene\t1\t90\t.\t+\t.\tID=g1\n";
    let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert!(report.is_clean());
    assert_eq!(set.lookup("t1").unwrap().children(), ["t1-CDS0", "t1-CDS1"]);
    assert_eq!(set.lookup("g1").unwrap().children(), ["t1"]);
}

#[test]
fn dangling_and_mistyped_references_are_reported() {
    let gff = "chr1\tsrc\tmRNA\t1\t90\t.\t+\t.\tID=t1;Parent=nowhere\n\
               chr1\tsrc\tCDS\t1\t30\t.\t+\t0\tID=c1;Parent=t1\n\
               chr1\tsrc\tCDS\t40\t60\t.\t+\t0\tID=c2;Parent=c1\n";
    let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert!(set.contains("c2"));
    assert!(report
        .unresolved
        .iter()
        .any(|reference| reference.child == "t1" && reference.reason == UnresolvedReason::Missing));
    let conflict = report
        .unresolved
        .iter()
        .find(|reference| reference.parent == "c1")
        .unwrap();
    assert_eq!(
        conflict.reason,
        UnresolvedReason::TypeConflict {
            expected: "gene".to_string(),
            found: "CDS".to_string()
        }
    );
}

#[test]
fn malformed_lines_are_skipped_with_their_line_numbers() {
    let gff = "chr1\tsrc\tgene\t1\t90\t.\t+\t.\tID=g1\n\
               chr1\tsrc\tgene\tone\t90\t.\t+\t.\tID=g2\n\
               chr1\tsrc\tgene\t1\n\
               chr1\tsrc\tgene\t1\t90\t.\t+\t.\tName=nothing\n";
    let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert_eq!(set.len(), 1);
    let lines: Vec<_> = report.skipped.iter().filter_map(|err| err.line()).collect();
    assert_eq!(lines, [2, 3, 4]);
}

#[test]
fn fasta_section_ends_the_annotations() {
    let gff = "chr1\tsrc\tgene\t1\t90\t.\t+\t.\tID=g1\n\
               ##FASTA\n\
               >chr1\n\
               ACGT\n";
    let (set, report) = read_gff3(gff, &IngestOptions::gff3()).unwrap();
    assert!(report.is_clean());
    assert_eq!(set.len(), 1);
}

#[test]
fn alignment_types_are_replaced_by_match() {
    let gff = "chr1\tsrc\tprotein_match\t1\t90\t.\t+\t.\tID=m1\n\
               chr1\tsrc\tmatch_part\t1\t40\t.\t+\t.\tID=p1;Parent=m1\n\
               chr1\tsrc\tmatch_part\t50\t90\t.\t+\t.\tID=p2;Parent=m1\n";
    let (set, _) = read_gff3(gff, &IngestOptions::gff3()).unwrap();

    assert!(set.contains_in("match", "m1"));
    assert_eq!(set.lookup("m1").unwrap().children(), ["p1", "p2"]);
    assert_eq!(set.coords("m1"), Some((1, 90)));
}

#[test]
fn gtf_groups_by_transcript_and_gene() {
    let gtf = "chr1\tsrc\tgene\t1\t300\t.\t+\t.\tgene_id \"G1\";\n\
               chr1\tsrc\ttranscript\t1\t300\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
               chr1\tsrc\texon\t1\t300\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
               chr1\tsrc\tCDS\t10\t120\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\";\n\
               chr1\tsrc\tstart_codon\t10\t12\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\";\n\
               chr1\tsrc\tCDS\t200\t290\t.\t+\t0\tgene_id \"G2\"; transcript_id \"T2\";\n";
    let (set, report) = read_gtf(gtf, &GtfOptions::new()).unwrap();

    assert!(report.unresolved.is_empty());
    assert_eq!(report.ignored, 2);
    assert!(set.contains_in("gene", "G1"));
    assert_eq!(set.lookup("G1").unwrap().children(), ["T1"]);
    assert_eq!(set.lookup("T1").unwrap().children(), ["T1-CDS-10"]);

    assert!(set.contains_in("transcript", "T2"));
    assert!(set.contains_in("gene", "G2"));
    assert_eq!(set.lookup("T2").unwrap().parent(), Some("G2"));
}

#[test]
fn cegma_exons_become_cds() {
    let cegma = "scaf1\tcegma\tFirst\t100\t200\t12.5\t+\t0\tKOG0001\n\
                 scaf1\tcegma\tTerminal\t300\t400\t10.1\t+\t2\tKOG0001\n";
    let (set, report) = read_cegma_gff(cegma, &IngestOptions::gff3()).unwrap();

    assert!(report.unresolved.is_empty());
    assert_eq!(set.collection("CDS").count(), 2);
    assert!(set.contains_in("gene", "KOG0001"));
    assert_eq!(set.coords("KOG0001"), Some((100, 400)));
}

#[test]
fn blast_hits_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "q1,scaffold_1,99.0,100,1,0,1,100,1000,1099,1e-40,180").unwrap();
    writeln!(file, "q1,scaffold_1,97.0,100,3,0,1,100,5099,5000,1e-30,150").unwrap();

    let regions = vec!["scaffold_1 length=9000".to_string()];
    let options = BlastOptions::new().sequence_regions(regions);
    let (set, report) = read_blast_csv(file.path(), &options).unwrap();

    assert_eq!(report.records, 2);
    assert_eq!(set.collection("match").count(), 2);
    let hit = set.lookup("q1-1").unwrap();
    assert_eq!(hit.seqid(), "scaffold_1 length=9000");
    assert_eq!(hit.strand(), Strand::Reverse);
    assert_eq!(hit.parent(), Some("q1-1-match"));
}

#[test]
fn exonerate_vulgar_becomes_a_match() {
    let report = "         Query: prot1_full\n\
                  \x20       Target: chr1\n\
                  vulgar: prot1 0 10 + chr1 100 130 + 50 M 10 30\n";
    let (set, ingest) = read_exonerate(report).unwrap();

    assert!(ingest.is_clean());
    let name = "prot1_full-against-chr1";
    assert!(set.contains_in("match", name));
    let parts = set.lookup(name).unwrap().children();
    assert_eq!(parts.len(), 1);
    assert_eq!(set.coords(&parts[0]), Some((101, 130)));
}

#[test]
fn reading_appends_to_an_existing_store() {
    let mut set = AnnotationSet::new();
    set.read_gff3(
        "chr1\tsrc\tCDS\t1\t30\t.\t+\t0\tID=c1;Parent=t1\n",
        &IngestOptions::gff3(),
    )
    .unwrap();
    set.read_gff3(
        "chr2\tsrc\tCDS\t1\t30\t.\t+\t0\tID=c1;Parent=t2\n",
        &IngestOptions::gff3(),
    )
    .unwrap();

    assert!(set.contains("c1"));
    assert!(set.contains("c1_1"));
    assert_eq!(set.all_sequence_region_ids(), ["chr1", "chr2"]);
}

#[test]
fn undecodable_lines_are_skipped_without_losing_the_rest() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"chr1\tsrc\tCDS\t1\t30\t.\t+\t0\tID=c1;Parent=t1\n")
        .unwrap();
    file.write_all(b"chr1\tsrc\tCDS\t40\t60\t.\t+\t0\tID=c2;Note=\xff\xfe;Parent=t1\n")
        .unwrap();
    file.write_all(b"chr1\tsrc\tCDS\t70\t90\t.\t+\t0\tID=c3;Parent=t1\n")
        .unwrap();

    let mut set = AnnotationSet::new();
    let report = set.read_gff3(file.path(), &IngestOptions::gff3()).unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(
        report.skipped[0],
        ReaderError::InvalidEncoding { line: 2, .. }
    ));
    assert!(!set.contains("c2"));
    assert_eq!(set.lookup("t1-transcript").unwrap().children(), ["c1", "c3"]);
    assert_eq!(set.coords("t1"), Some((1, 90)));
}

#[test]
fn undecodable_blast_lines_are_skipped() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"q1,chr1,99.0,100,1,0,1,100,1000,1099,1e-40,180\n")
        .unwrap();
    file.write_all(b"q\xff,chr1,99.0,100,1,0,1,100,2000,2099,1e-40,180\n")
        .unwrap();
    file.write_all(b"q2,chr1,99.0,100,1,0,1,100,3000,3099,1e-40,180\n")
        .unwrap();

    let (set, report) = read_blast_csv(file.path(), &BlastOptions::new()).unwrap();
    assert_eq!(
        report.skipped.iter().filter_map(|err| err.line()).collect::<Vec<_>>(),
        [2]
    );
    assert!(set.contains("q1"));
    assert!(set.contains("q2"));
}

#[test]
fn zero_coordinates_are_rejected() {
    let (set, report) = read_gff3(
        "chr1\tsrc\tCDS\t0\t90\t.\t+\t0\tID=c1;Parent=t1\n\
         chr1\tsrc\tCDS\t100\t190\t.\t+\t0\tID=c2;Parent=t1\n",
        &IngestOptions::gff3(),
    )
    .unwrap();
    assert!(!set.contains("c1"));
    assert!(matches!(
        report.skipped.as_slice(),
        [ReaderError::InvalidField { line: 1, field: "start", .. }]
    ));

    let (_, report) = read_blast_csv(
        "q1,chr1,99.0,100,1,0,1,100,0,99,1e-40,180\n",
        &BlastOptions::new(),
    )
    .unwrap();
    assert!(matches!(
        report.skipped.as_slice(),
        [ReaderError::InvalidField { field: "sstart", .. }]
    ));
}
