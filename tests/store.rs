use annoset::{AnnotationSet, BaseFeature, FeatureNode, ParentFeature, StoreError, Strand};

fn gene_model() -> AnnotationSet {
    let mut set = AnnotationSet::new();
    set.add_node(ParentFeature::new("g1", "chr1", "gene").with_strand(Strand::Forward))
        .unwrap();
    set.add_node(
        ParentFeature::new("t1", "chr1", "transcript")
            .with_strand(Strand::Forward)
            .with_parent(Some("g1".to_string())),
    )
    .unwrap();
    set.add_child("g1", "t1").unwrap();
    for (id, start, end) in [("c1", 500, 600), ("c2", 100, 200)] {
        set.add_node(
            BaseFeature::new(id, "chr1", start, end, "CDS").with_parent(Some("t1".to_string())),
        )
        .unwrap();
        set.add_child("t1", id).unwrap();
    }
    set.add_node(BaseFeature::new("r1", "chr2", 5, 50, "repeat_region"))
        .unwrap();
    set
}

#[test]
fn parent_spans_come_from_leaves() {
    let set = gene_model();
    assert_eq!(set.coords("c1"), Some((500, 600)));
    assert_eq!(set.coords("t1"), Some((100, 600)));
    assert_eq!(set.coords("g1"), Some((100, 600)));
    assert_eq!(set.coords("missing"), None);
}

#[test]
fn childless_parent_has_no_span() {
    let mut set = AnnotationSet::new();
    set.add_node(ParentFeature::new("g1", "chr1", "gene")).unwrap();
    assert_eq!(set.coords("g1"), None);
}

#[test]
fn identifiers_are_unique_across_types() {
    let mut set = gene_model();
    let err = set
        .add_node(BaseFeature::new("t1", "chr1", 1, 2, "UTR"))
        .unwrap_err();
    assert_eq!(err, StoreError::DuplicateIdentifier("t1".to_string()));
    assert_eq!(set.len(), 5);
}

#[test]
fn leaves_cannot_take_children() {
    let mut set = gene_model();
    assert_eq!(
        set.add_child("c1", "c2").unwrap_err(),
        StoreError::NotAParent("c1".to_string())
    );
    assert_eq!(
        set.add_child("t1", "nope").unwrap_err(),
        StoreError::NotFound("nope".to_string())
    );
}

#[test]
fn collections_keep_insertion_order() {
    let set = gene_model();
    let cds: Vec<&str> = set.collection("CDS").map(FeatureNode::id).collect();
    assert_eq!(cds, ["c1", "c2"]);

    let by_type = set.collections_by_type();
    assert_eq!(by_type["repeat_region"], ["r1"]);
    assert!(by_type["UTR"].is_empty());
    assert!(set.has_collection("UTR"));
    assert!(!set.has_collection("match"));
}

#[test]
fn attributes_can_be_edited() {
    let mut set = gene_model();
    set.attributes_mut("g1")
        .unwrap()
        .insert("Name".to_string(), "alpha".to_string());
    assert_eq!(set.lookup("g1").unwrap().attribute("Name"), Some("alpha"));
    assert!(set.attributes_mut("zzz").is_err());
}

#[test]
fn subset_by_sequence_region() {
    let set = gene_model();
    assert_eq!(set.all_sequence_region_ids(), ["chr1", "chr2"]);

    let chr2 = set.subset_by_sequence_region("chr2");
    assert_eq!(chr2.len(), 1);
    assert!(chr2.contains_in("repeat_region", "r1"));
    assert!(chr2.has_collection("gene"));
    assert_eq!(chr2.collection("gene").count(), 0);

    let chr1 = set.subset_by_sequence_region("chr1");
    assert_eq!(chr1.coords("g1"), Some((100, 600)));
}
