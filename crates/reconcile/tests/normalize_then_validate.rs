use nomap_mapping::MappingStore;
use nomap_protocol::{
    FindingKind, HierarchicalEntry, MappingRecord, MatchCandidate, Provenance, ReferenceEntry,
    ReferenceStatus,
};
use nomap_reconcile::{
    normalize, ConflictKind, NormalizerConfig, ReferenceMatcher, Validator, ValidatorConfig,
};
use nomap_taxonomy::{reconstruct, HierarchyIndex, ReferenceList, Tokenizer, DEFAULT_DEPTH_LENGTHS};
use pretty_assertions::assert_eq;

fn reference() -> ReferenceList {
    ReferenceList::from_entries(
        [
            ("42811", "Compression/pressure sock/stocking, reusable", ReferenceStatus::Active),
            ("42899", "Compression sock, reusable", ReferenceStatus::Obsolete),
            ("35213", "Central venous catheter", ReferenceStatus::Active),
        ]
        .into_iter()
        .map(|(code, description, status)| ReferenceEntry {
            code: code.to_string(),
            description: description.to_string(),
            status,
        }),
    )
}

fn hierarchy() -> HierarchyIndex {
    let entry = |code: &str, description: &str, depth: u8| HierarchicalEntry {
        code: code.to_string(),
        description: description.to_string(),
        category_prefix: code.chars().next().unwrap(),
        depth,
        is_terminal: true,
        parent_code: None,
    };
    reconstruct(
        vec![
            entry("M030405", "COMPRESSION STOCKINGS", 4),
            entry("C0104", "CENTRAL VENOUS CATHETERS", 3),
        ],
        &DEFAULT_DEPTH_LENGTHS,
    )
}

fn candidate(target: &str, description: &str, provenance: Provenance) -> MatchCandidate {
    MatchCandidate {
        target_code: target.to_string(),
        target_description: description.to_string(),
        score: if provenance == Provenance::Manual { 100 } else { 60 },
        provenance,
        category_prefix: target.chars().next().unwrap(),
    }
}

fn legacy_store() -> MappingStore {
    let mut store = MappingStore::new();
    for record in [
        MappingRecord {
            source_code: "L-0001".to_string(),
            source_description: "compression pressure sock stocking reusable".to_string(),
            matches: vec![candidate(
                "M030405",
                "COMPRESSION STOCKINGS",
                Provenance::Manual,
            )],
        },
        MappingRecord {
            source_code: "L-0002".to_string(),
            source_description: "Compression/Pressure Sock/Stocking, Reusable".to_string(),
            matches: vec![candidate(
                "M030405",
                "COMPRESSION STOCKINGS",
                Provenance::Automatic,
            )],
        },
        MappingRecord {
            source_code: "L-0003".to_string(),
            source_description: "Central venous catheter".to_string(),
            matches: vec![candidate("C0199", "GONE", Provenance::Automatic)],
        },
    ] {
        store.upsert(record, None);
    }
    store.refresh_stats();
    store
}

#[test]
fn legacy_codes_are_rekeyed_merged_and_validated() {
    let reference = reference();
    let tokenizer = Tokenizer::default();
    let matcher = ReferenceMatcher::new(&reference, &tokenizer, &NormalizerConfig::default());
    let outcome = normalize(&legacy_store(), &matcher, &tokenizer);

    let keys: Vec<&str> = outcome.store.mappings.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["35213", "42811"]);

    let stats = &outcome.report.stats;
    assert_eq!(stats.exact, 1);
    assert_eq!(stats.case_insensitive, 1);
    assert_eq!(stats.canonical, 1);
    assert_eq!(stats.rekeyed, 3);
    assert_eq!(stats.merged, 1);

    let stocking = outcome.store.get("42811").unwrap();
    assert_eq!(
        stocking.source_description,
        "Compression/pressure sock/stocking, reusable"
    );
    assert_eq!(stocking.matches.len(), 1);
    assert_eq!(stocking.matches[0].provenance, Provenance::Manual);

    assert_eq!(outcome.report.conflicts.len(), 1);
    assert_eq!(
        outcome.report.conflicts[0].kind,
        ConflictKind::MergedDescriptions
    );

    let hierarchy = hierarchy();
    let config = ValidatorConfig::default();
    let report = Validator::new(&config, &hierarchy, &tokenizer).validate(&outcome.store);
    assert_eq!(report.metadata.total_mappings, 2);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].source_code, "35213");
    assert_eq!(report.results[0].kind, FindingKind::MissingTarget);
}

#[test]
fn normalizing_twice_changes_nothing() {
    let reference = reference();
    let tokenizer = Tokenizer::default();
    let matcher = ReferenceMatcher::new(&reference, &tokenizer, &NormalizerConfig::default());
    let first = normalize(&legacy_store(), &matcher, &tokenizer);
    let second = normalize(&first.store, &matcher, &tokenizer);

    assert_eq!(second.store.mappings, first.store.mappings);
    assert_eq!(second.report.stats.rekeyed, 0);
    assert_eq!(second.report.stats.merged, 0);
    assert!(second.report.conflicts.is_empty());
}
