//! Integration tests for the complete Parcelgraph pipeline
//!
//! Seed document → classification → layout/owner planning → entity and edge
//! files on disk, including re-runs against the same directory.
//!
//! Run with: cargo test --test integration_tests

use std::collections::BTreeMap;
use std::path::Path;

use parcelgraph_ingest::{run_property, PropertySeed, RunConfig};
use parcelgraph_store::RelationshipDocument;
use parcelgraph_taxonomy::{ClassificationFailure, PropertyType, UseCodeClassifier, UseCodeTaxonomy};
use serde_json::{json, Value};
use tempfile::tempdir;

fn seed_json() -> Value {
    json!({
        "parcel_id": "01-2345-678",
        "use_code": "Single Family Residential (0100)",
        "property": {"built_year": 1978, "number_of_stories": 2},
        "address": {"street_number": "412", "street_name": "Palm", "city_name": "Ocala"},
        "fallback_areas": {"livable_area_sq_ft": 1840.0, "total_area_sq_ft": 2210.0},
        "layouts": [
            {"space_type": "Kitchen", "floor_level": "1st Floor"},
            {"space_type": "Living Room", "floor_level": "1st Floor"},
            {"space_type": "Bedroom", "floor_level": "2nd Floor"},
            "not a space",
            {"space_type": "Bathroom"}
        ],
        "owners": {
            "2012-04-30": [{"type": "company", "name": "Sunrise Homes, Inc."}],
            "2019-08-15": [
                {"type": "person", "first_name": "Jane", "last_name": "Doe"},
                {"type": "person", "first_name": "John", "last_name": "Doe"}
            ],
            "current": [
                {"type": "person", "first_name": "JANE", "last_name": "DOE"},
                {"type": "person", "first_name": "John", "last_name": "Doe"}
            ]
        },
        "sales": [
            {"date": "2019-08-15", "purchase_price_amount": 315000},
            {"date": "2012-04-30", "purchase_price_amount": 198000}
        ]
    })
}

fn seed() -> PropertySeed {
    serde_json::from_value(seed_json()).unwrap()
}

fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .map(|e| {
            (
                e.file_name().to_string_lossy().to_string(),
                std::fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}

fn signatures(dir: &Path) -> Vec<String> {
    let mut sigs: Vec<String> = snapshot(dir)
        .into_iter()
        .filter(|(name, _)| name.starts_with("relationship_"))
        .map(|(_, bytes)| {
            let doc: RelationshipDocument = serde_json::from_slice(&bytes).unwrap();
            doc.signature()
        })
        .collect();
    sigs.sort();
    sigs
}

fn read_json(dir: &Path, name: &str) -> Value {
    serde_json::from_str(&std::fs::read_to_string(dir.join(name)).unwrap()).unwrap()
}

// ============================================================================
// Full run
// ============================================================================

#[test]
fn test_full_run_writes_expected_graph() {
    let taxonomy = UseCodeTaxonomy::embedded().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);
    let dir = tempdir().unwrap();
    let config = RunConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunConfig::default()
    };

    let summary = run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();
    assert_eq!(summary.property_type, PropertyType::Building);
    assert_eq!(summary.sales, 2);
    assert_eq!(summary.persons, 2);
    assert_eq!(summary.companies, 1);
    // building, floors 1 and 2, four rooms
    assert_eq!(summary.layouts, 7);

    let property = read_json(dir.path(), "property.json");
    assert_eq!(property["parcel_identifier"], "01-2345-678");
    assert_eq!(property["property_type"], "Building");
    assert_eq!(property["built_year"], 1978);

    let building = read_json(dir.path(), "layout_1.json");
    assert_eq!(building["role"], "Building");
    assert_eq!(building["livable_area_sq_ft"], 1840.0);
    let second_floor = read_json(dir.path(), "layout_3.json");
    assert_eq!(second_floor["role"], "Floor");
    assert_eq!(second_floor["floor_key"], "2");

    // Jane and John bought in 2019 (sales_1, the latest); the current-owner
    // rule adds nothing new. Sunrise Homes bought in 2012 (sales_2).
    let sigs = signatures(dir.path());
    assert!(sigs.contains(&"./sales_1.json->./person_1.json".to_string()));
    assert!(sigs.contains(&"./sales_1.json->./person_2.json".to_string()));
    assert!(sigs.contains(&"./sales_2.json->./company_1.json".to_string()));
    assert_eq!(sigs.iter().filter(|s| s.starts_with("./sales_")).count(), 3);
    assert!(sigs.contains(&"./property.json->./address.json".to_string()));
    assert!(sigs.contains(&"./property.json->./layout_1.json".to_string()));
    assert!(sigs.contains(&"./layout_3.json->./layout_6.json".to_string()));
    // bathroom has no floor and hangs off the building
    assert!(sigs.contains(&"./layout_1.json->./layout_7.json".to_string()));

    let mut deduped = sigs.clone();
    deduped.dedup();
    assert_eq!(deduped, sigs);
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_rerun_is_byte_identical() {
    let taxonomy = UseCodeTaxonomy::embedded().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);
    let dir = tempdir().unwrap();
    let config = RunConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunConfig::default()
    };

    run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();
    let first = snapshot(dir.path());
    let summary = run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();
    let second = snapshot(dir.path());

    assert_eq!(first, second);
    assert_eq!(summary.removed_stale, first.len());
}

#[test]
fn test_rerun_without_cleanup_dedups_against_disk() {
    let taxonomy = UseCodeTaxonomy::embedded().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);
    let dir = tempdir().unwrap();
    let config = RunConfig {
        output_dir: dir.path().to_path_buf(),
        clean_stale: false,
        ..RunConfig::default()
    };

    run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();
    let first = snapshot(dir.path());
    let summary = run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();

    assert_eq!(summary.removed_stale, 0);
    assert_eq!(summary.edges.written, 0);
    assert_eq!(snapshot(dir.path()), first);
}

#[test]
fn test_shrinking_input_removes_stale_entities() {
    let taxonomy = UseCodeTaxonomy::embedded().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
    let config = RunConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunConfig::default()
    };

    run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();
    assert!(dir.path().join("layout_7.json").exists());

    let mut smaller = seed_json();
    smaller["layouts"] = json!([{"space_type": "Studio"}]);
    smaller["owners"] = json!({});
    let smaller: PropertySeed = serde_json::from_value(smaller).unwrap();
    run_property(&smaller, &classifier, &config, &mut config.edge_writer()).unwrap();

    let files = snapshot(dir.path());
    assert!(files.contains_key("layout_2.json"));
    assert!(!files.contains_key("layout_3.json"));
    assert!(!files.contains_key("person_1.json"));
    assert!(!files.contains_key("relationship_sales_history_has_person_1.json"));
    assert!(files.contains_key("notes.txt"));
}

// ============================================================================
// Structured layouts
// ============================================================================

#[test]
fn test_structured_layout_with_site_features() {
    let taxonomy = UseCodeTaxonomy::embedded().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);
    let dir = tempdir().unwrap();
    let config = RunConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunConfig::default()
    };

    let mut value = seed_json();
    value["layouts"] = json!({
        "building_groups": [
            {
                "building_layout": {"space_type": "Building", "built_year": 1978},
                "interior_layouts": [{"space_type": "Kitchen", "floor_level": "1"}]
            },
            {
                "building_layout": {"space_type": "Detached Garage"},
                "interior_layouts": []
            }
        ],
        "site_layouts": [{"space_type": "Pool"}]
    });
    let seed: PropertySeed = serde_json::from_value(value).unwrap();
    let summary = run_property(&seed, &classifier, &config, &mut config.edge_writer()).unwrap();
    assert_eq!(summary.layouts, 4);

    assert_eq!(read_json(dir.path(), "layout_3.json")["space_type"], "Detached Garage");
    assert_eq!(read_json(dir.path(), "layout_4.json")["role"], "SiteFeature");

    let sigs = signatures(dir.path());
    for root in ["layout_1", "layout_3", "layout_4"] {
        assert!(sigs.contains(&format!("./property.json->./{root}.json")), "{root}");
    }
    assert!(sigs.contains(&"./layout_1.json->./layout_2.json".to_string()));
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_unclassifiable_seed_leaves_directory_untouched() {
    let taxonomy = UseCodeTaxonomy::embedded().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);
    let dir = tempdir().unwrap();
    let config = RunConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunConfig::default()
    };

    run_property(&seed(), &classifier, &config, &mut config.edge_writer()).unwrap();
    let before = snapshot(dir.path());

    let mut value = seed_json();
    value["use_code"] = json!("Spaceport");
    let bad: PropertySeed = serde_json::from_value(value).unwrap();
    let err = run_property(&bad, &classifier, &config, &mut config.edge_writer()).unwrap_err();

    let failure = err.as_classification().unwrap();
    assert_eq!(failure.reason, ClassificationFailure::Unmatched);
    let reported: Value = serde_json::from_str(&failure.to_json()).unwrap();
    assert_eq!(reported["raw_value"], "Spaceport");
    assert_eq!(reported["field_path"], "property.property_type");

    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_external_taxonomy_file() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("codes.json");
    std::fs::write(
        &table,
        serde_json::to_string(&json!({
            "version": 1,
            "entries": [{
                "code": "R1",
                "descriptors": ["Residential One"],
                "property_type": "Building",
                "property_usage_type": "Residential",
                "ownership_estate_type": "FeeSimple",
                "structure_form": "SingleFamilyDetached",
                "build_status": "Improved"
            }]
        }))
        .unwrap(),
    )
    .unwrap();

    let config = RunConfig {
        output_dir: dir.path().join("out"),
        taxonomy_path: Some(table),
        ..RunConfig::default()
    };
    let taxonomy = config.load_taxonomy().unwrap();
    let classifier = UseCodeClassifier::new(&taxonomy);

    let mut value = seed_json();
    value["use_code"] = json!("R1 - Residential One");
    let seed: PropertySeed = serde_json::from_value(value).unwrap();
    let summary = run_property(&seed, &classifier, &config, &mut config.edge_writer()).unwrap();
    assert_eq!(summary.property_type, PropertyType::Building);
    assert_eq!(
        read_json(&config.output_dir, "property.json")["structure_form"],
        "SingleFamilyDetached"
    );
}
