//! One property run: seed document in, entity graph directory out.
//!
//! Everything that can fail on input content (classification) happens in
//! [`plan_property`], before any file is touched. [`write_plan`] then performs
//! the stale pre-pass and all writes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use parcelgraph_store::{
    remove_stale_outputs, EdgeWriteOutcome, EntityRef, EntityWriter, OutputPatterns, RelationshipEdgeWriter,
};
use parcelgraph_taxonomy::{classify_property, PropertyAttributes, PropertyType, UseCodeClassifier, PROPERTY_TYPE_FIELD};

use crate::config::{RelationNames, RunConfig};
use crate::error::{PipelineError, Result};
use crate::layout::{FallbackAreas, LayoutHierarchyBuilder, LayoutInput, LayoutPlan, Payload};
use crate::owners::{parse_sale_date, OwnerHistory, OwnerKind, OwnerLinks, OwnerTransactionLinker, SaleEvent};

// ============================================================================
// Seed
// ============================================================================

/// Extracted values for one property, as handed over by the scraping layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySeed {
    pub parcel_id: String,
    /// Raw use-code label or code.
    #[serde(default)]
    pub use_code: Option<String>,
    /// Extra property fields copied onto `property.json`.
    #[serde(default)]
    pub property: Payload,
    #[serde(default)]
    pub address: Option<Payload>,
    #[serde(default)]
    pub fallback_areas: FallbackAreas,
    #[serde(default)]
    pub layouts: Value,
    #[serde(default)]
    pub owners: Value,
    #[serde(default)]
    pub sales: Vec<Value>,
}

impl PropertySeed {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::SeedIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

/// One sale with its output record.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub event: SaleEvent,
    pub payload: Payload,
}

impl SaleRecord {
    pub fn file_stem(&self) -> String {
        format!("sales_{}", self.event.ordinal)
    }
}

const SALE_DATE_FIELDS: &[&str] = &["ownership_transfer_date", "date"];

/// Sales in list order. Ordinals default to the 1-based position; a repeated
/// ordinal is skipped.
pub fn parse_sales(items: &[Value]) -> Vec<SaleRecord> {
    let mut seen = HashSet::new();
    let mut sales = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            tracing::debug!(position = i + 1, "skipping non-object sale record");
            continue;
        };
        let ordinal = obj
            .get("ordinal")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(i as u32 + 1);
        if !seen.insert(ordinal) {
            tracing::warn!(ordinal, "duplicate sale ordinal; skipping record");
            continue;
        }

        let raw_date = SALE_DATE_FIELDS
            .iter()
            .find_map(|f| obj.get(*f).and_then(Value::as_str));
        let date = raw_date.and_then(parse_sale_date);
        if raw_date.is_some() && date.is_none() {
            tracing::debug!(ordinal, raw = ?raw_date, "unparseable sale date");
        }

        let mut payload = obj.clone();
        payload.remove("ordinal");
        payload.remove("date");
        payload.insert(
            "ownership_transfer_date".into(),
            date.map(|d| Value::from(d.to_string())).unwrap_or(Value::Null),
        );
        sales.push(SaleRecord {
            event: SaleEvent { ordinal, date },
            payload,
        });
    }
    sales
}

// ============================================================================
// Plan
// ============================================================================

/// Everything a run will write, computed without touching the disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPlan {
    pub attributes: PropertyAttributes,
    pub property_record: Payload,
    pub address: Option<Payload>,
    pub layout: LayoutPlan,
    pub sales: Vec<SaleRecord>,
    pub owners: OwnerLinks,
}

pub fn plan_property(seed: &PropertySeed, classifier: &UseCodeClassifier<'_>) -> Result<PropertyPlan> {
    let attributes = classify_property(classifier, seed.use_code.as_deref(), PROPERTY_TYPE_FIELD)?;

    let mut property_record = seed.property.clone();
    property_record.insert("parcel_identifier".into(), Value::from(seed.parcel_id.clone()));
    if let Value::Object(attrs) = serde_json::to_value(&attributes)? {
        property_record.extend(attrs);
    }

    let layout = LayoutHierarchyBuilder::new(attributes.property_type)
        .build(&LayoutInput::from_json(&seed.layouts), &seed.fallback_areas);

    let sales = parse_sales(&seed.sales);
    let events: Vec<SaleEvent> = sales.iter().map(|s| s.event).collect();
    let owners = OwnerTransactionLinker::new().link(&OwnerHistory::from_json(&seed.owners), &events);

    Ok(PropertyPlan {
        attributes,
        property_record,
        address: seed.address.clone(),
        layout,
        sales,
        owners,
    })
}

// ============================================================================
// Write
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeTally {
    pub written: usize,
    pub rewritten: usize,
    pub promoted: usize,
    pub moved: usize,
    pub skipped: usize,
}

impl EdgeTally {
    fn record(&mut self, outcome: &EdgeWriteOutcome) {
        match outcome {
            EdgeWriteOutcome::Written { .. } => self.written += 1,
            EdgeWriteOutcome::Rewritten { .. } => self.rewritten += 1,
            EdgeWriteOutcome::Promoted { .. } => self.promoted += 1,
            EdgeWriteOutcome::Moved { .. } => self.moved += 1,
            EdgeWriteOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.rewritten + self.promoted + self.moved + self.skipped
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub parcel_id: String,
    pub property_type: PropertyType,
    pub removed_stale: usize,
    pub layouts: usize,
    pub sales: usize,
    pub persons: usize,
    pub companies: usize,
    pub edges: EdgeTally,
}

struct EdgeSink<'a> {
    dir: &'a Path,
    writer: &'a mut RelationshipEdgeWriter,
    tally: EdgeTally,
}

impl EdgeSink<'_> {
    fn edge(&mut self, file_name: &str, from: &EntityRef, to: &EntityRef) -> Result<()> {
        let outcome = self.writer.write_edge(self.dir, file_name, from, to)?;
        self.tally.record(&outcome);
        Ok(())
    }
}

pub fn write_plan(
    plan: &PropertyPlan,
    parcel_id: &str,
    config: &RunConfig,
    writer: &mut RelationshipEdgeWriter,
) -> Result<RunSummary> {
    let dir = config.output_dir.as_path();
    let names = &config.relations;

    let removed_stale = if config.clean_stale {
        remove_stale_outputs(dir, &OutputPatterns::generated())?.len()
    } else {
        0
    };

    let entities = EntityWriter::new(dir);
    let mut edges = EdgeSink {
        dir,
        writer,
        tally: EdgeTally::default(),
    };

    let property = entities.write("property", &plan.property_record)?;

    if let Some(address) = &plan.address {
        let address_ref = entities.write("address", address)?;
        edges.edge(&RelationNames::canonical(&names.property_address), &property, &address_ref)?;
    }

    let mut sale_refs: HashMap<u32, EntityRef> = HashMap::new();
    for (k, sale) in plan.sales.iter().enumerate() {
        let sale_ref = entities.write(&sale.file_stem(), &sale.payload)?;
        edges.edge(&RelationNames::ordinal(&names.property_sale, k + 1), &property, &sale_ref)?;
        sale_refs.insert(sale.event.ordinal, sale_ref);
    }

    for owner in &plan.owners.owners {
        entities.write(&owner.file_stem, &owner.mention)?;
    }

    let (mut persons_linked, mut companies_linked) = (0, 0);
    for link in &plan.owners.buyers {
        let Some(sale_ref) = sale_refs.get(&link.sale_ordinal) else {
            tracing::warn!(sale = link.sale_ordinal, "buyer link to an unknown sale; skipping");
            continue;
        };
        let owner = plan.owners.owner(link);
        let (relation, n) = match owner.key.kind {
            OwnerKind::Person => {
                persons_linked += 1;
                (&names.sale_person, persons_linked)
            }
            OwnerKind::Company => {
                companies_linked += 1;
                (&names.sale_company, companies_linked)
            }
        };
        let owner_ref = EntityRef::file(&owner.file_stem);
        edges.edge(&RelationNames::ordinal(relation, n), sale_ref, &owner_ref)?;
    }

    for node in &plan.layout.nodes {
        entities.write(&node.file_stem(), &node.to_record())?;
    }
    for (k, root) in plan.layout.roots().enumerate() {
        let layout_ref = EntityRef::file(&root.file_stem());
        edges.edge(&RelationNames::ordinal(&names.property_layout, k + 1), &property, &layout_ref)?;
    }
    for (k, (parent, child)) in plan.layout.parent_child_pairs().into_iter().enumerate() {
        edges.edge(
            &RelationNames::ordinal(&names.layout_layout, k + 1),
            &EntityRef::file(&parent.file_stem()),
            &EntityRef::file(&child.file_stem()),
        )?;
    }

    let summary = RunSummary {
        parcel_id: parcel_id.to_string(),
        property_type: plan.attributes.property_type,
        removed_stale,
        layouts: plan.layout.len(),
        sales: plan.sales.len(),
        persons: count_kind(&plan.owners, OwnerKind::Person),
        companies: count_kind(&plan.owners, OwnerKind::Company),
        edges: edges.tally,
    };
    tracing::info!(
        parcel_id,
        dir = %dir.display(),
        layouts = summary.layouts,
        sales = summary.sales,
        edges_written = summary.edges.written,
        edges_skipped = summary.edges.skipped,
        "property run complete"
    );
    Ok(summary)
}

fn count_kind(links: &OwnerLinks, kind: OwnerKind) -> usize {
    links.owners.iter().filter(|o| o.key.kind == kind).count()
}

/// Classify, plan, then write. A classification failure leaves the output
/// directory untouched.
pub fn run_property(
    seed: &PropertySeed,
    classifier: &UseCodeClassifier<'_>,
    config: &RunConfig,
    writer: &mut RelationshipEdgeWriter,
) -> Result<RunSummary> {
    let plan = plan_property(seed, classifier)?;
    write_plan(&plan, &seed.parcel_id, config, writer)
}
