//! Layout hierarchy synthesis (building → floor → room).
//!
//! Two input shapes are accepted:
//!
//! - **structured**: building groups, each with an optional building payload
//!   and a list of interior spaces;
//! - **flat**: a plain list of space records, optionally labelled with a
//!   `floor_level`.
//!
//! Structured input wins whenever it has at least one group. Flat input gets a
//! synthesized building and, when spaces span more than one floor, one floor
//! node per distinct floor key.
//!
//! `space_index` is assigned only once the node list is final, in append order
//! (each group's building and its children before the next group), so the
//! same input always yields the same `layout_<N>` file names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use parcelgraph_taxonomy::PropertyType;

pub type Payload = Map<String, Value>;

pub const FLOOR_LEVEL_FIELD: &str = "floor_level";

// ============================================================================
// Input shapes
// ============================================================================

/// One building with its interior spaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingGroupInput {
    pub building: Option<Payload>,
    pub interiors: Vec<Payload>,
}

/// One space record from a flat list.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSpaceInput {
    pub payload: Payload,
}

impl FlatSpaceInput {
    pub fn floor_level(&self) -> Option<&str> {
        floor_level_of(&self.payload)
    }
}

fn floor_level_of(payload: &Payload) -> Option<&str> {
    payload
        .get(FLOOR_LEVEL_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A layout input as delivered by the extraction layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutInput {
    pub building_groups: Vec<BuildingGroupInput>,
    pub flat_spaces: Vec<FlatSpaceInput>,
    /// Parentless features outside any building (pool, dock, ...).
    pub site_features: Vec<Payload>,
}

/// The shape the builder will actually use.
#[derive(Debug, Clone, Copy)]
pub enum LayoutSource<'a> {
    Structured(&'a [BuildingGroupInput]),
    Flat(&'a [FlatSpaceInput]),
}

impl LayoutInput {
    /// Interpret a loosely typed JSON value.
    ///
    /// Accepted forms:
    /// - an array mixing building groups (`{building_layout, interior_layouts}`)
    ///   and plain space objects,
    /// - an object with `building_groups`, `spaces` and/or `site_layouts` arrays.
    ///
    /// Non-object entries are skipped.
    pub fn from_json(value: &Value) -> Self {
        let mut input = LayoutInput::default();
        match value {
            Value::Array(items) => input.push_items(items),
            Value::Object(obj) => {
                for key in ["building_groups", "spaces", "layouts"] {
                    if let Some(Value::Array(items)) = obj.get(key) {
                        input.push_items(items);
                    }
                }
                if let Some(Value::Array(items)) = obj.get("site_layouts") {
                    input.site_features.extend(objects_only(items, "site feature"));
                }
            }
            Value::Null => {}
            other => {
                tracing::debug!(kind = json_kind(other), "ignoring non-collection layout input");
            }
        }
        input
    }

    fn push_items(&mut self, items: &[Value]) {
        for item in items {
            let Value::Object(obj) = item else {
                tracing::debug!(kind = json_kind(item), "skipping non-object layout record");
                continue;
            };
            if obj.contains_key("building_layout") || obj.contains_key("interior_layouts") {
                let building = match obj.get("building_layout") {
                    Some(Value::Object(b)) => Some(b.clone()),
                    _ => None,
                };
                let interiors = match obj.get("interior_layouts") {
                    Some(Value::Array(list)) => objects_only(list, "interior layout"),
                    _ => Vec::new(),
                };
                self.building_groups.push(BuildingGroupInput { building, interiors });
            } else {
                self.flat_spaces.push(FlatSpaceInput {
                    payload: obj.clone(),
                });
            }
        }
    }

    pub fn source(&self) -> LayoutSource<'_> {
        if self.building_groups.is_empty() {
            LayoutSource::Flat(&self.flat_spaces)
        } else {
            LayoutSource::Structured(&self.building_groups)
        }
    }
}

fn objects_only(items: &[Value], what: &str) -> Vec<Payload> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(obj.clone()),
            other => {
                tracing::debug!(kind = json_kind(other), what, "skipping non-object record");
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Area figures used when a building record has to be synthesized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackAreas {
    #[serde(default)]
    pub livable_area_sq_ft: Option<f64>,
    #[serde(default)]
    pub total_area_sq_ft: Option<f64>,
}

impl FallbackAreas {
    fn building_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("space_type".into(), Value::from("Building"));
        if let Some(area) = self.livable_area_sq_ft {
            payload.insert("livable_area_sq_ft".into(), Value::from(area));
        }
        if let Some(area) = self.total_area_sq_ft {
            payload.insert("total_area_sq_ft".into(), Value::from(area));
        }
        payload
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutRole {
    Building,
    Floor,
    Room,
    SiteFeature,
}

/// Normalized floor identifier.
///
/// Ordering: numeric keys ascending, then label keys lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloorKey {
    Numeric(u64),
    Label(String),
}

impl FloorKey {
    /// First run of digits, else the lower-cased label. Blank labels have no key.
    pub fn from_label(label: &str) -> Option<FloorKey> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        let digits: String = label
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return Some(FloorKey::Label(label.to_lowercase()));
        }
        match digits.parse::<u64>() {
            Ok(n) => Some(FloorKey::Numeric(n)),
            Err(_) => Some(FloorKey::Label(digits)),
        }
    }
}

impl std::fmt::Display for FloorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloorKey::Numeric(n) => write!(f, "{n}"),
            FloorKey::Label(s) => f.write_str(s),
        }
    }
}

/// Opaque, run-scoped node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutId(u32);

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: LayoutId,
    pub role: LayoutRole,
    pub floor_key: Option<FloorKey>,
    pub payload: Payload,
    pub parent_id: Option<LayoutId>,
    /// 1-based position in the finalized node list.
    pub space_index: usize,
}

impl LayoutNode {
    pub fn file_stem(&self) -> String {
        format!("layout_{}", self.space_index)
    }

    /// Output record: the supplied payload plus `space_index`, `role` and
    /// `floor_key` (assigned fields take precedence over payload keys).
    pub fn to_record(&self) -> Payload {
        let mut record = self.payload.clone();
        record.insert("space_index".into(), Value::from(self.space_index as u64));
        record.insert(
            "role".into(),
            serde_json::to_value(self.role).unwrap_or(Value::Null),
        );
        if let Some(key) = &self.floor_key {
            record.insert("floor_key".into(), Value::from(key.to_string()));
        }
        record
    }
}

/// Finalized, ordered layout nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPlan {
    pub nodes: Vec<LayoutNode>,
}

impl LayoutPlan {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: LayoutId) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// `(parent, child)` pairs in child order.
    pub fn parent_child_pairs(&self) -> Vec<(&LayoutNode, &LayoutNode)> {
        let by_id: HashMap<LayoutId, &LayoutNode> = self.nodes.iter().map(|n| (n.id, n)).collect();
        self.nodes
            .iter()
            .filter_map(|child| {
                let parent = by_id.get(&child.parent_id?)?;
                Some((*parent, child))
            })
            .collect()
    }

    /// Nodes without a parent (buildings and site features).
    pub fn roots(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.iter().filter(|n| n.parent_id.is_none())
    }
}

// ============================================================================
// Builder
// ============================================================================

struct DraftNode {
    id: LayoutId,
    role: LayoutRole,
    floor_key: Option<FloorKey>,
    payload: Payload,
    parent_id: Option<LayoutId>,
}

#[derive(Default)]
struct Draft {
    nodes: Vec<DraftNode>,
}

impl Draft {
    fn push(
        &mut self,
        role: LayoutRole,
        floor_key: Option<FloorKey>,
        payload: Payload,
        parent_id: Option<LayoutId>,
    ) -> LayoutId {
        let id = LayoutId(self.nodes.len() as u32);
        self.nodes.push(DraftNode {
            id,
            role,
            floor_key,
            payload,
            parent_id,
        });
        id
    }

    fn finalize(self) -> LayoutPlan {
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(i, d)| LayoutNode {
                id: d.id,
                role: d.role,
                floor_key: d.floor_key,
                payload: d.payload,
                parent_id: d.parent_id,
                space_index: i + 1,
            })
            .collect();
        LayoutPlan { nodes }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutHierarchyBuilder {
    property_type: PropertyType,
}

impl LayoutHierarchyBuilder {
    pub fn new(property_type: PropertyType) -> Self {
        Self { property_type }
    }

    pub fn build(&self, input: &LayoutInput, fallback: &FallbackAreas) -> LayoutPlan {
        let mut draft = Draft::default();

        match input.source() {
            LayoutSource::Structured(groups) => self.build_structured(&mut draft, groups, fallback),
            LayoutSource::Flat(spaces) => self.build_flat(&mut draft, spaces, fallback),
        }

        for feature in &input.site_features {
            draft.push(LayoutRole::SiteFeature, None, feature.clone(), None);
        }

        let plan = draft.finalize();
        tracing::debug!(nodes = plan.len(), property_type = %self.property_type, "built layout hierarchy");
        plan
    }

    fn build_structured(&self, draft: &mut Draft, groups: &[BuildingGroupInput], fallback: &FallbackAreas) {
        for group in groups {
            let payload = group
                .building
                .clone()
                .unwrap_or_else(|| fallback.building_payload());
            let building = draft.push(LayoutRole::Building, None, payload, None);

            for interior in &group.interiors {
                let floor_key = floor_level_of(interior).and_then(FloorKey::from_label);
                draft.push(LayoutRole::Room, floor_key, interior.clone(), Some(building));
            }
        }
    }

    fn build_flat(&self, draft: &mut Draft, spaces: &[FlatSpaceInput], fallback: &FallbackAreas) {
        if self.property_type == PropertyType::LandParcel && spaces.is_empty() {
            return;
        }
        let building = draft.push(LayoutRole::Building, None, fallback.building_payload(), None);

        // distinct keys, first-seen order, with the first label seen for each
        let mut distinct: Vec<(FloorKey, String)> = Vec::new();
        for space in spaces {
            if let Some(label) = space.floor_level() {
                if let Some(key) = FloorKey::from_label(label) {
                    if !distinct.iter().any(|(k, _)| *k == key) {
                        distinct.push((key, label.to_string()));
                    }
                }
            }
        }

        let mut floors: HashMap<FloorKey, LayoutId> = HashMap::new();
        if distinct.len() > 1 {
            distinct.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, label) in distinct {
                let mut payload = Payload::new();
                payload.insert("space_type".into(), Value::from("Floor"));
                payload.insert(FLOOR_LEVEL_FIELD.into(), Value::from(label));
                let id = draft.push(LayoutRole::Floor, Some(key.clone()), payload, Some(building));
                floors.insert(key, id);
            }
        }

        for space in spaces {
            let floor_key = space.floor_level().and_then(FloorKey::from_label);
            let parent = floor_key
                .as_ref()
                .and_then(|k| floors.get(k).copied())
                .unwrap_or(building);
            draft.push(LayoutRole::Room, floor_key, space.payload.clone(), Some(parent));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(labels: &[Option<&str>]) -> LayoutInput {
        let spaces: Vec<Value> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| match label {
                Some(l) => json!({"space_type": format!("Room {i}"), "floor_level": l}),
                None => json!({"space_type": format!("Room {i}")}),
            })
            .collect();
        LayoutInput::from_json(&Value::Array(spaces))
    }

    #[test]
    fn floor_keys_normalize() {
        assert_eq!(FloorKey::from_label("1st Floor"), Some(FloorKey::Numeric(1)));
        assert_eq!(FloorKey::from_label("Floor 02"), Some(FloorKey::Numeric(2)));
        assert_eq!(
            FloorKey::from_label(" BASEMENT "),
            Some(FloorKey::Label("basement".into()))
        );
        assert_eq!(FloorKey::from_label("  "), None);
        assert!(FloorKey::Numeric(10) < FloorKey::Label("attic".into()));
        assert!(FloorKey::Numeric(2) < FloorKey::Numeric(10));
    }

    #[test]
    fn floors_sort_numeric_then_lexical() {
        let input = flat(&[Some("3rd Floor"), Some("Basement"), Some("1st Floor")]);
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &FallbackAreas::default());

        let floors: Vec<&str> = plan
            .nodes
            .iter()
            .filter(|n| n.role == LayoutRole::Floor)
            .map(|n| n.payload[FLOOR_LEVEL_FIELD].as_str().unwrap())
            .collect();
        assert_eq!(floors, vec!["1st Floor", "3rd Floor", "Basement"]);

        // building, 3 floors, 3 rooms
        assert_eq!(plan.len(), 7);
        let room_on_third = &plan.nodes[4];
        assert_eq!(room_on_third.role, LayoutRole::Room);
        let parent = plan.get(room_on_third.parent_id.unwrap()).unwrap();
        assert_eq!(parent.floor_key, Some(FloorKey::Numeric(3)));
    }

    #[test]
    fn single_floor_collapses_onto_building() {
        let input = flat(&[Some("1st Floor"), Some("First floor 1"), None]);
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &FallbackAreas::default());

        assert!(plan.nodes.iter().all(|n| n.role != LayoutRole::Floor));
        let building = plan.nodes[0].id;
        for room in plan.nodes.iter().filter(|n| n.role == LayoutRole::Room) {
            assert_eq!(room.parent_id, Some(building));
        }
    }

    #[test]
    fn rooms_without_floor_attach_to_building_when_floors_exist() {
        let input = flat(&[Some("1"), Some("2"), None]);
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &FallbackAreas::default());
        let last = plan.nodes.last().unwrap();
        assert_eq!(last.parent_id, Some(plan.nodes[0].id));
    }

    #[test]
    fn vacant_land_without_spaces_has_no_layout() {
        let plan = LayoutHierarchyBuilder::new(PropertyType::LandParcel)
            .build(&LayoutInput::default(), &FallbackAreas::default());
        assert!(plan.is_empty());

        let plan = LayoutHierarchyBuilder::new(PropertyType::Building)
            .build(&LayoutInput::default(), &FallbackAreas::default());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.nodes[0].role, LayoutRole::Building);
    }

    #[test]
    fn land_parcel_with_spaces_still_gets_a_building() {
        let input = flat(&[None]);
        let plan = LayoutHierarchyBuilder::new(PropertyType::LandParcel).build(&input, &FallbackAreas::default());
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn structured_groups_append_depth_first() {
        let input = LayoutInput::from_json(&json!([
            {
                "building_layout": {"space_type": "Building", "built_year": 1990},
                "interior_layouts": [
                    {"space_type": "Kitchen", "floor_level": "1st Floor"},
                    "garbage",
                    {"space_type": "Bedroom", "floor_level": "2nd Floor"}
                ]
            },
            {
                "interior_layouts": [{"space_type": "Garage"}]
            },
            {"space_type": "ignored because groups exist"}
        ]));
        let fallback = FallbackAreas {
            livable_area_sq_ft: Some(1200.0),
            total_area_sq_ft: None,
        };
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &fallback);

        let roles: Vec<LayoutRole> = plan.nodes.iter().map(|n| n.role).collect();
        assert_eq!(
            roles,
            vec![
                LayoutRole::Building,
                LayoutRole::Room,
                LayoutRole::Room,
                LayoutRole::Building,
                LayoutRole::Room,
            ]
        );
        assert_eq!(plan.nodes[0].payload["built_year"], json!(1990));
        assert_eq!(plan.nodes[2].floor_key, Some(FloorKey::Numeric(2)));
        assert_eq!(plan.nodes[2].parent_id, Some(plan.nodes[0].id));
        assert_eq!(plan.nodes[3].payload["livable_area_sq_ft"], json!(1200.0));
        assert_eq!(plan.nodes[4].parent_id, Some(plan.nodes[3].id));
    }

    #[test]
    fn site_features_are_parentless_and_last() {
        let input = LayoutInput::from_json(&json!({
            "spaces": [{"space_type": "Living Room"}],
            "site_layouts": [{"space_type": "Pool"}, 42]
        }));
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &FallbackAreas::default());
        let last = plan.nodes.last().unwrap();
        assert_eq!(last.role, LayoutRole::SiteFeature);
        assert_eq!(last.parent_id, None);
        assert_eq!(last.space_index, 3);
        assert_eq!(plan.roots().count(), 2);
    }

    #[test]
    fn records_carry_index_role_and_payload() {
        let input = flat(&[Some("Basement")]);
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &FallbackAreas::default());
        let room = &plan.nodes[1];
        assert_eq!(room.file_stem(), "layout_2");
        let record = room.to_record();
        assert_eq!(record["space_index"], json!(2));
        assert_eq!(record["role"], json!("Room"));
        assert_eq!(record["floor_key"], json!("basement"));
        assert_eq!(record["space_type"], json!("Room 0"));
    }

    #[test]
    fn parent_child_pairs_cover_every_child() {
        let input = flat(&[Some("1"), Some("2"), Some("2")]);
        let plan = LayoutHierarchyBuilder::new(PropertyType::Building).build(&input, &FallbackAreas::default());
        let pairs = plan.parent_child_pairs();
        assert_eq!(pairs.len(), plan.len() - 1);
        assert!(pairs.iter().all(|(p, c)| p.space_index < c.space_index));
    }
}
