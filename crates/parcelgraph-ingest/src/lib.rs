//! Property ingestion for Parcelgraph
//!
//! Turns one extracted property seed into an entity graph directory:
//!
//! - [`layout`]: building → floor → room synthesis with stable `space_index` order
//! - [`owners`]: owner dedup and buyer edges from sales to owners
//! - [`pipeline`]: classify, plan, then write entities and edges
//! - [`config`]: [`RunConfig`] and relation names

pub mod config;
pub mod error;
pub mod layout;
pub mod owners;
pub mod pipeline;

pub use config::{RelationNames, RunConfig};
pub use error::{PipelineError, Result};
pub use layout::{
    BuildingGroupInput, FallbackAreas, FlatSpaceInput, FloorKey, LayoutHierarchyBuilder, LayoutId, LayoutInput,
    LayoutNode, LayoutPlan, LayoutRole, LayoutSource, Payload,
};
pub use owners::{
    most_recent_sale, BuyerLink, CompanyOwner, LinkRule, OwnerEntity, OwnerHistory, OwnerKey, OwnerKind, OwnerLinks,
    OwnerMention, OwnerTransactionLinker, PersonOwner, SaleEvent,
};
pub use pipeline::{
    parse_sales, plan_property, run_property, write_plan, EdgeTally, PropertyPlan, PropertySeed, RunSummary,
    SaleRecord,
};
