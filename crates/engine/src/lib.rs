//! Domain logic for the product-page optimization engine: entity types,
//! persistence, the Bayesian allocation engine, sticky assignment, the
//! lifecycle state machine, order attribution, and evolution snapshotting.
//!
//! See SPEC_FULL.md for the component breakdown (C1-C7) this crate mirrors
//! module-by-module.

pub mod assignment;
pub mod attribution;
pub mod bayesian;
pub mod entities;
pub mod evolution;
pub mod jobs;
pub mod lifecycle;
pub mod store;

pub use assignment::{normalize_allocation, AssignmentService};
pub use attribution::{verify_webhook_signature, AttributionPipeline, OrderLineItem, OrderNoteAttribute, OrderPayload};
pub use bayesian::{production_rng, seed_state, seeded_rng, AllocationUpdate, BayesianEngine, Verdict, THOMPSON_DRAWS};
pub use entities::{
    ArmAggregates, BayesianState, EvolutionSnapshot, Optimization, OptimizationConversion, OptimizationImpression,
    OptimizationRow, OptimizationStatus, OptimizationType, Product, ProductVariantOption, RiskMode, SessionAssignment,
    Shop, Variant,
};
pub use evolution::EvolutionRecorder;
pub use jobs::{RecomputeAllocationHandler, RecomputeAllocationJob};
pub use lifecycle::{CatalogClient, LifecycleController};
pub use store::{PostgresStore, Store};
