pub mod events;
pub mod evolution_snapshot;
pub mod optimization;
pub mod product;
pub mod session_assignment;
pub mod shop;

pub use events::{OptimizationConversion, OptimizationImpression};
pub use evolution_snapshot::EvolutionSnapshot;
pub use optimization::{ArmAggregates, BayesianState, Optimization, OptimizationRow, OptimizationStatus, OptimizationType, RiskMode, Variant};
pub use product::{Product, ProductVariantOption};
pub use session_assignment::SessionAssignment;
pub use shop::Shop;
