// ABOUTME: Dependency graph resolution for project task graphs
// ABOUTME: Addressing schemes, readiness evaluation, expressions, and stage planning

pub mod address;
pub mod error;
pub mod expression;
pub mod plan;
pub mod resolver;

pub use address::{detect_scheme, is_dependency, resolve_dependencies, to_global_ids, AddressScheme};
pub use error::{GraphError, Result};
pub use expression::{DependencyExpr, ExpressionError};
pub use plan::{DependencyGraph, StagePlan};
pub use resolver::{is_ready, ordered_dependencies};
