//! The resource graph: nodes, edges, and the `GraphStore` contract.

pub mod edge;
pub mod node;
pub mod store;

pub use edge::{ConditionSet, ConditionVariant, Edge, EdgeKind, Effect};
pub use node::{Node, NodeId, NodeKind, ADMIN_LABEL};
pub use store::{GraphStore, InMemoryGraph, QuerySummary};
