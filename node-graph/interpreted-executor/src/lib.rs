//! Evaluation of multi-function networks, generated from inlined node trees or compiled from expressions.

pub mod cache;
pub mod evaluate_network;
pub mod expression;
pub mod generator;
pub mod node_registry;
pub mod optimization;
pub mod storage;

pub use cache::{ExpressionCache, UpdateGuard, UpdateToken, ValueCache};
pub use evaluate_network::MFEvaluateNetwork;
pub use expression::{CompiledExpression, ExpressionVariables, compile_expression, compile_expression_with};
pub use generator::{GeneratedNetwork, GeneratorError, generate_network};
pub use node_registry::{NodeBuilder, NodeRegistry};
pub use optimization::{OptimizationError, OptimizationSettings, constant_folding, dead_node_removal, optimize_network};
