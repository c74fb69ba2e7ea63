//! Multi-functions used by generated networks and compiled expressions.

pub mod arithmetic;
pub mod constant;
pub mod context;
pub mod convert;
pub mod custom;
pub mod list;
pub mod vector;

pub use arithmetic::{BinaryOperation, UnaryOperation, bool_binary, float_binary, float_unary, int_binary, int_unary, string_binary};
pub use constant::{ConstantValue, GenericConstantValue, GenericConstantVector};
pub use context::ContextValueFn;
pub use convert::ConvertFn;
pub use custom::{BinaryFn, InPlaceFn, UnaryFn};
pub use list::{AppendToListFn, GetListElementFn, ListLengthFn, PackListFn};
pub use vector::{CombineVectorFn, SeparateVectorFn};
