//! Containers for values whose type is only known at runtime through a [`CppType`](crate::CppType).

mod array_ref;
mod buffer;
mod value;
mod vector_array;
mod virtual_list;
mod virtual_list_list;

pub use array_ref::{GenericArrayRef, GenericMutableArrayRef};
pub use buffer::{GenericBuffer, MonotonicAllocator};
pub use value::GenericValue;
pub use vector_array::{GenericVectorArray, MutableVectorArrayRef, VectorArrayRef};
pub use virtual_list::{GenericVirtualListRef, VirtualListRef};
pub use virtual_list_list::{GenericVirtualListListRef, VirtualListListRef};
