pub mod cpp_type;
pub mod error;
pub mod generic;
pub mod index_mask;
pub mod multi_function;

pub use cpp_type::{CppType, CppTypeInfo};
pub use error::MFError;
pub use index_mask::{IndexMask, IndexRange};
pub use multi_function::{MFContext, MFDataType, MFParamType, MFParams, MFParamsBuilder, MFSignature, MFSignatureBuilder, MultiFunction};

// Re-export for the function library
pub use glam;
