mod context;
mod data_type;
mod params;
mod signature;

pub use context::{MFContext, MFContextBuilder, MFElementContext};
pub use data_type::{MFDataType, MFParamCategory, MFParamInterface, MFParamType};
pub use params::{MFParams, MFParamsBuilder};
pub use signature::{MFSignature, MFSignatureBuilder};

use crate::index_mask::IndexMask;

/// A typed, vectorized function that processes a batch of element indices per call.
///
/// All type checking happens when the arguments are bound, so `call` itself cannot fail. Implementations must only read or
/// write elements selected by the mask and must not depend on any state not passed through the params or the context.
pub trait MultiFunction: Send + Sync {
	fn signature(&self) -> &MFSignature;

	fn call(&self, mask: IndexMask, params: MFParams, context: &MFContext);

	fn name(&self) -> &str {
		&self.signature().function_name
	}

	fn param_amount(&self) -> usize {
		self.signature().param_amount()
	}

	fn param_type(&self, index: usize) -> MFParamType {
		self.signature().param_types[index]
	}

	fn param_name(&self, index: usize) -> &str {
		&self.signature().param_names[index]
	}

	fn depends_on_context(&self) -> bool {
		self.signature().depends_on_context
	}
}

impl std::fmt::Debug for dyn MultiFunction + '_ {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "MultiFunction({})", self.name())
	}
}
