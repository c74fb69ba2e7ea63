use core_types::{IndexMask, MFContext, MFParams, MFSignature, MFSignatureBuilder, MultiFunction};
use glam::Vec3;

/// Builds a vector from its three components.
pub struct CombineVectorFn {
	signature: MFSignature,
}

impl CombineVectorFn {
	pub fn new() -> Self {
		Self {
			signature: MFSignatureBuilder::new("Combine Vector")
				.single_input::<f32>("X")
				.single_input::<f32>("Y")
				.single_input::<f32>("Z")
				.single_output::<Vec3>("Vector")
				.build(),
		}
	}
}

impl Default for CombineVectorFn {
	fn default() -> Self {
		Self::new()
	}
}

impl MultiFunction for CombineVectorFn {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let x = params.readonly_single_input::<f32>(0, "X");
		let y = params.readonly_single_input::<f32>(1, "Y");
		let z = params.readonly_single_input::<f32>(2, "Z");
		let vectors = params.uninitialized_single_output::<Vec3>(3, "Vector");
		mask.foreach_index(|i| {
			vectors[i].write(Vec3::new(x[i], y[i], z[i]));
		});
	}
}

/// Splits a vector into its components. Accepts anything laid out as three floats.
pub struct SeparateVectorFn {
	signature: MFSignature,
}

impl SeparateVectorFn {
	pub fn new() -> Self {
		Self {
			signature: MFSignatureBuilder::new("Separate Vector")
				.single_input::<[f32; 3]>("Vector")
				.single_output::<f32>("X")
				.single_output::<f32>("Y")
				.single_output::<f32>("Z")
				.build(),
		}
	}
}

impl Default for SeparateVectorFn {
	fn default() -> Self {
		Self::new()
	}
}

impl MultiFunction for SeparateVectorFn {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let vectors = params.readonly_single_input::<[f32; 3]>(0, "Vector");
		let x = params.uninitialized_single_output::<f32>(1, "X");
		let y = params.uninitialized_single_output::<f32>(2, "Y");
		let z = params.uninitialized_single_output::<f32>(3, "Z");
		mask.foreach_index(|i| {
			let [vx, vy, vz] = vectors[i];
			x[i].write(vx);
			y[i].write(vy);
			z[i].write(vz);
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core_types::MFParamsBuilder;
	use core_types::generic::{GenericMutableArrayRef, GenericVirtualListRef};

	#[test]
	fn separate_accepts_vec3() {
		let function = SeparateVectorFn::new();
		let vectors = [Vec3::new(1., 2., 3.), Vec3::new(4., 5., 6.)];
		let (mut x, mut y, mut z) = ([0f32; 2], [0f32; 2], [0f32; 2]);
		{
			let mut params = MFParamsBuilder::for_function(&function, 2);
			params.add_readonly_single_input(GenericVirtualListRef::from_slice(&vectors)).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut x)).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut y)).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut z)).unwrap();
			function.call(IndexMask::from_size(2), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!((x, y, z), ([1., 4.], [2., 5.], [3., 6.]));
	}
}
