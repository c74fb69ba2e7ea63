use crate::storage::{InitializedBuffer, NetworkEvaluationStorage};
use core_types::generic::{GenericBuffer, GenericVectorArray};
use core_types::multi_function::MFParamCategory;
use core_types::{IndexMask, MFContext, MFDataType, MFError, MFParams, MFParamsBuilder, MFSignature, MFSignatureBuilder, MultiFunction};
use graph_craft::network::{MFNetwork, MFNodeId, MFSocket, MFSocketId, NetworkError};
use rustc_hash::FxHashSet;

/// Evaluates the parts of a [`MFNetwork`] needed to compute the requested outputs.
///
/// The inputs are outputs of dummy nodes whose values are passed by the caller, the outputs are inputs of dummy nodes whose
/// values are returned. Every function node runs at most once per call and only when one of the outputs depends on it.
pub struct MFEvaluateNetwork {
	network: MFNetwork,
	inputs: Vec<MFSocketId>,
	outputs: Vec<MFSocketId>,
	signature: MFSignature,
	/// Inputs of function nodes that are bound to mutable parameters.
	mutable_inputs: FxHashSet<MFSocketId>,
}

impl MFEvaluateNetwork {
	pub fn new(network: MFNetwork, inputs: Vec<MFSocketId>, outputs: Vec<MFSocketId>) -> Result<Self, NetworkError> {
		Self::with_name("Evaluate Network", network, inputs, outputs)
	}

	pub fn with_name(name: impl Into<String>, network: MFNetwork, inputs: Vec<MFSocketId>, outputs: Vec<MFSocketId>) -> Result<Self, NetworkError> {
		let mut signature = MFSignatureBuilder::new(name);
		for &input in &inputs {
			let socket = network.output_socket(input)?;
			if network.node(socket.node)?.is_function() {
				return Err(NetworkError::NotAnOutputSocket(input));
			}
			signature = signature.input(socket.name.clone(), socket.data_type);
		}
		for &output in &outputs {
			let socket = network.input_socket(output)?;
			if network.node(socket.node)?.is_function() {
				return Err(NetworkError::NotAnInputSocket(output));
			}
			signature = signature.output(socket.name.clone(), socket.data_type);
		}

		let provided: FxHashSet<_> = inputs.iter().copied().collect();
		if let Some(missing) = network.find_dummy_dependencies(outputs.iter().copied()).into_iter().find(|socket| !provided.contains(socket)) {
			return Err(NetworkError::MissingNetworkInput(missing));
		}

		let mut mutable_inputs = FxHashSet::default();
		for (_, node) in network.nodes() {
			let Some(function) = &node.function else { continue };
			if function.depends_on_context() {
				signature = signature.depends_on_context();
			}
			for (&socket, &param_index) in node.inputs.iter().zip(&node.input_param_indices) {
				if function.param_type(param_index).is_mutable() {
					mutable_inputs.insert(socket);
				}
			}
		}

		Ok(Self {
			network,
			inputs,
			outputs,
			signature: signature.build(),
			mutable_inputs,
		})
	}

	pub fn network(&self) -> &MFNetwork {
		&self.network
	}

	pub fn inputs(&self) -> &[MFSocketId] {
		&self.inputs
	}

	pub fn outputs(&self) -> &[MFSocketId] {
		&self.outputs
	}

	fn copy_inputs_to_storage<'a>(&self, params: &MFParams<'_, 'a>, storage: &mut NetworkEvaluationStorage<'a>, mask: IndexMask) {
		for (param_index, &socket) in self.inputs.iter().enumerate() {
			let name = &self.signature.param_names[param_index];
			match self.signature.param_types[param_index].data_type {
				MFDataType::Single(_) => storage.add_single_input_from_caller(socket, params.readonly_single_input_generic(param_index, name)),
				MFDataType::Vector(_) => storage.add_vector_input_from_caller(socket, params.readonly_vector_input_generic(param_index, name)),
			}
			self.forward_output(socket, storage, mask);
		}
	}

	fn forward_output(&self, socket: MFSocketId, storage: &mut NetworkEvaluationStorage, mask: IndexMask) {
		let Ok(output) = self.network.output_socket(socket) else { return };
		for &target in &output.targets {
			storage.forward(socket, target, self.mutable_inputs.contains(&target), mask);
		}
	}

	/// Walks backwards from the requested outputs and runs every function node once all of its inputs are known.
	fn evaluate_network_to_compute_outputs(&self, storage: &mut NetworkEvaluationStorage, mask: IndexMask, context: &MFContext) {
		let mut sockets_to_compute: Vec<MFSocketId> = self.outputs.clone();

		while let Some(&socket_id) = sockets_to_compute.last() {
			if storage.is_computed(socket_id) {
				sockets_to_compute.pop();
				continue;
			}
			match self.network.socket(socket_id) {
				Ok(MFSocket::Input(socket)) => sockets_to_compute.push(socket.origin),
				Ok(MFSocket::Output(socket)) => {
					let Some(node) = self.network.node(socket.node).ok().filter(|node| node.is_function()) else {
						panic!("socket {socket_id} has no value, outputs of dummy nodes have to be network inputs");
					};
					let missing_inputs: Vec<_> = node.inputs.iter().copied().filter(|&input| !storage.is_computed(input)).collect();
					if missing_inputs.is_empty() {
						self.compute_and_forward_outputs(socket.node, storage, mask, context);
						sockets_to_compute.pop();
					} else {
						sockets_to_compute.extend(missing_inputs);
					}
				}
				Err(error) => panic!("cannot evaluate socket {socket_id}: {error}"),
			}
		}
	}

	fn compute_and_forward_outputs(&self, node_id: MFNodeId, storage: &mut NetworkEvaluationStorage, mask: IndexMask, context: &MFContext) {
		let Ok(node) = self.network.node(node_id) else { return };
		let Some(function) = &node.function else {
			log::error!("Dummy node `{}` has no value for its outputs", node.name);
			return;
		};
		let signature = function.signature();
		let min_array_size = mask.min_array_size();

		enum Argument {
			SingleInput(MFSocketId),
			VectorInput(MFSocketId),
			SingleOutput(GenericBuffer, MFSocketId),
			VectorOutput(GenericVectorArray, MFSocketId),
			SingleMutable(InitializedBuffer, MFSocketId),
			VectorMutable(GenericVectorArray, MFSocketId),
		}

		let mut inputs = node.inputs.iter().copied();
		let mut outputs = node.outputs.iter().copied();
		let mut arguments = Vec::with_capacity(signature.param_amount());
		for param_type in &signature.param_types {
			let ty = param_type.data_type.base_type();
			let (input, output) = match param_type.category() {
				MFParamCategory::SingleInput | MFParamCategory::VectorInput => (inputs.next(), None),
				MFParamCategory::SingleOutput | MFParamCategory::VectorOutput => (None, outputs.next()),
				MFParamCategory::SingleMutable | MFParamCategory::VectorMutable => (inputs.next(), outputs.next()),
			};
			let argument = match (param_type.category(), input, output) {
				(MFParamCategory::SingleInput, Some(input), _) => Argument::SingleInput(input),
				(MFParamCategory::VectorInput, Some(input), _) => Argument::VectorInput(input),
				(MFParamCategory::SingleOutput, _, Some(output)) => {
					let mut buffer = GenericBuffer::new(ty, min_array_size);
					// SAFETY: the new buffer is uninitialized, the function initializes the masked elements
					unsafe { buffer.construct_default_outside(mask) };
					Argument::SingleOutput(buffer, output)
				}
				(MFParamCategory::VectorOutput, _, Some(output)) => Argument::VectorOutput(GenericVectorArray::new(ty, min_array_size), output),
				(MFParamCategory::SingleMutable, Some(input), Some(output)) => Argument::SingleMutable(storage.take_single_mutable(input, mask), output),
				(MFParamCategory::VectorMutable, Some(input), Some(output)) => Argument::VectorMutable(storage.take_vector_mutable(input, mask), output),
				_ => panic!("the sockets of node `{}` do not match the signature of its function", node.name),
			};
			arguments.push(argument);
		}

		{
			let storage = &*storage;
			let mut params = MFParamsBuilder::new(signature, min_array_size);
			for argument in &mut arguments {
				let result = match argument {
					Argument::SingleInput(socket) => params.add_readonly_single_input(storage.single(*socket)),
					Argument::VectorInput(socket) => params.add_readonly_vector_input(storage.vector(*socket)),
					Argument::SingleOutput(buffer, _) => params.add_uninitialized_single_output(buffer.as_mutable_array_ref()),
					Argument::VectorOutput(array, _) => params.add_vector_output(array),
					Argument::SingleMutable(buffer, _) => params.add_single_mutable(buffer.as_mutable_array_ref()),
					Argument::VectorMutable(array, _) => params.add_vector_mutable(array),
				};
				check_binding(result, &node.name);
			}
			match params.finish() {
				Ok(params) => function.call(mask, params, context),
				Err(error) => check_binding(Err(error), &node.name),
			}
		}

		for argument in arguments {
			let output = match argument {
				Argument::SingleInput(_) | Argument::VectorInput(_) => continue,
				Argument::SingleOutput(buffer, output) => {
					// SAFETY: the function initialized the masked elements, all others were default constructed
					storage.add_single_output(output, unsafe { InitializedBuffer::from_initialized(buffer) });
					output
				}
				Argument::SingleMutable(buffer, output) => {
					storage.add_single_output(output, buffer);
					output
				}
				Argument::VectorOutput(array, output) | Argument::VectorMutable(array, output) => {
					storage.add_vector_output(output, array);
					output
				}
			};
			self.forward_output(output, storage, mask);
		}
	}

	fn copy_computed_values_to_outputs(&self, params: &mut MFParams, storage: &NetworkEvaluationStorage, mask: IndexMask) {
		for (i, &socket) in self.outputs.iter().enumerate() {
			let param_index = self.inputs.len() + i;
			let name = &self.signature.param_names[param_index];
			match self.signature.param_types[param_index].data_type {
				MFDataType::Single(_) => {
					let values = storage.single(socket);
					let output = params.uninitialized_single_output_generic(param_index, name);
					for index in mask {
						// SAFETY: the computed value is initialized and the caller's output is not yet initialized at masked indices
						unsafe { values.ty().copy_to_uninitialized(values.get(index), output.get(index)) };
					}
				}
				MFDataType::Vector(_) => params.vector_output_generic(param_index, name).extend_multiple(mask, storage.vector(socket)),
			}
		}
	}
}

/// Networks are type checked when linked, so binding can only fail when a function does not follow its own signature.
fn check_binding(result: Result<(), MFError>, node: &str) {
	if let Err(error) = result {
		panic!("failed to bind the parameters of node `{node}`: {error}");
	}
}

impl MultiFunction for MFEvaluateNetwork {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, context: &MFContext) {
		if mask.is_empty() {
			return;
		}

		let mut storage = NetworkEvaluationStorage::new(self.network.socket_id_amount(), mask.min_array_size());
		self.copy_inputs_to_storage(&params, &mut storage, mask);
		self.evaluate_network_to_compute_outputs(&mut storage, mask, context);
		self.copy_computed_values_to_outputs(&mut params, &storage, mask);
	}
}

impl std::fmt::Debug for MFEvaluateNetwork {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MFEvaluateNetwork")
			.field("name", &self.signature.function_name)
			.field("inputs", &self.inputs)
			.field("outputs", &self.outputs)
			.finish()
	}
}
