use crate::evaluate_network::MFEvaluateNetwork;
use crate::storage::InitializedBuffer;
use core_types::generic::{GenericBuffer, GenericValue, GenericVectorArray, GenericVirtualListRef};
use core_types::{IndexMask, MFContext, MFDataType, MFError, MFParamsBuilder, MultiFunction};
use graph_craft::network::{LinkError, MFNetwork, MFNetworkBuilder, MFNodeId, MFSocketId, NetworkError};
use math_nodes::{GenericConstantValue, GenericConstantVector};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OptimizationError {
	#[error(transparent)]
	Link(#[from] LinkError),
	#[error(transparent)]
	Network(#[from] NetworkError),
	#[error(transparent)]
	Params(#[from] MFError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationSettings {
	pub constant_folding: bool,
	pub dead_node_removal: bool,
}

impl Default for OptimizationSettings {
	fn default() -> Self {
		Self {
			constant_folding: true,
			dead_node_removal: true,
		}
	}
}

pub fn optimize_network(builder: &mut MFNetworkBuilder, settings: &OptimizationSettings) -> Result<(), OptimizationError> {
	if settings.constant_folding {
		constant_folding(builder)?;
	}
	if settings.dead_node_removal {
		dead_node_removal(builder);
	}
	Ok(())
}

/// Removes all function nodes whose outputs never reach a dummy node. Returns the amount of removed nodes.
pub fn dead_node_removal(builder: &mut MFNetworkBuilder) -> usize {
	let reachable = builder.nodes_reachable_from_outputs();
	let dead: Vec<_> = builder.function_nodes().map(|(id, _)| id).filter(|id| !reachable.contains(id)).collect();
	builder.remove_nodes(dead.iter().copied());
	if !dead.is_empty() {
		log::debug!("Removed {} dead nodes", dead.len());
	}
	dead.len()
}

/// Function nodes that neither depend on a dummy node nor on the context.
fn find_constant_nodes(builder: &MFNetworkBuilder) -> FxHashSet<MFNodeId> {
	let mut constants = FxHashSet::default();
	loop {
		let found: Vec<_> = builder
			.function_nodes()
			.filter(|(id, node)| {
				!constants.contains(id)
					&& node.function().is_some_and(|function| !function.depends_on_context())
					&& node.inputs.iter().all(|&input| {
						let origin = builder.socket(input).and_then(|socket| socket.origin).and_then(|origin| builder.socket(origin));
						origin.is_some_and(|origin| constants.contains(&origin.node))
					})
			})
			.map(|(id, _)| id)
			.collect();
		if found.is_empty() {
			return constants;
		}
		constants.extend(found);
	}
}

enum FoldedValue {
	Single(GenericValue),
	Vector(GenericVectorArray),
}

/// Computes every value that only depends on constants and is used by a node that does not, and replaces the nodes computing it
/// with a single constant node. Returns the amount of replaced outputs.
pub fn constant_folding(builder: &mut MFNetworkBuilder) -> Result<usize, OptimizationError> {
	let constants = find_constant_nodes(builder);
	let folded_outputs: Vec<MFSocketId> = constants
		.iter()
		.filter_map(|&id| builder.node(id))
		.filter(|node| !node.inputs.is_empty())
		.flat_map(|node| node.outputs.iter().copied())
		.filter(|&output| {
			let targets = builder.socket(output).map(|socket| socket.targets.as_slice()).unwrap_or_default();
			targets.iter().any(|&target| builder.socket(target).is_some_and(|target| !constants.contains(&target.node)))
		})
		.collect();
	if folded_outputs.is_empty() {
		return Ok(0);
	}

	let (constant_network, network_outputs) = constant_subnetwork(builder, &folded_outputs)?;
	let network = MFNetwork::new(&constant_network)?;
	let values = evaluate_once(&MFEvaluateNetwork::new(network, Vec::new(), network_outputs)?)?;

	for (&output, value) in folded_outputs.iter().zip(values) {
		let function: Arc<dyn MultiFunction> = match value {
			FoldedValue::Single(value) => Arc::new(GenericConstantValue::new(value)),
			FoldedValue::Vector(array) => Arc::new(GenericConstantVector::new(GenericVirtualListRef::from_full_array(array.get(0)))),
		};
		let constant = builder.add_function(function);
		let Some(&constant_output) = builder.node(constant).and_then(|node| node.outputs.first()) else { continue };
		builder.relink_origin(output, constant_output)?;
	}

	// Only the replaced constant nodes go, unrelated parts of the network stay as they are
	let consumer_inputs: Vec<_> = builder.function_nodes().chain(builder.dummy_nodes()).filter(|(id, _)| !constants.contains(id)).flat_map(|(_, node)| node.inputs.iter().copied()).collect();
	let still_used = builder.nodes_upstream_of(consumer_inputs);
	builder.remove_nodes(constants.iter().copied().filter(|id| !still_used.contains(id)));
	log::debug!("Folded {} constant values", folded_outputs.len());
	Ok(folded_outputs.len())
}

/// Copies the nodes computing `outputs` into a new builder, with one output dummy per output.
///
/// The rest of the network may still be under construction, so only the copied part has to be valid.
fn constant_subnetwork(builder: &MFNetworkBuilder, outputs: &[MFSocketId]) -> Result<(MFNetworkBuilder, Vec<MFSocketId>), OptimizationError> {
	let mut upstream: Vec<_> = builder.nodes_upstream_of(outputs.iter().copied()).into_iter().collect();
	upstream.sort();

	let mut network = MFNetworkBuilder::new();
	let mut socket_map = FxHashMap::default();
	for &id in &upstream {
		let node = builder.node(id).ok_or(NetworkError::NodeNotFound(id))?;
		let function = node.function().ok_or(NetworkError::NodeNotFound(id))?;
		let copy = network.add_function(function.clone());
		let copy = network.node(copy).ok_or(NetworkError::NodeNotFound(copy))?;
		socket_map.extend(node.inputs.iter().copied().zip(copy.inputs.iter().copied()));
		socket_map.extend(node.outputs.iter().copied().zip(copy.outputs.iter().copied()));
	}
	for &id in &upstream {
		let node = builder.node(id).ok_or(NetworkError::NodeNotFound(id))?;
		for &input in &node.inputs {
			let origin = builder.socket(input).and_then(|socket| socket.origin).ok_or(NetworkError::SocketNotFound(input))?;
			let from = *socket_map.get(&origin).ok_or(NetworkError::SocketNotFound(origin))?;
			let to = *socket_map.get(&input).ok_or(NetworkError::SocketNotFound(input))?;
			network.add_link(from, to)?;
		}
	}

	let mut dummies = Vec::with_capacity(outputs.len());
	for &output in outputs {
		let from = *socket_map.get(&output).ok_or(NetworkError::SocketNotFound(output))?;
		let data_type = builder.socket(output).ok_or(NetworkError::SocketNotFound(output))?.data_type;
		let dummy = network.add_output_dummy("Folded", data_type);
		network.add_link(from, dummy)?;
		dummies.push(dummy);
	}
	Ok((network, dummies))
}

/// Calls a network without inputs for a single element.
fn evaluate_once(evaluate_network: &MFEvaluateNetwork) -> Result<Vec<FoldedValue>, OptimizationError> {
	let signature = evaluate_network.signature();
	let mut singles = Vec::new();
	let mut vectors = Vec::new();
	for param_type in &signature.param_types {
		match param_type.data_type {
			MFDataType::Single(ty) => singles.push(GenericBuffer::new(ty, 1)),
			MFDataType::Vector(ty) => vectors.push(GenericVectorArray::new(ty, 1)),
		}
	}

	{
		let mut params = MFParamsBuilder::new(signature, 1);
		let mut singles = singles.iter_mut();
		let mut vectors = vectors.iter_mut();
		for param_type in &signature.param_types {
			match param_type.data_type {
				MFDataType::Single(_) => {
					if let Some(buffer) = singles.next() {
						params.add_uninitialized_single_output(buffer.as_mutable_array_ref())?;
					}
				}
				MFDataType::Vector(_) => {
					if let Some(array) = vectors.next() {
						params.add_vector_output(array)?;
					}
				}
			}
		}
		evaluate_network.call(IndexMask::from_size(1), params.finish()?, &MFContext::empty());
	}

	let mut singles = singles.into_iter().map(|buffer| {
		// SAFETY: the network initialized the only element
		let buffer = unsafe { InitializedBuffer::from_initialized(buffer) };
		// SAFETY: the element is initialized and of the buffer's type
		FoldedValue::Single(unsafe { GenericValue::copy_from_ptr(buffer.ty(), buffer.as_array_ref().get(0)) })
	});
	let mut vectors = vectors.into_iter().map(FoldedValue::Vector);
	let values = signature
		.param_types
		.iter()
		.filter_map(|param_type| match param_type.data_type {
			MFDataType::Single(_) => singles.next(),
			MFDataType::Vector(_) => vectors.next(),
		})
		.collect();
	Ok(values)
}

#[cfg(test)]
mod test {
	use super::*;
	use math_nodes::{BinaryOperation, ConstantValue, ContextValueFn, float_binary};
	use pretty_assertions::assert_eq;

	fn link_node(builder: &mut MFNetworkBuilder, function: Arc<dyn MultiFunction>, inputs: &[MFSocketId]) -> MFSocketId {
		let node = builder.add_function(function);
		let sockets = builder.node(node).unwrap().clone();
		for (&from, &to) in inputs.iter().zip(&sockets.inputs) {
			builder.add_link(from, to).unwrap();
		}
		sockets.outputs[0]
	}

	fn constant(builder: &mut MFNetworkBuilder, value: f32) -> MFSocketId {
		link_node(builder, Arc::new(ConstantValue::new(value)), &[])
	}

	fn constant_value(builder: &MFNetworkBuilder, output: MFSocketId) -> Option<f32> {
		let origin = builder.socket(output)?.origin?;
		let function = builder.node(builder.socket(origin)?.node)?.function()?.clone();
		let mut value = [0f32];
		{
			let mut params = MFParamsBuilder::for_function(function.as_ref(), 1);
			params.add_uninitialized_single_output(core_types::generic::GenericMutableArrayRef::from_slice(&mut value)).ok()?;
			function.call(IndexMask::from_size(1), params.finish().ok()?, &MFContext::empty());
		}
		Some(value[0])
	}

	#[test]
	fn folds_constant_subnetworks() {
		let mut builder = MFNetworkBuilder::new();
		let input = builder.add_input_dummy("X", MFDataType::for_single::<f32>());
		let [two, three] = [constant(&mut builder, 2.), constant(&mut builder, 3.)];
		let product = link_node(&mut builder, float_binary(BinaryOperation::Multiply).unwrap(), &[two, three]);
		let sum = link_node(&mut builder, float_binary(BinaryOperation::Add).unwrap(), &[product, input]);
		let result = builder.add_output_dummy("Result", MFDataType::for_single::<f32>());
		builder.add_link(sum, result).unwrap();
		assert_eq!(builder.function_nodes().count(), 4);

		assert_eq!(constant_folding(&mut builder), Ok(1));
		// The two constants and the product are replaced by a single constant.
		assert_eq!(builder.function_nodes().count(), 2);
		let add = builder.socket(sum).unwrap().node;
		let folded_input = builder.node(add).unwrap().inputs[0];
		assert_eq!(constant_value(&builder, folded_input), Some(6.));
		assert!(builder.is_valid());
		assert_eq!(constant_folding(&mut builder), Ok(0));
	}

	#[test]
	fn folding_ignores_unrelated_unlinked_inputs() {
		let mut builder = MFNetworkBuilder::new();
		let input = builder.add_input_dummy("X", MFDataType::for_single::<f32>());
		let [two, three] = [constant(&mut builder, 2.), constant(&mut builder, 3.)];
		let product = link_node(&mut builder, float_binary(BinaryOperation::Multiply).unwrap(), &[two, three]);
		let sum = link_node(&mut builder, float_binary(BinaryOperation::Add).unwrap(), &[product, input]);
		let result = builder.add_output_dummy("Result", MFDataType::for_single::<f32>());
		builder.add_link(sum, result).unwrap();
		let stray = link_node(&mut builder, float_binary(BinaryOperation::Add).unwrap(), &[]);
		assert!(MFNetwork::new(&builder).is_err());

		assert_eq!(constant_folding(&mut builder), Ok(1));
		let add = builder.socket(sum).unwrap().node;
		assert_eq!(constant_value(&builder, builder.node(add).unwrap().inputs[0]), Some(6.));
		// The stray node is left for dead node removal
		assert!(builder.socket(stray).is_some());
		assert_eq!(builder.function_nodes().count(), 3);

		assert_eq!(dead_node_removal(&mut builder), 1);
		assert!(MFNetwork::new(&builder).is_ok());
	}

	#[test]
	fn context_dependent_nodes_are_kept() {
		let mut builder = MFNetworkBuilder::new();
		let time = link_node(&mut builder, Arc::new(ContextValueFn::<f32>::new("Time")), &[]);
		let one = constant(&mut builder, 1.);
		let sum = link_node(&mut builder, float_binary(BinaryOperation::Add).unwrap(), &[time, one]);
		let result = builder.add_output_dummy("Result", MFDataType::for_single::<f32>());
		builder.add_link(sum, result).unwrap();

		assert_eq!(constant_folding(&mut builder), Ok(0));
		assert_eq!(builder.function_nodes().count(), 3);
	}

	#[test]
	fn removes_unreachable_nodes() {
		let mut builder = MFNetworkBuilder::new();
		let input = builder.add_input_dummy("X", MFDataType::for_single::<f32>());
		link_node(&mut builder, float_binary(BinaryOperation::Add).unwrap(), &[input, input]);
		let result = builder.add_output_dummy("Result", MFDataType::for_single::<f32>());
		builder.add_link(input, result).unwrap();

		assert_eq!(dead_node_removal(&mut builder), 1);
		assert_eq!(builder.function_nodes().count(), 0);
		assert_eq!(builder.dummy_nodes().count(), 2);
	}
}
