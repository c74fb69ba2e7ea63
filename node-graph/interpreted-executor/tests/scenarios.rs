use core_types::generic::{GenericMutableArrayRef, GenericVirtualListRef};
use core_types::{IndexMask, MFContext, MFDataType, MFParamsBuilder, MultiFunction};
use graph_craft::document::{DocumentNode, DocumentSocket, GROUP_IDNAME, NodeTree, NodeTreeLibrary, TreeId};
use graph_craft::network::{LinkError, MFNetwork, MFNetworkBuilder};
use graph_craft::{FlattenSettings, InlinedNodeTree, VTreeCache};
use interpreted_executor::{ExpressionVariables, MFEvaluateNetwork, NodeRegistry, OptimizationSettings, compile_expression, generate_network};
use math_nodes::{BinaryOperation, ConstantValue, float_binary};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

fn call_floats(function: &dyn MultiFunction, inputs: &[&[f32]], size: usize, mask: IndexMask) -> Vec<f32> {
	let mut output = vec![0.; size];
	{
		let mut params = MFParamsBuilder::for_function(function, size);
		for values in inputs {
			params.add_readonly_single_input(GenericVirtualListRef::from_slice(values)).unwrap();
		}
		params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output)).unwrap();
		function.call(mask, params.finish().unwrap(), &MFContext::empty());
	}
	output
}

#[test]
fn dummy_input_plus_constant() {
	init_logger();
	let float = MFDataType::for_single::<f32>();
	let mut builder = MFNetworkBuilder::new();
	let input = builder.add_input_dummy("Value", float);
	let output = builder.add_output_dummy("Result", float);
	let constant = builder.add_function(Arc::new(ConstantValue::new(4f32)));
	let add = builder.add_function(float_binary(BinaryOperation::Add).unwrap());
	let constant_output = builder.node(constant).unwrap().outputs[0];
	let add_node = builder.node(add).unwrap().clone();
	builder.add_link(input, add_node.inputs[0]).unwrap();
	builder.add_link(constant_output, add_node.inputs[1]).unwrap();
	builder.add_link(add_node.outputs[0], output).unwrap();

	let function = MFEvaluateNetwork::new(MFNetwork::new(&builder).unwrap(), vec![input], vec![output]).unwrap();
	assert_eq!(call_floats(&function, &[&[3.]], 1, IndexMask::from_indices(&[0])), vec![7.]);
}

#[test]
fn inputs_have_a_single_origin() {
	let float = MFDataType::for_single::<f32>();
	let mut builder = MFNetworkBuilder::new();
	let first = builder.add_input_dummy("First", float);
	let second = builder.add_input_dummy("Second", float);
	let output = builder.add_output_dummy("Result", float);
	builder.add_link(first, output).unwrap();
	assert_eq!(builder.add_link(second, output), Err(LinkError::InputAlreadyLinked { input: output, origin: first }));
	assert_eq!(builder.socket(output).unwrap().origin, Some(first));
	assert!(builder.is_valid());
}

#[test]
fn expression_product_binds_tighter() {
	let compiled = compile_expression("2 + 3 * 4", &ExpressionVariables::new()).unwrap();
	assert_eq!(compiled.ast().to_string(), "(+ 2 (* 3 4))");
	assert_eq!(compiled.evaluate(&[]).unwrap().get::<i32>(), Some(&14));
}

#[test]
fn expression_converts_int_operands() {
	let settings = OptimizationSettings {
		constant_folding: false,
		dead_node_removal: false,
	};
	let compiled = interpreted_executor::compile_expression_with("1 + 2.5", &ExpressionVariables::new(), &settings).unwrap();
	assert!(compiled.network().nodes().any(|(_, node)| node.name == "i32 to f32"));
	assert_eq!(compiled.evaluate(&[]).unwrap().get::<f32>(), Some(&3.5));
}

fn float_math(name: &str, operation: &str) -> DocumentNode {
	DocumentNode::new(name, "fn_FloatMathNode")
		.with_input(DocumentSocket::new("A", "fn_FloatSocket"))
		.with_input(DocumentSocket::new("B", "fn_FloatSocket"))
		.with_output(DocumentSocket::new("Result", "fn_FloatSocket"))
		.with_property("operation", operation)
}

fn float_group(name: &str, tree: TreeId) -> DocumentNode {
	DocumentNode::group(name, tree)
		.with_input(DocumentSocket::new("Value", "fn_FloatSocket"))
		.with_input(DocumentSocket::new("Amount", "fn_FloatSocket"))
		.with_output(DocumentSocket::new("Result", "fn_FloatSocket"))
}

/// `Root -> GroupA -> GroupB`: GroupB computes `Value * Amount`, GroupA adds 1 to the output of GroupB.
fn nested_library() -> (NodeTreeLibrary, TreeId) {
	let mut library = NodeTreeLibrary::new();

	let mut group_b = NodeTree::new("GroupB");
	let value = group_b.add_node(DocumentNode::group_input("Value", "fn_FloatSocket", 0));
	let amount = group_b.add_node(DocumentNode::group_input("Amount", "fn_FloatSocket", 1));
	let multiply = group_b.add_node(float_math("Multiply", "multiply"));
	let result = group_b.add_node(DocumentNode::group_output("Result", "fn_FloatSocket", 0));
	group_b.add_link(value, 0, multiply, 0).unwrap();
	group_b.add_link(amount, 0, multiply, 1).unwrap();
	group_b.add_link(multiply, 0, result, 0).unwrap();
	let group_b = library.add_tree(group_b);

	let mut group_a = NodeTree::new("GroupA");
	let value = group_a.add_node(DocumentNode::group_input("Value", "fn_FloatSocket", 0));
	let amount = group_a.add_node(DocumentNode::group_input("Amount", "fn_FloatSocket", 1));
	let inner = group_a.add_node(float_group("Inner", group_b));
	let add = group_a.add_node(float_math("Add", "add"));
	let result = group_a.add_node(DocumentNode::group_output("Result", "fn_FloatSocket", 0));
	group_a.add_link(value, 0, inner, 0).unwrap();
	group_a.add_link(amount, 0, inner, 1).unwrap();
	group_a.add_link(inner, 0, add, 0).unwrap();
	group_a.nodes[add].inputs[1] = DocumentSocket::new("B", "fn_FloatSocket").with_default(1f32);
	group_a.add_link(add, 0, result, 0).unwrap();
	let group_a = library.add_tree(group_a);

	// The amount of the outer group stays unlinked and is read from its default
	let mut root = NodeTree::new("Root");
	let input = root.add_node(DocumentNode::group_input("X", "fn_FloatSocket", 0));
	let mut outer = float_group("Outer", group_a);
	outer.inputs[1].default_value = 2f32.into();
	let outer = root.add_node(outer);
	let output = root.add_node(DocumentNode::group_output("Result", "fn_FloatSocket", 0));
	root.add_link(input, 0, outer, 0).unwrap();
	root.add_link(outer, 0, output, 0).unwrap();
	let root = library.add_tree(root);

	(library, root)
}

/// The same computation as [`nested_library`] written without groups.
fn flat_library() -> (NodeTreeLibrary, TreeId) {
	let mut root = NodeTree::new("Root");
	let input = root.add_node(DocumentNode::group_input("X", "fn_FloatSocket", 0));
	let mut multiply = float_math("Multiply", "multiply");
	multiply.inputs[1].default_value = 2f32.into();
	let multiply = root.add_node(multiply);
	let mut add = float_math("Add", "add");
	add.inputs[1].default_value = 1f32.into();
	let add = root.add_node(add);
	let output = root.add_node(DocumentNode::group_output("Result", "fn_FloatSocket", 0));
	root.add_link(input, 0, multiply, 0).unwrap();
	root.add_link(multiply, 0, add, 0).unwrap();
	root.add_link(add, 0, output, 0).unwrap();

	let mut library = NodeTreeLibrary::new();
	let root = library.add_tree(root);
	(library, root)
}

fn inline(library: &NodeTreeLibrary, root: TreeId) -> InlinedNodeTree {
	InlinedNodeTree::new(library, root, &mut VTreeCache::new(), &FlattenSettings::default()).unwrap()
}

#[test]
fn nested_groups_are_inlined() {
	init_logger();
	let (library, root) = nested_library();
	let inlined = inline(&library, root);

	assert_eq!(inlined.nodes_with_idname(GROUP_IDNAME).count(), 0);
	let multiply = inlined.nodes().find(|node| node.name() == "Multiply").unwrap();
	assert_eq!(multiply.depth(), 2);
	assert_eq!(multiply.parent_chain().iter().map(|parent| parent.name()).collect::<Vec<_>>(), vec!["Inner", "Outer"]);
	let add = inlined.nodes().find(|node| node.name() == "Add").unwrap();
	assert_eq!(add.depth(), 1);

	// The unlinked amount of the outer group reaches the inner multiplication
	assert_eq!(inlined.group_inputs().len(), 1);
	let amount = multiply.input(1);
	assert_eq!(amount.linked_group_inputs().map(|group_input| group_input.default_value().as_float()).collect::<Vec<_>>(), vec![Some(2.)]);
}

#[test]
fn grouped_and_flat_trees_agree() {
	init_logger();
	let registry = NodeRegistry::default();
	let inputs: [f32; 4] = [-1.5, 0., 1., 4.25];
	let mask = IndexMask::from_size(inputs.len());

	let mut results = Vec::new();
	for (library, root) in [nested_library(), flat_library()] {
		let inlined = inline(&library, root);
		for settings in [OptimizationSettings::default(), OptimizationSettings { constant_folding: false, dead_node_removal: false }] {
			let generated = generate_network(&inlined, &registry).unwrap();
			let function = generated.into_evaluate_network(&settings).unwrap();
			results.push(call_floats(&function, &[&inputs], inputs.len(), mask));
		}
	}
	let expected: Vec<f32> = inputs.iter().map(|x| x * 2. + 1.).collect();
	for result in results {
		assert_eq!(result, expected);
	}
}

#[test]
fn masked_elements_are_left_untouched() {
	let (library, root) = flat_library();
	let function = generate_network(&inline(&library, root), &NodeRegistry::default()).unwrap().into_evaluate_network(&OptimizationSettings::default()).unwrap();
	let inputs: [f32; 4] = [1., 2., 3., 4.];
	assert_eq!(call_floats(&function, &[&inputs], 4, IndexMask::from_indices(&[1, 3])), vec![0., 5., 0., 9.]);
	assert_eq!(call_floats(&function, &[&inputs], 4, IndexMask::from_indices(&[])), vec![0.; 4]);
}
