use core_types::generic::{GenericArrayRef, GenericBuffer, GenericMutableArrayRef, GenericVectorArray, GenericVirtualListListRef, GenericVirtualListRef};
use core_types::{CppType, IndexMask};
use graph_craft::MFSocketId;

/// A buffer whose elements are all initialized. Dropping it destructs every element.
pub struct InitializedBuffer {
	buffer: GenericBuffer,
}

impl InitializedBuffer {
	/// # Safety
	/// Every element of `buffer` must be initialized.
	pub unsafe fn from_initialized(buffer: GenericBuffer) -> Self {
		Self { buffer }
	}

	/// Copies the masked elements of `values` into a new buffer of `size` elements, the other elements are default constructed.
	pub fn copy_from(values: GenericVirtualListRef, mask: IndexMask, size: usize) -> Self {
		let ty = values.ty();
		let mut buffer = GenericBuffer::new(ty, size);
		for index in mask {
			// SAFETY: the source is initialized and every masked index is visited once
			unsafe { ty.copy_to_uninitialized(values.get(index), buffer.get(index)) };
		}
		// SAFETY: only the masked elements were initialized above
		unsafe { buffer.construct_default_outside(mask) };
		Self { buffer }
	}

	pub fn ty(&self) -> &'static CppType {
		self.buffer.ty()
	}

	pub fn size(&self) -> usize {
		self.buffer.size()
	}

	pub fn as_array_ref(&self) -> GenericArrayRef<'_> {
		// SAFETY: all elements are initialized
		unsafe { self.buffer.as_array_ref() }
	}

	pub fn as_virtual_list(&self) -> GenericVirtualListRef<'_> {
		GenericVirtualListRef::from_full_array(self.as_array_ref())
	}

	pub fn as_mutable_array_ref(&mut self) -> GenericMutableArrayRef<'_> {
		self.buffer.as_mutable_array_ref()
	}
}

impl Drop for InitializedBuffer {
	fn drop(&mut self) {
		let size = self.buffer.size();
		// SAFETY: all elements are initialized
		unsafe { self.buffer.destruct_indices(IndexMask::from_size(size)) };
	}
}

/// What a socket currently refers to.
#[derive(Clone, Copy, Debug)]
enum SlotValue<'a> {
	Empty,
	/// Provided by the caller, never written to.
	SingleRef(GenericVirtualListRef<'a>),
	VectorRef(GenericVirtualListListRef<'a>),
	/// Owned by the storage. Several sockets may alias the same value.
	Single(usize),
	Vector(usize),
}

/// Values of all sockets computed during one call of a network.
pub(crate) struct NetworkEvaluationStorage<'a> {
	min_array_size: usize,
	slots: Vec<SlotValue<'a>>,
	singles: Vec<Option<InitializedBuffer>>,
	vectors: Vec<Option<GenericVectorArray>>,
}

impl<'a> NetworkEvaluationStorage<'a> {
	pub fn new(socket_amount: usize, min_array_size: usize) -> Self {
		Self {
			min_array_size,
			slots: vec![SlotValue::Empty; socket_amount],
			singles: Vec::new(),
			vectors: Vec::new(),
		}
	}

	pub fn is_computed(&self, socket: MFSocketId) -> bool {
		!matches!(self.slots[socket.index()], SlotValue::Empty)
	}

	pub fn add_single_input_from_caller(&mut self, socket: MFSocketId, list: GenericVirtualListRef<'a>) {
		self.slots[socket.index()] = SlotValue::SingleRef(list);
	}

	pub fn add_vector_input_from_caller(&mut self, socket: MFSocketId, list_list: GenericVirtualListListRef<'a>) {
		self.slots[socket.index()] = SlotValue::VectorRef(list_list);
	}

	pub fn add_single_output(&mut self, socket: MFSocketId, value: InitializedBuffer) {
		self.singles.push(Some(value));
		self.slots[socket.index()] = SlotValue::Single(self.singles.len() - 1);
	}

	pub fn add_vector_output(&mut self, socket: MFSocketId, value: GenericVectorArray) {
		self.vectors.push(Some(value));
		self.slots[socket.index()] = SlotValue::Vector(self.vectors.len() - 1);
	}

	/// Makes the value of the output `from` available at the input `to`. A mutable consumer receives its own copy, everything else
	/// aliases the value.
	pub fn forward(&mut self, from: MFSocketId, to: MFSocketId, to_is_mutable: bool, mask: IndexMask) {
		let value = match self.slots[from.index()] {
			SlotValue::SingleRef(_) | SlotValue::Single(_) if to_is_mutable => {
				let copy = InitializedBuffer::copy_from(self.single(from), mask, self.min_array_size);
				self.singles.push(Some(copy));
				SlotValue::Single(self.singles.len() - 1)
			}
			SlotValue::VectorRef(_) | SlotValue::Vector(_) if to_is_mutable => {
				let copy = GenericVectorArray::copy_from(self.vector(from), mask, self.min_array_size);
				self.vectors.push(Some(copy));
				SlotValue::Vector(self.vectors.len() - 1)
			}
			value => value,
		};
		self.slots[to.index()] = value;
	}

	pub fn single(&self, socket: MFSocketId) -> GenericVirtualListRef<'_> {
		match self.slots[socket.index()] {
			SlotValue::SingleRef(list) => list,
			SlotValue::Single(index) => match &self.singles[index] {
				Some(buffer) => buffer.as_virtual_list(),
				None => panic!("the value of socket {socket} was moved into a mutable parameter"),
			},
			slot => panic!("socket {socket} does not hold a single value: {slot:?}"),
		}
	}

	pub fn vector(&self, socket: MFSocketId) -> GenericVirtualListListRef<'_> {
		match self.slots[socket.index()] {
			SlotValue::VectorRef(list_list) => list_list,
			SlotValue::Vector(index) => match &self.vectors[index] {
				Some(array) => array.as_list_list(),
				None => panic!("the value of socket {socket} was moved into a mutable parameter"),
			},
			slot => panic!("socket {socket} does not hold a vector value: {slot:?}"),
		}
	}

	/// Takes the value of an input consumed by a mutable parameter.
	pub fn take_single_mutable(&mut self, socket: MFSocketId, mask: IndexMask) -> InitializedBuffer {
		if let SlotValue::Single(index) = self.slots[socket.index()] {
			if let Some(buffer) = self.singles[index].take() {
				return buffer;
			}
		}
		InitializedBuffer::copy_from(self.single(socket), mask, self.min_array_size)
	}

	pub fn take_vector_mutable(&mut self, socket: MFSocketId, mask: IndexMask) -> GenericVectorArray {
		if let SlotValue::Vector(index) = self.slots[socket.index()] {
			if let Some(array) = self.vectors[index].take() {
				return array;
			}
		}
		GenericVectorArray::copy_from(self.vector(socket), mask, self.min_array_size)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn copies_are_default_filled() {
		let values = [String::from("a"), String::from("b"), String::from("c")];
		let indices = [0, 2];
		let copy = InitializedBuffer::copy_from(GenericVirtualListRef::from_slice(&values), IndexMask::from_indices(&indices), 3);
		assert_eq!(copy.as_array_ref().as_typed_ref::<String>(), &["a".to_string(), String::new(), "c".to_string()]);
	}

	#[test]
	fn mutable_consumers_get_a_copy() {
		let values = [1, 2, 3];
		let mask = IndexMask::from_size(3);
		let mut storage = NetworkEvaluationStorage::new(3, 3);
		let [input, shared, mutable] = [MFSocketId(0), MFSocketId(1), MFSocketId(2)];
		storage.add_single_input_from_caller(input, GenericVirtualListRef::from_slice(&values));
		storage.forward(input, shared, false, mask);
		storage.forward(input, mutable, true, mask);

		let mut owned = storage.take_single_mutable(mutable, mask);
		// SAFETY: the buffer holds initialized i32 values
		(unsafe { owned.as_mutable_array_ref().into_typed::<i32>() })[1] = 20;
		assert_eq!(owned.as_array_ref().as_typed_ref::<i32>(), &[1, 20, 3]);
		assert_eq!(storage.single(shared).as_typed_ref::<i32>().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
		assert!(storage.is_computed(mutable));
	}
}
