use crate::expression::{CompiledExpression, ExpressionVariables, compile_expression};
use math_parser::CompileError;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A bounded map shared between clones. The oldest entry is evicted once `capacity` is exceeded.
#[derive(Debug)]
pub struct ValueCache<K, V> {
	inner: Arc<Mutex<CacheInner<K, V>>>,
}

#[derive(Debug)]
struct CacheInner<K, V> {
	capacity: usize,
	values: FxHashMap<K, V>,
	insertion_order: VecDeque<K>,
}

impl<K, V> Clone for ValueCache<K, V> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<K: Clone + Eq + Hash, V: Clone> Default for ValueCache<K, V> {
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_CAPACITY)
	}
}

impl<K: Clone + Eq + Hash, V: Clone> ValueCache<K, V> {
	pub fn new(capacity: usize) -> Self {
		Self {
			inner: Arc::new(Mutex::new(CacheInner {
				capacity: capacity.max(1),
				values: FxHashMap::default(),
				insertion_order: VecDeque::new(),
			})),
		}
	}

	fn lock(&self) -> MutexGuard<'_, CacheInner<K, V>> {
		// A panic while holding the lock cannot leave the map half updated
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	pub fn get(&self, key: &K) -> Option<V> {
		self.lock().values.get(key).cloned()
	}

	pub fn insert(&self, key: K, value: V) {
		let mut inner = self.lock();
		if inner.values.insert(key.clone(), value).is_none() {
			inner.insertion_order.push_back(key);
		}
		while inner.values.len() > inner.capacity {
			let Some(oldest) = inner.insertion_order.pop_front() else { break };
			inner.values.remove(&oldest);
		}
	}

	pub fn get_or_insert_with(&self, key: K, create: impl FnOnce() -> V) -> V {
		match self.try_get_or_insert_with(key, || Ok::<_, std::convert::Infallible>(create())) {
			Ok(value) => value,
			Err(infallible) => match infallible {},
		}
	}

	/// Failed creations are not cached. The lock is not held while `create` runs.
	pub fn try_get_or_insert_with<E>(&self, key: K, create: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
		if let Some(value) = self.get(&key) {
			return Ok(value);
		}
		let value = create()?;
		self.insert(key, value.clone());
		Ok(value)
	}

	pub fn len(&self) -> usize {
		self.lock().values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		let mut inner = self.lock();
		inner.values.clear();
		inner.insertion_order.clear();
	}
}

/// Compiled expressions keyed by their source and variables.
#[derive(Clone, Debug, Default)]
pub struct ExpressionCache {
	cache: ValueCache<(String, ExpressionVariables), Arc<CompiledExpression>>,
}

impl ExpressionCache {
	pub fn new(capacity: usize) -> Self {
		Self { cache: ValueCache::new(capacity) }
	}

	pub fn get_or_compile(&self, src: &str, variables: &ExpressionVariables) -> Result<Arc<CompiledExpression>, CompileError> {
		self.cache.try_get_or_insert_with((src.to_string(), variables.clone()), || {
			log::trace!("Expression cache miss for `{src}`");
			compile_expression(src, variables).map(Arc::new)
		})
	}

	pub fn len(&self) -> usize {
		self.cache.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.is_empty()
	}

	pub fn clear(&self) {
		self.cache.clear();
	}
}

/// Prevents an update from starting while a previous one is still running.
#[derive(Clone, Debug, Default)]
pub struct UpdateGuard {
	running: Arc<AtomicBool>,
}

/// Marks the guarded update as running until dropped.
#[derive(Debug)]
pub struct UpdateToken {
	running: Arc<AtomicBool>,
}

impl UpdateGuard {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `None` if another update holds the guard.
	pub fn try_begin(&self) -> Option<UpdateToken> {
		self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
		Some(UpdateToken { running: self.running.clone() })
	}

	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::Acquire)
	}
}

impl Drop for UpdateToken {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
	}
}
