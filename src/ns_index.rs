use core::{fmt, hash::Hash};
use hashbrown::{hash_map::Entry, HashMap};
use std::rc::Rc;

/// An opaque tag grouping bindings and subscriptions so they can be removed together.
///
/// Each [`View`](`crate::View`) owns the namespace equal to its id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(Rc<str>);

impl Namespace {
	#[must_use]
	pub fn new(name: &str) -> Self {
		Self(name.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Namespace {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for Namespace {
	fn from(name: String) -> Self {
		Self(name.into())
	}
}

/// Index from [`Namespace`] to the handles registered under it, in registration order.
///
/// Handles are expected to be unique across the whole index.
#[derive(Debug)]
pub(crate) struct NamespaceIndex<H>(HashMap<Namespace, Vec<H>>);

impl<H> Default for NamespaceIndex<H> {
	fn default() -> Self {
		Self(HashMap::new())
	}
}

impl<H> NamespaceIndex<H>
where
	H: Copy + Eq + Hash,
{
	pub fn insert(&mut self, ns: Namespace, handle: H) {
		self.0.entry(ns).or_default().push(handle)
	}

	/// Removes and returns all handles under `ns`.
	pub fn take(&mut self, ns: &Namespace) -> Vec<H> {
		self.0.remove(ns).unwrap_or_default()
	}

	/// Removes and returns the handles under `ns` for which `filter` returns `true`.
	pub fn take_where(&mut self, ns: &Namespace, mut filter: impl FnMut(H) -> bool) -> Vec<H> {
		match self.0.entry(ns.clone()) {
			Entry::Vacant(_) => Vec::new(),
			Entry::Occupied(mut occupied) => {
				let (taken, kept): (Vec<H>, Vec<H>) = occupied.get().iter().copied().partition(|&handle| filter(handle));
				if kept.is_empty() {
					occupied.remove();
				} else {
					*occupied.get_mut() = kept;
				}
				taken
			}
		}
	}

	/// Forgets a single handle that was removed by other means.
	pub fn forget(&mut self, ns: &Namespace, handle: H) {
		if let Entry::Occupied(mut occupied) = self.0.entry(ns.clone()) {
			occupied.get_mut().retain(|&h| h != handle);
			if occupied.get().is_empty() {
				occupied.remove();
			}
		}
	}

	#[cfg(test)]
	pub fn namespace_count(&self) -> usize {
		self.0.len()
	}
}

#[cfg(test)]
mod tests {
	use super::{Namespace, NamespaceIndex};

	#[test]
	fn take_returns_handles_in_order() {
		let mut index = NamespaceIndex::default();
		index.insert(Namespace::new("a"), 1);
		index.insert(Namespace::new("b"), 2);
		index.insert(Namespace::new("a"), 3);

		assert_eq!(index.take(&"a".into()), vec![1, 3]);
		assert_eq!(index.take(&"a".into()), Vec::<i32>::new());
		assert_eq!(index.namespace_count(), 1);
	}

	#[test]
	fn take_where_keeps_the_rest() {
		let mut index = NamespaceIndex::default();
		for handle in 0..6 {
			index.insert(Namespace::new("ns"), handle);
		}

		assert_eq!(index.take_where(&"ns".into(), |h| h % 2 == 0), vec![0, 2, 4]);
		assert_eq!(index.take(&"ns".into()), vec![1, 3, 5]);
		assert_eq!(index.namespace_count(), 0);
	}

	#[test]
	fn forget_drops_empty_namespaces() {
		let mut index = NamespaceIndex::default();
		index.insert(Namespace::new("x"), 7_u32);
		index.forget(&"x".into(), 8);
		assert_eq!(index.namespace_count(), 1);
		index.forget(&"x".into(), 7);
		assert_eq!(index.namespace_count(), 0);
	}
}
