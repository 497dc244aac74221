//! Named publish/subscribe hubs keyed by topic and optional label.

use crate::{ns_index::NamespaceIndex, split_list, Error, Namespace};
use hashbrown::HashMap;
use serde_json::Value;
use std::{cell::RefCell, fmt, rc::Rc};
use tracing::{error, instrument, trace};

/// A hub subscriber. Errors are logged and don't stop delivery to the remaining subscribers.
pub type HubHandler = Rc<dyn Fn(&Value, &HubInfo) -> Result<(), Error>>;

/// Wraps a closure into a [`HubHandler`].
pub fn handler(f: impl 'static + Fn(&Value, &HubInfo) -> Result<(), Error>) -> HubHandler {
	Rc::new(f)
}

/// Delivery information passed alongside each message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubInfo {
	pub topic: String,
	/// The published label for label-bound subscribers, all published labels joined with `,` for topic-only
	/// subscribers, or [`None`] if the message was published without labels.
	pub label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
	/// Tags the subscription for [`Hub::unsubscribe`].
	pub ns: Option<Namespace>,
}

impl SubscribeOptions {
	#[must_use]
	pub fn ns(ns: impl Into<Namespace>) -> Self {
		Self { ns: Some(ns.into()) }
	}
}

struct Subscription {
	key: (String, Option<String>),
	handler: HubHandler,
	ns: Option<Namespace>,
}

#[derive(Default)]
struct HubState {
	next_id: u64,
	subscriptions: HashMap<u64, Subscription>,
	by_key: HashMap<(String, Option<String>), Vec<u64>>,
	by_ns: NamespaceIndex<u64>,
}

impl HubState {
	fn handlers(&self, topic: &str, label: Option<&str>) -> impl '_ + Iterator<Item = HubHandler> {
		self.by_key
			.get(&(topic.to_owned(), label.map(ToOwned::to_owned)))
			.into_iter()
			.flatten()
			.filter_map(move |id| self.subscriptions.get(id))
			.map(|subscription| subscription.handler.clone())
	}
}

/// Handle to a named hub. Clones share state.
#[derive(Clone)]
pub struct Hub {
	name: Rc<str>,
	state: Rc<RefCell<HubState>>,
}

impl fmt::Debug for Hub {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Hub").field("name", &self.name).field("len", &self.len()).finish()
	}
}

impl Hub {
	fn new(name: &str) -> Self {
		Self { name: name.into(), state: Rc::default() }
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Subscribes `handler` to each comma-separated topic, or to each topic × label pair if `labels` names any.
	///
	/// Identical subscriptions are not deduplicated. Returns the number of entries created.
	#[instrument(skip(self, handler), fields(hub = %self.name))]
	pub fn subscribe(&self, topics: &str, labels: Option<&str>, handler: HubHandler, options: &SubscribeOptions) -> usize {
		let labels: Vec<Option<&str>> = match labels.map(split_list).filter(|labels| !labels.is_empty()) {
			Some(labels) => labels.into_iter().map(Some).collect(),
			None => vec![None],
		};
		let mut state = self.state.borrow_mut();
		let mut created = 0;
		for topic in split_list(topics) {
			for &label in &labels {
				state.next_id += 1;
				let id = state.next_id;
				let key = (topic.to_owned(), label.map(ToOwned::to_owned));
				state.by_key.entry(key.clone()).or_default().push(id);
				if let Some(ns) = &options.ns {
					state.by_ns.insert(ns.clone(), id);
				}
				state.subscriptions.insert(id, Subscription { key, handler: handler.clone(), ns: options.ns.clone() });
				created += 1;
			}
		}
		trace!("Created {} subscription(s).", created);
		created
	}

	/// Delivers `message` synchronously to the matching subscribers and returns how many were invoked.
	///
	/// With labels, label-bound subscribers of each topic × label go first, then each topic's topic-only subscribers.
	/// Subscribers are resolved before the first one runs.
	#[instrument(skip(self, message), fields(hub = %self.name))]
	pub fn publish(&self, topics: &str, labels: Option<&str>, message: &Value) -> usize {
		if cfg!(feature = "dangerous-logging") {
			trace!(%message, "Publishing.");
		}

		let topics = split_list(topics);
		let labels = labels.map(split_list).filter(|labels| !labels.is_empty());

		let deliveries: Vec<(HubHandler, HubInfo)> = {
			let state = self.state.borrow();
			let mut deliveries = Vec::new();
			if let Some(labels) = &labels {
				for &topic in &topics {
					for &label in labels {
						let info = HubInfo { topic: topic.to_owned(), label: Some(label.to_owned()) };
						deliveries.extend(state.handlers(topic, Some(label)).map(|handler| (handler, info.clone())));
					}
				}
			}
			let joined_labels = labels.as_ref().map(|labels| labels.join(","));
			for &topic in &topics {
				let info = HubInfo { topic: topic.to_owned(), label: joined_labels.clone() };
				deliveries.extend(state.handlers(topic, None).map(|handler| (handler, info.clone())));
			}
			deliveries
		};

		for (handler, info) in &deliveries {
			if let Err(error) = handler(message, info) {
				error!(topic = %info.topic, label = ?info.label, "Hub handler failed: {}", error);
			}
		}
		deliveries.len()
	}

	/// Removes every subscription tagged with `ns`. Returns the number removed.
	#[instrument(skip(self), fields(hub = %self.name))]
	pub fn unsubscribe(&self, ns: &Namespace) -> usize {
		let mut state = self.state.borrow_mut();
		let ids = state.by_ns.take(ns);
		for id in &ids {
			if let Some(subscription) = state.subscriptions.remove(id) {
				debug_assert_eq!(subscription.ns.as_ref(), Some(ns));
				let now_empty = state.by_key.get_mut(&subscription.key).map_or(false, |key_ids| {
					key_ids.retain(|other| other != id);
					key_ids.is_empty()
				});
				if now_empty {
					state.by_key.remove(&subscription.key);
				}
			}
		}
		trace!("Removed {} subscription(s).", ids.len());
		ids.len()
	}

	/// The number of live subscriptions.
	#[must_use]
	pub fn len(&self) -> usize {
		self.state.borrow().subscriptions.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// A registry of named [`Hub`]s. Clones share state.
#[derive(Clone, Default)]
pub struct Hubs(Rc<RefCell<HashMap<String, Hub>>>);

impl fmt::Debug for Hubs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.0.borrow().keys()).finish()
	}
}

impl Hubs {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the hub called `name`, creating it on first request.
	#[must_use]
	pub fn get(&self, name: &str) -> Hub {
		self.0
			.borrow_mut()
			.entry(name.to_owned())
			.or_insert_with(|| {
				trace!(name, "Created hub.");
				Hub::new(name)
			})
			.clone()
	}

	/// Unsubscribes `ns` from every hub in this registry.
	pub fn unsubscribe_all(&self, ns: &Namespace) -> usize {
		let hubs: Vec<Hub> = self.0.borrow().values().cloned().collect();
		hubs.iter().map(|hub| hub.unsubscribe(ns)).sum()
	}
}
