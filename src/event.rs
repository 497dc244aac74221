//! DOM event binding with selector delegation and namespaced bulk removal.

use crate::{ns_index::NamespaceIndex, split_list, Error, Namespace};
use hashbrown::HashMap;
use js_sys::{Function, JSON};
use serde_json::Value;
use std::{
	cell::RefCell,
	fmt,
	rc::{Rc, Weak},
};
use tracing::{error, instrument, trace, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{AddEventListenerOptions, CustomEvent, CustomEventInit, DocumentFragment, Element, EventTarget, Node};

/// A bound event listener. Identity (for [`Events::off`]) is the [`Rc`] allocation.
pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// Wraps a closure into a [`Listener`].
pub fn listener(f: impl 'static + Fn(&DomEvent)) -> Listener {
	Rc::new(f)
}

/// What a [`Listener`] receives.
#[derive(Debug, Clone)]
pub struct DomEvent {
	event: web_sys::Event,
	current_target: EventTarget,
	select_target: Option<Element>,
}

impl DomEvent {
	#[must_use]
	pub fn event(&self) -> &web_sys::Event {
		&self.event
	}

	/// The target the listener was bound to.
	#[must_use]
	pub fn current_target(&self) -> &EventTarget {
		&self.current_target
	}

	/// For delegated bindings, the closest ancestor-or-self of the event's origin that matched the selector.
	#[must_use]
	pub fn select_target(&self) -> Option<&Element> {
		self.select_target.as_ref()
	}

	/// The matched element for delegated bindings, otherwise the bound target.
	#[must_use]
	pub fn context(&self) -> &EventTarget {
		self.select_target.as_ref().map_or(&self.current_target, |element| element.as_ref())
	}

	/// The `detail` of a [`CustomEvent`], converted back from JavaScript.
	/// A `null` detail reads as [`None`].
	#[must_use]
	pub fn detail(&self) -> Option<Value> {
		let detail = self.event.dyn_ref::<CustomEvent>()?.detail();
		from_js(&detail)
	}
}

#[derive(Debug, Clone, Default)]
pub struct EventOptions {
	/// Tags the binding for [`Events::off_ns`].
	pub ns: Option<Namespace>,
	pub capture: bool,
}

impl EventOptions {
	#[must_use]
	pub fn ns(ns: impl Into<Namespace>) -> Self {
		Self { ns: Some(ns.into()), capture: false }
	}
}

/// Parameters of [`trigger`]. Triggered events always bubble.
#[derive(Debug, Clone, Default)]
pub struct EventInfo {
	pub cancelable: bool,
	pub detail: Option<Value>,
}

struct Binding {
	target: EventTarget,
	ty: String,
	selector: Option<String>,
	listener: Listener,
	function: Function,
	capture: bool,
	ns: Option<Namespace>,
}

#[derive(Default)]
struct Bindings {
	next_id: u32,
	by_id: HashMap<u32, Binding>,
	by_ns: NamespaceIndex<u32>,
}

struct Inner {
	bindings: RefCell<Bindings>,
	common_handler: Closure<dyn Fn(JsValue, web_sys::Event)>,
}

/// A registry of DOM event bindings.
///
/// All native listeners share one JavaScript closure that is bound to a per-binding id.
/// Dropping the last handle removes every listener still attached through it.
#[derive(Clone)]
pub struct Events(Rc<Inner>);

impl fmt::Debug for Events {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Events").field("len", &self.len()).finish_non_exhaustive()
	}
}

impl Default for Events {
	fn default() -> Self {
		Self::new()
	}
}

impl Events {
	#[must_use]
	pub fn new() -> Self {
		Self(Rc::new_cyclic(|weak: &Weak<Inner>| {
			let weak = weak.clone();
			Inner {
				bindings: RefCell::default(),
				common_handler: Closure::wrap(Box::new(move |id: JsValue, event: web_sys::Event| {
					let span = trace_span!("common_handler", ?id, event_type = %event.type_());
					let _enter = span.enter();
					match weak.upgrade() {
						Some(inner) => dispatch(&inner, &id, event),
						None => warn!("Event received after its registry was dropped."),
					}
				}) as Box<dyn Fn(JsValue, web_sys::Event)>),
			}
		}))
	}

	/// Binds `listener` for each comma-separated event type on each target.
	///
	/// With a `selector`, the listener only runs for events originating inside an element
	/// matching it, within the bound target.
	#[instrument(skip(self, targets, listener))]
	pub fn on<T: AsRef<EventTarget>>(&self, targets: impl IntoIterator<Item = T>, types: &str, selector: Option<&str>, listener: Listener, options: &EventOptions) -> Result<(), Error> {
		if let Some(selector) = selector {
			validate_selector(selector)?;
		}
		let types = split_list(types);
		for target in targets {
			let target = target.as_ref();
			for &ty in &types {
				let id = {
					let mut bindings = self.0.bindings.borrow_mut();
					let Bindings { next_id, by_id, .. } = &mut *bindings;
					free_id(next_id, by_id)
				};
				let function = self.0.common_handler.as_ref().unchecked_ref::<Function>().bind1(&JsValue::UNDEFINED, &JsValue::from(id)).unchecked_into::<Function>();

				let add_options = AddEventListenerOptions::new();
				add_options.set_capture(options.capture);
				target.add_event_listener_with_callback_and_add_event_listener_options(ty, &function, &add_options)?;

				let mut bindings = self.0.bindings.borrow_mut();
				if let Some(ns) = &options.ns {
					bindings.by_ns.insert(ns.clone(), id);
				}
				bindings.by_id.insert(
					id,
					Binding {
						target: target.clone(),
						ty: ty.to_owned(),
						selector: selector.map(ToOwned::to_owned),
						listener: listener.clone(),
						function,
						capture: options.capture,
						ns: options.ns.clone(),
					},
				);
				trace!(id, ty, "Bound listener.");
			}
		}
		Ok(())
	}

	/// Removes the bindings that match exactly on target, type and selector, and on `listener` if given.
	///
	/// Returns the number of removed bindings.
	#[instrument(skip(self, targets, listener))]
	pub fn off<T: AsRef<EventTarget>>(&self, targets: impl IntoIterator<Item = T>, types: &str, selector: Option<&str>, listener: Option<&Listener>) -> usize {
		let types = split_list(types);
		let mut ids = Vec::new();
		{
			let bindings = self.0.bindings.borrow();
			for target in targets {
				let target = target.as_ref();
				ids.extend(
					bindings
						.by_id
						.iter()
						.filter(|(_, binding)| {
							same_target(&binding.target, target)
								&& types.contains(&binding.ty.as_str())
								&& binding.selector.as_deref() == selector
								&& listener.map_or(true, |listener| same_listener(listener, &binding.listener))
						})
						.map(|(&id, _)| id),
				);
			}
		}
		self.detach(ids)
	}

	/// Removes every binding registered under `ns` on the given targets.
	///
	/// Returns the number of removed bindings.
	#[instrument(skip(self, targets))]
	pub fn off_ns<T: AsRef<EventTarget>>(&self, targets: impl IntoIterator<Item = T>, ns: &Namespace) -> usize {
		let targets: Vec<EventTarget> = targets.into_iter().map(|target| target.as_ref().clone()).collect();
		if targets.is_empty() {
			return 0;
		}
		let ids = {
			let mut bindings = self.0.bindings.borrow_mut();
			let Bindings { by_id, by_ns, .. } = &mut *bindings;
			by_ns.take_where(ns, |id| by_id.get(&id).map_or(true, |binding| targets.iter().any(|target| same_target(&binding.target, target))))
		};
		self.detach(ids)
	}

	/// The number of live bindings.
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.bindings.borrow().by_id.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn detach(&self, ids: Vec<u32>) -> usize {
		let removed: Vec<Binding> = {
			let mut bindings = self.0.bindings.borrow_mut();
			ids.into_iter()
				.filter_map(|id| {
					let binding = bindings.by_id.remove(&id)?;
					if let Some(ns) = &binding.ns {
						bindings.by_ns.forget(ns, id);
					}
					Some(binding)
				})
				.collect()
		};
		for binding in &removed {
			remove_listener(binding);
		}
		trace!("Removed {} listener(s).", removed.len());
		removed.len()
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		let bindings = self.bindings.get_mut();
		if !bindings.by_id.is_empty() {
			trace!("Removing {} listener(s) of a dropped registry.", bindings.by_id.len());
		}
		for (_, binding) in bindings.by_id.drain() {
			remove_listener(&binding);
		}
	}
}

fn remove_listener(binding: &Binding) {
	if let Err(error) = binding.target.remove_event_listener_with_callback_and_bool(&binding.ty, &binding.function, binding.capture) {
		error!("Failed to remove {:?} listener: {:?}", binding.ty, error);
	}
}

fn dispatch(inner: &Inner, id: &JsValue, event: web_sys::Event) {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	let id = match id.as_f64() {
		Some(id) => id as u32,
		None => return error!("Listener bound to non-numeric id {:?}.", id),
	};

	let (current_target, selector, listener) = match inner.bindings.borrow().by_id.get(&id) {
		Some(binding) => (binding.target.clone(), binding.selector.clone(), binding.listener.clone()),
		None => return trace!(id, "Stale listener invocation ignored."),
	};

	let select_target = match selector {
		None => None,
		Some(selector) => {
			let origin = event.target().and_then(|target| target.dyn_into::<Element>().ok());
			let matched = match origin.map(|origin| origin.closest(&selector)) {
				Some(Ok(Some(matched))) => matched,
				Some(Err(error)) => return error!("Delegation selector {:?} failed: {:?}", selector, error),
				Some(Ok(None)) | None => return,
			};
			// Windows aren't nodes, so everything is considered inside them.
			if let Some(scope) = current_target.dyn_ref::<Node>() {
				let matched_node: &Node = matched.as_ref();
				if !scope.contains(Some(matched_node)) {
					return;
				}
			}
			Some(matched)
		}
	};

	listener(&DomEvent { event, current_target, select_target });
}

/// Advances `next_id` to the next id not in `taken`. Ids wrap around, skipping live ones.
fn free_id<V>(next_id: &mut u32, taken: &HashMap<u32, V>) -> u32 {
	loop {
		*next_id = next_id.wrapping_add(1);
		if !taken.contains_key(&*next_id) {
			return *next_id;
		}
	}
}

fn validate_selector(selector: &str) -> Result<(), Error> {
	let probe = DocumentFragment::new()?;
	probe.query_selector(selector).map(|_| ()).map_err(crate::dom::invalid_selector(selector))
}

fn same_target(a: &EventTarget, b: &EventTarget) -> bool {
	AsRef::<JsValue>::as_ref(a) == AsRef::<JsValue>::as_ref(b)
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
	Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

/// Dispatches a bubbling [`CustomEvent`] named `ty` on each target.
///
/// Returns how many of the dispatched events were not cancelled.
#[instrument(skip(targets, info))]
pub fn trigger<T: AsRef<EventTarget>>(targets: impl IntoIterator<Item = T>, ty: &str, info: &EventInfo) -> Result<usize, Error> {
	let detail = info.detail.as_ref().map(to_js).transpose()?;
	let mut not_cancelled = 0;
	for target in targets {
		let init = CustomEventInit::new();
		init.set_bubbles(true);
		init.set_cancelable(info.cancelable);
		if let Some(detail) = &detail {
			init.set_detail(detail);
		}
		let event = CustomEvent::new_with_event_init_dict(ty, &init)?;
		if target.as_ref().dispatch_event(&event)? {
			not_cancelled += 1;
		}
	}
	Ok(not_cancelled)
}

pub(crate) fn to_js(value: &Value) -> Result<JsValue, Error> {
	Ok(JSON::parse(&value.to_string())?)
}

/// `null` and `undefined` both mean "no detail", since that's what an event without one carries.
pub(crate) fn from_js(value: &JsValue) -> Option<Value> {
	if value.is_null() || value.is_undefined() {
		return None;
	}
	let json = JSON::stringify(value).ok()?.as_string()?;
	serde_json::from_str(&json).ok()
}
