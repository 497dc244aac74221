//! Declarative event and hub bindings of a [`ViewController`](`crate::ViewController`).
//!
//! Event keys read `"types"` or `"types; selector"`, hub keys `"hub; topics"` or `"hub; topics; labels"`.
//! Everything a view binds is tagged with its [`Namespace`](`crate::Namespace`).

use crate::{
	dom,
	event::{self, DomEvent, EventOptions, Events},
	hub::{self, HubInfo, Hubs, SubscribeOptions},
	Error, View,
};
use serde_json::Value;
use std::rc::Rc;
use tracing::{instrument, trace, warn};
use web_sys::EventTarget;

pub(crate) type ViewEventHandler = Rc<dyn Fn(&View, &DomEvent)>;
pub(crate) type ViewHubHandler = Rc<dyn Fn(&View, &Value, &HubInfo) -> Result<(), Error>>;

#[derive(Clone)]
pub(crate) struct EventBinding {
	pub key: String,
	pub handler: ViewEventHandler,
}

#[derive(Clone)]
pub(crate) struct HubBinding {
	pub key: String,
	pub handler: ViewHubHandler,
}

/// Where a group of event bindings is attached.
#[derive(Debug, Clone, Copy)]
enum Scope {
	Element,
	Document,
	Window,
}

fn parse_event_key(key: &str) -> Result<(&str, Option<&str>), Error> {
	let mut parts = key.split(';').map(str::trim);
	let types = parts.next().filter(|types| !types.is_empty()).ok_or_else(|| Error::InvalidBinding { key: key.to_owned(), reason: "missing event type" })?;
	let selector = parts.next().filter(|selector| !selector.is_empty());
	if parts.next().is_some() {
		return Err(Error::InvalidBinding { key: key.to_owned(), reason: "expected `types` or `types; selector`" });
	}
	Ok((types, selector))
}

fn parse_hub_key(key: &str) -> Result<(&str, &str, Option<&str>), Error> {
	let parts: Vec<&str> = key.split(';').map(str::trim).collect();
	match parts.as_slice() {
		[hub, topics] | [hub, topics, ""] if !hub.is_empty() && !topics.is_empty() => Ok((*hub, *topics, None)),
		[hub, topics, labels] if !hub.is_empty() && !topics.is_empty() => Ok((*hub, *topics, Some(*labels))),
		_ => Err(Error::InvalidBinding { key: key.to_owned(), reason: "expected `hub; topics` or `hub; topics; labels`" }),
	}
}

/// Binds all declared bindings of `view` under its namespace.
///
/// Stops at the first malformed declaration; the caller is expected to [`unbind`] in that case.
#[instrument(skip(view, events, hubs), fields(view = %view.id()))]
pub(crate) fn bind(view: &View, events: &Events, hubs: &Hubs) -> Result<(), Error> {
	let controller = view.controller();
	let options = EventOptions::ns(view.namespace());

	for (scope, bindings) in [(Scope::Element, &controller.events), (Scope::Document, &controller.doc_events), (Scope::Window, &controller.win_events)] {
		if bindings.is_empty() {
			continue;
		}
		let target: EventTarget = match scope {
			Scope::Element => view.el().ok_or_else(|| Error::Removed(view.id().to_owned()))?.into(),
			Scope::Document => dom::document()?.into(),
			Scope::Window => dom::window()?.into(),
		};
		for binding in bindings {
			let (types, selector) = parse_event_key(&binding.key)?;
			let handler = binding.handler.clone();
			let bound_view = view.clone();
			events.on(Some(&target), types, selector, event::listener(move |event| handler(&bound_view, event)), &options)?;
			trace!(?scope, key = %binding.key, "Bound view event.");
		}
	}

	let options = SubscribeOptions::ns(view.namespace());
	for binding in &controller.hub_events {
		let (hub_name, topics, labels) = parse_hub_key(&binding.key)?;
		let handler = binding.handler.clone();
		let bound_view = view.clone();
		hubs.get(hub_name).subscribe(topics, labels, hub::handler(move |message, info| handler(&bound_view, message, info)), &options);
		trace!(key = %binding.key, "Bound view hub event.");
	}
	Ok(())
}

/// Removes everything `view` bound on its element, the document, the window and any hub.
#[instrument(skip(view, events, hubs), fields(view = %view.id()))]
pub(crate) fn unbind(view: &View, events: &Events, hubs: &Hubs) -> usize {
	let ns = view.namespace();
	let mut targets: Vec<EventTarget> = Vec::with_capacity(3);
	targets.extend(view.el().map(Into::into));
	match dom::window() {
		Ok(window) => {
			targets.extend(window.document().map(Into::into));
			targets.push(window.into());
		}
		Err(error) => warn!("Unbinding without a window: {}", error),
	}
	let removed = events.off_ns(&targets, &ns) + hubs.unsubscribe_all(&ns);
	trace!("Unbound {} binding(s).", removed);
	removed
}
