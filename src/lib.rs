//! View lifecycle management, delegated DOM events, push/pull data binding and a publish/subscribe hub for [`web_sys`].
//!
//! Every registry is an explicit value ([`Views`], [`Events`], [`Hubs`], [`Dx`]) that can be created fresh, for example per test.
//! The free functions in this module use per-thread default instances, where [`hub`], [`on`] and friends share the
//! [`Events`] and [`Hubs`] of the default [`Views`].

#![doc(html_root_url = "https://docs.rs/dom-views/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod binding;
pub mod dom;
pub mod dx;
mod error;
pub mod event;
pub mod hub;
mod ns_index;
pub mod view;

pub use dom::Append;
pub use dx::{set_val, val, Dx};
pub use error::Error;
pub use event::{DomEvent, EventInfo, EventOptions, Events, Listener};
pub use hub::{Hub, HubHandler, HubInfo, Hubs, SubscribeOptions};
pub use ns_index::Namespace;
pub use view::{Config, Content, HookStage, Target, View, ViewClass, ViewController, ViewState, Views};

use serde_json::Value;
use web_sys::{Element, EventTarget};

thread_local! {
	static VIEWS: Views = Views::new();
	static DX: Dx = Dx::new();
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub(crate) fn split_list(list: &str) -> Vec<&str> {
	list.split(',').map(str::trim).filter(|item| !item.is_empty()).collect()
}

/// The default [`Views`] of the current thread.
#[must_use]
pub fn views() -> Views {
	VIEWS.with(Clone::clone)
}

/// The default [`Dx`] of the current thread.
#[must_use]
pub fn dx() -> Dx {
	DX.with(Clone::clone)
}

/// See [`Views::register`].
pub fn register(name: &str, controller: ViewController) -> Result<(), Error> {
	views().register(name, controller)
}

/// See [`Views::register_with`].
pub fn register_with(name: &str, controller: ViewController, config: Config) -> Result<(), Error> {
	views().register_with(name, controller, config)
}

/// See [`Views::register_class`].
pub fn register_class<T: ViewClass>() -> Result<(), Error> {
	views().register_class::<T>()
}

/// See [`Views::display`].
pub async fn display(name: &str, parent: impl Into<Target>, data: Value, config: impl Into<Option<Config>>) -> Result<View, Error> {
	let views = views();
	views.display(name, parent, data, config).await
}

/// See [`Views::display_class`].
pub async fn display_class<T: ViewClass>(parent: impl Into<Target>, data: Value, config: impl Into<Option<Config>>) -> Result<View, Error> {
	let views = views();
	views.display_class::<T>(parent, data, config).await
}

/// See [`Views::remove`].
pub fn remove(el: Option<&Element>) -> Result<(), Error> {
	views().remove(el)
}

/// See [`Views::empty`].
pub fn empty(el: Option<&Element>) -> Result<(), Error> {
	views().empty(el)
}

/// See [`Views::hook`].
pub fn hook(stage: HookStage, hook: impl 'static + Fn(&View) -> Result<(), Error>) {
	views().hook(stage, hook);
}

/// See [`Hubs::get`].
#[must_use]
pub fn hub(name: &str) -> Hub {
	views().hubs().get(name)
}

/// See [`Events::on`].
pub fn on<T: AsRef<EventTarget>>(targets: impl IntoIterator<Item = T>, types: &str, selector: Option<&str>, listener: Listener, options: &EventOptions) -> Result<(), Error> {
	views().events().on(targets, types, selector, listener, options)
}

/// See [`Events::off`].
pub fn off<T: AsRef<EventTarget>>(targets: impl IntoIterator<Item = T>, types: &str, selector: Option<&str>, listener: Option<&Listener>) -> usize {
	views().events().off(targets, types, selector, listener)
}

/// See [`Events::off_ns`].
pub fn off_ns<T: AsRef<EventTarget>>(targets: impl IntoIterator<Item = T>, ns: &Namespace) -> usize {
	views().events().off_ns(targets, ns)
}

/// See [`event::trigger`].
pub fn trigger<T: AsRef<EventTarget>>(targets: impl IntoIterator<Item = T>, ty: &str, info: &EventInfo) -> Result<usize, Error> {
	event::trigger(targets, ty, info)
}

/// See [`Dx::push`].
pub fn push(el: &Element, selector: Option<&str>, data: &Value) -> Result<(), Error> {
	dx().push(el, selector, data)
}

/// See [`Dx::pull`].
pub fn pull(el: &Element, selector: Option<&str>) -> Result<Value, Error> {
	dx().pull(el, selector)
}

/// See [`Dx::pull_into`].
pub fn pull_into(el: &Element, selector: Option<&str>, data: &mut Value) -> Result<(), Error> {
	dx().pull_into(el, selector, data)
}

/// See [`Dx::pusher`].
pub fn pusher(selector: &str, pusher: impl 'static + Fn(&Element, &Value) -> Result<(), Error>) {
	dx().pusher(selector, pusher);
}

/// See [`Dx::puller`].
pub fn puller(selector: &str, puller: impl 'static + Fn(&Element, Option<&Value>) -> Result<Option<Value>, Error>) {
	dx().puller(selector, puller);
}

#[cfg(test)]
mod tests {
	use super::split_list;

	#[test]
	fn split_list_trims_and_drops_empty() {
		assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
		assert!(split_list(" , ").is_empty());
	}
}
