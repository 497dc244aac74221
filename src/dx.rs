//! Pushing plain data into DOM subtrees and pulling it back out.
//!
//! An element takes part if it matches the push/pull selector (`.dx` by default) and names a
//! property path, through (in order of precedence):
//!
//! - its first `dx-` class, with dashes as path separators (`dx-contact-email` → `contact.email`),
//! - its `data-dx` attribute,
//! - its `name` attribute.
//!
//! Each element is handled by the first [`Pusher`] or [`Puller`] whose selector it matches.
//! Custom ones are checked newest first, before the built-in ones.

use crate::{dom, Error};
use serde_json::{Map, Value};
use std::{cell::RefCell, fmt, rc::Rc};
use tracing::{instrument, trace, trace_span};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

/// Writes a value into a matched element.
pub type Pusher = Rc<dyn Fn(&Element, &Value) -> Result<(), Error>>;

/// Reads a value from a matched element, given what was already collected for the same path.
/// [`None`] leaves the path untouched.
pub type Puller = Rc<dyn Fn(&Element, Option<&Value>) -> Result<Option<Value>, Error>>;

pub const DEFAULT_SELECTOR: &str = ".dx";

const CHECKABLE: &str = "input[type='checkbox'], input[type='radio']";

struct DxState {
	pushers: Vec<(String, Pusher)>,
	pullers: Vec<(String, Puller)>,
}

/// A push/pull registry. Clones share state.
#[derive(Clone)]
pub struct Dx(Rc<RefCell<DxState>>);

impl fmt::Debug for Dx {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.0.borrow();
		f.debug_struct("Dx")
			.field("pushers", &state.pushers.iter().map(|(selector, _)| selector).collect::<Vec<_>>())
			.field("pullers", &state.pullers.iter().map(|(selector, _)| selector).collect::<Vec<_>>())
			.finish()
	}
}

impl Default for Dx {
	fn default() -> Self {
		Self::new()
	}
}

impl Dx {
	/// Creates a registry with only the built-in pushers and pullers.
	#[must_use]
	pub fn new() -> Self {
		let pushers: Vec<(String, Pusher)> = vec![
			(CHECKABLE.to_owned(), Rc::new(push_checkable) as Pusher),
			("input".to_owned(), Rc::new(|el: &Element, value: &Value| with_input(el, |input| input.set_value(&text(value)))) as Pusher),
			("select".to_owned(), Rc::new(|el: &Element, value: &Value| with(el, |select: &HtmlSelectElement| select.set_value(&text(value)))) as Pusher),
			("textarea".to_owned(), Rc::new(|el: &Element, value: &Value| with(el, |textarea: &HtmlTextAreaElement| textarea.set_value(&text(value)))) as Pusher),
			("*".to_owned(), Rc::new(|el: &Element, value: &Value| {
				el.set_text_content(Some(&text(value)));
				Ok(())
			}) as Pusher),
		];
		let pullers: Vec<(String, Puller)> = vec![
			(CHECKABLE.to_owned(), Rc::new(pull_checkable) as Puller),
			("input".to_owned(), Rc::new(|el: &Element, _: Option<&Value>| with_input(el, |input| Some(Value::String(input.value())))) as Puller),
			("select".to_owned(), Rc::new(|el: &Element, _: Option<&Value>| with(el, |select: &HtmlSelectElement| Some(Value::String(select.value())))) as Puller),
			("textarea".to_owned(), Rc::new(|el: &Element, _: Option<&Value>| with(el, |textarea: &HtmlTextAreaElement| Some(Value::String(textarea.value())))) as Puller),
			("*".to_owned(), Rc::new(|el: &Element, _: Option<&Value>| Ok(Some(Value::String(el.text_content().unwrap_or_default())))) as Puller),
		];
		Self(Rc::new(RefCell::new(DxState { pushers, pullers })))
	}

	/// Registers a pusher for elements matching `selector`, ahead of all existing ones.
	pub fn pusher(&self, selector: &str, pusher: impl 'static + Fn(&Element, &Value) -> Result<(), Error>) {
		self.0.borrow_mut().pushers.insert(0, (selector.to_owned(), Rc::new(pusher)));
	}

	/// Registers a puller for elements matching `selector`, ahead of all existing ones.
	pub fn puller(&self, selector: &str, puller: impl 'static + Fn(&Element, Option<&Value>) -> Result<Option<Value>, Error>) {
		self.0.borrow_mut().pullers.insert(0, (selector.to_owned(), Rc::new(puller)));
	}

	/// Pushes the properties of `data` into the matching elements below `el`.
	///
	/// Elements whose path is absent from `data` are left alone.
	#[instrument(skip(self, el, data))]
	pub fn push(&self, el: &Element, selector: Option<&str>, data: &Value) -> Result<(), Error> {
		for dx_el in dom::all(Some(el), selector.unwrap_or(DEFAULT_SELECTOR))? {
			let path = match prop_path(&dx_el) {
				Some(path) => path,
				None => continue,
			};
			let value = match val(data, &path) {
				Some(value) => value,
				None => continue,
			};
			let span = trace_span!("push", %path);
			let _enter = span.enter();
			if cfg!(feature = "dangerous-logging") {
				trace!(%value, "Pushing.");
			}
			if let Some(pusher) = self.find(&dx_el, |state| &state.pushers)? {
				pusher(&dx_el, value)?;
			}
		}
		Ok(())
	}

	/// Collects the values of the matching elements below `el` into a new object.
	pub fn pull(&self, el: &Element, selector: Option<&str>) -> Result<Value, Error> {
		let mut data = Value::Object(Map::new());
		self.pull_into(el, selector, &mut data)?;
		Ok(data)
	}

	/// Like [`pull`](`Dx::pull`), but writes into `data`, keeping properties no element names.
	///
	/// Pullers see what `data` already holds at their path.
	#[instrument(skip(self, el, data))]
	pub fn pull_into(&self, el: &Element, selector: Option<&str>, data: &mut Value) -> Result<(), Error> {
		for dx_el in dom::all(Some(el), selector.unwrap_or(DEFAULT_SELECTOR))? {
			let path = match prop_path(&dx_el) {
				Some(path) => path,
				None => continue,
			};
			let span = trace_span!("pull", %path);
			let _enter = span.enter();
			if let Some(puller) = self.find(&dx_el, |state| &state.pullers)? {
				if let Some(value) = puller(&dx_el, val(data, &path))? {
					if cfg!(feature = "dangerous-logging") {
						trace!(%value, "Pulled.");
					}
					set_val(data, &path, value);
				}
			}
		}
		Ok(())
	}

	fn find<F: Clone>(&self, el: &Element, entries: impl FnOnce(&DxState) -> &Vec<(String, F)>) -> Result<Option<F>, Error> {
		// Cloned out so that pushers and pullers may register others.
		let entries = entries(&self.0.borrow()).clone();
		for (selector, f) in entries {
			if el.matches(&selector).map_err(dom::invalid_selector(&selector))? {
				return Ok(Some(f));
			}
		}
		Ok(None)
	}
}

/// The property path an element is bound to, if any.
#[must_use]
pub fn prop_path(el: &Element) -> Option<String> {
	let classes = el.class_list();
	(0..classes.length())
		.filter_map(|i| classes.item(i))
		.find_map(|class| class.strip_prefix("dx-").map(|rest| rest.replace('-', ".")))
		.filter(|path| !path.is_empty())
		.or_else(|| el.get_attribute("data-dx"))
		.or_else(|| el.get_attribute("name"))
		.filter(|path| !path.is_empty())
}

/// Reads the value at a dot-separated path. Numeric segments also index into arrays.
#[must_use]
pub fn val<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
	path.split('.').try_fold(value, |current, key| match current {
		Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
		_ => current.get(key),
	})
}

/// Writes `new` at a dot-separated path, replacing non-object intermediates with objects.
pub fn set_val(value: &mut Value, path: &str, new: Value) {
	if !value.is_object() {
		*value = Value::Object(Map::new());
	}
	if let Value::Object(map) = value {
		match path.split_once('.') {
			None => {
				map.insert(path.to_owned(), new);
			}
			Some((key, rest)) => set_val(map.entry(key.to_owned()).or_insert(Value::Null), rest, new),
		}
	}
}

fn text(value: &Value) -> String {
	match value {
		Value::Null => String::new(),
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

fn with<T: JsCast, R>(el: &Element, f: impl FnOnce(&T) -> R) -> Result<R, Error> {
	el.dyn_ref::<T>().map(f).ok_or_else(|| Error::Js(format!("<{}> is not the expected element type", el.tag_name().to_ascii_lowercase())))
}

fn with_input<R>(el: &Element, f: impl FnOnce(&HtmlInputElement) -> R) -> Result<R, Error> {
	with(el, f)
}

fn checkable_value(input: &HtmlInputElement) -> String {
	match input.value() {
		value if value.is_empty() => "on".to_owned(),
		value => value,
	}
}

fn push_checkable(el: &Element, value: &Value) -> Result<(), Error> {
	with_input(el, |input| {
		let own = checkable_value(input);
		let checked = match value {
			Value::Array(values) => values.iter().any(|value| text(value) == own),
			value if own == "on" => truthy(value),
			value => text(value) == own,
		};
		input.set_checked(checked);
	})
}

/// Checked boxes pull their value, or `true` if they have none. Repeated paths collect into arrays.
/// An unchecked value-less box pulls `false` unless the path already has a value.
fn pull_checkable(el: &Element, existing: Option<&Value>) -> Result<Option<Value>, Error> {
	with_input(el, |input| {
		let own = checkable_value(input);
		if !input.checked() {
			return if own == "on" && existing.is_none() { Some(Value::Bool(false)) } else { None };
		}
		let new = if own == "on" { Value::Bool(true) } else { Value::String(own) };
		Some(match existing {
			None | Some(Value::Bool(false)) => new,
			Some(Value::Array(values)) => {
				let mut values = values.clone();
				values.push(new);
				Value::Array(values)
			}
			Some(other) => Value::Array(vec![other.clone(), new]),
		})
	})
}
