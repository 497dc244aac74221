//! Thin query and insertion helpers over [`web_sys`].
//!
//! Absent (`None`) starting elements make queries return nothing rather than fail,
//! so call sites that render conditionally don't have to branch.

use crate::Error;
use core::str::FromStr;
use tracing::{instrument, trace};
use wasm_bindgen::JsCast;
use web_sys::{Document, DocumentFragment, Element, HtmlTemplateElement, Node, NodeList, Window};

pub fn window() -> Result<Window, Error> {
	web_sys::window().ok_or(Error::DomUnavailable)
}

pub fn document() -> Result<Document, Error> {
	window()?.document().ok_or(Error::DomUnavailable)
}

pub(crate) fn invalid_selector(selector: &str) -> impl '_ + FnOnce(wasm_bindgen::JsValue) -> Error {
	move |_| Error::InvalidSelector(selector.to_owned())
}

/// Collects the [`Element`]s of a [`NodeList`], skipping other node kinds.
#[must_use]
pub fn elements(list: &NodeList) -> Vec<Element> {
	(0..list.length()).filter_map(|i| list.item(i)).filter_map(|node| node.dyn_into::<Element>().ok()).collect()
}

/// `el.querySelector(selector)`, or [`None`] if `el` is [`None`].
pub fn first(el: Option<&Element>, selector: &str) -> Result<Option<Element>, Error> {
	match el {
		Some(el) => el.query_selector(selector).map_err(invalid_selector(selector)),
		None => Ok(None),
	}
}

/// `document.querySelector(selector)`.
pub fn first_in_document(selector: &str) -> Result<Option<Element>, Error> {
	document()?.query_selector(selector).map_err(invalid_selector(selector))
}

/// The first element child of an element or fragment.
#[must_use]
pub fn first_child(node: Option<&Node>) -> Option<Element> {
	let node = node?;
	if let Some(fragment) = node.dyn_ref::<DocumentFragment>() {
		fragment.first_element_child()
	} else {
		node.dyn_ref::<Element>()?.first_element_child()
	}
}

/// `el.querySelectorAll(selector)` as a [`Vec`], empty if `el` is [`None`].
pub fn all(el: Option<&Element>, selector: &str) -> Result<Vec<Element>, Error> {
	match el {
		Some(el) => el.query_selector_all(selector).map(|list| elements(&list)).map_err(invalid_selector(selector)),
		None => Ok(Vec::new()),
	}
}

/// `document.querySelectorAll(selector)` as a [`Vec`].
pub fn all_in_document(selector: &str) -> Result<Vec<Element>, Error> {
	document()?.query_selector_all(selector).map(|list| elements(&list)).map_err(invalid_selector(selector))
}

/// The closest ancestor-or-self of `el` matching `selector`.
pub fn closest(el: Option<&Element>, selector: &str) -> Result<Option<Element>, Error> {
	match el {
		Some(el) => el.closest(selector).map_err(invalid_selector(selector)),
		None => Ok(None),
	}
}

/// The next sibling element, optionally the next one matching `selector`.
pub fn next(el: Option<&Element>, selector: Option<&str>) -> Result<Option<Element>, Error> {
	sibling(el, selector, Element::next_element_sibling)
}

/// The previous sibling element, optionally the previous one matching `selector`.
pub fn prev(el: Option<&Element>, selector: Option<&str>) -> Result<Option<Element>, Error> {
	sibling(el, selector, Element::previous_element_sibling)
}

fn sibling(el: Option<&Element>, selector: Option<&str>, step: fn(&Element) -> Option<Element>) -> Result<Option<Element>, Error> {
	let mut current = el.and_then(step);
	while let Some(candidate) = current {
		match selector {
			None => return Ok(Some(candidate)),
			Some(selector) => {
				if candidate.matches(selector).map_err(invalid_selector(selector))? {
					return Ok(Some(candidate));
				}
			}
		}
		current = step(&candidate);
	}
	Ok(None)
}

/// Parses `html` into a [`DocumentFragment`] via a `<template>` element.
#[instrument(skip(html))]
pub fn frag(html: &str) -> Result<DocumentFragment, Error> {
	let template: HtmlTemplateElement = document()?.create_element("template")?.dyn_into().map_err(|_| Error::Js("`<template>` is not an `HTMLTemplateElement`".to_owned()))?;
	template.set_inner_html(html);
	Ok(template.content())
}

/// Where a new node goes relative to a reference element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
	/// As the reference's first child.
	First,
	/// As the reference's last child.
	Last,
	/// As the reference's only child (existing children are removed).
	Empty,
	/// As the reference's previous sibling.
	Before,
	/// As the reference's next sibling.
	After,
}

impl Default for Append {
	fn default() -> Self {
		Self::Last
	}
}

impl Append {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::First => "first",
			Self::Last => "last",
			Self::Empty => "empty",
			Self::Before => "before",
			Self::After => "after",
		}
	}
}

impl FromStr for Append {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"first" => Self::First,
			"last" => Self::Last,
			"empty" => Self::Empty,
			"before" => Self::Before,
			"after" => Self::After,
			other => return Err(Error::UnknownName { kind: "append policy", name: other.to_owned() }),
		})
	}
}

/// Removes all child nodes of `el`.
pub fn clear(el: &Node) -> Result<(), Error> {
	while let Some(child) = el.first_child() {
		el.remove_child(&child)?;
	}
	Ok(())
}

/// Inserts `new` relative to `reference` as described by `append`.
///
/// This only moves nodes. Views living in removed children are not torn down here,
/// use [`Views::empty`](`crate::Views::empty`) for that.
#[instrument(skip(reference, new))]
pub fn append(reference: &Element, new: &Node, append: Append) -> Result<(), Error> {
	let reference_node: &Node = reference.as_ref();
	match append {
		Append::Last => {
			reference_node.append_child(new)?;
		}
		Append::First => {
			reference_node.insert_before(new, reference_node.first_child().as_ref())?;
		}
		Append::Empty => {
			clear(reference_node)?;
			reference_node.append_child(new)?;
		}
		Append::Before | Append::After => {
			let parent = reference_node.parent_node().ok_or_else(|| Error::ParentNotFound(format!("parent of <{}>", reference.tag_name().to_ascii_lowercase())))?;
			let next = if append == Append::Before { Some(reference_node.clone()) } else { reference_node.next_sibling() };
			parent.insert_before(new, next.as_ref())?;
		}
	}
	trace!("Inserted node.");
	Ok(())
}
