#![cfg(target_arch = "wasm32")]

use dom_views::{dom, Append, Error};
use wasm_bindgen_test::*;
use web_sys::{Element, Node};

wasm_bindgen_test_configure!(run_in_browser);

use web_setup_::{container, query};

fn ids(elements: &[Element]) -> Vec<String> {
	elements.iter().map(Element::id).collect()
}

#[wasm_bindgen_test]
fn queries() {
	let root = container();
	root.set_inner_html(r#"<p id="a" class="x"></p><p id="b"><i id="c" class="x"></i></p><p id="d" class="x"></p>"#);

	assert_eq!(dom::first(Some(&root), ".x").unwrap().unwrap().id(), "a");
	assert_eq!(ids(&dom::all(Some(&root), ".x").unwrap()), ["a", "c", "d"]);
	assert!(dom::first(None, ".x").unwrap().is_none());
	assert!(dom::all(None, ".x").unwrap().is_empty());
	assert!(matches!(dom::all(Some(&root), "!!"), Err(Error::InvalidSelector(_))));

	let c = query(&root, "#c");
	assert_eq!(dom::closest(Some(&c), "p").unwrap().unwrap().id(), "b");
	assert!(dom::closest(None, "p").unwrap().is_none());

	let a = query(&root, "#a");
	assert_eq!(dom::next(Some(&a), None).unwrap().unwrap().id(), "b");
	assert_eq!(dom::next(Some(&a), Some(".x")).unwrap().unwrap().id(), "d");
	assert!(dom::prev(Some(&a), None).unwrap().is_none());
	assert_eq!(dom::prev(Some(&query(&root, "#d")), Some("#a")).unwrap().unwrap().id(), "a");

	let root_node: &Node = root.as_ref();
	assert_eq!(dom::first_child(Some(root_node)).unwrap().id(), "a");
	assert!(dom::first_child(None).is_none());
}

#[wasm_bindgen_test]
fn frag_keeps_markup() {
	let fragment = dom::frag(r#"<tr><td>cell</td></tr><p>second</p>"#).unwrap();
	assert_eq!(fragment.child_element_count(), 2);
	assert_eq!(fragment.first_element_child().unwrap().outer_html(), "<tr><td>cell</td></tr>");
	let fragment_node: &Node = fragment.as_ref();
	assert_eq!(dom::first_child(Some(fragment_node)).unwrap().tag_name(), "TR");
}

#[wasm_bindgen_test]
fn append_policies() {
	let root = container();
	root.set_inner_html(r#"<p id="ref"></p>"#);
	let reference = query(&root, "#ref");
	let new = |id: &str| {
		let el = web_setup_::document().create_element("b").unwrap();
		el.set_id(id);
		el
	};

	dom::append(&root, &new("last"), Append::Last).unwrap();
	dom::append(&root, &new("first"), Append::First).unwrap();
	dom::append(&reference, &new("before"), Append::Before).unwrap();
	dom::append(&reference, &new("after"), Append::After).unwrap();
	assert_eq!(ids(&dom::all(Some(&root), "*").unwrap()), ["first", "before", "ref", "after", "last"]);

	dom::append(&root, &new("only"), Append::Empty).unwrap();
	assert_eq!(root.inner_html(), r#"<b id="only"></b>"#);

	let detached = new("detached");
	assert!(matches!(dom::append(&detached, &new("x"), Append::After), Err(Error::ParentNotFound(_))));
}

#[wasm_bindgen_test]
fn append_default() {
	assert_eq!(Append::default(), Append::Last);
	assert!(matches!("sideways".parse::<Append>(), Err(Error::UnknownName { .. })));
}
