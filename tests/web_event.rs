#![cfg(target_arch = "wasm32")]

use dom_views::{
	event::{self, listener},
	Error, EventInfo, EventOptions, Events, Listener, Namespace,
};
use serde_json::{json, Value};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen_test::*;
use web_sys::{Element, EventTarget};

wasm_bindgen_test_configure!(run_in_browser);

use web_setup_::{click, container, query};

fn counter() -> (Rc<RefCell<usize>>, Listener) {
	let count = Rc::new(RefCell::new(0));
	let listener = {
		let count = count.clone();
		listener(move |_| *count.borrow_mut() += 1)
	};
	(count, listener)
}

#[wasm_bindgen_test]
fn direct() {
	let events = Events::new();
	let root = container();
	let (count, counting) = counter();

	events.on(Some(&root), "click", None, counting.clone(), &EventOptions::default()).unwrap();
	click(&root);
	assert_eq!(*count.borrow(), 1);

	let other = listener(|_| ());
	assert_eq!(events.off(Some(&root), "click", None, Some(&other)), 0);
	assert_eq!(events.off(Some(&root), "click", Some(".item"), Some(&counting)), 0);
	assert_eq!(events.off(Some(&root), "click", None, Some(&counting)), 1);
	assert!(events.is_empty());

	click(&root);
	assert_eq!(*count.borrow(), 1);
}

#[wasm_bindgen_test]
fn several_types_and_targets() {
	let events = Events::new();
	let (a, b) = (container(), container());
	let (count, counting) = counter();

	events.on(vec![&a, &b], "click, custom", None, counting, &EventOptions::default()).unwrap();
	assert_eq!(events.len(), 4);

	click(&a);
	event::trigger(Some(&b), "custom", &EventInfo::default()).unwrap();
	assert_eq!(*count.borrow(), 2);

	// Without a listener, everything matching target, type and selector goes.
	assert_eq!(events.off(Some(&a), "click, custom", None, None), 2);
	assert_eq!(events.len(), 2);
}

#[wasm_bindgen_test]
fn delegated() {
	let events = Events::new();
	let root = container();
	root.set_inner_html(r#"<ul><li class="item" id="first"><span>a</span></li><li id="second">b</li></ul>"#);
	let matched = Rc::new(RefCell::new(Vec::new()));

	events
		.on(
			Some(&root),
			"click",
			Some(".item"),
			listener({
				let matched = matched.clone();
				move |event| {
					let select_target = event.select_target().expect("Delegated events have a select target.");
					matched.borrow_mut().push(select_target.id());
					assert_eq!(event.context(), AsRef::<EventTarget>::as_ref(select_target));
				}
			}),
			&EventOptions::default(),
		)
		.unwrap();

	click(&query(&root, "span"));
	click(&query(&root, "#second"));
	click(&query(&root, "#first"));
	assert_eq!(*matched.borrow(), vec!["first".to_owned(), "first".to_owned()]);
}

#[wasm_bindgen_test]
fn delegation_stays_inside_the_bound_target() {
	let events = Events::new();
	let outer = container();
	outer.set_class_name("item");
	outer.set_inner_html("<p><button>x</button></p>");
	let inner = query(&outer, "p");
	let (count, counting) = counter();

	// `.item` only matches outside of `inner`.
	events.on(Some(&inner), "click", Some(".item"), counting, &EventOptions::default()).unwrap();
	click(&query(&outer, "button"));
	assert_eq!(*count.borrow(), 0);
}

#[wasm_bindgen_test]
fn invalid_selector() {
	let events = Events::new();
	let root = container();
	let (_, counting) = counter();
	assert!(matches!(events.on(Some(&root), "click", Some("!!"), counting, &EventOptions::default()), Err(Error::InvalidSelector(_))));
	assert!(events.is_empty());
}

#[wasm_bindgen_test]
fn absent_targets() {
	let events = Events::new();
	let (_, counting) = counter();
	events.on(None::<&Element>, "click", None, counting.clone(), &EventOptions::default()).unwrap();
	assert!(events.is_empty());
	assert_eq!(events.off(None::<&Element>, "click", None, Some(&counting)), 0);
	assert_eq!(events.off_ns(Vec::<Element>::new(), &Namespace::new("any")), 0);
	assert_eq!(event::trigger(None::<&Element>, "click", &EventInfo::default()).unwrap(), 0);
}

#[wasm_bindgen_test]
fn namespaces() {
	let events = Events::new();
	let (a, b) = (container(), container());
	let (a_count, a_counting) = counter();
	let (b_count, b_counting) = counter();
	let (plain_count, plain_counting) = counter();

	events.on(vec![&a, &b], "click", None, a_counting, &EventOptions::ns("a")).unwrap();
	events.on(Some(&a), "click", None, b_counting, &EventOptions::ns("b")).unwrap();
	events.on(Some(&a), "click", None, plain_counting, &EventOptions::default()).unwrap();

	// Only the given targets are affected.
	assert_eq!(events.off_ns(Some(&a), &Namespace::new("a")), 1);
	click(&a);
	click(&b);
	assert_eq!((*a_count.borrow(), *b_count.borrow(), *plain_count.borrow()), (1, 1, 1));

	assert_eq!(events.off_ns(vec![&a, &b], &Namespace::new("a")), 1);
	assert_eq!(events.off_ns(vec![&a, &b], &Namespace::new("a")), 0);
	click(&b);
	assert_eq!(*a_count.borrow(), 1);
	assert_eq!(events.len(), 2);
}

#[wasm_bindgen_test]
fn trigger_detail_and_cancellation() {
	let events = Events::new();
	let root = container();
	root.set_inner_html("<p></p>");
	let child = query(&root, "p");
	let details = Rc::new(RefCell::new(Vec::new()));

	events
		.on(
			Some(&root),
			"custom",
			None,
			listener({
				let details = details.clone();
				move |event| {
					details.borrow_mut().push(event.detail());
					event.event().prevent_default();
				}
			}),
			&EventOptions::default(),
		)
		.unwrap();

	let info = EventInfo { cancelable: true, detail: Some(json!({ "id": 7, "tags": ["a"] })) };
	assert_eq!(event::trigger(Some(&child), "custom", &info).unwrap(), 0);
	assert_eq!(event::trigger(Some(&child), "custom", &EventInfo::default()).unwrap(), 1);
	// The DOM defaults a missing detail to `null`, so an explicit `null` reads the same.
	assert_eq!(event::trigger(Some(&child), "custom", &EventInfo { cancelable: false, detail: Some(Value::Null) }).unwrap(), 1);
	assert_eq!(*details.borrow(), vec![Some(json!({ "id": 7, "tags": ["a"] })), None, None]);
}

#[wasm_bindgen_test]
fn listeners_may_unbind_themselves() {
	let events = Events::new();
	let root = container();
	let count = Rc::new(RefCell::new(0));
	let this: Rc<RefCell<Option<Listener>>> = Rc::default();
	let once = listener({
		let (events, root, count, this) = (events.clone(), root.clone(), count.clone(), this.clone());
		move |_| {
			*count.borrow_mut() += 1;
			let this = this.borrow_mut().take();
			events.off(Some(&root), "click", None, this.as_ref());
		}
	});
	*this.borrow_mut() = Some(once.clone());
	events.on(Some(&root), "click", None, once, &EventOptions::default()).unwrap();

	click(&root);
	click(&root);
	assert_eq!(*count.borrow(), 1);
	assert!(events.is_empty());
}

#[wasm_bindgen_test]
fn dropping_the_registry_detaches_listeners() {
	let root = container();
	let (count, counting) = counter();
	{
		let events = Events::new();
		events.on(Some(&root), "click", None, counting, &EventOptions::default()).unwrap();
		click(&root);
	}
	click(&root);
	assert_eq!(*count.borrow(), 1);
}
