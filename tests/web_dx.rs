#![cfg(target_arch = "wasm32")]

use dom_views::{dx::prop_path, Dx, Error};
use serde_json::json;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlInputElement;

wasm_bindgen_test_configure!(run_in_browser);

use web_setup_::{container, query};

const FORM: &str = r#"
	<input class="dx dx-name">
	<textarea class="dx" data-dx="bio"></textarea>
	<select class="dx" name="contact.kind">
		<option value="home">Home</option>
		<option value="work">Work</option>
	</select>
	<span class="dx dx-contact-email"></span>
	<input type="checkbox" class="dx" name="admin">
	<input type="checkbox" class="dx" name="tags" value="a">
	<input type="checkbox" class="dx" name="tags" value="b">
	<input type="checkbox" class="dx" name="tags" value="c">
	<input class="not-dx" name="ignored" value="untouched">
"#;

#[wasm_bindgen_test]
fn push_then_pull() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(FORM);

	let data = json!({
		"name": "Ada",
		"bio": "Counts <things>",
		"contact": { "kind": "work", "email": "ada@example.com" },
		"admin": true,
		"tags": ["a", "c"],
		"ignored": "nope",
	});
	dx.push(&root, None, &data).unwrap();

	assert_eq!(query(&root, ".dx-contact-email").text_content().unwrap(), "ada@example.com");
	assert_eq!(query(&root, ".not-dx").unchecked_into::<HtmlInputElement>().value(), "untouched");

	let mut expected = data;
	expected.as_object_mut().unwrap().remove("ignored");
	assert_eq!(dx.pull(&root, None).unwrap(), expected);
}

#[wasm_bindgen_test]
fn missing_paths_are_left_alone() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(r#"<input class="dx" name="a" value="kept"><span class="dx dx-b">kept too</span>"#);

	dx.push(&root, None, &json!({ "unrelated": 1 })).unwrap();
	assert_eq!(dx.pull(&root, None).unwrap(), json!({ "a": "kept", "b": "kept too" }));
}

#[wasm_bindgen_test]
fn checkboxes() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(
		r#"
		<input type="checkbox" class="dx" name="flag">
		<input type="checkbox" class="dx" name="choice" value="x">
		<input type="checkbox" class="dx" name="choice" value="y">
		<input type="radio" class="dx" name="size" value="s">
		<input type="radio" class="dx" name="size" value="m">
	"#,
	);

	dx.push(&root, None, &json!({ "flag": 0, "choice": "y", "size": "m" })).unwrap();
	assert_eq!(dx.pull(&root, None).unwrap(), json!({ "flag": false, "choice": "y", "size": "m" }));

	dx.push(&root, None, &json!({ "flag": "yes", "choice": [] })).unwrap();
	// Nothing checked under `choice` leaves it out.
	assert_eq!(dx.pull(&root, None).unwrap(), json!({ "flag": true, "size": "m" }));
}

#[wasm_bindgen_test]
fn custom_selector() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(r#"<b class="field" data-dx="x"></b><b class="dx" data-dx="y"></b>"#);

	dx.push(&root, Some(".field"), &json!({ "x": 1, "y": 2 })).unwrap();
	assert_eq!(query(&root, ".field").text_content().unwrap(), "1");
	assert_eq!(query(&root, ".dx").text_content().unwrap(), "");
	assert_eq!(dx.pull(&root, Some(".field")).unwrap(), json!({ "x": "1" }));

	assert!(matches!(dx.push(&root, Some("!!"), &json!({})), Err(Error::InvalidSelector(_))));
}

#[wasm_bindgen_test]
fn newest_custom_handlers_win() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(r#"<span class="dx money" data-dx="price"></span>"#);

	dx.pusher(".money", |_, _| Err(Error::handler("shadowed")));
	dx.pusher(".money", |el, value| {
		el.set_text_content(Some(&format!("${}", value)));
		Ok(())
	});
	dx.puller(".money", |el, _| Ok(el.text_content().and_then(|text| text.trim_start_matches('$').parse::<f64>().ok()).map(|price| json!(price))));

	dx.push(&root, None, &json!({ "price": 12.5 })).unwrap();
	assert_eq!(query(&root, ".money").text_content().unwrap(), "$12.5");
	assert_eq!(dx.pull(&root, None).unwrap(), json!({ "price": 12.5 }));

	// Registries don't share handlers.
	assert_eq!(Dx::new().pull(&root, None).unwrap(), json!({ "price": "$12.5" }));
}

#[wasm_bindgen_test]
fn handler_errors_propagate() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(r#"<i class="dx" data-dx="a"></i>"#);
	dx.puller("i", |_, _| Err(Error::handler("nope")));
	assert_eq!(dx.pull(&root, None), Err(Error::Handler("nope".to_owned())));
}

#[wasm_bindgen_test]
fn path_precedence() {
	let root = container();
	root.set_inner_html(
		r#"
		<p id="class" class="x dx-from-class" data-dx="attr" name="name"></p>
		<p id="attr" data-dx="attr" name="name"></p>
		<p id="name" name="name"></p>
		<p id="none" class="dx"></p>
	"#,
	);
	assert_eq!(prop_path(&query(&root, "#class")).as_deref(), Some("from.class"));
	assert_eq!(prop_path(&query(&root, "#attr")).as_deref(), Some("attr"));
	assert_eq!(prop_path(&query(&root, "#name")).as_deref(), Some("name"));
	assert_eq!(prop_path(&query(&root, "#none")), None);
}

#[wasm_bindgen_test]
fn default_registry() {
	let root = container();
	root.set_inner_html(r#"<input class="dx" name="q">"#);
	dom_views::push(&root, None, &json!({ "q": "search" })).unwrap();
	assert_eq!(dom_views::pull(&root, None).unwrap(), json!({ "q": "search" }));
}

#[wasm_bindgen_test]
fn pull_into_keeps_unrelated_properties() {
	let dx = Dx::new();
	let root = container();
	root.set_inner_html(r#"<input class="dx" name="contact.email" value="new@example.com">"#);

	let mut data = json!({ "id": 7, "contact": { "email": "old@example.com", "phone": "123" } });
	dx.pull_into(&root, None, &mut data).unwrap();
	assert_eq!(data, json!({ "id": 7, "contact": { "email": "new@example.com", "phone": "123" } }));

	let mut scalar = json!("replaced");
	dom_views::pull_into(&root, None, &mut scalar).unwrap();
	assert_eq!(scalar, json!({ "contact": { "email": "new@example.com" } }));
}
