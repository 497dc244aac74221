//! View registration, display and teardown.

use crate::{
	binding::{self, EventBinding, HubBinding},
	dom::{self, Append},
	event::{DomEvent, Events},
	hub::{HubInfo, Hubs},
	Error, Namespace,
};
use core::{
	cell::{Cell, RefCell},
	cmp::Reverse,
	fmt,
	future::Future,
	str::FromStr,
	sync::atomic::{AtomicU64, Ordering},
};
use futures::{future::LocalBoxFuture, FutureExt};
use hashbrown::HashMap;
use serde_json::Value;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn, Instrument};
use web_sys::{DocumentFragment, Element, HtmlElement, Node};

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// The points in a view's life at which [`Views::hook`] callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
	WillCreate,
	DidCreate,
	WillInit,
	DidInit,
	WillDisplay,
	DidDisplay,
	WillPostDisplay,
	DidPostDisplay,
	WillRemove,
	DidRemove,
}

impl HookStage {
	pub const ALL: [Self; 10] = [
		Self::WillCreate,
		Self::DidCreate,
		Self::WillInit,
		Self::DidInit,
		Self::WillDisplay,
		Self::DidDisplay,
		Self::WillPostDisplay,
		Self::DidPostDisplay,
		Self::WillRemove,
		Self::DidRemove,
	];

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::WillCreate => "willCreate",
			Self::DidCreate => "didCreate",
			Self::WillInit => "willInit",
			Self::DidInit => "didInit",
			Self::WillDisplay => "willDisplay",
			Self::DidDisplay => "didDisplay",
			Self::WillPostDisplay => "willPostDisplay",
			Self::DidPostDisplay => "didPostDisplay",
			Self::WillRemove => "willRemove",
			Self::DidRemove => "didRemove",
		}
	}
}

impl fmt::Display for HookStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for HookStage {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL.iter().copied().find(|stage| stage.as_str() == s).ok_or_else(|| Error::UnknownName { kind: "hook stage", name: s.to_owned() })
	}
}

/// Where a view instance is in its life. [`ViewState::Removed`] is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
	Creating,
	Created,
	Initializing,
	Initialized,
	Displaying,
	Displayed,
	PostDisplaying,
	PostDisplayed,
	Removing,
	Removed,
}

/// Per-display options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
	pub append: Append,
}

impl From<Append> for Config {
	fn from(append: Append) -> Self {
		Self { append }
	}
}

/// Lets [`Views::display`] take a bare [`Append`] where a config is optional.
impl From<Append> for Option<Config> {
	fn from(append: Append) -> Self {
		Some(append.into())
	}
}

/// What a controller's `create` returns. The first element becomes the view's root.
#[derive(Debug, Clone)]
pub enum Content {
	Html(String),
	Element(Element),
	Fragment(DocumentFragment),
}

impl From<&str> for Content {
	fn from(html: &str) -> Self {
		Self::Html(html.to_owned())
	}
}

impl From<String> for Content {
	fn from(html: String) -> Self {
		Self::Html(html)
	}
}

impl From<Element> for Content {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}

impl From<HtmlElement> for Content {
	fn from(element: HtmlElement) -> Self {
		Self::Element(element.into())
	}
}

impl From<DocumentFragment> for Content {
	fn from(fragment: DocumentFragment) -> Self {
		Self::Fragment(fragment)
	}
}

impl Content {
	fn into_element(self, view_name: &str) -> Result<Element, Error> {
		let fragment = match self {
			Self::Element(element) => return Ok(element),
			Self::Html(html) => dom::frag(&html)?,
			Self::Fragment(fragment) => fragment,
		};
		if fragment.child_element_count() > 1 {
			warn!(view = view_name, "Created content has {} elements. Only the first one is used.", fragment.child_element_count());
		}
		fragment.first_element_child().ok_or_else(|| Error::EmptyContent(view_name.to_owned()))
	}
}

/// Where a view is displayed: an element, or a selector resolved against the document.
#[derive(Debug, Clone)]
pub enum Target {
	Element(Element),
	Selector(String),
}

impl From<Element> for Target {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}

impl From<&Element> for Target {
	fn from(element: &Element) -> Self {
		Self::Element(element.clone())
	}
}

impl From<HtmlElement> for Target {
	fn from(element: HtmlElement) -> Self {
		Self::Element(element.into())
	}
}

impl From<&HtmlElement> for Target {
	fn from(element: &HtmlElement) -> Self {
		Self::Element(element.clone().into())
	}
}

impl From<&str> for Target {
	fn from(selector: &str) -> Self {
		Self::Selector(selector.to_owned())
	}
}

impl From<String> for Target {
	fn from(selector: String) -> Self {
		Self::Selector(selector)
	}
}

impl Target {
	fn resolve(&self) -> Result<Element, Error> {
		match self {
			Self::Element(element) => Ok(element.clone()),
			Self::Selector(selector) => dom::first_in_document(selector)?.ok_or_else(|| Error::ParentNotFound(selector.clone())),
		}
	}
}

type CreateFn = Rc<dyn Fn(&Value, &Config) -> LocalBoxFuture<'static, Result<Content, Error>>>;
type StageFn = Rc<dyn Fn(&View) -> LocalBoxFuture<'static, Result<(), Error>>>;
type DestroyFn = Rc<dyn Fn(&View)>;
type Hook = Rc<dyn Fn(&View) -> Result<(), Error>>;

/// A view template: optional lifecycle functions and declarative bindings.
///
/// `init` and `post_display` see the displayed data and config through [`View::data`] and [`View::config`].
#[derive(Clone, Default)]
pub struct ViewController {
	create: Option<CreateFn>,
	init: Option<StageFn>,
	post_display: Option<StageFn>,
	destroy: Option<DestroyFn>,
	pub(crate) events: Vec<EventBinding>,
	pub(crate) doc_events: Vec<EventBinding>,
	pub(crate) win_events: Vec<EventBinding>,
	pub(crate) hub_events: Vec<HubBinding>,
}

impl fmt::Debug for ViewController {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let keys = |bindings: &[EventBinding]| bindings.iter().map(|binding| binding.key.clone()).collect::<Vec<_>>();
		f.debug_struct("ViewController")
			.field("create", &self.create.is_some())
			.field("init", &self.init.is_some())
			.field("post_display", &self.post_display.is_some())
			.field("destroy", &self.destroy.is_some())
			.field("events", &keys(&self.events[..]))
			.field("doc_events", &keys(&self.doc_events[..]))
			.field("win_events", &keys(&self.win_events[..]))
			.field("hub_events", &self.hub_events.iter().map(|binding| binding.key.clone()).collect::<Vec<_>>())
			.finish()
	}
}

fn stage_fn<F, Fut>(f: F) -> StageFn
where
	F: 'static + Fn(&View) -> Fut,
	Fut: 'static + Future<Output = Result<(), Error>>,
{
	Rc::new(move |view: &View| f(view).boxed_local())
}

impl ViewController {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Produces the view's content. Without it, views are an empty `<div>`.
	#[must_use]
	pub fn create<F, Fut, C>(mut self, create: F) -> Self
	where
		F: 'static + Fn(&Value, &Config) -> Fut,
		Fut: 'static + Future<Output = Result<C, Error>>,
		C: 'static + Into<Content>,
	{
		let create: CreateFn = Rc::new(move |data: &Value, config: &Config| {
			create(data, config).map(|result: Result<C, Error>| -> Result<Content, Error> { result.map(Into::into) }).boxed_local()
		});
		self.create = Some(create);
		self
	}

	/// Runs once the root element is in place, before the view is displayed.
	#[must_use]
	pub fn init<F, Fut>(mut self, init: F) -> Self
	where
		F: 'static + Fn(&View) -> Fut,
		Fut: 'static + Future<Output = Result<(), Error>>,
	{
		self.init = Some(stage_fn(init));
		self
	}

	/// Runs after the declared bindings are live.
	#[must_use]
	pub fn post_display<F, Fut>(mut self, post_display: F) -> Self
	where
		F: 'static + Fn(&View) -> Fut,
		Fut: 'static + Future<Output = Result<(), Error>>,
	{
		self.post_display = Some(stage_fn(post_display));
		self
	}

	/// Runs during removal, after the view's bindings are gone.
	#[must_use]
	pub fn destroy(mut self, destroy: impl 'static + Fn(&View)) -> Self {
		self.destroy = Some(Rc::new(destroy));
		self
	}

	/// Binds an event on the view's root element. `key` is `"types"` or `"types; selector"`.
	#[must_use]
	pub fn event(mut self, key: &str, handler: impl 'static + Fn(&View, &DomEvent)) -> Self {
		self.events.push(EventBinding { key: key.to_owned(), handler: Rc::new(handler) });
		self
	}

	/// Binds an event on the document. `key` is `"types"` or `"types; selector"`.
	#[must_use]
	pub fn doc_event(mut self, key: &str, handler: impl 'static + Fn(&View, &DomEvent)) -> Self {
		self.doc_events.push(EventBinding { key: key.to_owned(), handler: Rc::new(handler) });
		self
	}

	/// Binds an event on the window. `key` is `"types"` or `"types; selector"`.
	#[must_use]
	pub fn win_event(mut self, key: &str, handler: impl 'static + Fn(&View, &DomEvent)) -> Self {
		self.win_events.push(EventBinding { key: key.to_owned(), handler: Rc::new(handler) });
		self
	}

	/// Subscribes to a hub. `key` is `"hub; topics"` or `"hub; topics; labels"`.
	#[must_use]
	pub fn hub_event(mut self, key: &str, handler: impl 'static + Fn(&View, &Value, &HubInfo) -> Result<(), Error>) -> Self {
		self.hub_events.push(HubBinding { key: key.to_owned(), handler: Rc::new(handler) });
		self
	}
}

/// A view type known by its Rust type.
pub trait ViewClass {
	fn name() -> &'static str;
	fn controller() -> ViewController;
}

struct ViewInner {
	id: String,
	name: String,
	controller: Rc<ViewController>,
	data: Value,
	config: Config,
	el: RefCell<Option<Element>>,
	state: Cell<ViewState>,
}

/// A displayed instance of a [`ViewController`]. Clones refer to the same instance.
#[derive(Clone)]
pub struct View(Rc<ViewInner>);

impl PartialEq for View {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for View {}

impl fmt::Debug for View {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("View").field("id", &self.0.id).field("name", &self.0.name).field("state", &self.0.state.get()).finish()
	}
}

impl View {
	fn new(name: &str, controller: Rc<ViewController>, data: Value, config: Config) -> Self {
		let id = format!("v_{}", NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed));
		Self(Rc::new(ViewInner {
			id,
			name: name.to_owned(),
			controller,
			data,
			config,
			el: RefCell::new(None),
			state: Cell::new(ViewState::Creating),
		}))
	}

	/// Unique among all views of this process.
	#[must_use]
	pub fn id(&self) -> &str {
		&self.0.id
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// The root element, available from [`HookStage::DidCreate`] on.
	#[must_use]
	pub fn el(&self) -> Option<Element> {
		self.0.el.borrow().clone()
	}

	#[must_use]
	pub fn data(&self) -> &Value {
		&self.0.data
	}

	#[must_use]
	pub fn config(&self) -> &Config {
		&self.0.config
	}

	#[must_use]
	pub fn state(&self) -> ViewState {
		self.0.state.get()
	}

	/// The namespace all of this view's bindings are registered under.
	#[must_use]
	pub fn namespace(&self) -> Namespace {
		Namespace::new(&self.0.id)
	}

	pub(crate) fn controller(&self) -> &ViewController {
		&self.0.controller
	}

	fn enter(&self, next: ViewState) -> Result<(), Error> {
		match self.state() {
			ViewState::Removing | ViewState::Removed => Err(Error::Removed(self.0.id.clone())),
			_ => {
				trace!(view = %self.0.id, ?next, "Lifecycle transition.");
				self.0.state.set(next);
				Ok(())
			}
		}
	}
}

/// A registered controller and the config its displays fall back to.
#[derive(Clone)]
struct Registration {
	controller: Rc<ViewController>,
	config: Config,
}

struct ViewsInner {
	controllers: RefCell<HashMap<String, Registration>>,
	hooks: RefCell<HashMap<HookStage, Vec<Hook>>>,
	live: RefCell<Vec<View>>,
	events: Events,
	hubs: Hubs,
}

/// The lifecycle controller: registered controllers, hooks and live views.
///
/// Clones share state. Declared bindings go through this registry's [`Events`] and [`Hubs`].
#[derive(Clone)]
pub struct Views(Rc<ViewsInner>);

impl fmt::Debug for Views {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Views")
			.field("controllers", &self.0.controllers.borrow().keys().collect::<Vec<_>>())
			.field("live", &self.0.live.borrow())
			.field("events", &self.0.events)
			.field("hubs", &self.0.hubs)
			.finish()
	}
}

impl Default for Views {
	fn default() -> Self {
		Self::new()
	}
}

impl Views {
	/// Creates a registry with its own [`Events`] and [`Hubs`].
	#[must_use]
	pub fn new() -> Self {
		Self::with_registries(Events::new(), Hubs::new())
	}

	/// Creates a registry that binds through the given [`Events`] and [`Hubs`].
	#[must_use]
	pub fn with_registries(events: Events, hubs: Hubs) -> Self {
		let views = Self(Rc::new(ViewsInner {
			controllers: RefCell::default(),
			hooks: RefCell::default(),
			live: RefCell::default(),
			events: events.clone(),
			hubs: hubs.clone(),
		}));
		// Registered first, so declared bindings are live before any other `willPostDisplay` hook runs.
		views.hook(HookStage::WillPostDisplay, move |view| binding::bind(view, &events, &hubs));
		views
	}

	#[must_use]
	pub fn events(&self) -> &Events {
		&self.0.events
	}

	#[must_use]
	pub fn hubs(&self) -> &Hubs {
		&self.0.hubs
	}

	/// Registers `controller` under `name`.
	///
	/// # Errors
	///
	/// [`Error::AlreadyRegistered`] if `name` is taken.
	pub fn register(&self, name: &str, controller: ViewController) -> Result<(), Error> {
		self.register_with(name, controller, Config::default())
	}

	/// Registers `controller` under `name`, with `config` used by displays that don't pass their own.
	///
	/// # Errors
	///
	/// [`Error::AlreadyRegistered`] if `name` is taken.
	#[instrument(skip(self, controller))]
	pub fn register_with(&self, name: &str, controller: ViewController, config: Config) -> Result<(), Error> {
		let mut controllers = self.0.controllers.borrow_mut();
		if controllers.contains_key(name) {
			return Err(Error::AlreadyRegistered(name.to_owned()));
		}
		controllers.insert(name.to_owned(), Registration { controller: Rc::new(controller), config });
		trace!("Registered view controller.");
		Ok(())
	}

	/// Registers `T` under [`ViewClass::name`].
	pub fn register_class<T: ViewClass>(&self) -> Result<(), Error> {
		self.register(T::name(), T::controller())
	}

	#[must_use]
	pub fn is_registered(&self, name: &str) -> bool {
		self.0.controllers.borrow().contains_key(name)
	}

	/// Adds a callback that runs for every view reaching `stage`, after those added before it.
	pub fn hook(&self, stage: HookStage, hook: impl 'static + Fn(&View) -> Result<(), Error>) {
		self.0.hooks.borrow_mut().entry(stage).or_default().push(Rc::new(hook));
	}

	/// The live view whose root is `el`.
	#[must_use]
	pub fn view_of(&self, el: &Element) -> Option<View> {
		self.0.live.borrow().iter().find(|view| view.el().map_or(false, |view_el| same_node(&view_el, el))).cloned()
	}

	/// All live views, in display order.
	#[must_use]
	pub fn live(&self) -> Vec<View> {
		self.0.live.borrow().clone()
	}

	/// Creates a view from the controller registered as `name` and inserts it relative to `parent`.
	///
	/// `config` may be a [`Config`], a bare [`Append`] or [`None`], which uses the config given at registration.
	///
	/// # Errors
	///
	/// Lookup, content, insertion, binding, lifecycle function and hook errors.
	/// Whatever the view had bound or inserted by then is removed again.
	#[instrument(skip(self, parent, data, config))]
	pub async fn display(&self, name: &str, parent: impl Into<Target>, data: Value, config: impl Into<Option<Config>>) -> Result<View, Error> {
		let (parent, config): (Target, Option<Config>) = (parent.into(), config.into());
		let Registration { controller, config: registered } = self.0.controllers.borrow().get(name).cloned().ok_or_else(|| Error::NotRegistered(name.to_owned()))?;
		self.display_controller(name, controller, &parent, data, config.unwrap_or(registered)).await
	}

	/// Like [`display`](`Views::display`), registering `T` first if necessary.
	pub async fn display_class<T: ViewClass>(&self, parent: impl Into<Target>, data: Value, config: impl Into<Option<Config>>) -> Result<View, Error> {
		let (parent, config): (Target, Option<Config>) = (parent.into(), config.into());
		if !self.is_registered(T::name()) {
			self.register_class::<T>()?;
		}
		self.display(T::name(), parent, data, config).await
	}

	async fn display_controller(&self, name: &str, controller: Rc<ViewController>, parent: &Target, data: Value, config: Config) -> Result<View, Error> {
		let parent = parent.resolve()?;
		let view = View::new(name, controller, data, config);

		self.run_hooks(HookStage::WillCreate, &view)?;
		let content = match &view.controller().create {
			Some(create) => create(view.data(), view.config()).instrument(trace_span!("create", view = %view.id())).await?,
			None => Content::Html("<div></div>".to_owned()),
		};
		let el = content.into_element(name)?;
		*view.0.el.borrow_mut() = Some(el);
		self.0.live.borrow_mut().push(view.clone());

		match self.finish_display(&view, &parent).await {
			Ok(()) => Ok(view),
			Err(error) => {
				error!(view = %view.id(), state = ?view.state(), "Display failed: {}", error);
				self.abort(&view);
				Err(error)
			}
		}
	}

	async fn finish_display(&self, view: &View, parent: &Element) -> Result<(), Error> {
		view.enter(ViewState::Created)?;
		self.run_hooks(HookStage::DidCreate, view)?;

		let el = view.el().ok_or_else(|| Error::Removed(view.id().to_owned()))?;
		match view.config().append {
			Append::Empty => {
				self.empty(Some(parent))?;
				dom::append(parent, &el, Append::Last)?;
			}
			append => dom::append(parent, &el, append)?,
		}

		view.enter(ViewState::Initializing)?;
		self.run_hooks(HookStage::WillInit, view)?;
		if let Some(init) = &view.controller().init {
			init(view).instrument(trace_span!("init", view = %view.id())).await?;
		}
		view.enter(ViewState::Initialized)?;
		self.run_hooks(HookStage::DidInit, view)?;

		view.enter(ViewState::Displaying)?;
		self.run_hooks(HookStage::WillDisplay, view)?;
		view.enter(ViewState::Displayed)?;
		self.run_hooks(HookStage::DidDisplay, view)?;

		view.enter(ViewState::PostDisplaying)?;
		self.run_hooks(HookStage::WillPostDisplay, view)?;
		if let Some(post_display) = &view.controller().post_display {
			post_display(view).instrument(trace_span!("post_display", view = %view.id())).await?;
		}
		view.enter(ViewState::PostDisplayed)?;
		self.run_hooks(HookStage::DidPostDisplay, view)
	}

	fn run_hooks(&self, stage: HookStage, view: &View) -> Result<(), Error> {
		let hooks = self.0.hooks.borrow().get(&stage).cloned().unwrap_or_default();
		let span = trace_span!("hooks", %stage, view = %view.id(), count = hooks.len());
		let _enter = span.enter();
		hooks.iter().try_for_each(|hook| hook(view))
	}

	/// Undoes a failed display without running removal hooks or `destroy`.
	fn abort(&self, view: &View) {
		if let Some(el) = view.el() {
			if let Err(error) = self.teardown_within(&el, false) {
				warn!("Nested view teardown failed: {}", error);
			}
			el.remove();
		}
		binding::unbind(view, &self.0.events, &self.0.hubs);
		view.0.state.set(ViewState::Removed);
		self.0.live.borrow_mut().retain(|live| live != view);
	}

	/// Tears down the views rooted at or inside `el`, then detaches it.
	///
	/// # Errors
	///
	/// The first hook error. Teardown still completes.
	#[instrument(skip(self, el))]
	pub fn remove(&self, el: Option<&Element>) -> Result<(), Error> {
		let el = match el {
			Some(el) => el,
			None => return Ok(()),
		};
		let result = self.teardown_within(el, true);
		el.remove();
		result
	}

	/// Tears down the views inside `el` and removes all of its children.
	///
	/// # Errors
	///
	/// The first hook error, or a DOM error while clearing. Teardown still completes.
	#[instrument(skip(self, el))]
	pub fn empty(&self, el: Option<&Element>) -> Result<(), Error> {
		let el = match el {
			Some(el) => el,
			None => return Ok(()),
		};
		let result = self.teardown_within(el, false);
		dom::clear(el)?;
		result
	}

	/// Removes the live views rooted inside `el` (and at `el` if `inclusive`), deepest first.
	fn teardown_within(&self, el: &Element, inclusive: bool) -> Result<(), Error> {
		let scope: &Node = el.as_ref();
		let mut doomed: Vec<(usize, View)> = self
			.0
			.live
			.borrow()
			.iter()
			.filter_map(|view| {
				let view_el = view.el()?;
				let view_node: &Node = view_el.as_ref();
				let inside = if same_node(&view_el, el) { inclusive } else { scope.contains(Some(view_node)) };
				if inside {
					Some((depth(&view_el), view.clone()))
				} else {
					None
				}
			})
			.collect();
		doomed.sort_by_key(|(depth, _)| Reverse(*depth));

		let mut result = Ok(());
		for (_, view) in doomed {
			let removed = self.remove_view(&view);
			if result.is_ok() {
				result = removed;
			}
		}
		result
	}

	fn remove_view(&self, view: &View) -> Result<(), Error> {
		if matches!(view.state(), ViewState::Removing | ViewState::Removed) {
			return Ok(());
		}
		let span = trace_span!("remove_view", view = %view.id(), name = %view.name());
		let _enter = span.enter();

		view.0.state.set(ViewState::Removing);
		let will_remove = self.run_hooks(HookStage::WillRemove, view);
		binding::unbind(view, &self.0.events, &self.0.hubs);
		if let Some(destroy) = &view.controller().destroy {
			destroy(view);
		}
		let did_remove = self.run_hooks(HookStage::DidRemove, view);

		view.0.state.set(ViewState::Removed);
		self.0.live.borrow_mut().retain(|live| live != view);
		trace!("Removed view.");
		will_remove.and(did_remove)
	}
}

fn same_node(a: &Element, b: &Element) -> bool {
	let (a, b): (&Node, &Node) = (a.as_ref(), b.as_ref());
	a.is_same_node(Some(b))
}

fn depth(el: &Element) -> usize {
	let mut depth = 0;
	let mut current = el.parent_node();
	while let Some(node) = current {
		depth += 1;
		current = node.parent_node();
	}
	depth
}
