use thiserror::Error;
use wasm_bindgen::JsValue;

/// Everything that can go wrong in this crate, plus whatever user callbacks report.
///
/// JavaScript exceptions are stringified on conversion, so this type is also usable off-wasm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	#[error("no view controller registered under {0:?}")]
	NotRegistered(String),
	#[error("a view controller is already registered under {0:?}")]
	AlreadyRegistered(String),
	#[error("malformed binding declaration {key:?}: {reason}")]
	InvalidBinding { key: String, reason: &'static str },
	#[error("unknown {kind} {name:?}")]
	UnknownName { kind: &'static str, name: String },
	#[error("invalid selector {0:?}")]
	InvalidSelector(String),
	#[error("parent target {0:?} not found")]
	ParentNotFound(String),
	#[error("content created for view {0:?} contains no element")]
	EmptyContent(String),
	#[error("DOM is not available")]
	DomUnavailable,
	#[error("view {0} was already removed")]
	Removed(String),
	/// Raised by user code (lifecycle functions, hooks, handlers).
	#[error("{0}")]
	Handler(String),
	#[error("JavaScript error: {0}")]
	Js(String),
}

impl Error {
	pub fn handler(message: impl Into<String>) -> Self {
		Self::Handler(message.into())
	}
}

impl From<JsValue> for Error {
	fn from(value: JsValue) -> Self {
		value.as_string().map_or_else(|| Self::Js(format!("{:?}", value)), Self::Js)
	}
}

impl From<Error> for JsValue {
	fn from(error: Error) -> Self {
		match error {
			Error::Js(message) => Self::from(message),
			other => Self::from(other.to_string()),
		}
	}
}
