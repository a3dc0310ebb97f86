//! A declarative UI runtime for the DOM.
//!
//! Application code describes what should exist as a tree of immutable
//! [`Element`] values; the runtime owns a parallel tree of internal
//! instances that it materialises into a document, updates against new
//! descriptions with minimal mutations, and tears down on unmount, while
//! synthesising a normalised event system on top of native DOM events.
//!
//! The three load-bearing pieces:
//!
//! * **The reconciler** (`instance`, `composite`, `children`, `host`) —
//!   shadows every live descriptor with a mutable instance, drives component
//!   lifecycles, diffs keyed children into minimal insert/move/remove
//!   operations, and writes through the host adapter into a
//!   [`twigdom`] document.
//! * **Updates and transactions** ([`Updater`], the batching surface on
//!   [`Runtime`]) — state patches accumulate on instances, a dirty set drains
//!   in mount order, and open/close wrapper pairs guarantee invariants like
//!   "every `did_mount` fires after every mount completes".
//! * **Synthetic events** ([`events`]) — one delegated native listener per
//!   document and event name, a plugin registry extracting pooled
//!   [`SyntheticEvent`]s, and capture/bubble propagation walked over the
//!   instance tree rather than the DOM.
//!
//! ```
//! use arbor::{create_element, host, record, Runtime};
//! use twigdom::Document;
//!
//! let rt = Runtime::new();
//! let doc = Document::new();
//! let container = doc.create_element("div");
//! doc.as_node().append_child(&container);
//!
//! rt.render(
//!     create_element(host("span"), record! { "id" => "greeting" }, vec!["hi".into()]),
//!     &container,
//! )
//! .unwrap();
//! assert!(container.inner_html().contains("hi"));
//! ```

#![warn(missing_docs)]

mod cache;
mod children;
mod component;
mod composite;
mod element;
mod error;
pub mod events;
mod host;
mod instance;
mod mount;
mod pool;
mod record;
mod reconciler;
mod runtime;
pub mod testing;
mod transaction;
mod updates;

pub use component::{
    AsAny, Callback, CaughtError, Component, ComponentClass, ComponentHandle, Cx, Public,
    StatePatch, Updater,
};
pub use element::{
    create_element, host, should_update_component, ComponentKind, Element, ElementKind,
    RefCallback, StatelessFn, View,
};
pub use error::Error;
pub use events::{Handler, SyntheticEvent};
pub use host::{Container, ID_ATTRIBUTE, ROOT_ATTRIBUTE};
pub use instance::{Instance, NodeSpan};
pub use pool::{Pool, Poolable, DEFAULT_POOL_SIZE};
pub use record::{Record, Value};
pub use runtime::{Runtime, WeakRuntime};
pub use transaction::{InitData, Transaction};
