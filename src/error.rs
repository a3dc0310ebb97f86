//! Contract-violation errors surfaced from the public API.

use twigdom::NodeKind;

/// Errors produced when input handed to the runtime violates its contracts.
/// Each variant is raised from the public API call that received the input;
/// none of them are recovered internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mount targets must be element, document, or fragment nodes.
    #[error("target container must be an element, document, or document fragment, not {kind:?}")]
    InvalidContainer {
        /// The kind of node that was handed in.
        kind: NodeKind,
    },

    /// Host tags must start with a letter and continue with letters, digits,
    /// or `-` `_` `.` `:`.
    #[error("invalid tag name <{tag}>")]
    InvalidTag {
        /// The offending tag.
        tag: String,
    },

    /// Void elements cannot carry children or raw inner html.
    #[error("<{tag}> is a void element and must not be given children or dangerous_inner_html")]
    VoidElementContent {
        /// The void tag.
        tag: String,
    },

    /// `children` and `dangerous_inner_html` are mutually exclusive.
    #[error("props may set either children or dangerous_inner_html, not both")]
    InnerHtmlWithChildren,

    /// `dangerous_inner_html` must be a record of the shape `{ "__html": "…" }`.
    #[error("dangerous_inner_html expects a record with an \"__html\" string entry")]
    MalformedInnerHtml,

    /// The `style` prop must be a record of style names to values.
    #[error("the style prop expects a record of style names to values")]
    StyleMustBeRecord,

    /// A component emitted a child-context key it never declared.
    #[error("{component} returned child context key \"{key}\" which is not declared in child_context_keys")]
    UndeclaredChildContext {
        /// The component's display name.
        component: String,
        /// The undeclared key.
        key: String,
    },

    /// `render_subtree_into_container` was handed a parent handle that is not
    /// mounted in this runtime.
    #[error("the given parent component is not mounted in this runtime")]
    UnknownParentComponent,
}
