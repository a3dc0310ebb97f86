//! A small rig for driving the runtime in tests: a fresh document, a
//! container attached to it, and shorthand for rendering and reading back
//! serialised output.

use crate::{element::Element, error::Error, runtime::Runtime, Public};
use twigdom::{Document, Node as DomNode};

pub use twigdom::testing::TargetExt;

/// A runtime wired to a fresh document with one container in it.
pub struct Harness {
    /// The runtime under test.
    pub rt: Runtime,
    /// The emulated document.
    pub doc: Document,
    /// A container element attached to the document.
    pub container: DomNode,
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new()
    }
}

impl Harness {
    /// A fresh runtime, document, and attached container.
    pub fn new() -> Self {
        let rt = Runtime::new();
        let doc = Document::new();
        let container = doc.create_element("div");
        doc.as_node().append_child(&container);
        Harness { rt, doc, container }
    }

    /// Render into the rig's container.
    pub fn render(&self, element: Element) -> Result<Option<Public>, Error> {
        self.rt.render(element, &self.container)
    }

    /// The container's serialised contents.
    pub fn html(&self) -> String {
        self.container.inner_html()
    }

    /// Tear down the rig's container.
    pub fn unmount(&self) -> Result<bool, Error> {
        self.rt.unmount_component_at_node(&self.container)
    }

    /// The mounted node carrying the given id attribute value, found by a
    /// depth-first walk.
    pub fn node_by_id(&self, id: &str) -> Option<DomNode> {
        fn walk(node: &DomNode, id: &str) -> Option<DomNode> {
            if node.get_attribute("id").as_deref() == Some(id) {
                return Some(node.clone());
            }
            for child in node.child_nodes() {
                if let Some(found) = walk(&child, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.container, id)
    }
}

