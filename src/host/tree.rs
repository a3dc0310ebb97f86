//! Lazy subtrees: a created-but-detached DOM node plus the child attachments
//! deferred until the node itself is in place. Deferral is the quirks-era
//! fast path, switched by the document's emulated `documentMode`; standards
//! documents attach children eagerly as the tree is built.

use twigdom::{Node as DomNode, NodeKind};

/// A DOM node with deferred child and raw-HTML attachments.
pub struct LazyTree {
    /// The subtree's root node.
    pub node: DomNode,
    children: Vec<LazyTree>,
    html: Option<String>,
    enable_lazy: bool,
}

impl LazyTree {
    /// Wrap a freshly-created node. `enable_lazy` defers child appends until
    /// insertion.
    pub fn new(node: DomNode, enable_lazy: bool) -> Self {
        LazyTree { node, children: Vec::new(), html: None, enable_lazy }
    }

    /// Attach a child subtree, now or at insertion depending on the mode.
    pub fn queue_child(&mut self, child: LazyTree) {
        if self.enable_lazy {
            self.children.push(child);
        } else {
            self.node.append_child(&child.node);
            child.flush();
        }
    }

    /// Attach raw markup, now or at insertion depending on the mode.
    pub fn queue_html(&mut self, html: String) {
        if self.enable_lazy {
            self.html = Some(html);
        } else {
            self.node.set_inner_html(&html);
        }
    }

    fn flush(self) {
        if !self.enable_lazy {
            return;
        }
        for child in self.children {
            self.node.append_child(&child.node);
            child.flush();
        }
        if let Some(html) = self.html {
            self.node.set_inner_html(&html);
        }
    }
}

/// Attach an assembled subtree into `parent` before `reference` (append when
/// `None`), then perform any deferred attachments.
///
/// Fragment roots splice on insertion, so their queued children must be
/// attached before the splice; everything else attaches after.
pub fn insert_tree_before(parent: &DomNode, tree: LazyTree, reference: Option<&DomNode>) {
    if tree.node.kind() == NodeKind::Fragment {
        let LazyTree { node, children, html, enable_lazy } = tree;
        let rebuilt = LazyTree { node: node.clone(), children, html, enable_lazy };
        rebuilt.flush();
        parent.insert_before(&node, reference);
    } else {
        parent.insert_before(&tree.node, reference);
        tree.flush();
    }
}
