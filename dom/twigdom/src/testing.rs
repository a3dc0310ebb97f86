//! Convenience methods for dispatching events to targets the way a user
//! would, primarily useful for tests: find the node of interest, `click` it
//! or `keyboard` into it, then assert on the resulting document.

use crate::{event::Event, Node};

/// User-shaped event dispatch helpers.
pub trait TargetExt {
    /// Dispatch a click to the target.
    fn click(&self) {
        self.event(&Event::click());
    }

    /// "Type" the provided text, one key pair per character, followed by the
    /// `<Enter>` key and a blur.
    fn keyboardln(&self, contents: &str) {
        self.keyboard(contents);
        self.enter();
        self.blur();
    }

    /// "Type" the provided text, one keydown/keyup pair per character.
    fn keyboard(&self, contents: &str) {
        for c in contents.chars() {
            self.key(&c.to_string());
        }
    }

    /// "Press" the `<Enter>` key.
    fn enter(&self) {
        self.key("Enter");
    }

    /// Dismiss the target, causing it to lose focus.
    fn blur(&self) {
        self.event(&Event::blur());
    }

    /// Emit a keydown/keyup pair for `key`.
    fn key(&self, key: &str);

    /// Dispatch the given event to this target.
    fn event(&self, event: &Event);
}

impl TargetExt for Node {
    fn key(&self, key: &str) {
        self.event(&Event::key_down(key));
        self.event(&Event::key_up(key));
    }

    fn event(&self, event: &Event) {
        self.dispatch(event);
    }
}
