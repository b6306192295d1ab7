//! Visual nodes placed into cells.
//!
//! The cell engine never draws anything itself. It moves references to
//! nodes built by application code (render-cache entries, fragment roots)
//! into and out of cell surfaces. A node only needs to be shareable and
//! identifiable; [`Label`] is a minimal concrete node for simple fragments.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use trellis_core::Property;

/// A node of the host scene graph.
pub trait SceneNode: Any + Send + Sync + fmt::Debug {
    /// A short type-like name used in logs and debug output.
    fn node_name(&self) -> &str;

    /// Get this as Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A shared reference to a scene node.
pub type NodeRef = Arc<dyn SceneNode>;

/// Returns `true` if both references point at the same node instance.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// A text node with an observable text property.
pub struct Label {
    name: String,
    /// The displayed text.
    pub text: Property<String>,
}

impl Label {
    /// Create a label with initial text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            name: "label".to_string(),
            text: Property::new(text.into()),
        }
    }

    /// Set the node name using builder pattern.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wrap the label into a shared node reference.
    pub fn into_node(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Label")
            .field("name", &self.name)
            .field("text", &self.text.get())
            .finish()
    }
}

impl SceneNode for Label {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
