//! The visible state of a cell slot.
//!
//! A [`CellSurface`] is what the host toolkit paints for one slot: an
//! optional text, an optional graphic, an inline style and a set of style
//! classes. Formatting callbacks receive it mutably; the controller resets
//! it to a [`StyleBaseline`] whenever the slot loses its item.

use std::fmt;

use crate::editor::EditorKind;
use crate::node::{NodeRef, same_node};

/// What occupies the graphic position of a cell.
#[derive(Clone, Default)]
pub enum Graphic {
    /// Nothing.
    #[default]
    Empty,
    /// A node from the render cache, a fragment root or a formatter.
    Node(NodeRef),
    /// The input widget of an active edit session.
    Editor(EditorKind),
    /// An always-present toggle showing the given state.
    Toggle(bool),
}

impl Graphic {
    /// Returns `true` if nothing is shown.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The node shown, if the graphic is a node.
    pub fn node(&self) -> Option<&NodeRef> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns `true` if this graphic shows exactly `node`.
    pub fn is_node(&self, node: &NodeRef) -> bool {
        self.node().is_some_and(|shown| same_node(shown, node))
    }
}

impl fmt::Debug for Graphic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Node(node) => f.debug_tuple("Node").field(&node.node_name()).finish(),
            Self::Editor(kind) => f.debug_tuple("Editor").field(kind).finish(),
            Self::Toggle(checked) => f.debug_tuple("Toggle").field(checked).finish(),
        }
    }
}

impl PartialEq for Graphic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Node(a), Self::Node(b)) => same_node(a, b),
            (Self::Editor(a), Self::Editor(b)) => a == b,
            (Self::Toggle(a), Self::Toggle(b)) => a == b,
            _ => false,
        }
    }
}

/// Style classes a slot carried before it was ever bound to an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleBaseline {
    classes: Vec<String>,
}

impl StyleBaseline {
    /// Create a baseline from a list of classes.
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut baseline = Self::default();
        for class in classes {
            let class = class.into();
            if !baseline.classes.contains(&class) {
                baseline.classes.push(class);
            }
        }
        baseline
    }

    /// The baseline classes in insertion order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Returns `true` if `class` is part of the baseline.
    pub fn contains(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Displayed state of one cell slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellSurface {
    text: Option<String>,
    graphic: Graphic,
    style: Option<String>,
    style_classes: Vec<String>,
}

impl CellSurface {
    /// Create an empty surface carrying the given baseline classes.
    pub fn with_baseline(baseline: &StyleBaseline) -> Self {
        Self {
            style_classes: baseline.classes.clone(),
            ..Self::default()
        }
    }

    /// The displayed text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Set the displayed text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Remove the displayed text.
    pub fn clear_text(&mut self) {
        self.text = None;
    }

    /// The displayed graphic.
    pub fn graphic(&self) -> &Graphic {
        &self.graphic
    }

    /// Replace the displayed graphic.
    pub fn set_graphic(&mut self, graphic: Graphic) {
        self.graphic = graphic;
    }

    /// Show a node as the graphic.
    pub fn set_node(&mut self, node: NodeRef) {
        self.graphic = Graphic::Node(node);
    }

    /// Remove the displayed graphic.
    pub fn clear_graphic(&mut self) {
        self.graphic = Graphic::Empty;
    }

    /// The inline style override.
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Set an inline style override.
    pub fn set_style(&mut self, style: impl Into<String>) {
        self.style = Some(style.into());
    }

    /// Remove the inline style override.
    pub fn clear_style(&mut self) {
        self.style = None;
    }

    /// The current style classes.
    pub fn style_classes(&self) -> &[String] {
        &self.style_classes
    }

    /// Add a style class. Adding a class twice has no effect.
    pub fn add_style_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !self.has_style_class(&class) {
            self.style_classes.push(class);
        }
    }

    /// Remove a style class, returning `true` if it was present.
    pub fn remove_style_class(&mut self, class: &str) -> bool {
        let before = self.style_classes.len();
        self.style_classes.retain(|c| c != class);
        before != self.style_classes.len()
    }

    /// Add or remove a class depending on `enabled`.
    pub fn toggle_style_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.add_style_class(class);
        } else {
            self.remove_style_class(class);
        }
    }

    /// Returns `true` if the class is present.
    pub fn has_style_class(&self, class: &str) -> bool {
        self.style_classes.iter().any(|c| c == class)
    }

    /// Capture the current classes as a baseline.
    pub fn snapshot_baseline(&self) -> StyleBaseline {
        StyleBaseline {
            classes: self.style_classes.clone(),
        }
    }

    /// Make the class set equal to `baseline`.
    ///
    /// Classes added since the snapshot are removed and baseline classes
    /// removed since the snapshot come back, in baseline order.
    pub fn restore_baseline(&mut self, baseline: &StyleBaseline) {
        self.style_classes.clone_from(&baseline.classes);
    }

    /// Clear text, graphic and inline style and restore the baseline classes.
    pub fn reset(&mut self, baseline: &StyleBaseline) {
        self.text = None;
        self.graphic = Graphic::Empty;
        self.style = None;
        self.restore_baseline(baseline);
    }
}
