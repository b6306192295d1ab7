//! Typed per-view configuration.
//!
//! Everything a column or view registers for its cells lives in one
//! [`CellConfig`]. The configuration is assembled through the view binding
//! API, validated as each piece is registered, and then shared read-only
//! by every controller the view creates.

use std::fmt;
use std::sync::Arc;

use crate::cache::CellCacheLookup;
use crate::delegate::EditDelegate;
use crate::fragment::FragmentFactory;
use crate::surface::{CellSurface, StyleBaseline};

/// Edit lifecycle notifications passed to an edit-support callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditEvent {
    StartEdit,
    CommitEdit,
    CancelEdit,
}

/// Formats a cell for an item. Runs after cache and fragment output.
pub type Formatter<T> = Arc<dyn Fn(&mut CellSurface, &T) + Send + Sync>;

/// Observes edit transitions. The value is present only for commits.
pub type EditSupport<T> = Arc<dyn Fn(&mut CellSurface, EditEvent, Option<&T>) + Send + Sync>;

/// Everything registered for the cells of one column or view.
pub struct CellConfig<R: 'static, T: 'static> {
    formatter: Option<Formatter<T>>,
    cache: Option<Arc<dyn CellCacheLookup<T>>>,
    fragment: Option<FragmentFactory<R, T>>,
    delegate: Option<EditDelegate<T>>,
    edit_support: Option<EditSupport<T>>,
    editable: bool,
    baseline: StyleBaseline,
}

impl<R: 'static, T: 'static> CellConfig<R, T> {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self {
            formatter: None,
            cache: None,
            fragment: None,
            delegate: None,
            edit_support: None,
            editable: false,
            baseline: StyleBaseline::default(),
        }
    }

    /// Set the formatter using builder pattern, replacing any previous one.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&mut CellSurface, &T) + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Add a formatting step after the current formatter.
    ///
    /// Without a formatter the decorator becomes the formatter.
    pub fn with_decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(&mut CellSurface, &T) + Send + Sync + 'static,
    {
        let formatter: Formatter<T> = match self.formatter.take() {
            Some(previous) => Arc::new(move |surface: &mut CellSurface, item: &T| {
                previous(surface, item);
                decorator(surface, item);
            }),
            None => Arc::new(decorator),
        };
        self.formatter = Some(formatter);
        self
    }

    /// Set the render cache using builder pattern.
    pub fn with_cache(mut self, cache: Arc<dyn CellCacheLookup<T>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the fragment factory using builder pattern.
    pub fn with_fragment(mut self, factory: FragmentFactory<R, T>) -> Self {
        self.fragment = Some(factory);
        self
    }

    /// Set the edit delegate using builder pattern.
    pub fn with_delegate(mut self, delegate: EditDelegate<T>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Set the edit-support callback using builder pattern.
    pub fn with_edit_support<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut CellSurface, EditEvent, Option<&T>) + Send + Sync + 'static,
    {
        self.edit_support = Some(Arc::new(callback));
        self
    }

    /// Set whether cells may enter editing using builder pattern.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Set the baseline style classes using builder pattern.
    pub fn with_baseline(mut self, baseline: StyleBaseline) -> Self {
        self.baseline = baseline;
        self
    }

    /// The formatter.
    pub fn formatter(&self) -> Option<&Formatter<T>> {
        self.formatter.as_ref()
    }

    /// The render cache.
    pub fn cache(&self) -> Option<&Arc<dyn CellCacheLookup<T>>> {
        self.cache.as_ref()
    }

    /// The fragment factory.
    pub fn fragment(&self) -> Option<&FragmentFactory<R, T>> {
        self.fragment.as_ref()
    }

    /// The edit delegate.
    pub fn delegate(&self) -> Option<&EditDelegate<T>> {
        self.delegate.as_ref()
    }

    /// The edit-support callback.
    pub fn edit_support(&self) -> Option<&EditSupport<T>> {
        self.edit_support.as_ref()
    }

    /// Returns `true` if cells may enter editing.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Style classes every slot starts with.
    pub fn baseline(&self) -> &StyleBaseline {
        &self.baseline
    }
}

impl<R: 'static, T: 'static> Default for CellConfig<R, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static, T: 'static> Clone for CellConfig<R, T> {
    fn clone(&self) -> Self {
        Self {
            formatter: self.formatter.clone(),
            cache: self.cache.clone(),
            fragment: self.fragment.clone(),
            delegate: self.delegate.clone(),
            edit_support: self.edit_support.clone(),
            editable: self.editable,
            baseline: self.baseline.clone(),
        }
    }
}

impl<R: 'static, T: 'static> fmt::Debug for CellConfig<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellConfig")
            .field("formatter", &self.formatter.is_some())
            .field("cache", &self.cache.is_some())
            .field("fragment", &self.fragment.is_some())
            .field("delegate", &self.delegate)
            .field("edit_support", &self.edit_support.is_some())
            .field("editable", &self.editable)
            .field("baseline", &self.baseline)
            .finish()
    }
}

/// Configuration for a [`VirtualFlow`](crate::flow::VirtualFlow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    /// Number of rows visible at once.
    pub viewport_len: usize,
    /// Extra slots kept bound beyond the viewport edge.
    pub overscan: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            viewport_len: 20,
            overscan: 2,
        }
    }
}

impl FlowConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the viewport size using builder pattern.
    pub fn with_viewport_len(mut self, viewport_len: usize) -> Self {
        self.viewport_len = viewport_len;
        self
    }

    /// Set the overscan using builder pattern.
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    /// Total number of slots a flow keeps.
    pub fn pool_len(&self) -> usize {
        self.viewport_len + self.overscan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decorators_run_in_registration_order() {
        let config = CellConfig::<(), i32>::new()
            .with_decorator(|surface, item| surface.set_text(item.to_string()))
            .with_decorator(|surface, item| {
                if *item < 0 {
                    surface.add_style_class("negative");
                }
            });

        let mut surface = CellSurface::default();
        (config.formatter().unwrap())(&mut surface, &-3);
        assert_eq!(surface.text(), Some("-3"));
        assert!(surface.has_style_class("negative"));
    }

    #[test]
    fn test_clone_shares_callbacks() {
        let config = CellConfig::<(), i32>::new()
            .with_formatter(|surface, _| surface.set_text("x"))
            .with_editable(true);
        let copy = config.clone();
        assert!(Arc::ptr_eq(
            config.formatter().unwrap(),
            copy.formatter().unwrap()
        ));
        assert!(copy.is_editable());
    }

    #[test]
    fn test_flow_config_builder() {
        let config = FlowConfig::new().with_viewport_len(3).with_overscan(1);
        assert_eq!(config.pool_len(), 4);
        assert_eq!(FlowConfig::default().pool_len(), 22);
    }
}
