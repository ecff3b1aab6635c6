//! Ambient log context.
//!
//! Properties pushed here are attached to every record emitted on the same
//! thread until the returned guard drops. Fields of the enclosing `tracing`
//! spans form the other half of the ambient context and are collected by
//! [`PipelineLayer`](crate::pipeline::layer::PipelineLayer).

use std::cell::RefCell;
use std::marker::PhantomData;

use serde_json::Value;

thread_local! {
    static PROPERTIES: RefCell<Vec<(String, Value)>> = const { RefCell::new(Vec::new()) };
}

/// Thread-scoped property overlays.
pub struct LogContext;

impl LogContext {
    /// Push a property; it is popped when the guard drops.
    #[must_use = "the property is removed as soon as the guard is dropped"]
    pub fn push_property(name: impl Into<String>, value: impl Into<Value>) -> PropertyGuard {
        let depth = PROPERTIES.with(|props| {
            let mut props = props.borrow_mut();
            let depth = props.len();
            props.push((name.into(), value.into()));
            depth
        });
        PropertyGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Visit the current properties, outermost first.
    pub fn with_properties<R>(f: impl FnOnce(&[(String, Value)]) -> R) -> R {
        PROPERTIES.with(|props| f(&props.borrow()))
    }
}

/// Removes a pushed property (and anything pushed after it) on drop.
pub struct PropertyGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for PropertyGuard {
    fn drop(&mut self) {
        PROPERTIES.with(|props| props.borrow_mut().truncate(self.depth));
    }
}
