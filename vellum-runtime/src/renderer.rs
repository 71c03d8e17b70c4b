// vellum-runtime/src/renderer.rs

use std::any::Any;
use std::rc::Rc;

use vellum_core::Value;

/// Opaque handle to a node owned by the renderer. Each renderer downcasts
/// back to its own concrete node type.
pub type NodeHandle = Rc<dyn Any>;

/// Callback installed for a host event. Arguments are renderer-defined.
pub type EventHandler = Rc<dyn Fn(&[Value])>;

/// How the host expects the scheduler to be driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventLoopType {
    /// Flush synchronously as soon as a component is invalidated.
    Sync,
    /// The host drives flushing from its own async loop.
    Async,
    /// The host toolkit owns the loop; flushing is requested through it.
    HostToolkit,
    /// No preference; the driver picks a synchronous flush.
    Default,
}

/// The interface the fragment runtime draws through. Implementations own
/// the actual node tree; the runtime only ever holds `NodeHandle`s.
pub trait Renderer {
    fn create_element(&self, tag: &str) -> NodeHandle;

    fn create_text_element(&self) -> NodeHandle;

    /// Insert `child` into `parent`, before `anchor` when given, appended
    /// otherwise.
    fn insert(&self, child: &NodeHandle, parent: &NodeHandle, anchor: Option<&NodeHandle>);

    fn remove(&self, child: &NodeHandle, parent: &NodeHandle);

    fn set_element_text(&self, element: &NodeHandle, text: &str);

    fn set_attribute(&self, element: &NodeHandle, name: &str, value: &Value);

    fn remove_attribute(&self, element: &NodeHandle, name: &str);

    fn add_event_listener(&self, element: &NodeHandle, event: &str, handler: EventHandler);

    fn remove_event_listener(&self, element: &NodeHandle, event: &str, handler: &EventHandler);

    fn preferred_event_loop_type(&self) -> EventLoopType {
        EventLoopType::Default
    }
}
