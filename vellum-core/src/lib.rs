//! vellum-core: the fine-grained reactivity primitive and dynamic value
//! model shared by the compiler output and the fragment runtime.

pub mod computed;
pub mod reactive;
pub mod value;
pub mod watch;

pub use computed::{Computed, computed};
pub use reactive::Reactive;
pub use value::Value;
pub use watch::{WatchOptions, Watcher, watch};
