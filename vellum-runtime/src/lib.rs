//! vellum-runtime: the fragment runtime that compiled components run on.
//!
//! Compiled modules build [`Fragment`] trees against an abstract
//! [`Renderer`]; the [`Component`] and scheduler layers route state
//! invalidation into selective bind updates.

pub mod app;
pub mod component;
pub mod context;
pub mod fragment;
pub mod renderer;
pub mod scheduler;
pub mod tree_renderer;

pub use app::Vellum;
pub use component::{Component, ComponentDef, Invalidate};
pub use context::Context;
pub use fragment::{Fragment, ItemAccessor, Tag};
pub use renderer::{EventHandler, EventLoopType, NodeHandle, Renderer};
pub use tree_renderer::{TreeNode, TreeRenderer, tree_node};
