//! # gauze-gui
//!
//! Widget and vector-rendering overlay layer for a 3D engine's 2D GUI.
//!
//! This crate is the core of the overlay: it owns the rasterization pipeline
//! that turns declarative vector scenes into offscreen bitmaps shown as
//! single controls, and the reactive invalidation protocol that keeps those
//! bitmaps current without redundant work. The host GUI framework (layout,
//! paint loop, pointer routing) and the vector content library (shapes, text
//! shaping, markup) are external collaborators reached through traits.
//!
//! ## Core Types
//!
//! - [`Vg`] - leaf control that rasterizes a vector scene to a bitmap
//! - [`FlowingText`] - auto-reflowing rich text layered on [`Vg`]
//! - [`DecoratedContainer`] - decoration + content composite every higher
//!   widget builds on
//! - [`DynamicRegionManager`] - pointer semantics for interactive regions of
//!   a rendered bitmap
//!
//! ## Scheduling & Invalidation
//!
//! - [`Scheduler`] - cooperative turn/timeout pump driven by the host
//! - [`Promise`] - single-threaded awaitable completion
//! - [`Debounced`] - collapses synchronous mutation bursts into single
//!   deferred executions
//! - [`Observable`] - synchronous multi-subscriber event streams
//!
//! ## Seams
//!
//! - [`VectorScene`] / [`TextScene`] / [`TextEngine`] - the vector library
//! - [`Canvas`] - the host's 2D drawing context
//! - [`Control`] / [`ContentControl`] - the capabilities widgets expose

mod canvas;
mod color;
mod control;
mod debounce;
mod decorated;
mod error;
mod flowing_text;
mod geometry;
mod observable;
mod promise;
mod regions;
mod scene;
mod schedule;
mod surface;
mod vg;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

// Core controls
pub use decorated::*;
pub use flowing_text::*;
pub use regions::*;
pub use vg::*;

// Scheduling & invalidation
pub use debounce::*;
pub use observable::*;
pub use promise::*;
pub use schedule::*;

// Seams & substrate
pub use canvas::*;
pub use color::*;
pub use control::*;
pub use error::*;
pub use geometry::*;
pub use scene::*;
pub use surface::*;
