//! # gauze-gui-widgets
//!
//! Higher-level widgets built on the `gauze-gui` core: push buttons with
//! per-state styling, dialogs with infotip tooltip orchestration, a
//! hand-of-cards layout panel, and the de-overlap solver that keeps floating
//! frames apart and on-screen.

mod action_button;
mod deoverlap;
mod dialog;
mod hand_panel;

pub use action_button::*;
pub use deoverlap::*;
pub use dialog::*;
pub use hand_panel::*;
