mod apply;
mod commands;
mod core;
mod editor;
mod html;
mod mark;
mod normalize;
mod ops;
mod plugin;
mod position;
mod serde_value;

pub use crate::apply::{ApplyError, PathError};
pub use crate::core::*;
pub use crate::editor::*;
pub use crate::html::*;
pub use crate::mark::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::position::*;
pub use crate::serde_value::*;
