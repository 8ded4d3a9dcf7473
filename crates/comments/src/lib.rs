mod comment;
mod config;
mod list;
mod marks;
mod storage;

pub use crate::comment::*;
pub use crate::config::*;
pub use crate::list::*;
pub use crate::marks::*;
pub use crate::storage::*;
