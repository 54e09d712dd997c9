//! Application state module

mod app_state;
mod forms;
pub mod youtube;

pub use app_state::*;
pub use forms::*;
