//! Form rendering module
//!
//! - `field_renderer`: a single registered field with its error
//! - `youtube_form`: the sign-up form and its action panel

mod field_renderer;
mod youtube_form;

pub use youtube_form::draw;
