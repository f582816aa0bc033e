//! Request handlers.

pub mod health;
pub mod results;
pub mod videos;

pub use health::*;
pub use results::*;
pub use videos::*;
