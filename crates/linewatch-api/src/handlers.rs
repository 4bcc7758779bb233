//! Request handlers.

pub mod health;
pub mod pipeline;
pub mod sessions;
pub mod status;

pub use health::*;
pub use pipeline::*;
pub use sessions::*;
pub use status::*;
