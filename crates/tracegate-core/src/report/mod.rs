pub mod aggregate;
pub mod artifacts;
pub mod model;
pub mod render;
