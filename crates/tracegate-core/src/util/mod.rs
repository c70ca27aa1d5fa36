pub mod deterministic;
pub mod domain;
