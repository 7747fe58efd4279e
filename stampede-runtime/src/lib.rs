#![doc = include_str!("../../README.md")]

mod error;
pub mod report;
pub mod runtime;

pub use error::RuntimeError;
pub use runtime::{StampedeCli, StampedeRuntime};
