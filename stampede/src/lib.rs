#![doc = include_str!("../../README.md")]

pub mod error;
pub mod ramp;
pub mod recorder;
pub mod scenario;
pub mod session;
pub mod thresholds;
pub mod transport;

pub(crate) mod driver;
pub(crate) mod transaction;

pub use error::{Error, IterationError};
pub use load_test::{ConfigurableLoadTest, LoadTest};
pub use scenario::{default_scenario, Check, Group, Scenario};

pub mod prelude {
    pub use crate::load_test::{ConfigurableLoadTest, LoadTest};
    pub use crate::scenario::{default_scenario, Check, Group, Scenario};
    pub use crate::transport::{ReqwestTransport, Transport};
    pub use stampede_core::{NoDataPolicy, RunConfig, RunSummary, Stage};
}
