pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{natpmpc::NatpmpcClient, port_file::PortFile};
pub use config::{CliArgs, Settings};
pub use self::core::renewal::{IterationOutcome, RenewalLoop, RenewalSettings};
pub use domain::model::{MappingRequest, MappingResult, Protocol, Validation};
pub use domain::ports::{Gateway, PortStore};
pub use utils::error::{NatPmpError, Result};
