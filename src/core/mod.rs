pub mod renewal;
pub mod shutdown;

pub use crate::domain::model::{MappingRequest, MappingResult, Protocol, Validation};
pub use crate::domain::ports::{Gateway, PortStore};
pub use crate::utils::error::Result;
