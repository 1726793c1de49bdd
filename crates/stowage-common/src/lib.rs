pub mod error;
pub mod types;

pub use error::{BackendFault, ErrorKind, Result, StowageError};
pub use types::{Object, ObjectMode, Part, SystemMetadata};
