pub mod error;
pub mod path;
pub mod types;
pub mod value;

pub use error::{ErrorKind, VarError};
pub use path::{segment_index, VarPath};
pub use types::*;
pub use value::*;
