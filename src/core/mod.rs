mod error;
mod ids;
mod value;

pub use error::{MapperError, Result};
pub use ids::{generate_timeuuid, generate_uuid};
pub use value::CqlValue;
