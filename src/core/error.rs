use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type parse error: {0}")]
    ParseError(String),

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Column '{0}' not found in schema for '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Schema probe failed: {0}")]
    ProbeError(String),

    #[error("Create failed: {0}")]
    CreateError(String),

    #[error("Alter failed: {0}")]
    AlterError(String),

    #[error("Drop failed: {0}")]
    DropError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

pub type Result<T> = std::result::Result<T, MapperError>;
