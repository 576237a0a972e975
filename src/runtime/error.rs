use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("`{type_name}` has no member `{name}`")]
    NoSuchMember { type_name: String, name: String },
    #[error("No overload of `{name}` accepts {argc} argument(s)")]
    NoMatchingOverload { name: String, argc: usize },
    #[error("Invalid operand type: {message}")]
    InvalidOperandType { message: String },
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
}
