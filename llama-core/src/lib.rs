pub mod diagnostics;
pub mod position;
pub mod token;
pub mod value;

pub use diagnostics::{Diagnostic, LogLevel, Logger, Status};
pub use position::Position;
pub use token::{Token, TokenKind};
pub use value::Value;
