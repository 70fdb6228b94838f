//! Tree-walking interpreter for the JavaScript-like subset that challenge
//! templates and submissions are written in.
//!
//! The interpreter has no ambient authority: the only names visible to user
//! code are the explicit allow-listed builtins installed by `interp` (console,
//! Math, JSON, a few conversion helpers, and array/string methods). Anything
//! else is simply `undefined`, so host state is unreachable from inside a
//! submission. Every evaluation step draws from a fixed step budget, which
//! bounds runaway loops deterministically.

pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use interp::{ConsoleLevel, ConsoleLine, EvalError, Interp};
pub use parser::{parse_program, ParseError};
pub use value::Value;
