//! Words: a small stack-oriented language with a tree-walking interpreter and
//! a Cortex-M0 assembly backend.

pub mod ast;
pub mod diagnostics;
pub mod interpreter;
pub mod lexer;
pub mod m0_backend;
pub mod parser;
pub mod token;
