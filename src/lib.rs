//! # essence-rs
//!
//! `essence-rs` is a parser front end for a small Essence-like constraint
//! modelling language. A program declares decision variables over integer or
//! boolean domains with `find` statements, and states a single boolean
//! constraint after `such that`:
//!
//! ```text
//! find x, y : int(1..10)
//! find b : bool
//! such that x + y <= 10 and min([x, y]) = 2 or b
//! ```
//!
//! [`parse`] produces the [`ast::Program`] that a solver-binding layer walks
//! to materialize solver variables and propagators. This crate is only the
//! front end: it checks syntactic well-formedness and nothing more. In
//! particular, it does not verify that variables referenced in the
//! constraint were declared, nor that ranges are non-empty; those checks
//! belong to a semantic pass or the solver binding.
//!
//! Parsing is a single synchronous pass with fail-fast error reporting:
//! the result is either a complete AST or the first [`ParseError`], carrying
//! an error kind, a message, and the source span it points at.
//!
//! ## Example
//! ```
//! let program = essence_rs::parse("find x : int(1..3) such that x = 2")
//!     .expect("valid program");
//!
//! let statement = &program.find_statements[0].node;
//! assert_eq!("x", &*statement.variables[0].node);
//!
//! // The AST renders back to canonical surface syntax.
//! assert_eq!(
//!     "find x : int(1..3)\nsuch that x = 2",
//!     program.to_string()
//! );
//! ```

pub mod ast;
pub mod essence;

mod error;

pub use error::*;
pub use essence::lex;
pub use essence::parse;
pub use essence::Token;
