//! # Policy language intermediate representation
//!
//! This module defines the data model shared by the compiler and the
//! machine: lexical tokens, the tree IR, and the compiled program container.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[nodes]** - Tree nodes, literal payloads, structural equality
//! - **[program]** - The compiled program handed to a machine
//!
//! ## Source shape
//!
//! Programs are statements of composed calls, terminated by `;`:
//!
//! ```text
//! const app = env(APP_NAME);
//! (alert(response-time GTE 600)|recover(LT 500)).page();
//! scale-up($app requests GTE f0.9);
//! ```
//!
//! ## Core Concepts
//!
//! ### Chains
//!
//! `.` applies one successor call to the return value of the previous
//! expression: `alert(...).page()`.
//!
//! ### Groups
//!
//! `( a | b )` evaluates each expression, collects the produced return
//! values in order, and hands the list to the chained call that follows.
//!
//! ### Constant bindings
//!
//! `const name = expr;` binds write-once; `$name` reads the binding inside
//! a call; the native `_delete(name)` releases the name for re-binding.

pub mod nodes;
pub mod program;
pub mod tokens;

pub use nodes::{node_equal, value_equal, Node, NodeKind, NodeValue};
pub use program::Program;
pub use tokens::{Token, TokenKind};
