//! Abstract Syntax Tree (AST) Types for Pipelines
//!
//! This module defines the parsed form of one input line.
//!
//! Architecture:
//!   Input → Lexer → Parser → Pipeline → Launcher → Exit statuses

pub mod types;
