//! # Module for File IO
//!
//! Parsing of the extended DIMACS input format. It is recommended to parse
//! through [`Cnf`](crate::instances::Cnf) rather than using the submodule
//! functions directly.

use std::io;

use thiserror::Error;

pub mod dimacs;

/// Errors parsing an input file
#[derive(Error, Debug)]
pub enum ParsingError {
    /// Errors from the DIMACS parser
    #[error("parsing error: {0}")]
    Dimacs(#[from] dimacs::Error),
    /// IO error reading the input
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}
