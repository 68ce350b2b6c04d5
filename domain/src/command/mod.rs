//! Command protocol — the structured dialect models use to drive tools.
//!
//! [`entities`] defines the closed [`Command`] set; [`codec`] is the strict
//! BEGIN/END wire codec with its [`ParseError`] taxonomy.

pub mod codec;
pub mod entities;

pub use codec::{BEGIN_MARKER, END_MARKER, ParseError, parse, render};
pub use entities::{Args, Command};
