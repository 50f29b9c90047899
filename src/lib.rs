//! An interactive command shell built around external-process pipelines.
//!
//! A submitted line is expanded against the process environment, split on
//! `|` into stages with optional `<`/`>` file redirection at the ends, and
//! launched as one process per stage wired together with pipes. A trailing
//! `&` turns the pipeline into a background job tracked by a per-session
//! job table; `cd`, `myjobs`, `myhistory` and `exit` are handled
//! in-process.
//!
//! The main entry point is [`Shell`], which owns the session state (working
//! directory, variable file, job table, history log) and drives the
//! read-eval loop.

mod builtin;
pub mod env;
mod external;
mod history;
mod interpreter;
mod jobs;
mod lexer;
mod parser;

pub use interpreter::{Shell, ShellConfig};
