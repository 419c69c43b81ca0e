//! Typesets formal German letters: an HTTP form goes in, a `pdflatex`-built
//! PDF comes out.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
