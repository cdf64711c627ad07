#![allow(clippy::type_complexity)]
//! An embedded configuration expression engine.
//!
//! linicfg reads INI-style `key = value` documents whose values are a small
//! expression language: references to other keys, environment lookups,
//! subprocess captures, file reads, colour conversions, numeric remapping,
//! clocks and caches, composed through string interpolation and fallbacks.
//!
//! The [`document`] module provides a minimal line-based reader/writer
//! sufficient to build and round-trip a document from text; the [`node`]
//! and [`wrapper`] modules are the evaluation engine underneath it, usable
//! directly by anything that wants to build a tree by hand instead.
//!
//! # Example
//!
//! ```rust
//! use linicfg::document::Document;
//! use linicfg::node::collaborators::Collaborators;
//! use std::rc::Rc;
//!
//! let input = "\
//! greeting = hello
//!
//! [server]
//! port = 8080
//! banner = ${greeting}, listening on port ${server.port}
//! ";
//!
//! let (doc, diagnostics) = Document::parse(input, Rc::new(Collaborators::default()));
//! assert!(diagnostics.is_empty());
//! let banner = match &*doc.root.borrow() {
//!     linicfg::node::Node::Wrapper(w) => w.get_child("server.banner").unwrap().unwrap(),
//!     _ => unreachable!(),
//! };
//! assert_eq!(banner, "hello, listening on port 8080");
//! ```

pub mod clone;
pub mod document;
pub mod error;
pub mod node;
pub mod parse;
pub mod slot;
pub mod tstring;
pub mod wrapper;

pub use document::Document;
pub use error::{Diagnostic, Diagnostics, Error, Result};
pub use node::Node;
pub use slot::Slot;
pub use wrapper::Wrapper;
