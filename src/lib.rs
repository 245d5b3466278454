//! Thin facade crate: re-exports the engine implemented in
//! [`hierograph_core`] so callers can depend on `hierograph` directly.

pub extern crate hierograph_core;

pub use hierograph_core::*;
