//! Compiles a Gerber X3 command tree into RVMC, a renderer-agnostic list of layered draw commands.
//!
//! The [`AstWalker`] tracks the graphics state of a Gerber program and calls [`WalkerHooks`] for every
//! operation, the [`Compiler`] uses [`GeometryCompiler`] hooks to turn apertures, strokes and regions into
//! geometry, pre-transformed copies of apertures and finally an ordered [`Rvmc`].

pub mod ast;
mod compiler;
pub mod coordinate;
mod error;
pub mod expressions;
mod geometry;
mod rvmc;
mod spacial;
pub mod state;
mod types;
mod walker;

pub use compiler::*;
pub use error::*;
pub use geometry::*;
pub use rvmc::*;
pub use spacial::*;
pub use types::Exposure;
pub use walker::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
