//! Output sink and emitter.

pub mod emitter;
pub mod sink;

pub use emitter::emit;
pub use sink::{Sink, TextGcodeSink};
