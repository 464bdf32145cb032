//! Front and middle end for machine descriptions: declares registers, memories, immediates and
//! instruction encodings, validates them, and resolves every instruction form into a
//! bit-packing program an emitter can turn into encoder code.

pub mod loader;
pub mod model;
