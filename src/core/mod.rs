pub mod codec;
pub mod interner;

pub use codec::{CodecError, StateReader, StateWriter};
pub use interner::{StringTable, Symbol};
