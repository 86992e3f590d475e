//! This module contains providers backing the dispute game's trait seams: the mock alphabet
//! execution engine and a trace corruptor for exercising games end to end.

mod alphabet;
pub use self::alphabet::{alphabet_step, AlphabetBatch, AlphabetEngine, AlphabetTrace};

mod forked;
pub use self::forked::ForkedTrace;
