pub mod bit_clock;
pub mod clocks;
pub mod notes;
pub mod transport;
pub mod trigger;

pub use bit_clock::*;
pub use clocks::*;
pub use notes::*;
pub use transport::*;
pub use trigger::*;
