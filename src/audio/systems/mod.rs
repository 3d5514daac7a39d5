pub mod binary_counter;

pub use binary_counter::{BinaryCounterSystem, WallClock};
