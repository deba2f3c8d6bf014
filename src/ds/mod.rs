pub mod frequency_sketch;
pub mod slot_arena;

pub use frequency_sketch::FrequencySketch;
pub use slot_arena::{SlotArena, SlotId};
