// MIT License - Copyright (c) 2026 Peter Wright
// Contact ID reporting protocol

pub mod collector;
pub mod decoder;
pub mod table;

pub use collector::{Collector, RawMessage};
pub use decoder::Decoder;
pub use table::{EventEntry, Match, Qualifier};
