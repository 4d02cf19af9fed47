//! Typed decoding of agent events

mod parser;

pub use parser::parse_event;
