//! Routing decisions and request formatting
//!
//! The routing agent marks its decision with a literal tag at the start of
//! its reply. All knowledge of that tag grammar lives in this module.

mod formatter;
mod parser;


pub use formatter::{
    format_routing_messages, format_technical_messages, DEFAULT_ROUTING_SYSTEM_PROMPT,
    DEFAULT_TECHNICAL_SYSTEM_PROMPT,
};
pub use parser::{handoff_marker, parse_routing_response, RoutingDecision};
