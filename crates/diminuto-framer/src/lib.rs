//! Byte-stuffed framing over an unreliable, bidirectional byte stream: one
//! octet value delimits frames, escape sequences keep it (and its friends)
//! from appearing inside a frame's content, and a Fletcher-16 plus
//! CRC-CCITT trailer catch corruption before a malformed frame is ever
//! handed to a caller.

mod checksum;
mod state;
mod stuffing;
mod writer;

pub use state::{fill, Framer, FramerState, Outcome};
pub use stuffing::{is_reserved, ESCAPE, FLAG, XOFF, XON};
pub use writer::encode;
