//! Parley wire protocol
//!
//! Framing and envelope format spoken between chat clients and the relay.
//! Everything here is pure data manipulation with no I/O, so the same code
//! backs the async transport, the tests and any alternative front end.
//!
//! # Wire format
//!
//! ```text
//! +----------------------------+---------------------------+
//! | length (10 ASCII, padded)  | payload (length bytes)    |
//! +----------------------------+---------------------------+
//!
//! first frame:  "alice"              identity announcement
//! later frames: "alice:hello"        envelope (sender:message)
//!               "alice:<base64>"     envelope with ciphertext
//! ```
//!
//! There is no type tag on the wire. Whether a message is ciphertext is
//! decided by the receiver (see `parley-crypto`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
pub mod errors;
mod frame;
mod header;

pub use envelope::{ENVELOPE_SEPARATOR, Envelope, Username};
pub use errors::ProtocolError;
pub use frame::{Frame, FrameFormat};
pub use header::FrameHeader;
