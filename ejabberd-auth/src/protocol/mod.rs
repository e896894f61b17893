//! ejabberd extauth wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! request:  [2 bytes: length (big-endian u16)][command:arg:arg...]
//! response: [0x00 0x02][0x00 0x01 accept | 0x00 0x00 reject]
//! ```

mod request;
mod wire;

pub use request::{Request, RequestError, SEPARATOR};
pub use wire::{
    encode_decision, encode_frame, read_frame, write_decision, FramingError, RESPONSE_LENGTH,
};
