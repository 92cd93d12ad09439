//! Delimiter-terminated message framing for worker standard streams.
//!
//! Every message on the wire is one line:
//! - the payload bytes (never containing the delimiter)
//! - a single delimiter byte, `\n` by default
//!
//! Bytes arrive in arbitrary chunks; [`LineFramer`] keeps the undelimited
//! tail between reads so callers only ever see complete frames.

pub mod codec;
pub mod error;
pub mod framer;
#[cfg(feature = "async")]
pub mod line_codec;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_DELIMITER};
pub use error::{FrameError, Result};
pub use framer::{Frames, LineFramer};
#[cfg(feature = "async")]
pub use line_codec::LineCodec;
pub use writer::FrameWriter;
