//! Length-delimited framing over TCP.
//!
//! One frame on the stream is a 4-byte big-endian length followed by the
//! UTF-8 payload. `tokio-util`'s [`LengthDelimitedCodec`] does the work; this
//! module only pins down its parameters so both directions agree.

use tokio_util::codec::LengthDelimitedCodec;

/// Default upper bound on a single frame's payload (64 KiB).
///
/// A `START` frame for a crowded maze is the largest thing we send and stays
/// far below this.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Builds the codec used for both halves of every connection.
pub fn codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_length)
        .new_codec()
}
