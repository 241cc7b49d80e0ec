//! # tspb
//!
//! A proto3 toolchain in two halves:
//!
//! - A **binary wire codec runtime**: [`BinaryReader`]/[`BinaryWriter`] over
//!   complete buffers, with varint/zigzag/fixed codecs, length-delimited
//!   framing, permissive UTF-8 string decoding, and lossless 64-bit value
//!   handling ([`int64`]). [`json`] adds the proto3 canonical JSON value
//!   mapping (decimal-string 64-bit integers, base64 bytes, non-finite float
//!   spellings).
//! - A **code generator** ([`codegen`]) driven by the `protoc-gen-tspb`
//!   binary: it deserializes a `CodeGeneratorRequest` from the compiler,
//!   walks each file descriptor into an intermediate tree of message/enum
//!   nodes, and emits TypeScript (or JavaScript) source defining the data
//!   types together with a binary codec and a JSON codec per message.
//!
//! The generator is self-hosting: the descriptor and plugin-protocol
//! messages in [`descriptor`] are hand-written in exactly the shape the
//! emitter produces, decoding through this crate's own runtime.
//!
//! ## Decoding
//!
//! ```
//! use tspb::BinaryReader;
//!
//! // message M { int32 n = 1; string s = 2; } with {n: 150, s: "hi"}
//! let mut reader = BinaryReader::new(vec![0x08, 0x96, 0x01, 0x12, 0x02, 0x68, 0x69]);
//! while reader.next_field() {
//!     match reader.get_field_number() {
//!         1 => assert_eq!(reader.read_int32(), 150),
//!         2 => assert_eq!(reader.read_string(), "hi"),
//!         _ => reader.skip_field(),
//!     }
//! }
//! assert!(!reader.get_error());
//! ```
//!
//! ## Encoding
//!
//! ```
//! use tspb::BinaryWriter;
//!
//! let mut writer = BinaryWriter::new();
//! writer.write_int32(1, 150);
//! writer.write_string(2, "hi");
//! assert_eq!(writer.get_result_buffer(), [0x08, 0x96, 0x01, 0x12, 0x02, 0x68, 0x69]);
//! ```
//!
//! ## Restrictions
//!
//! - Proto2 groups are not supported; a group wire type poisons the reader.
//! - Unknown fields are skipped during decoding, not preserved.
//! - Codecs operate on complete buffers; there is no streaming surface.

pub mod decoding;
pub mod encoding;
pub mod int64;
pub mod json;
pub mod wire;

pub mod codegen;
pub mod descriptor;

// Re-export the generated-code-facing types at crate root
pub use decoding::{BinaryDecoder, BinaryReader};
pub use encoding::BinaryWriter;

/// Errors surfaced by the codec runtime's fallible entry points.
#[derive(Debug)]
pub enum Error {
    /// The decoder's error flag tripped: malformed varint, read past end,
    /// or an invalid length on a delimited field.
    InvalidData,
    /// A decimal-string 64-bit value did not parse.
    InvalidNumber(String),
    /// A base64 payload did not decode under either alphabet.
    InvalidBase64,
    /// Malformed JSON input, propagated from the parser.
    Json(serde_json::Error),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidData => write!(f, "invalid protobuf data"),
            Error::InvalidNumber(s) => write!(f, "invalid 64-bit decimal string {s:?}"),
            Error::InvalidBase64 => write!(f, "invalid base64"),
            Error::Json(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}
