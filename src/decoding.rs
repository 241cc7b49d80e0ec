//! Binary wire-format decoding.
//!
//! Two layers, mirroring the encoder in `encoding`:
//!
//! - [`BinaryDecoder`]: a cursor over a bounded byte window with varint,
//!   fixed-width, float, UTF-8 and raw-bytes reads. Freed decoders are kept
//!   on a thread-local free list (up to `DECODER_CACHE_LIMIT`) so tight
//!   decode loops do not churn allocations.
//! - [`BinaryReader`]: tag-level dispatch on top of a decoder. Generated
//!   code drives `next_field`/`get_field_number` and calls one typed read
//!   per known field, `skip_field` otherwise.
//!
//! Neither layer returns `Result`; malformed input sets a sticky error flag
//! and the top-level message `decode` converts the flag into an error. No
//! partial decode escapes.

use std::cell::RefCell;

use bytes::Bytes;

use crate::int64::{
    join_float32, join_float64, join_hash64, join_int64, join_signed_decimal_string, join_uint64,
    join_unsigned_decimal_string, join_zigzag64,
};
use crate::wire::{tag_field_number, zigzag_decode32, WireType, MAX_VARINT_BYTES};

const DECODER_CACHE_LIMIT: usize = 100;

thread_local! {
    static DECODER_CACHE: RefCell<Vec<BinaryDecoder>> = const { RefCell::new(Vec::new()) };
}

/// Cursor over a bounded window of a byte buffer.
pub struct BinaryDecoder {
    block: Bytes,
    start: usize,
    end: usize,
    cursor: usize,
    error: bool,
}

impl Default for BinaryDecoder {
    fn default() -> Self {
        BinaryDecoder {
            block: Bytes::new(),
            start: 0,
            end: 0,
            cursor: 0,
            error: false,
        }
    }
}

impl BinaryDecoder {
    /// Pop a decoder off the thread-local free list (or make a fresh one)
    /// and seat it on `block`.
    pub fn alloc(block: Bytes) -> BinaryDecoder {
        let mut decoder = DECODER_CACHE
            .with(|cache| cache.borrow_mut().pop())
            .unwrap_or_default();
        decoder.set_block(block);
        decoder
    }

    /// Return a decoder to the free list. Past the cap it is simply dropped.
    pub fn free(mut decoder: BinaryDecoder) {
        decoder.clear();
        DECODER_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            if cache.len() < DECODER_CACHE_LIMIT {
                cache.push(decoder);
            }
        });
    }

    /// Seat the decoder on a new block, spanning the whole buffer.
    pub fn set_block(&mut self, block: Bytes) {
        self.start = 0;
        self.end = block.len();
        self.cursor = 0;
        self.error = false;
        self.block = block;
    }

    pub fn clear(&mut self) {
        self.block = Bytes::new();
        self.start = 0;
        self.end = 0;
        self.cursor = 0;
        self.error = false;
    }

    pub fn get_error(&self) -> bool {
        self.error
    }

    pub fn at_end(&self) -> bool {
        self.cursor == self.end
    }

    pub fn past_end(&self) -> bool {
        self.cursor > self.end
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn start(&self) -> usize {
        self.start
    }

    fn read_byte(&mut self) -> u8 {
        if self.cursor >= self.end {
            self.error = true;
            return 0;
        }
        let byte = self.block[self.cursor];
        self.cursor += 1;
        byte
    }

    fn advance(&mut self, count: usize) {
        if self.end - self.cursor < count {
            self.error = true;
            self.cursor = self.end;
            return;
        }
        self.cursor += count;
    }

    /// Unrolled 32-bit varint read. The fifth byte contributes only its low
    /// four bits; continuation past it must terminate within five more bytes
    /// (the sign extension of a negative 64-bit value) or the varint is
    /// malformed.
    pub fn read_varint32(&mut self) -> u32 {
        let mut byte = self.read_byte();
        let mut value = (byte & 0x7f) as u32;
        if byte < 0x80 {
            return value;
        }

        byte = self.read_byte();
        value |= ((byte & 0x7f) as u32) << 7;
        if byte < 0x80 {
            return value;
        }

        byte = self.read_byte();
        value |= ((byte & 0x7f) as u32) << 14;
        if byte < 0x80 {
            return value;
        }

        byte = self.read_byte();
        value |= ((byte & 0x7f) as u32) << 21;
        if byte < 0x80 {
            return value;
        }

        byte = self.read_byte();
        value |= ((byte & 0x0f) as u32) << 28;
        if byte < 0x80 {
            return value;
        }

        // Look for the terminator among the sign-extension bytes.
        for _ in 0..MAX_VARINT_BYTES - 5 {
            if self.read_byte() < 0x80 {
                return value;
            }
        }
        self.error = true;
        value
    }

    /// Read a full 64-bit varint into two 32-bit halves and hand them to
    /// `convert` (one of the `int64` joins). Terminates at the first byte
    /// with a clear continuation bit; ten continuation bytes without a
    /// terminator is a decode error.
    pub fn read_split_varint64<R>(&mut self, convert: impl FnOnce(u32, u32) -> R) -> R {
        let mut byte = 0x80u8;
        let mut low = 0u32;
        let mut high = 0u32;

        for shift in 0..4 {
            if byte < 0x80 {
                break;
            }
            byte = self.read_byte();
            low |= ((byte & 0x7f) as u32) << (shift * 7);
        }

        if byte >= 0x80 {
            // Fifth byte straddles the halves: four bits low, three high.
            byte = self.read_byte();
            low |= ((byte & 0x7f) as u32) << 28;
            high |= ((byte & 0x7f) as u32) >> 4;
        }

        for shift in 0..5 {
            if byte < 0x80 {
                break;
            }
            byte = self.read_byte();
            high |= ((byte & 0x7f) as u32) << (shift * 7 + 3);
        }

        if byte >= 0x80 {
            self.error = true;
        }
        convert(low, high)
    }

    /// Consume a varint without materializing it.
    pub fn skip_varint(&mut self) {
        for _ in 0..MAX_VARINT_BYTES {
            if self.read_byte() < 0x80 {
                return;
            }
        }
        self.error = true;
    }

    pub fn read_unsigned_varint32(&mut self) -> u32 {
        self.read_varint32()
    }

    pub fn read_signed_varint32(&mut self) -> i32 {
        // int32 on the wire is the sign-extended 64-bit varint.
        self.read_split_varint64(join_int64) as i32
    }

    pub fn read_zigzag_varint32(&mut self) -> i32 {
        zigzag_decode32(self.read_varint32())
    }

    pub fn read_unsigned_varint64(&mut self) -> u64 {
        self.read_split_varint64(join_uint64)
    }

    pub fn read_signed_varint64(&mut self) -> i64 {
        self.read_split_varint64(join_int64)
    }

    pub fn read_zigzag_varint64(&mut self) -> i64 {
        self.read_split_varint64(join_zigzag64)
    }

    pub fn read_unsigned_varint64_string(&mut self) -> String {
        self.read_split_varint64(join_unsigned_decimal_string)
    }

    pub fn read_signed_varint64_string(&mut self) -> String {
        self.read_split_varint64(join_signed_decimal_string)
    }

    pub fn read_varint_hash64(&mut self) -> [u8; 8] {
        self.read_split_varint64(join_hash64)
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_split_varint64(join_uint64) != 0
    }

    pub fn read_uint8(&mut self) -> u8 {
        self.read_byte()
    }

    pub fn read_uint16(&mut self) -> u16 {
        let low = self.read_byte() as u16;
        let high = self.read_byte() as u16;
        low | (high << 8)
    }

    pub fn read_uint32(&mut self) -> u32 {
        let mut value = 0u32;
        for shift in 0..4 {
            value |= (self.read_byte() as u32) << (shift * 8);
        }
        value
    }

    pub fn read_int32_fixed(&mut self) -> i32 {
        self.read_uint32() as i32
    }

    pub fn read_split_fixed64<R>(&mut self, convert: impl FnOnce(u32, u32) -> R) -> R {
        let low = self.read_uint32();
        let high = self.read_uint32();
        convert(low, high)
    }

    pub fn read_fixed_hash64(&mut self) -> [u8; 8] {
        self.read_split_fixed64(join_hash64)
    }

    pub fn read_float(&mut self) -> f32 {
        join_float32(self.read_uint32())
    }

    pub fn read_double(&mut self) -> f64 {
        self.read_split_fixed64(join_float64)
    }

    /// A view over `length` bytes of the source buffer; no copy.
    pub fn read_bytes(&mut self, length: usize) -> Bytes {
        if self.end - self.cursor < length {
            self.error = true;
            self.cursor = self.end;
            return Bytes::new();
        }
        let bytes = self.block.slice(self.cursor..self.cursor + length);
        self.cursor += length;
        bytes
    }

    /// Permissive UTF-8 decode of `length` bytes.
    ///
    /// Walks 1- to 4-byte sequences into UTF-16 code units; 4-byte sequences
    /// become an explicit surrogate pair. Continuation bytes without a lead
    /// are skipped silently; a sequence truncated by the field boundary is
    /// dropped.
    pub fn read_string(&mut self, length: usize) -> String {
        if self.end - self.cursor < length {
            self.error = true;
            self.cursor = self.end;
            return String::new();
        }
        let end = self.cursor + length;
        let mut units: Vec<u16> = Vec::with_capacity(length);

        while self.cursor < end {
            let c = self.block[self.cursor] as u32;
            if c < 0x80 {
                units.push(c as u16);
                self.cursor += 1;
            } else if c < 0xc0 {
                // Out-of-sync continuation byte.
                self.cursor += 1;
            } else if c < 0xe0 {
                if end - self.cursor < 2 {
                    self.cursor = end;
                    break;
                }
                let c2 = self.block[self.cursor + 1] as u32;
                units.push((((c & 0x1f) << 6) | (c2 & 0x3f)) as u16);
                self.cursor += 2;
            } else if c < 0xf0 {
                if end - self.cursor < 3 {
                    self.cursor = end;
                    break;
                }
                let c2 = self.block[self.cursor + 1] as u32;
                let c3 = self.block[self.cursor + 2] as u32;
                units.push((((c & 0x0f) << 12) | ((c2 & 0x3f) << 6) | (c3 & 0x3f)) as u16);
                self.cursor += 3;
            } else {
                if end - self.cursor < 4 {
                    self.cursor = end;
                    break;
                }
                let c2 = self.block[self.cursor + 1] as u32;
                let c3 = self.block[self.cursor + 2] as u32;
                let c4 = self.block[self.cursor + 3] as u32;
                let codepoint =
                    ((c & 0x07) << 18) | ((c2 & 0x3f) << 12) | ((c3 & 0x3f) << 6) | (c4 & 0x3f);
                let v = codepoint - 0x10000;
                units.push((0xd800 + (v >> 10)) as u16);
                units.push((0xdc00 + (v & 0x3ff)) as u16);
                self.cursor += 4;
            }
        }

        String::from_utf16_lossy(&units)
    }
}

/// Tag-level reader used by generated decoders.
pub struct BinaryReader {
    decoder: BinaryDecoder,
    field_number: u32,
    wire_type: WireType,
    error: bool,
}

impl BinaryReader {
    pub fn new(bytes: impl Into<Bytes>) -> BinaryReader {
        BinaryReader {
            decoder: BinaryDecoder::alloc(bytes.into()),
            field_number: 0,
            wire_type: WireType::Varint,
            error: false,
        }
    }

    /// Return the underlying decoder to the free list.
    pub fn free(self) {
        BinaryDecoder::free(self.decoder);
    }

    pub fn get_error(&self) -> bool {
        self.error || self.decoder.get_error()
    }

    pub fn get_field_number(&self) -> u32 {
        self.field_number
    }

    pub fn get_wire_type(&self) -> WireType {
        self.wire_type
    }

    /// True when the current field is length-delimited; repeated-scalar
    /// decoders use this to accept both packed and unpacked encodings.
    pub fn is_delimited(&self) -> bool {
        self.wire_type == WireType::Delimited
    }

    /// Advance to the next field header. Returns false at end of input or on
    /// a malformed header.
    pub fn next_field(&mut self) -> bool {
        if self.get_error() || self.decoder.at_end() {
            return false;
        }
        let header = self.decoder.read_varint32();
        if self.decoder.get_error() {
            return false;
        }
        let field_number = tag_field_number(header);
        if field_number == 0 {
            self.error = true;
            return false;
        }
        let Some(wire_type) = WireType::from_tag(header) else {
            self.error = true;
            return false;
        };
        self.field_number = field_number;
        self.wire_type = wire_type;
        true
    }

    /// Consume exactly the bytes of the current field. Groups are not
    /// supported and poison the reader.
    pub fn skip_field(&mut self) {
        match self.wire_type {
            WireType::Varint => self.decoder.skip_varint(),
            WireType::Fixed64 => self.decoder.advance(8),
            WireType::Delimited => {
                let length = self.decoder.read_varint32() as usize;
                self.decoder.advance(length);
            }
            WireType::Fixed32 => self.decoder.advance(4),
            WireType::StartGroup | WireType::EndGroup => self.error = true,
        }
    }

    fn expect(&mut self, wire_type: WireType) -> bool {
        if self.wire_type != wire_type {
            self.error = true;
            return false;
        }
        true
    }

    pub fn read_int32(&mut self) -> i32 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_signed_varint32()
    }

    pub fn read_uint32(&mut self) -> u32 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_unsigned_varint32()
    }

    pub fn read_sint32(&mut self) -> i32 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_zigzag_varint32()
    }

    pub fn read_int64(&mut self) -> i64 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_signed_varint64()
    }

    pub fn read_uint64(&mut self) -> u64 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_unsigned_varint64()
    }

    pub fn read_sint64(&mut self) -> i64 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_zigzag_varint64()
    }

    /// `int64` as a decimal string, for callers bound to the generated-code
    /// contract of string-transported 64-bit values.
    pub fn read_int64_string(&mut self) -> String {
        if !self.expect(WireType::Varint) {
            return "0".to_string();
        }
        self.decoder.read_signed_varint64_string()
    }

    pub fn read_uint64_string(&mut self) -> String {
        if !self.expect(WireType::Varint) {
            return "0".to_string();
        }
        self.decoder.read_unsigned_varint64_string()
    }

    pub fn read_varint_hash64(&mut self) -> [u8; 8] {
        if !self.expect(WireType::Varint) {
            return [0; 8];
        }
        self.decoder.read_varint_hash64()
    }

    pub fn read_bool(&mut self) -> bool {
        if !self.expect(WireType::Varint) {
            return false;
        }
        self.decoder.read_bool()
    }

    pub fn read_enum(&mut self) -> i32 {
        if !self.expect(WireType::Varint) {
            return 0;
        }
        self.decoder.read_signed_varint64() as i32
    }

    pub fn read_fixed32(&mut self) -> u32 {
        if !self.expect(WireType::Fixed32) {
            return 0;
        }
        self.decoder.read_uint32()
    }

    pub fn read_sfixed32(&mut self) -> i32 {
        if !self.expect(WireType::Fixed32) {
            return 0;
        }
        self.decoder.read_int32_fixed()
    }

    pub fn read_fixed64(&mut self) -> u64 {
        if !self.expect(WireType::Fixed64) {
            return 0;
        }
        self.decoder.read_split_fixed64(join_uint64)
    }

    pub fn read_sfixed64(&mut self) -> i64 {
        if !self.expect(WireType::Fixed64) {
            return 0;
        }
        self.decoder.read_split_fixed64(join_int64)
    }

    pub fn read_fixed64_string(&mut self) -> String {
        if !self.expect(WireType::Fixed64) {
            return "0".to_string();
        }
        self.decoder.read_split_fixed64(join_unsigned_decimal_string)
    }

    pub fn read_sfixed64_string(&mut self) -> String {
        if !self.expect(WireType::Fixed64) {
            return "0".to_string();
        }
        self.decoder.read_split_fixed64(join_signed_decimal_string)
    }

    pub fn read_fixed_hash64(&mut self) -> [u8; 8] {
        if !self.expect(WireType::Fixed64) {
            return [0; 8];
        }
        self.decoder.read_fixed_hash64()
    }

    pub fn read_float(&mut self) -> f32 {
        if !self.expect(WireType::Fixed32) {
            return 0.0;
        }
        self.decoder.read_float()
    }

    pub fn read_double(&mut self) -> f64 {
        if !self.expect(WireType::Fixed64) {
            return 0.0;
        }
        self.decoder.read_double()
    }

    pub fn read_string(&mut self) -> String {
        if !self.expect(WireType::Delimited) {
            return String::new();
        }
        let length = self.decoder.read_varint32() as usize;
        self.decoder.read_string(length)
    }

    pub fn read_bytes(&mut self) -> Bytes {
        if !self.expect(WireType::Delimited) {
            return Bytes::new();
        }
        let length = self.decoder.read_varint32() as usize;
        self.decoder.read_bytes(length)
    }

    /// Read a length-delimited sub-message by handing a nested reader over
    /// its body to `read_fn`.
    pub fn read_message<T>(&mut self, msg: &mut T, read_fn: impl FnOnce(&mut T, &mut BinaryReader)) {
        if !self.expect(WireType::Delimited) {
            return;
        }
        let length = self.decoder.read_varint32() as usize;
        let body = self.decoder.read_bytes(length);
        if self.decoder.get_error() {
            return;
        }
        let mut nested = BinaryReader::new(body);
        read_fn(msg, &mut nested);
        if nested.get_error() {
            self.error = true;
        }
        nested.free();
    }

    fn read_packed<T>(&mut self, read_one: impl Fn(&mut BinaryDecoder) -> T) -> Vec<T> {
        if !self.expect(WireType::Delimited) {
            return Vec::new();
        }
        let length = self.decoder.read_varint32() as usize;
        if self.decoder.end - self.decoder.cursor < length {
            self.error = true;
            return Vec::new();
        }
        let end = self.decoder.cursor + length;
        let mut values = Vec::new();
        while self.decoder.cursor < end && !self.decoder.get_error() {
            values.push(read_one(&mut self.decoder));
        }
        if self.decoder.cursor != end {
            self.error = true;
        }
        values
    }

    pub fn read_packed_int32(&mut self) -> Vec<i32> {
        self.read_packed(BinaryDecoder::read_signed_varint32)
    }

    pub fn read_packed_uint32(&mut self) -> Vec<u32> {
        self.read_packed(BinaryDecoder::read_unsigned_varint32)
    }

    pub fn read_packed_sint32(&mut self) -> Vec<i32> {
        self.read_packed(BinaryDecoder::read_zigzag_varint32)
    }

    pub fn read_packed_int64(&mut self) -> Vec<i64> {
        self.read_packed(BinaryDecoder::read_signed_varint64)
    }

    pub fn read_packed_uint64(&mut self) -> Vec<u64> {
        self.read_packed(BinaryDecoder::read_unsigned_varint64)
    }

    pub fn read_packed_sint64(&mut self) -> Vec<i64> {
        self.read_packed(BinaryDecoder::read_zigzag_varint64)
    }

    pub fn read_packed_bool(&mut self) -> Vec<bool> {
        self.read_packed(BinaryDecoder::read_bool)
    }

    pub fn read_packed_enum(&mut self) -> Vec<i32> {
        self.read_packed(|d| d.read_signed_varint64() as i32)
    }

    pub fn read_packed_fixed32(&mut self) -> Vec<u32> {
        self.read_packed(BinaryDecoder::read_uint32)
    }

    pub fn read_packed_sfixed32(&mut self) -> Vec<i32> {
        self.read_packed(BinaryDecoder::read_int32_fixed)
    }

    pub fn read_packed_fixed64(&mut self) -> Vec<u64> {
        self.read_packed(|d| d.read_split_fixed64(join_uint64))
    }

    pub fn read_packed_sfixed64(&mut self) -> Vec<i64> {
        self.read_packed(|d| d.read_split_fixed64(join_int64))
    }

    pub fn read_packed_float(&mut self) -> Vec<f32> {
        self.read_packed(BinaryDecoder::read_float)
    }

    pub fn read_packed_double(&mut self) -> Vec<f64> {
        self.read_packed(BinaryDecoder::read_double)
    }
}
