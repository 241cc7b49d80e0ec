//! Binary wire-format encoding.
//!
//! [`BinaryWriter`] grows a single buffer. Nested messages are framed by
//! encoding into a scratch writer first, then copying behind a length
//! prefix; with complete-buffer codecs there is no need for the block-list
//! bookkeeping a streaming encoder would carry.

use crate::int64::{split64, split_zigzag64};
use crate::wire::{make_tag, zigzag_encode32, WireType, MAX_FIELD_NUMBER};
use crate::Error;

#[derive(Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> BinaryWriter {
        BinaryWriter::default()
    }

    /// The accumulated byte sequence.
    pub fn get_result_buffer(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        debug_assert!(field_number != 0 && field_number <= MAX_FIELD_NUMBER);
        self.write_unsigned_varint32(make_tag(field_number, wire_type));
    }

    pub fn write_unsigned_varint32(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_unsigned_varint64(&mut self, value: u64) {
        let (mut low, mut high) = split64(value);
        while high != 0 || low >= 0x80 {
            self.buf.push((low as u8 & 0x7f) | 0x80);
            low = (low >> 7) | (high << 25);
            high >>= 7;
        }
        self.buf.push(low as u8);
    }

    /// int32/int64/enum values share the sign-extended 64-bit encoding.
    pub fn write_signed_varint64(&mut self, value: i64) {
        self.write_unsigned_varint64(value as u64);
    }

    pub fn write_int32(&mut self, field_number: u32, value: i32) {
        self.write_tag(field_number, WireType::Varint);
        self.write_signed_varint64(value as i64);
    }

    pub fn write_uint32(&mut self, field_number: u32, value: u32) {
        self.write_tag(field_number, WireType::Varint);
        self.write_unsigned_varint32(value);
    }

    pub fn write_sint32(&mut self, field_number: u32, value: i32) {
        self.write_tag(field_number, WireType::Varint);
        self.write_unsigned_varint32(zigzag_encode32(value));
    }

    pub fn write_int64(&mut self, field_number: u32, value: i64) {
        self.write_tag(field_number, WireType::Varint);
        self.write_signed_varint64(value);
    }

    pub fn write_uint64(&mut self, field_number: u32, value: u64) {
        self.write_tag(field_number, WireType::Varint);
        self.write_unsigned_varint64(value);
    }

    pub fn write_sint64(&mut self, field_number: u32, value: i64) {
        let (low, high) = split_zigzag64(value);
        self.write_tag(field_number, WireType::Varint);
        self.write_unsigned_varint64(((high as u64) << 32) | low as u64);
    }

    /// Decimal-string entry point for callers on the generated-code
    /// contract, where 64-bit values travel as strings.
    pub fn write_int64_string(&mut self, field_number: u32, value: &str) -> Result<(), Error> {
        let parsed: i64 = value
            .parse()
            .map_err(|_| Error::InvalidNumber(value.to_string()))?;
        self.write_int64(field_number, parsed);
        Ok(())
    }

    pub fn write_uint64_string(&mut self, field_number: u32, value: &str) -> Result<(), Error> {
        let parsed: u64 = value
            .parse()
            .map_err(|_| Error::InvalidNumber(value.to_string()))?;
        self.write_uint64(field_number, parsed);
        Ok(())
    }

    pub fn write_bool(&mut self, field_number: u32, value: bool) {
        self.write_tag(field_number, WireType::Varint);
        self.buf.push(value as u8);
    }

    pub fn write_enum(&mut self, field_number: u32, value: i32) {
        self.write_int32(field_number, value);
    }

    pub fn write_fixed32(&mut self, field_number: u32, value: u32) {
        self.write_tag(field_number, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_sfixed32(&mut self, field_number: u32, value: i32) {
        self.write_tag(field_number, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, field_number: u32, value: u64) {
        self.write_tag(field_number, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_sfixed64(&mut self, field_number: u32, value: i64) {
        self.write_tag(field_number, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_float(&mut self, field_number: u32, value: f32) {
        self.write_tag(field_number, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_double(&mut self, field_number: u32, value: f64) {
        self.write_tag(field_number, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_string(&mut self, field_number: u32, value: &str) {
        self.write_tag(field_number, WireType::Delimited);
        self.write_unsigned_varint32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_bytes(&mut self, field_number: u32, value: &[u8]) {
        self.write_tag(field_number, WireType::Delimited);
        self.write_unsigned_varint32(value.len() as u32);
        self.buf.extend_from_slice(value);
    }

    /// Frame a sub-message as length-delimited: encode through its
    /// `_writeMessage` counterpart into a scratch writer, then prefix.
    pub fn write_message<T>(
        &mut self,
        field_number: u32,
        msg: &T,
        write_fn: impl FnOnce(&T, &mut BinaryWriter),
    ) {
        let mut nested = BinaryWriter::new();
        write_fn(msg, &mut nested);
        self.write_tag(field_number, WireType::Delimited);
        self.write_unsigned_varint32(nested.buf.len() as u32);
        self.buf.extend_from_slice(&nested.buf);
    }

    pub fn write_repeated_int32(&mut self, field_number: u32, values: &[i32]) {
        for &v in values {
            self.write_int32(field_number, v);
        }
    }

    pub fn write_repeated_string(&mut self, field_number: u32, values: &[String]) {
        for v in values {
            self.write_string(field_number, v);
        }
    }

    pub fn write_repeated_bytes(&mut self, field_number: u32, values: &[Vec<u8>]) {
        for v in values {
            self.write_bytes(field_number, v);
        }
    }

    pub fn write_repeated_message<T>(
        &mut self,
        field_number: u32,
        msgs: &[T],
        write_fn: impl Fn(&T, &mut BinaryWriter),
    ) {
        for msg in msgs {
            self.write_message(field_number, msg, &write_fn);
        }
    }

    fn write_packed<T: Copy>(
        &mut self,
        field_number: u32,
        values: &[T],
        write_one: impl Fn(&mut BinaryWriter, T),
    ) {
        let mut body = BinaryWriter::new();
        for &v in values {
            write_one(&mut body, v);
        }
        self.write_tag(field_number, WireType::Delimited);
        self.write_unsigned_varint32(body.buf.len() as u32);
        self.buf.extend_from_slice(&body.buf);
    }

    pub fn write_packed_int32(&mut self, field_number: u32, values: &[i32]) {
        self.write_packed(field_number, values, |w, v| w.write_signed_varint64(v as i64));
    }

    pub fn write_packed_uint32(&mut self, field_number: u32, values: &[u32]) {
        self.write_packed(field_number, values, BinaryWriter::write_unsigned_varint32);
    }

    pub fn write_packed_sint32(&mut self, field_number: u32, values: &[i32]) {
        self.write_packed(field_number, values, |w, v| {
            w.write_unsigned_varint32(zigzag_encode32(v));
        });
    }

    pub fn write_packed_int64(&mut self, field_number: u32, values: &[i64]) {
        self.write_packed(field_number, values, BinaryWriter::write_signed_varint64);
    }

    pub fn write_packed_uint64(&mut self, field_number: u32, values: &[u64]) {
        self.write_packed(field_number, values, BinaryWriter::write_unsigned_varint64);
    }

    pub fn write_packed_sint64(&mut self, field_number: u32, values: &[i64]) {
        self.write_packed(field_number, values, |w, v| {
            let (low, high) = split_zigzag64(v);
            w.write_unsigned_varint64(((high as u64) << 32) | low as u64);
        });
    }

    pub fn write_packed_bool(&mut self, field_number: u32, values: &[bool]) {
        self.write_packed(field_number, values, |w, v| w.buf.push(v as u8));
    }

    pub fn write_packed_enum(&mut self, field_number: u32, values: &[i32]) {
        self.write_packed_int32(field_number, values);
    }

    pub fn write_packed_fixed32(&mut self, field_number: u32, values: &[u32]) {
        self.write_packed(field_number, values, |w, v| {
            w.buf.extend_from_slice(&v.to_le_bytes());
        });
    }

    pub fn write_packed_sfixed32(&mut self, field_number: u32, values: &[i32]) {
        self.write_packed(field_number, values, |w, v| {
            w.buf.extend_from_slice(&v.to_le_bytes());
        });
    }

    pub fn write_packed_fixed64(&mut self, field_number: u32, values: &[u64]) {
        self.write_packed(field_number, values, |w, v| {
            w.buf.extend_from_slice(&v.to_le_bytes());
        });
    }

    pub fn write_packed_sfixed64(&mut self, field_number: u32, values: &[i64]) {
        self.write_packed(field_number, values, |w, v| {
            w.buf.extend_from_slice(&v.to_le_bytes());
        });
    }

    pub fn write_packed_float(&mut self, field_number: u32, values: &[f32]) {
        self.write_packed(field_number, values, |w, v| {
            w.buf.extend_from_slice(&v.to_le_bytes());
        });
    }

    pub fn write_packed_double(&mut self, field_number: u32, values: &[f64]) {
        self.write_packed(field_number, values, |w, v| {
            w.buf.extend_from_slice(&v.to_le_bytes());
        });
    }
}
