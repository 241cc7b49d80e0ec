//! 64-bit value assembly from two 32-bit halves.
//!
//! The varint and fixed64 paths of the decoder read into (`low`, `high`)
//! halves without loss and hand the pair to one of these joins. The writer
//! side uses [`split64`] to go the other way.

use crate::wire::{zigzag_decode64, zigzag_encode64};

pub const fn join_uint64(low: u32, high: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

pub const fn join_int64(low: u32, high: u32) -> i64 {
    join_uint64(low, high) as i64
}

pub const fn join_zigzag64(low: u32, high: u32) -> i64 {
    zigzag_decode64(join_uint64(low, high))
}

pub fn join_unsigned_decimal_string(low: u32, high: u32) -> String {
    join_uint64(low, high).to_string()
}

pub fn join_signed_decimal_string(low: u32, high: u32) -> String {
    join_int64(low, high).to_string()
}

/// The raw eight bytes of the value, little-endian. Callers that key maps by
/// 64-bit ids use this to avoid a decimal conversion.
pub const fn join_hash64(low: u32, high: u32) -> [u8; 8] {
    join_uint64(low, high).to_le_bytes()
}

pub fn join_float32(bits: u32) -> f32 {
    f32::from_bits(bits)
}

pub fn join_float64(low: u32, high: u32) -> f64 {
    f64::from_bits(join_uint64(low, high))
}

pub const fn split64(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

pub const fn split_zigzag64(value: i64) -> (u32, u32) {
    split64(zigzag_encode64(value))
}
