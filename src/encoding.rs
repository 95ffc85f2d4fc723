//! Binary encoding primitives for WebAssembly values.
//!
//! Provides LEB128 integer encoding, IEEE 754 float encoding, and byte vector
//! encoding as specified by the WebAssembly binary format, plus the wire
//! constants shared by the section and instruction encoders.
//!
//! All functions write directly into a caller-provided `&mut Vec<u8>` buffer,
//! avoiding intermediate allocations.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io;

// ---------------------------------------------------------------------------
// WebAssembly binary format constants (spec section 5)
// ---------------------------------------------------------------------------

/// Magic number at the start of every binary module: `\0asm`.
pub const MAGIC: [u8; 4] = *b"\0asm";

/// Binary format version, little-endian.
pub const VERSION: u32 = 1;

// Section IDs (§5.5.2; tag section from the exception-handling proposal)
pub const SECTION_CUSTOM: u8 = 0;
pub const SECTION_TYPE: u8 = 1;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_FUNCTION: u8 = 3;
pub const SECTION_TABLE: u8 = 4;
pub const SECTION_MEMORY: u8 = 5;
pub const SECTION_GLOBAL: u8 = 6;
pub const SECTION_EXPORT: u8 = 7;
pub const SECTION_START: u8 = 8;
pub const SECTION_ELEMENT: u8 = 9;
pub const SECTION_CODE: u8 = 10;
pub const SECTION_DATA: u8 = 11;
pub const SECTION_DATA_COUNT: u8 = 12;
pub const SECTION_TAG: u8 = 13;

// Type constructors (§5.3.6; rec/sub forms from the GC proposal)
pub const TYPE_FUNC: u8 = 0x60;
pub const TYPE_STRUCT: u8 = 0x5F;
pub const TYPE_ARRAY: u8 = 0x5E;
pub const TYPE_REC: u8 = 0x4E;
pub const TYPE_SUB: u8 = 0x50;
pub const TYPE_SUB_FINAL: u8 = 0x4F;

// Reference type constructors (GC proposal)
pub const REF_NON_NULL: u8 = 0x64;
pub const REF_NULL: u8 = 0x63;

// Import/export descriptor kinds (§5.5.5, §5.5.10)
pub const DESC_FUNC: u8 = 0x00;
pub const DESC_TABLE: u8 = 0x01;
pub const DESC_MEMORY: u8 = 0x02;
pub const DESC_GLOBAL: u8 = 0x03;
pub const DESC_TAG: u8 = 0x04;

// Tag attribute byte (exception-handling proposal)
pub const TAG_ATTR_EXCEPTION: u8 = 0x00;

// Limits flags (§5.3.7; bit 1 = shared, threads proposal)
pub const LIMITS_MIN: u8 = 0x00;
pub const LIMITS_MIN_MAX: u8 = 0x01;
pub const LIMITS_SHARED_MIN_MAX: u8 = 0x03;

// Element segment elemkind (§5.5.12)
pub const ELEMKIND_FUNCREF: u8 = 0x00;

// Element segment flags (§5.5.12)
// 3-bit encoding: bit 0 = non-active mode, bit 1 = explicit table or
// declarative, bit 2 = expression-encoded items
pub const ELEM_ACTIVE_FUNCS: u32 = 0;
pub const ELEM_PASSIVE_FUNCS: u32 = 1;
pub const ELEM_ACTIVE_TABLE_FUNCS: u32 = 2;
pub const ELEM_DECLARATIVE_FUNCS: u32 = 3;
pub const ELEM_ACTIVE_EXPRS: u32 = 4;
pub const ELEM_PASSIVE_EXPRS: u32 = 5;
pub const ELEM_ACTIVE_TABLE_EXPRS: u32 = 6;
pub const ELEM_DECLARATIVE_EXPRS: u32 = 7;

// Data segment flags (§5.5.14)
pub const DATA_ACTIVE: u32 = 0;
pub const DATA_PASSIVE: u32 = 1;
pub const DATA_ACTIVE_EXPLICIT: u32 = 2;

// Opcode prefix bytes
pub const PREFIX_FC: u8 = 0xFC;
pub const PREFIX_SIMD: u8 = 0xFD;
pub const PREFIX_GC: u8 = 0xFB;
pub const PREFIX_ATOMIC: u8 = 0xFE;

// Structured-instruction terminators (§5.4.1)
pub const OP_ELSE: u8 = 0x05;
pub const OP_END: u8 = 0x0B;

// Block type: empty (§5.4.1)
pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

// Memarg alignment flag bit selecting an explicit memory index
// (multi-memory encoding)
pub const MEMARG_HAS_MEMORY: u32 = 0x40;

// ---------------------------------------------------------------------------
// Unsigned LEB128
// ---------------------------------------------------------------------------

/// Appends the unsigned LEB128 encoding of a u64 value to `buf`.
fn write_vu(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Appends the unsigned LEB128 encoding of a u32 value to `buf`.
pub fn write_vu32(buf: &mut Vec<u8>, v: u32) {
    write_vu(buf, v as u64);
}

/// Appends the unsigned LEB128 encoding of a u64 value to `buf`.
pub fn write_vu64(buf: &mut Vec<u8>, v: u64) {
    write_vu(buf, v);
}

/// Appends a single-bit boolean as a one-byte LEB128 value (0x00 or 0x01).
pub fn write_vu1(buf: &mut Vec<u8>, v: bool) {
    buf.push(if v { 1 } else { 0 });
}

// ---------------------------------------------------------------------------
// Signed LEB128
// ---------------------------------------------------------------------------

/// Appends the signed LEB128 encoding of an i64 value to `buf`.
fn write_vs(buf: &mut Vec<u8>, mut value: i64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Appends the signed LEB128 encoding of an i32 value to `buf`.
pub fn write_vs32(buf: &mut Vec<u8>, v: i32) {
    write_vs(buf, v as i64);
}

/// Appends the signed LEB128 encoding of an i64 value to `buf`.
pub fn write_vs64(buf: &mut Vec<u8>, v: i64) {
    write_vs(buf, v);
}

/// Appends a 33-bit signed value (s33) as signed LEB128.
///
/// Block types and heap types share this space: abstract codes are small
/// negatives, type indices are non-negative u32 values.
pub fn write_vs33(buf: &mut Vec<u8>, v: i64) {
    write_vs(buf, v);
}

// ---------------------------------------------------------------------------
// IEEE 754 floats (little-endian)
// ---------------------------------------------------------------------------

/// Appends the little-endian IEEE 754 encoding of an f32 value to `buf`.
pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    let mut bytes = [0u8; 4];
    let mut wtr = io::Cursor::new(&mut bytes[..]);
    wtr.write_f32::<LittleEndian>(v).unwrap();
    buf.extend_from_slice(&bytes);
}

/// Appends the little-endian IEEE 754 encoding of an f64 value to `buf`.
pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    let mut bytes = [0u8; 8];
    let mut wtr = io::Cursor::new(&mut bytes[..]);
    wtr.write_f64::<LittleEndian>(v).unwrap();
    buf.extend_from_slice(&bytes);
}

// ---------------------------------------------------------------------------
// v128 (16-byte SIMD vector, raw bytes)
// ---------------------------------------------------------------------------

/// Appends 16 raw bytes to `buf`.
pub fn write_v128(buf: &mut Vec<u8>, v: [u8; 16]) {
    buf.extend_from_slice(&v);
}

// ---------------------------------------------------------------------------
// Length-prefixed vectors
// ---------------------------------------------------------------------------

/// Appends a length-prefixed byte vector (vu32 length + raw bytes) to `buf`.
pub fn write_u8vec(buf: &mut Vec<u8>, v: &[u8]) {
    write_vu32(buf, v.len() as u32);
    buf.extend_from_slice(v);
}

/// Appends a name as a length-prefixed UTF-8 byte vector.
pub fn write_name(buf: &mut Vec<u8>, name: &str) {
    write_u8vec(buf, name.as_bytes());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal unsigned LEB128 reader, test-only. The crate has no decoder,
    /// so round-trip tests carry their own.
    fn read_vu64(bytes: &[u8]) -> (u64, usize) {
        let mut result = 0u64;
        let mut shift = 0;
        for (i, b) in bytes.iter().enumerate() {
            result |= ((b & 0x7f) as u64) << shift;
            if b & 0x80 == 0 {
                return (result, i + 1);
            }
            shift += 7;
        }
        panic!("unterminated LEB128");
    }

    /// Minimal signed LEB128 reader, test-only.
    fn read_vs64(bytes: &[u8]) -> (i64, usize) {
        let mut result = 0i64;
        let mut shift = 0;
        for (i, b) in bytes.iter().enumerate() {
            result |= ((b & 0x7f) as i64) << shift;
            shift += 7;
            if b & 0x80 == 0 {
                if shift < 64 && (b & 0x40) != 0 {
                    result |= -1i64 << shift;
                }
                return (result, i + 1);
            }
        }
        panic!("unterminated LEB128");
    }

    fn encode_vu32(v: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vu32(&mut buf, v);
        buf
    }

    fn encode_vu64(v: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vu64(&mut buf, v);
        buf
    }

    fn encode_vs32(v: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vs32(&mut buf, v);
        buf
    }

    fn encode_vs64(v: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vs64(&mut buf, v);
        buf
    }

    // -- Unsigned LEB128 --

    #[test]
    fn test_write_vu32() {
        assert_eq!(encode_vu32(0), vec![0]);
        assert_eq!(encode_vu32(1), vec![1]);
        assert_eq!(encode_vu32(127), vec![0x7f]);
        assert_eq!(encode_vu32(128), vec![0x80, 0x01]);
        assert_eq!(encode_vu32(624485), vec![0b11100101, 0b10001110, 0b00100110]);
        assert_eq!(encode_vu32(0xffffffff), vec![0xff, 0xff, 0xff, 0xff, 0xf]);
        assert_eq!(encode_vu32(0x80000000), vec![128, 128, 128, 128, 8]);
    }

    #[test]
    fn test_rt_vu64_minimal() {
        let mut test_values = vec![0, 1, u64::MAX, 127, 128, 129, 624485];

        for i in 0..63 {
            let value = 1u64 << i;
            test_values.push(value);
            test_values.push(value + 1);
            test_values.push(value - 1);
        }

        use rand::Rng;
        let mut rng = rand::rng();
        for _ in 0..100 {
            test_values.push(rng.random::<u64>());
        }

        for &expected in &test_values {
            let bytes = encode_vu64(expected);
            let (actual, used) = read_vu64(&bytes);
            assert_eq!(actual, expected);
            assert_eq!(used, bytes.len());
            // Minimality: the final byte must carry payload unless the value
            // fits a single byte.
            if bytes.len() > 1 {
                assert_ne!(*bytes.last().unwrap(), 0, "non-minimal encoding for {expected}");
            }
        }
    }

    #[test]
    fn test_write_vu1() {
        let mut buf = Vec::new();
        write_vu1(&mut buf, false);
        write_vu1(&mut buf, true);
        assert_eq!(buf, vec![0, 1]);
    }

    // -- Signed LEB128 --

    #[test]
    fn test_write_vs32() {
        assert_eq!(encode_vs32(0), vec![0]);
        assert_eq!(encode_vs32(1), vec![1]);
        assert_eq!(encode_vs32(-1), vec![0x7f]);
        assert_eq!(encode_vs32(63), vec![0x3f]);
        assert_eq!(encode_vs32(64), vec![0xc0, 0x00]);
        assert_eq!(encode_vs32(-64), vec![0x40]);
        assert_eq!(encode_vs32(-65), vec![0xbf, 0x7f]);
        assert_eq!(encode_vs32(-128), vec![0x80, 0x7f]);
        assert_eq!(encode_vs32(624485), vec![0b11100101, 0b10001110, 0b00100110]);
        assert_eq!(encode_vs32(-624485), vec![0b10011011, 0b11110001, 0b01011001]);
        assert_eq!(encode_vs32(i32::MIN), vec![128, 128, 128, 128, 120]);
    }

    #[test]
    fn test_rt_vs64() {
        let mut test_values = vec![0, 1, -1, i64::MAX, i64::MIN, 128, -128, 624485, -624485];

        for i in 0..63 {
            let value = 1i64 << i;
            test_values.push(value);
            test_values.push(-value);
            test_values.push(value - 1);
            test_values.push(-value + 1);
        }

        use rand::Rng;
        let mut rng = rand::rng();
        for _ in 0..100 {
            test_values.push(rng.random::<i64>());
        }

        for &expected in &test_values {
            let bytes = encode_vs64(expected);
            let (actual, used) = read_vs64(&bytes);
            assert_eq!(actual, expected);
            assert_eq!(used, bytes.len());
        }
    }

    #[test]
    fn test_vs33_abstract_heap_codes() {
        // Abstract heap types are small negative s33 values that must fit
        // one byte, matching their shorthand value-type encodings.
        let mut buf = Vec::new();
        write_vs33(&mut buf, -0x10);
        assert_eq!(buf, vec![0x70]); // func
        buf.clear();
        write_vs33(&mut buf, -0x11);
        assert_eq!(buf, vec![0x6f]); // extern
        buf.clear();
        write_vs33(&mut buf, -0x0d);
        assert_eq!(buf, vec![0x73]); // nofunc
    }

    // -- Floats and byte vectors --

    #[test]
    fn test_write_f32_into_buffer() {
        let mut buf = Vec::new();
        write_f32(&mut buf, 6.283_185_5);
        assert_eq!(buf, vec![219, 15, 201, 64]);
    }

    #[test]
    fn test_write_f64_into_buffer() {
        let mut buf = Vec::new();
        write_f64(&mut buf, std::f64::consts::TAU);
        assert_eq!(buf, vec![24, 45, 68, 84, 251, 33, 25, 64]);
    }

    #[test]
    fn test_write_v128_into_buffer() {
        let mut buf = Vec::new();
        write_v128(&mut buf, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(buf, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_write_name() {
        let mut buf = Vec::new();
        write_name(&mut buf, "add");
        assert_eq!(buf, vec![3, b'a', b'd', b'd']);
    }

    #[test]
    fn test_write_u8vec_into_buffer() {
        let mut buf = Vec::new();
        write_u8vec(&mut buf, &[0xDE, 0xAD]);
        assert_eq!(buf, vec![2, 0xDE, 0xAD]);
    }
}
