//! TLV codec for the two control payloads.
//!
//! Every element is `type length value`, with `type` and `length` written as
//! VarNumbers:
//!
//! ```text
//!   value < 253          → [value]
//!   value <= u16::MAX    → [253][u16 big-endian]
//!   value <= u32::MAX    → [254][u32 big-endian]
//!   otherwise            → [255][u64 big-endian]
//! ```
//!
//! ## Payloads
//!
//! ```text
//!   ThetaVector (0xF3)                       AccessVector (0xF1)
//!   ├── ThetaPair (0xF2)                     ├── AccessDelta (0xF0)
//!   │   ├── Key (0x07)    raw bytes          │   ├── Key (0x07)   raw bytes
//!   │   └── ThetaFixed (0xF5) signed int     │   └── Count (0xF4) unsigned int
//!   └── ...                                  └── ...
//! ```
//!
//! Integers are 1, 2, 4 or 8 bytes big-endian; `Count` is unsigned and
//! `ThetaFixed` is two's complement. A fixed-point θ is `value / 10000`,
//! clamped to `[0, 1]`.
//!
//! Decoding is all-or-nothing: a payload is fully parsed before anything is
//! returned. Unknown element types inside a vector or a pair are skipped.
//!
//! ## Example Usage
//!
//! ```
//! use tinyslru::codec::{decode_theta_updates, encode_theta_updates, ThetaUpdate};
//! use tinyslru::Name;
//!
//! let payload = encode_theta_updates(&[ThetaUpdate::new(Name::from("/v/1"), 0.7342)]);
//! let updates = decode_theta_updates(&payload).unwrap();
//! assert_eq!(updates[0].key, Name::from("/v/1"));
//! assert!((updates[0].theta - 0.7342).abs() < 1e-9);
//! ```

use crate::error::CodecError;
use crate::name::Name;
use crate::policy::admission::clamp_theta;

/// TLV type numbers.
pub mod tlv {
    pub const KEY: u64 = 0x07;
    pub const ACCESS_DELTA: u64 = 0xF0;
    pub const ACCESS_VECTOR: u64 = 0xF1;
    pub const THETA_PAIR: u64 = 0xF2;
    pub const THETA_VECTOR: u64 = 0xF3;
    pub const COUNT: u64 = 0xF4;
    pub const THETA_FIXED: u64 = 0xF5;
}

/// Fixed-point denominator: `7342` encodes θ = 0.7342.
pub const THETA_SCALE: f64 = 10_000.0;

// ============================================================================
// Primitives
// ============================================================================

/// Encode a VarNumber.
pub fn encode_var_number(value: u64, buf: &mut Vec<u8>) {
    if value < 253 {
        buf.push(value as u8);
    } else if value <= u64::from(u16::MAX) {
        buf.push(253);
        buf.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u64::from(u32::MAX) {
        buf.push(254);
        buf.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        buf.push(255);
        buf.extend_from_slice(&value.to_be_bytes());
    }
}

/// Decode a VarNumber, advancing `buf`.
pub fn decode_var_number(buf: &mut &[u8], context: &'static str) -> Result<u64, CodecError> {
    let (&first, rest) = buf.split_first().ok_or(CodecError::Truncated { context })?;
    *buf = rest;
    let width = match first {
        0..=252 => return Ok(u64::from(first)),
        253 => 2,
        254 => 4,
        255 => 8,
    };
    let bytes = take(buf, width, context)?;
    Ok(be_unsigned(bytes))
}

/// Encode a complete element.
pub fn encode_tlv(tlv_type: u64, value: &[u8], buf: &mut Vec<u8>) {
    encode_var_number(tlv_type, buf);
    encode_var_number(value.len() as u64, buf);
    buf.extend_from_slice(value);
}

/// Decode one element, returning `(type, value)` and advancing `buf`.
pub fn decode_tlv<'a>(buf: &mut &'a [u8]) -> Result<(u64, &'a [u8]), CodecError> {
    let tlv_type = decode_var_number(buf, "type")?;
    let len = decode_var_number(buf, "length")?;
    if len > buf.len() as u64 {
        return Err(CodecError::Truncated { context: "value" });
    }
    let value = take(buf, len as usize, "value")?;
    Ok((tlv_type, value))
}

/// Encode an unsigned integer element in the narrowest of 1/2/4/8 bytes.
pub fn encode_unsigned(tlv_type: u64, value: u64, buf: &mut Vec<u8>) {
    if let Ok(v) = u8::try_from(value) {
        encode_tlv(tlv_type, &v.to_be_bytes(), buf);
    } else if let Ok(v) = u16::try_from(value) {
        encode_tlv(tlv_type, &v.to_be_bytes(), buf);
    } else if let Ok(v) = u32::try_from(value) {
        encode_tlv(tlv_type, &v.to_be_bytes(), buf);
    } else {
        encode_tlv(tlv_type, &value.to_be_bytes(), buf);
    }
}

/// Encode a signed integer element in the narrowest of 1/2/4/8 bytes.
pub fn encode_signed(tlv_type: u64, value: i64, buf: &mut Vec<u8>) {
    if let Ok(v) = i8::try_from(value) {
        encode_tlv(tlv_type, &v.to_be_bytes(), buf);
    } else if let Ok(v) = i16::try_from(value) {
        encode_tlv(tlv_type, &v.to_be_bytes(), buf);
    } else if let Ok(v) = i32::try_from(value) {
        encode_tlv(tlv_type, &v.to_be_bytes(), buf);
    } else {
        encode_tlv(tlv_type, &value.to_be_bytes(), buf);
    }
}

/// Decode the value of an unsigned integer element.
pub fn decode_unsigned(value: &[u8]) -> Result<u64, CodecError> {
    match value.len() {
        1 | 2 | 4 | 8 => Ok(be_unsigned(value)),
        n => Err(CodecError::InvalidIntegerLength(n)),
    }
}

/// Decode the value of a two's-complement integer element.
pub fn decode_signed(value: &[u8]) -> Result<i64, CodecError> {
    let unsigned = decode_unsigned(value)?;
    let bits = value.len() as u32 * 8;
    // Sign-extend from the encoded width.
    let shift = 64 - bits;
    Ok(((unsigned << shift) as i64) >> shift)
}

fn take<'a>(buf: &mut &'a [u8], n: usize, context: &'static str) -> Result<&'a [u8], CodecError> {
    if buf.len() < n {
        return Err(CodecError::Truncated { context });
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Ok(head)
}

fn be_unsigned(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Parses the outer container of `payload`, requiring type `expected` and
/// no bytes after it.
fn outer<'a>(payload: &'a [u8], expected: u64) -> Result<&'a [u8], CodecError> {
    let mut buf = payload;
    let (found, value) = decode_tlv(&mut buf)?;
    if found != expected {
        return Err(CodecError::UnexpectedType { expected, found });
    }
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes(buf.len()));
    }
    Ok(value)
}

// ============================================================================
// Theta updates (controller → engine)
// ============================================================================

/// One `(key, θ)` instruction from the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ThetaUpdate {
    pub key: Name,
    /// Always within `[0, 1]` once decoded.
    pub theta: f64,
}

impl ThetaUpdate {
    pub fn new(key: Name, theta: f64) -> Self {
        Self { key, theta }
    }
}

/// Fixed-point value to a clamped probability.
#[inline]
pub fn theta_from_fixed(fixed: i64) -> f64 {
    clamp_theta(fixed as f64 / THETA_SCALE)
}

/// Probability to its fixed-point encoding, rounded to the nearest unit.
#[inline]
pub fn theta_to_fixed(theta: f64) -> i64 {
    (theta * THETA_SCALE).round() as i64
}

/// Encode a ThetaVector. Values are written as given; the decoder clamps.
pub fn encode_theta_updates(updates: &[ThetaUpdate]) -> Vec<u8> {
    let mut body = Vec::with_capacity(updates.len() * 24);
    let mut pair = Vec::with_capacity(32);
    for update in updates {
        pair.clear();
        encode_tlv(tlv::KEY, update.key.as_bytes(), &mut pair);
        encode_signed(tlv::THETA_FIXED, theta_to_fixed(update.theta), &mut pair);
        encode_tlv(tlv::THETA_PAIR, &pair, &mut body);
    }
    let mut out = Vec::with_capacity(body.len() + 10);
    encode_tlv(tlv::THETA_VECTOR, &body, &mut out);
    out
}

/// Decode a ThetaVector. Any structural error rejects the whole payload.
pub fn decode_theta_updates(payload: &[u8]) -> Result<Vec<ThetaUpdate>, CodecError> {
    let mut elements = outer(payload, tlv::THETA_VECTOR)?;
    let mut updates = Vec::new();
    while !elements.is_empty() {
        let (tlv_type, value) = decode_tlv(&mut elements)?;
        if tlv_type != tlv::THETA_PAIR {
            continue;
        }

        let mut fields = value;
        let mut key = None;
        let mut fixed = None;
        while !fields.is_empty() {
            let (field_type, field) = decode_tlv(&mut fields)?;
            match field_type {
                tlv::KEY => key = Some(Name::from_bytes(field)),
                tlv::THETA_FIXED => fixed = Some(decode_signed(field)?),
                _ => {},
            }
        }
        let key = key.ok_or(CodecError::MissingField("key"))?;
        let fixed = fixed.ok_or(CodecError::MissingField("theta"))?;
        updates.push(ThetaUpdate::new(key, theta_from_fixed(fixed)));
    }
    Ok(updates)
}

// ============================================================================
// Access reports (engine → controller)
// ============================================================================

/// Requests for one key since the previous report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDelta {
    pub key: Name,
    pub count: u64,
}

impl AccessDelta {
    pub fn new(key: Name, count: u64) -> Self {
        Self { key, count }
    }
}

/// Encode an AccessVector, preserving record order.
pub fn encode_access_report(records: &[AccessDelta]) -> Vec<u8> {
    let mut body = Vec::with_capacity(records.len() * 24);
    let mut delta = Vec::with_capacity(32);
    for record in records {
        delta.clear();
        encode_tlv(tlv::KEY, record.key.as_bytes(), &mut delta);
        encode_unsigned(tlv::COUNT, record.count, &mut delta);
        encode_tlv(tlv::ACCESS_DELTA, &delta, &mut body);
    }
    let mut out = Vec::with_capacity(body.len() + 10);
    encode_tlv(tlv::ACCESS_VECTOR, &body, &mut out);
    out
}

/// Decode an AccessVector.
pub fn decode_access_report(payload: &[u8]) -> Result<Vec<AccessDelta>, CodecError> {
    let mut elements = outer(payload, tlv::ACCESS_VECTOR)?;
    let mut records = Vec::new();
    while !elements.is_empty() {
        let (tlv_type, value) = decode_tlv(&mut elements)?;
        if tlv_type != tlv::ACCESS_DELTA {
            continue;
        }

        let mut fields = value;
        let mut key = None;
        let mut count = None;
        while !fields.is_empty() {
            let (field_type, field) = decode_tlv(&mut fields)?;
            match field_type {
                tlv::KEY => key = Some(Name::from_bytes(field)),
                tlv::COUNT => count = Some(decode_unsigned(field)?),
                _ => {},
            }
        }
        let key = key.ok_or(CodecError::MissingField("key"))?;
        let count = count.ok_or(CodecError::MissingField("count"))?;
        records.push(AccessDelta::new(key, count));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        Name::from(s)
    }

    /// Hand-assembles a ThetaVector holding one pair with raw θ bytes.
    fn theta_payload(key: &[u8], fixed_bytes: &[u8]) -> Vec<u8> {
        let mut pair = Vec::new();
        encode_tlv(tlv::KEY, key, &mut pair);
        encode_tlv(tlv::THETA_FIXED, fixed_bytes, &mut pair);
        let mut body = Vec::new();
        encode_tlv(tlv::THETA_PAIR, &pair, &mut body);
        let mut out = Vec::new();
        encode_tlv(tlv::THETA_VECTOR, &body, &mut out);
        out
    }

    mod var_number {
        use super::*;

        #[test]
        fn widths_at_boundaries() {
            let cases: [(u64, &[u8]); 6] = [
                (0, &[0]),
                (252, &[252]),
                (253, &[253, 0, 253]),
                (0xFFFF, &[253, 0xFF, 0xFF]),
                (0x1_0000, &[254, 0, 1, 0, 0]),
                (0x1_0000_0000, &[255, 0, 0, 0, 1, 0, 0, 0, 0]),
            ];
            for (value, wire) in cases {
                let mut buf = Vec::new();
                encode_var_number(value, &mut buf);
                assert_eq!(buf, wire, "encoding {}", value);
                let mut cursor = &buf[..];
                assert_eq!(decode_var_number(&mut cursor, "test"), Ok(value));
                assert!(cursor.is_empty());
            }
        }

        #[test]
        fn truncated_multi_byte_number() {
            let mut cursor: &[u8] = &[254, 0, 1];
            assert_eq!(
                decode_var_number(&mut cursor, "length"),
                Err(CodecError::Truncated { context: "length" })
            );
        }
    }

    mod integers {
        use super::*;

        #[test]
        fn signed_sign_extension() {
            assert_eq!(decode_signed(&[0xFF]), Ok(-1));
            assert_eq!(decode_signed(&[0xFF, 0xFE]), Ok(-2));
            assert_eq!(decode_signed(&[0x3A, 0x98]), Ok(15000));
            assert_eq!(decode_signed(&(-70000i32).to_be_bytes()), Ok(-70000));
            assert_eq!(decode_signed(&i64::MIN.to_be_bytes()), Ok(i64::MIN));
        }

        #[test]
        fn bad_widths_rejected() {
            assert_eq!(decode_unsigned(&[]), Err(CodecError::InvalidIntegerLength(0)));
            assert_eq!(decode_unsigned(&[1, 2, 3]), Err(CodecError::InvalidIntegerLength(3)));
            assert_eq!(decode_signed(&[0; 9]), Err(CodecError::InvalidIntegerLength(9)));
        }

        #[test]
        fn narrowest_width_chosen() {
            let mut buf = Vec::new();
            encode_unsigned(tlv::COUNT, 300, &mut buf);
            assert_eq!(buf, vec![0xF4, 2, 0x01, 0x2C]);

            buf.clear();
            encode_signed(tlv::THETA_FIXED, -1, &mut buf);
            assert_eq!(buf, vec![0xF5, 1, 0xFF]);

            buf.clear();
            encode_signed(tlv::THETA_FIXED, 10_000, &mut buf);
            assert_eq!(buf, vec![0xF5, 2, 0x27, 0x10]);
        }
    }

    mod theta_updates {
        use super::*;

        #[test]
        fn fixed_point_is_scaled_and_clamped() {
            let payload = theta_payload(b"/a", &7342i16.to_be_bytes());
            assert_eq!(decode_theta_updates(&payload).unwrap()[0].theta, 0.7342);

            let payload = theta_payload(b"/a", &15000i16.to_be_bytes());
            assert_eq!(decode_theta_updates(&payload).unwrap()[0].theta, 1.0);

            let payload = theta_payload(b"/a", &(-1i8).to_be_bytes());
            assert_eq!(decode_theta_updates(&payload).unwrap()[0].theta, 0.0);
        }

        #[test]
        fn encoder_output_decodes() {
            let updates = vec![
                ThetaUpdate::new(n("/x"), 0.25),
                ThetaUpdate::new(n("/y"), 1.0),
                ThetaUpdate::new(n("/z"), 0.0),
            ];
            assert_eq!(decode_theta_updates(&encode_theta_updates(&updates)), Ok(updates));
        }

        #[test]
        fn empty_vector_is_valid() {
            assert_eq!(decode_theta_updates(&encode_theta_updates(&[])), Ok(vec![]));
        }

        #[test]
        fn wrong_outer_type_rejected() {
            let report = encode_access_report(&[AccessDelta::new(n("/a"), 1)]);
            assert_eq!(
                decode_theta_updates(&report),
                Err(CodecError::UnexpectedType {
                    expected: tlv::THETA_VECTOR,
                    found: tlv::ACCESS_VECTOR,
                })
            );
        }

        #[test]
        fn trailing_bytes_rejected() {
            let mut payload = encode_theta_updates(&[ThetaUpdate::new(n("/a"), 0.5)]);
            payload.push(0);
            assert_eq!(decode_theta_updates(&payload), Err(CodecError::TrailingBytes(1)));
        }

        #[test]
        fn truncated_payload_rejected_in_full() {
            let payload = encode_theta_updates(&[
                ThetaUpdate::new(n("/a"), 0.5),
                ThetaUpdate::new(n("/b"), 0.5),
            ]);
            for cut in 0..payload.len() {
                assert!(decode_theta_updates(&payload[..cut]).is_err(), "cut at {}", cut);
            }
        }

        #[test]
        fn missing_theta_rejects_batch() {
            let mut good_pair = Vec::new();
            encode_tlv(tlv::KEY, b"/ok", &mut good_pair);
            encode_signed(tlv::THETA_FIXED, 5000, &mut good_pair);
            let mut bad_pair = Vec::new();
            encode_tlv(tlv::KEY, b"/bad", &mut bad_pair);

            let mut body = Vec::new();
            encode_tlv(tlv::THETA_PAIR, &good_pair, &mut body);
            encode_tlv(tlv::THETA_PAIR, &bad_pair, &mut body);
            let mut payload = Vec::new();
            encode_tlv(tlv::THETA_VECTOR, &body, &mut payload);

            assert_eq!(
                decode_theta_updates(&payload),
                Err(CodecError::MissingField("theta"))
            );
        }

        #[test]
        fn unknown_elements_skipped() {
            let mut pair = Vec::new();
            encode_tlv(0x99, b"ignored", &mut pair);
            encode_tlv(tlv::KEY, b"/k", &mut pair);
            encode_signed(tlv::THETA_FIXED, 2500, &mut pair);

            let mut body = Vec::new();
            encode_tlv(0x42, b"junk", &mut body);
            encode_tlv(tlv::THETA_PAIR, &pair, &mut body);
            let mut payload = Vec::new();
            encode_tlv(tlv::THETA_VECTOR, &body, &mut payload);

            assert_eq!(
                decode_theta_updates(&payload),
                Ok(vec![ThetaUpdate::new(n("/k"), 0.25)])
            );
        }
    }

    mod access_reports {
        use super::*;

        #[test]
        fn wire_layout_of_single_record() {
            let payload = encode_access_report(&[AccessDelta::new(n("/a"), 2)]);
            assert_eq!(
                payload,
                vec![0xF1, 9, 0xF0, 7, 0x07, 2, b'/', b'a', 0xF4, 1, 2]
            );
        }

        #[test]
        fn large_counts_and_long_keys() {
            let long_key = Name::from(vec![b'k'; 300]);
            let records = vec![
                AccessDelta::new(long_key, u64::MAX),
                AccessDelta::new(n("/b"), 70_000),
            ];
            let payload = encode_access_report(&records);
            assert_eq!(decode_access_report(&payload), Ok(records));
        }

        #[test]
        fn missing_count_rejected() {
            let mut delta = Vec::new();
            encode_tlv(tlv::KEY, b"/a", &mut delta);
            let mut body = Vec::new();
            encode_tlv(tlv::ACCESS_DELTA, &delta, &mut body);
            let mut payload = Vec::new();
            encode_tlv(tlv::ACCESS_VECTOR, &body, &mut payload);
            assert_eq!(
                decode_access_report(&payload),
                Err(CodecError::MissingField("count"))
            );
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
                let _ = decode_theta_updates(&bytes);
                let _ = decode_access_report(&bytes);
            }

            #[test]
            fn decoded_theta_always_in_unit_interval(
                fixed in any::<i64>(),
                key in prop::collection::vec(any::<u8>(), 0..40),
            ) {
                let mut pair = Vec::new();
                encode_tlv(tlv::KEY, &key, &mut pair);
                encode_signed(tlv::THETA_FIXED, fixed, &mut pair);
                let mut body = Vec::new();
                encode_tlv(tlv::THETA_PAIR, &pair, &mut body);
                let mut payload = Vec::new();
                encode_tlv(tlv::THETA_VECTOR, &body, &mut payload);

                let updates = decode_theta_updates(&payload).unwrap();
                prop_assert_eq!(updates.len(), 1);
                prop_assert!((0.0..=1.0).contains(&updates[0].theta));
                prop_assert_eq!(updates[0].key.as_bytes(), &key[..]);
            }

            #[test]
            fn report_records_survive_encoding(
                records in prop::collection::vec(
                    (prop::collection::vec(any::<u8>(), 0..64), any::<u64>()), 0..20)
            ) {
                let records: Vec<AccessDelta> = records
                    .into_iter()
                    .map(|(k, c)| AccessDelta::new(Name::from(k), c))
                    .collect();
                let payload = encode_access_report(&records);
                prop_assert_eq!(decode_access_report(&payload).unwrap(), records);
            }
        }
    }
}
