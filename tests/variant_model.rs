//! Behavioral tests of the variant value model from the outside: wire
//! roundtrips, arithmetic promotion, cast boundaries, and cross-type
//! comparison, plus property tests over the shared codecs.

use std::cmp::Ordering;

use proptest::prelude::*;
use strata::encoding::{
    decode_varint, decode_varint_signed, encode_varint, encode_varint_signed, MAX_VARINT_LEN,
};
use strata::storage::ColumnDataAddress;
use strata::types::{RawDateTime, Variant, VariantType};

fn roundtrip(mut value: Variant) -> Variant {
    let mut buf = Vec::new();
    value.serialize(&mut buf).unwrap();
    let (decoded, consumed) = Variant::deserialize(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    decoded
}

#[test]
fn every_scalar_tag_round_trips() {
    assert_eq!(roundtrip(Variant::Null), Variant::Null);
    assert_eq!(roundtrip(Variant::from(true)), Variant::Bool(true));
    assert_eq!(roundtrip(Variant::from(i8::MIN)), Variant::Int8(i8::MIN));
    assert_eq!(roundtrip(Variant::from(u8::MAX)), Variant::UInt8(u8::MAX));
    assert_eq!(roundtrip(Variant::from(i16::MIN)), Variant::Int16(i16::MIN));
    assert_eq!(roundtrip(Variant::from(u16::MAX)), Variant::UInt16(u16::MAX));
    assert_eq!(roundtrip(Variant::from(i32::MIN)), Variant::Int32(i32::MIN));
    assert_eq!(roundtrip(Variant::from(u32::MAX)), Variant::UInt32(u32::MAX));
    assert_eq!(roundtrip(Variant::from(i64::MIN)), Variant::Int64(i64::MIN));
    assert_eq!(roundtrip(Variant::from(u64::MAX)), Variant::UInt64(u64::MAX));
    assert_eq!(roundtrip(Variant::from(1.5f32)), Variant::Float(1.5));
    assert_eq!(roundtrip(Variant::from(-2.25f64)), Variant::Double(-2.25));
    assert_eq!(
        roundtrip(Variant::from("héllo")),
        Variant::String("héllo".into())
    );
    assert_eq!(
        roundtrip(Variant::from(vec![0u8, 255, 7])),
        Variant::Binary(vec![0, 255, 7])
    );

    let dt = RawDateTime::parse("2024-06-01 10:20:30.5").unwrap();
    assert_eq!(roundtrip(Variant::from(dt)), Variant::from(dt));
}

#[test]
fn lob_values_round_trip_through_memory_streams() {
    use strata::lob::{BinaryBlobStream, StringClobStream};

    let mut decoded = roundtrip(Variant::from_clob(Box::new(StringClobStream::new(
        "stream content",
    ))));
    assert_eq!(decoded.value_type(), VariantType::Clob);
    assert_eq!(
        decoded.get_clob().unwrap().read_as_string(usize::MAX).unwrap(),
        "stream content"
    );

    let bytes = vec![9u8; 1000];
    let mut decoded = roundtrip(Variant::from_blob(Box::new(BinaryBlobStream::new(
        bytes.clone(),
    ))));
    assert_eq!(
        decoded.get_blob().unwrap().read_as_binary(usize::MAX).unwrap(),
        bytes
    );
}

#[test]
fn arithmetic_promotes_to_the_right_operand() {
    // small-integer pairs widen to Int32
    assert_eq!(
        Variant::from(100i8).add(&Variant::from(100i16)).unwrap(),
        Variant::Int32(200)
    );
    // otherwise the right operand's type wins
    assert_eq!(
        Variant::from(7i8).add(&Variant::from(1i32)).unwrap(),
        Variant::Int32(8)
    );
    assert_eq!(
        Variant::from(3i32).add(&Variant::from(0.5f64)).unwrap(),
        Variant::Double(3.5)
    );
    assert_eq!(
        Variant::from(10u64).subtract(&Variant::from(3i64)).unwrap(),
        Variant::Int64(7)
    );
}

#[test]
fn integer_arithmetic_wraps() {
    assert_eq!(
        Variant::from(i32::MAX).add(&Variant::from(1i32)).unwrap(),
        Variant::Int32(i32::MIN)
    );
    assert_eq!(
        Variant::from(0u8).subtract(&Variant::from(1u8)).unwrap(),
        Variant::Int32(-1)
    );
}

#[test]
fn integer_division_by_zero_is_an_error() {
    assert!(Variant::from(1i64).divide(&Variant::from(0i64)).is_err());
    assert!(Variant::from(1i64).remainder(&Variant::from(0i64)).is_err());
    // float division by zero follows IEEE
    let v = Variant::from(1.0f64).divide(&Variant::from(0.0f64)).unwrap();
    assert_eq!(v, Variant::Double(f64::INFINITY));
}

#[test]
fn shifts_mask_their_amount() {
    assert_eq!(
        Variant::from(1i32).shift_left(&Variant::from(33i32)).unwrap(),
        Variant::Int32(2)
    );
}

#[test]
fn unary_operators_widen_small_integers() {
    assert_eq!(Variant::from(5i8).negate().unwrap(), Variant::Int32(-5));
    assert_eq!(Variant::from(0u8).bit_not().unwrap(), Variant::Int32(-1));
    assert_eq!(
        Variant::from(5i64).negate().unwrap(),
        Variant::Int64(-5)
    );
}

#[test]
fn string_addition_concatenates() {
    assert_eq!(
        Variant::from("foo").add(&Variant::from("bar")).unwrap(),
        Variant::String("foobar".into())
    );
}

#[test]
fn string_casts_parse_the_whole_string_or_fail() {
    assert_eq!(
        Variant::from("123").as_int32().unwrap(),
        Variant::Int32(123)
    );
    assert_eq!(
        Variant::from("-7").as_int64().unwrap(),
        Variant::Int64(-7)
    );
    assert!(Variant::from(" 123").as_int32().is_err());
    assert!(Variant::from("12.5").as_int32().is_err());
    assert!(Variant::from("12abc").as_int32().is_err());
}

#[test]
fn binary_casts_decode_little_endian_prefixes() {
    assert_eq!(
        Variant::from(vec![1u8, 0, 0, 0]).as_int32().unwrap(),
        Variant::Int32(1)
    );
    // longer buffers contribute their leading bytes
    assert_eq!(
        Variant::from(vec![2u8, 0, 0, 0, 99, 99]).as_int32().unwrap(),
        Variant::Int32(2)
    );
    // shorter buffers cannot fill the width
    assert!(Variant::from(vec![1u8, 2]).as_int32().is_err());

    assert_eq!(
        Variant::from(vec![0xABu8, 0x01]).as_string().unwrap(),
        Variant::String("ab01".into())
    );
}

#[test]
fn float_to_integer_casts_truncate() {
    assert_eq!(Variant::from(3.9f64).as_int32().unwrap(), Variant::Int32(3));
    assert_eq!(
        Variant::from(-3.9f64).as_int32().unwrap(),
        Variant::Int32(-3)
    );
}

#[test]
fn date_time_casts_go_through_the_text_form() {
    let dt = RawDateTime::parse("2024-06-01 10:20:30").unwrap();

    let parsed = Variant::from("2024-06-01 10:20:30").as_date_time().unwrap();
    assert_eq!(parsed, Variant::from(dt));

    // the textual form parses back to the same instant
    let mut value = Variant::from(dt);
    let text = match value.as_string().unwrap() {
        Variant::String(s) => s,
        other => panic!("unexpected cast result {:?}", other),
    };
    assert_eq!(RawDateTime::parse(&text).unwrap(), dt);
}

#[test]
fn strict_compare_orders_mismatched_tags_by_tag() {
    assert_eq!(
        Variant::Null.compare(&Variant::from(false)),
        Ordering::Less
    );
    assert_eq!(
        Variant::from("z").compare(&Variant::from(vec![0u8])),
        Ordering::Less
    );
    // same tag compares by value
    assert_eq!(
        Variant::from(2i32).compare(&Variant::from(10i32)),
        Ordering::Less
    );
}

#[test]
fn compatible_comparison_is_exact_across_signedness() {
    assert!(!Variant::from(-1i64)
        .compatible_equal(&Variant::from(u64::MAX))
        .unwrap());
    assert!(Variant::from(-1i64)
        .compatible_less(&Variant::from(0u64))
        .unwrap());
    assert!(Variant::from(2i32)
        .compatible_less(&Variant::from(2.5f64))
        .unwrap());
    assert!(Variant::from(5u8)
        .compatible_equal(&Variant::from(5i64))
        .unwrap());
}

#[test]
fn compatible_comparison_parses_strings_against_date_times() {
    let dt = RawDateTime::parse("2024-06-01").unwrap();
    assert!(Variant::from("2024-06-01")
        .compatible_equal(&Variant::from(dt))
        .unwrap());
    assert!(Variant::from("2024-06-02")
        .compatible_greater(&Variant::from(dt))
        .unwrap());
}

proptest! {
    #[test]
    fn varint_roundtrip(v in any::<u64>()) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = encode_varint(v, &mut buf);
        let (decoded, consumed) = decode_varint(&buf[..n]).unwrap();
        prop_assert_eq!(decoded, v);
        prop_assert_eq!(consumed, n);
    }

    #[test]
    fn signed_varint_roundtrip(v in any::<i64>()) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = encode_varint_signed(v, &mut buf);
        let (decoded, consumed) = decode_varint_signed(&buf[..n]).unwrap();
        prop_assert_eq!(decoded, v);
        prop_assert_eq!(consumed, n);
    }

    #[test]
    fn address_codecs_roundtrip(block_id in any::<u64>(), offset in any::<u32>()) {
        let addr = ColumnDataAddress::new(block_id, offset);

        let mut compact = Vec::new();
        addr.serialize_into(&mut compact);
        let (decoded, consumed) = ColumnDataAddress::deserialize(&compact).unwrap();
        prop_assert_eq!(decoded, addr);
        prop_assert_eq!(consumed, compact.len());

        let plain = addr.encode_plain();
        prop_assert_eq!(ColumnDataAddress::decode_plain(&plain).unwrap(), addr);
    }

    #[test]
    fn integer_variants_roundtrip(v in any::<i64>()) {
        let mut value = Variant::from(v);
        let mut buf = Vec::new();
        value.serialize(&mut buf).unwrap();
        let (decoded, _) = Variant::deserialize(&buf).unwrap();
        prop_assert_eq!(decoded, Variant::Int64(v));
    }
}
