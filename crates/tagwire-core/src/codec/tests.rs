use super::*;
use crate::integer::IntegerStrategy;
use crate::schema::EnumSchema;
use crate::wire::Utf8Policy;
use pretty_assertions::assert_eq;
use prost::Message as _;

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_message(
            MessageSchema::new(
                "demo.Block",
                [
                    FieldDescriptor::new("height", 1, LogicalType::Int64),
                    FieldDescriptor::new("hash", 2, LogicalType::Bytes),
                ],
            )
            .unwrap(),
        )
        .with_message(
            MessageSchema::new(
                "demo.Batch",
                [
                    FieldDescriptor::new("ids", 1, LogicalType::UInt64).packed(),
                    FieldDescriptor::new("deltas", 2, LogicalType::SInt32).repeated(),
                    FieldDescriptor::new("label", 3, LogicalType::String),
                    FieldDescriptor::new("stamp", 4, LogicalType::Message("google.protobuf.Timestamp".into())),
                    FieldDescriptor::new("weight", 5, LogicalType::Double),
                    FieldDescriptor::new("offset", 6, LogicalType::SFixed64),
                    FieldDescriptor::new("status", 7, LogicalType::Enum("demo.Status".into())),
                    FieldDescriptor::new("blocks", 8, LogicalType::Message("demo.Block".into())).repeated(),
                    FieldDescriptor::new("retries", 9, LogicalType::UInt32).optional(),
                ],
            )
            .unwrap(),
        )
        .with_message(
            MessageSchema::new(
                "google.protobuf.Timestamp",
                [
                    FieldDescriptor::new("seconds", 1, LogicalType::Int64),
                    FieldDescriptor::new("nanos", 2, LogicalType::Int32),
                ],
            )
            .unwrap(),
        )
        .with_message(
            MessageSchema::new(
                "demo.Node",
                [
                    FieldDescriptor::new("value", 1, LogicalType::UInt32),
                    FieldDescriptor::new("child", 2, LogicalType::Message("demo.Node".into())),
                ],
            )
            .unwrap(),
        )
        .with_enum(
            EnumSchema::new("demo.Status", [("STATUS_UNSPECIFIED", 0), ("STATUS_OK", 1)])
                .unwrap()
                .with_unrecognized(),
        )
}

#[derive(Clone, PartialEq, prost::Message)]
struct Batch {
    #[prost(uint64, repeated, tag = "1")]
    ids: Vec<u64>,
    #[prost(sint32, repeated, packed = "false", tag = "2")]
    deltas: Vec<i32>,
    #[prost(string, tag = "3")]
    label: String,
    #[prost(message, optional, tag = "4")]
    stamp: Option<prost_types::Timestamp>,
    #[prost(double, tag = "5")]
    weight: f64,
    #[prost(sfixed64, tag = "6")]
    offset: i64,
    #[prost(int32, tag = "7")]
    status: i32,
}

#[test]
fn test_decode_block() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let message = codec
        .decode(&[0x08, 0xB9, 0x60, 0x12, 0x02, 0x01, 0x02], schema)
        .unwrap();
    assert_eq!(message.get("height"), Some(&Value::I64(12345)));
    assert_eq!(message.get("hash"), Some(&Value::Bytes(Bytes::from_static(&[0x01, 0x02]))));
}

#[test]
fn test_encode_block() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let message = Message::new().with("height", 12345i64).with("hash", vec![0x01u8, 0x02]);
    assert_eq!(
        codec.encode(&message, schema).unwrap().as_ref(),
        &[0x08, 0xB9, 0x60, 0x12, 0x02, 0x01, 0x02]
    );
}

#[test]
fn test_empty_buffer_yields_defaults() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let message = codec.decode(&[], schema).unwrap();
    assert_eq!(message, codec.default_message(schema));
    assert_eq!(message.get("ids"), Some(&Value::List(vec![])));
    assert_eq!(message.get("label"), Some(&Value::String(String::new())));
    assert_eq!(message.get("status"), Some(&Value::Enum(0)));
    assert!(!message.contains("stamp"));
    assert!(!message.contains("retries"));
}

#[test]
fn test_defaults_are_not_written() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let encoded = codec.encode(&codec.default_message(schema), schema).unwrap();
    assert!(encoded.is_empty());

    // Explicit presence is written even at zero
    let present = Message::new().with("retries", 0u32);
    assert_eq!(codec.encode(&present, schema).unwrap().as_ref(), &[0x48, 0x00]);
}

#[test]
fn test_unknown_fields_are_skipped() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let data = [
        0x18, 0x96, 0x01, // field 3, varint
        0x21, 1, 2, 3, 4, 5, 6, 7, 8, // field 4, I64
        0x2A, 0x03, b'a', b'b', b'c', // field 5, LEN
        0x35, 1, 2, 3, 4, // field 6, I32
        0x3B, 0x08, 0x01, 0x3C, // field 7, group holding field 1
        0x08, 0x07, // field 1
    ];
    let message = codec.decode(&data, schema).unwrap();
    assert_eq!(message.get("height"), Some(&Value::I64(7)));
    assert_eq!(message.len(), 2);
}

#[test]
fn test_packed_and_unpacked_are_equivalent() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let packed = codec.decode(&[0x0A, 0x03, 0x01, 0x02, 0x03], schema).unwrap();
    let unpacked = codec.decode(&[0x08, 0x01, 0x08, 0x02, 0x08, 0x03], schema).unwrap();
    let mixed = codec.decode(&[0x08, 0x01, 0x0A, 0x02, 0x02, 0x03], schema).unwrap();

    let expected = Value::List(vec![Value::U64(1), Value::U64(2), Value::U64(3)]);
    assert_eq!(packed.get("ids"), Some(&expected));
    assert_eq!(packed, unpacked);
    assert_eq!(packed, mixed);

    // Declared unpacked, still accepted packed
    let deltas = codec.decode(&[0x12, 0x02, 0x01, 0x04], schema).unwrap();
    assert_eq!(
        deltas.get("deltas"),
        Some(&Value::List(vec![Value::I32(-1), Value::I32(2)]))
    );
}

#[test]
fn test_binary_round_trip() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let message = codec
        .from_partial(
            &Message::new()
                .with("ids", vec![Value::U64(0), Value::U64(300), Value::U64(1 << 40)])
                .with("deltas", vec![Value::I32(-5), Value::I32(0), Value::I32(i32::MAX)])
                .with("label", "héllo")
                .with("stamp", Message::new().with("seconds", 1_700_000_000i64).with("nanos", 5i32))
                .with("weight", -2.5f64)
                .with("offset", -9i64)
                .with("status", Value::Enum(17))
                .with(
                    "blocks",
                    vec![
                        Value::Message(Message::new().with("height", 1i64)),
                        Value::Message(Message::new()),
                    ],
                )
                .with("retries", 3u32),
            schema,
        )
        .unwrap();

    let encoded = codec.encode(&message, schema).unwrap();
    assert_eq!(codec.decode(&encoded, schema).unwrap(), message);
}

#[test]
fn test_singular_message_merges() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    // stamp{seconds: 5} then stamp{nanos: 7}
    let data = [0x22, 0x02, 0x08, 0x05, 0x22, 0x02, 0x10, 0x07];
    let message = codec.decode(&data, schema).unwrap();
    let stamp = message.get("stamp").and_then(Value::as_message).unwrap();
    assert_eq!(stamp.get("seconds"), Some(&Value::I64(5)));
    assert_eq!(stamp.get("nanos"), Some(&Value::I32(7)));
}

#[test]
fn test_last_scalar_wins() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let message = codec.decode(&[0x08, 0x01, 0x08, 0x02], schema).unwrap();
    assert_eq!(message.get("height"), Some(&Value::I64(2)));
}

#[test]
fn test_negative_int64_uses_ten_bytes() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let encoded = codec.encode(&Message::new().with("height", -1i64), schema).unwrap();
    assert_eq!(encoded.len(), 11);
    assert_eq!(codec.decode(&encoded, schema).unwrap().get("height"), Some(&Value::I64(-1)));
}

#[test]
fn test_truncated_input() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let err = codec.decode(&[0x12, 0x05, 0x01, 0x02], schema).unwrap_err();
    assert!(matches!(err, Error::TruncatedBuffer { offset: 1, needed: 5, remaining: 2 }));

    let err = codec.decode(&[0x08, 0xB9], schema).unwrap_err();
    assert!(matches!(err, Error::MalformedVarint { offset: 1 }));
}

#[test]
fn test_overlong_varint() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let mut data = vec![0x08];
    data.extend([0xFF; 10]);
    data.push(0x01);
    assert!(matches!(
        codec.decode(&data, schema),
        Err(Error::MalformedVarint { offset: 1 })
    ));
}

#[test]
fn test_unknown_wire_types() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    for tag in [0x0E, 0x0F] {
        let err = codec.decode(&[0x08, 0x01, tag, 0x00], schema).unwrap_err();
        assert!(matches!(err, Error::UnknownWireType { offset: 2, .. }), "{err}");
    }
}

#[test]
fn test_invalid_field_number() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    assert!(matches!(
        codec.decode(&[0x00, 0x01], schema),
        Err(Error::InvalidFieldNumber { number: 0, .. })
    ));
}

#[test]
fn test_wire_type_mismatch() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    // height declared varint, sent as I32
    let err = codec.decode(&[0x0D, 0x01, 0x02, 0x03, 0x04], schema).unwrap_err();
    assert!(matches!(
        err,
        Error::WireTypeMismatch { expected: 0, found: 5, offset: 0, ref field } if field == "height"
    ));
}

#[test]
fn test_recursion_limit() {
    let registry = registry();
    let schema = registry.resolve_message("demo.Node").unwrap();

    let mut node = Message::new().with("value", 1u32);
    for _ in 0..5 {
        node = Message::new().with("value", 1u32).with("child", node);
    }

    let shallow = MessageCodec::new(&registry).with_config(CodecConfig::new().recursion_limit(3));
    assert!(matches!(
        shallow.encode(&node, schema),
        Err(Error::RecursionLimit { limit: 3 })
    ));

    let codec = MessageCodec::new(&registry);
    let encoded = codec.encode(&node, schema).unwrap();
    assert_eq!(codec.decode(&encoded, schema).unwrap(), node);
    assert!(matches!(
        shallow.decode(&encoded, schema),
        Err(Error::RecursionLimit { limit: 3 })
    ));
}

#[test]
fn test_type_mismatch_on_encode() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let err = codec.encode(&Message::new().with("height", "tall"), schema).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref field, expected: "an i64" } if field == "height"));

    let batch = registry.resolve_message("demo.Batch").unwrap();
    let err = codec.encode(&Message::new().with("ids", 1u64), batch).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { expected: "a list", .. }));
}

#[test]
fn test_integer_ceiling_on_decode() {
    let registry = registry();
    let schema = registry.resolve_message("demo.Block").unwrap();
    let data = [0x08, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x10]; // 2^53

    let safe = MessageCodec::new(&registry);
    assert!(matches!(
        safe.decode(&data, schema),
        Err(Error::IntegerOverflow { ceiling: 9_007_199_254_740_991, .. })
    ));

    let native = safe.with_config(CodecConfig::new().integers(IntegerStrategy::Native));
    let message = native.decode(&data, schema).unwrap();
    assert_eq!(message.get("height"), Some(&Value::I64(1 << 53)));
}

#[test]
fn test_strict_utf8() {
    let registry = registry();
    let schema = registry.resolve_message("demo.Batch").unwrap();
    let data = [0x1A, 0x02, 0xC3, 0x28];

    let lenient = MessageCodec::new(&registry);
    let message = lenient.decode(&data, schema).unwrap();
    assert_eq!(message.get("label"), Some(&Value::String("\u{FFFD}(".into())));

    let strict = lenient.with_config(CodecConfig::new().utf8(Utf8Policy::Strict));
    assert!(matches!(
        strict.decode(&data, schema),
        Err(Error::InvalidUtf8 { offset: 2, .. })
    ));
}

#[test]
fn test_decode_with_length() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();
    let data = [0x08, 0x01, 0x08, 0x02];

    let first = codec.decode_with_length(&data, schema, Some(2)).unwrap();
    assert_eq!(first.get("height"), Some(&Value::I64(1)));

    assert!(matches!(
        codec.decode_with_length(&data, schema, Some(8)),
        Err(Error::TruncatedBuffer { .. })
    ));
}

#[test]
fn test_length_delimited_stream() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Block").unwrap();

    let mut stream = Vec::new();
    for height in [1i64, 300] {
        let frame = codec
            .encode_length_delimited(&Message::new().with("height", height), schema)
            .unwrap();
        stream.extend_from_slice(&frame);
    }
    assert_eq!(stream, vec![0x02, 0x08, 0x01, 0x03, 0x08, 0xAC, 0x02]);

    let (first, used) = codec.decode_length_delimited(&stream, schema).unwrap();
    assert_eq!(used, 3);
    assert_eq!(first.get("height"), Some(&Value::I64(1)));

    let (second, used) = codec.decode_length_delimited(&stream[3..], schema).unwrap();
    assert_eq!(used, 4);
    assert_eq!(second.get("height"), Some(&Value::I64(300)));
}

#[test]
fn test_from_partial() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let partial = Message::new()
        .with("stamp", Message::new().with("seconds", 9i64))
        .with("not_a_field", true);
    let complete = codec.from_partial(&partial, schema).unwrap();

    assert_eq!(complete.get("weight"), Some(&Value::F64(0.0)));
    assert_eq!(complete.get("deltas"), Some(&Value::List(vec![])));
    assert!(!complete.contains("not_a_field"));
    assert!(!complete.contains("retries"));

    let stamp = complete.get("stamp").and_then(Value::as_message).unwrap();
    assert_eq!(stamp.get("nanos"), Some(&Value::I32(0)));
}

#[test]
fn test_decodes_prost_output() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let batch = Batch {
        ids: vec![1, 2, 150],
        deltas: vec![-1, 64],
        label: "relay".to_string(),
        stamp: Some(prost_types::Timestamp {
            seconds: 1_700_000_000,
            nanos: 42,
        }),
        weight: 0.5,
        offset: -3,
        status: 1,
    };
    let message = codec.decode(&batch.encode_to_vec(), schema).unwrap();

    assert_eq!(
        message.get("ids"),
        Some(&Value::List(vec![Value::U64(1), Value::U64(2), Value::U64(150)]))
    );
    assert_eq!(
        message.get("deltas"),
        Some(&Value::List(vec![Value::I32(-1), Value::I32(64)]))
    );
    assert_eq!(message.get("label"), Some(&Value::String("relay".into())));
    assert_eq!(message.get("weight"), Some(&Value::F64(0.5)));
    assert_eq!(message.get("offset"), Some(&Value::I64(-3)));
    assert_eq!(message.get("status"), Some(&Value::Enum(1)));

    let stamp = message.get("stamp").and_then(Value::as_message).unwrap();
    assert_eq!(stamp.get("seconds"), Some(&Value::I64(1_700_000_000)));
    assert_eq!(stamp.get("nanos"), Some(&Value::I32(42)));
}

#[test]
fn test_prost_reads_our_output() {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let schema = registry.resolve_message("demo.Batch").unwrap();

    let message = Message::new()
        .with("ids", vec![Value::U64(7), Value::U64(1 << 33)])
        .with("deltas", vec![Value::I32(-100)])
        .with("label", "out")
        .with("stamp", Message::new().with("seconds", -62_135_596_800i64))
        .with("offset", i64::from(i32::MIN))
        .with("status", Value::Enum(1));
    let encoded = codec.encode(&message, schema).unwrap();

    let batch = Batch::decode(encoded).unwrap();
    assert_eq!(
        batch,
        Batch {
            ids: vec![7, 1 << 33],
            deltas: vec![-100],
            label: "out".to_string(),
            stamp: Some(prost_types::Timestamp {
                seconds: -62_135_596_800,
                nanos: 0,
            }),
            weight: 0.0,
            offset: i32::MIN as i64,
            status: 1,
        }
    );
}
