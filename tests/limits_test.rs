use jsongraph::{
    reader::DecodeSettings,
    value::{Array, Value},
    writer::{CyclePolicy, EncodeSettings},
    Codec, DepthPolicy, JsonError,
};

use crate::test_lib::TestResult;

mod test_lib;

fn nested_arrays(depth: usize) -> String {
    "[".repeat(depth) + &"]".repeat(depth)
}

fn nested_value(depth: usize) -> Value {
    let mut value = Value::Array(Array::new());
    for _ in 1..depth {
        value = Value::Array([value].into_iter().collect());
    }
    value
}

fn assert_out_of_depth<T: std::fmt::Debug>(result: Result<T, JsonError>, expected_max_depth: usize) {
    match result {
        Err(JsonError::OutOfDepth { max_depth }) => assert_eq!(expected_max_depth, max_depth),
        r => panic!("Unexpected result: {r:?}"),
    }
}

#[test]
fn decode_depth() -> TestResult {
    let value = jsongraph::from_str(&nested_arrays(20))?;
    assert_eq!(nested_value(20), value);
    assert_out_of_depth(jsongraph::from_str(&nested_arrays(21)), 20);

    let settings = DecodeSettings {
        max_depth: 3,
        ..Default::default()
    };
    jsongraph::from_str_with(r#"{"a": [{}]}"#, &settings)?;
    assert_out_of_depth(jsongraph::from_str_with(r#"{"a": [{"b": []}]}"#, &settings), 3);
    // Scalars don't count
    jsongraph::from_str_with(r#"[[["text", 1, true]]]"#, &settings)?;
    Ok(())
}

#[test]
fn decode_depth_truncated() -> TestResult {
    let settings = DecodeSettings {
        max_depth: 2,
        depth_policy: DepthPolicy::Truncate,
        ..Default::default()
    };
    let value = jsongraph::from_str_with(r#"[[{"a": [1, "]"]}, 2], 3]"#, &settings)?;
    assert_eq!("[[{},2],3]", jsongraph::to_string(&value)?);

    // Pointers within skipped content are not resolved
    let value = jsongraph::from_str_with(r##"[[[{"$ref": "#/x"}]], [1]]"##, &settings)?;
    assert_eq!("[[[]],[1]]", jsongraph::to_string(&value)?);
    Ok(())
}

#[test]
fn encode_depth() -> TestResult {
    assert_eq!(nested_arrays(20), jsongraph::to_string(&nested_value(20))?);
    assert_out_of_depth(jsongraph::to_string(&nested_value(21)), 20);

    let settings = EncodeSettings {
        max_depth: 2,
        depth_policy: DepthPolicy::Truncate,
        ..Default::default()
    };
    let value = jsongraph::from_str(r#"{"a": {"b": {"c": 1}, "d": 2}, "e": [[1]]}"#)?;
    assert_eq!(
        r#"{"a":{"b":{},"d":2},"e":[[]]}"#,
        jsongraph::to_string_with(&value, &settings)?
    );
    Ok(())
}

#[test]
fn pointer_at_depth_limit() -> TestResult {
    let value = jsongraph::from_str(r##"{"name": "root", "self": {"$ref": "#"}}"##)?;
    let encode_settings = EncodeSettings {
        max_depth: 1,
        cycle_policy: CyclePolicy::EmitPointer,
        ..Default::default()
    };
    let json = jsongraph::to_string_with(&value, &encode_settings)?;
    assert_eq!(r##"{"name":"root","self":{"$ref":"#"}}"##, json);

    // Pointer objects are no nesting level, neither when writing nor when reading them
    for depth_policy in [DepthPolicy::Error, DepthPolicy::Truncate] {
        let settings = DecodeSettings {
            max_depth: 1,
            depth_policy,
            ..Default::default()
        };
        let decoded = jsongraph::from_str_with(&json, &settings)?;
        let inner = decoded.pointer(&"#/self".parse()?).ok_or("missing member")?;
        assert!(decoded.ptr_eq(&inner), "for {depth_policy:?}");
        if let Some(object) = decoded.as_object() {
            object.insert("self", Value::Null);
        }
    }

    // Without resolution the pointer object is regular data, and nested too deep
    let settings = DecodeSettings {
        max_depth: 1,
        resolve_references: false,
        ..Default::default()
    };
    assert_out_of_depth(jsongraph::from_str_with(&json, &settings), 1);

    if let Some(object) = value.as_object() {
        object.insert("self", Value::Null);
    }
    Ok(())
}

#[test]
fn arena_limit() -> TestResult {
    let value = jsongraph::from_str(r#"{"name": "a longer string value", "items": [1, 2, 3]}"#)?;
    let encoded = jsongraph::to_string(&value)?;

    let exact = EncodeSettings {
        initial_capacity: 4,
        max_arena_size: encoded.len(),
        ..Default::default()
    };
    assert_eq!(encoded, jsongraph::to_string_with(&value, &exact)?);

    let too_small = EncodeSettings {
        max_arena_size: encoded.len() - 1,
        ..exact
    };
    match jsongraph::to_string_with(&value, &too_small) {
        Err(JsonError::OutOfMemory { max_size, .. }) => assert_eq!(encoded.len() - 1, max_size),
        r => panic!("Unexpected result: {r:?}"),
    }
    Ok(())
}

#[test]
fn writer_flushes_small_arena() -> TestResult {
    let long_string = "ab\"c\n".repeat(200);
    let value = Value::Array(
        (0..100)
            .map(|i| {
                if i % 10 == 0 {
                    Value::from(long_string.as_str())
                } else {
                    Value::from(i)
                }
            })
            .collect(),
    );
    let expected = jsongraph::to_string(&value)?;

    for max_arena_size in [3, 16, 100, 1000] {
        let settings = EncodeSettings {
            initial_capacity: 1,
            max_arena_size,
            ..Default::default()
        };
        let mut output = Vec::<u8>::new();
        jsongraph::to_writer_with(&value, &mut output, &settings)?;
        assert_eq!(expected.as_bytes(), output.as_slice(), "max arena size {max_arena_size}");
    }
    Ok(())
}

#[test]
fn writer_flushes_pretty() -> TestResult {
    let value = jsongraph::from_str(r#"{"a": [1, {"b": []}], "c": {}}"#)?;
    let settings = EncodeSettings {
        max_arena_size: 8,
        ..EncodeSettings::pretty()
    };
    let mut output = Vec::<u8>::new();
    jsongraph::to_writer_with(&value, &mut output, &settings)?;
    assert_eq!(
        jsongraph::to_string_with(&value, &EncodeSettings::pretty())?,
        String::from_utf8(output)?
    );
    Ok(())
}

#[test]
fn reader_limit() -> TestResult {
    let codec = Codec::new(
        EncodeSettings::default(),
        DecodeSettings {
            max_arena_size: 10,
            ..Default::default()
        },
    );
    assert_eq!(
        Value::Array([1, 2, 3].into_iter().collect()),
        codec.decode_reader("[1, 2, 3]".as_bytes())?
    );
    assert!(matches!(
        codec.decode_reader("[1, 2, 3, 4]".as_bytes()),
        Err(JsonError::OutOfMemory { max_size: 10, .. })
    ));
    Ok(())
}

#[test]
fn invalid_utf8_input() {
    match jsongraph::from_reader(&[b'"', 0xC3, b'"'][..]) {
        Err(JsonError::IoError(e)) => assert_eq!(std::io::ErrorKind::InvalidData, e.kind()),
        r => panic!("Unexpected result: {r:?}"),
    }
}
