use std::io::Write;

use crate::{
    arena::Arena,
    error::JsonError,
    path::Path,
    source::{ChildSink, Key, PullSource, Scalar, Shape},
    writer::{
        references::{Occurrence, ReferenceCache},
        EncodeSettings,
    },
    DepthPolicy,
};

/// Strings shorter than this are escaped with a single worst-case reservation
const SHORT_STRING_THRESHOLD: usize = 300;
/// Number of bytes escaped per reservation for longer strings
const ESCAPE_CHUNK_SIZE: usize = 128;

#[inline]
fn escape_sequence(b: u8) -> Option<&'static [u8; 2]> {
    match b {
        b'"' => Some(b"\\\""),
        b'\\' => Some(b"\\\\"),
        b'\n' => Some(b"\\n"),
        b'\r' => Some(b"\\r"),
        b'\t' => Some(b"\\t"),
        _ => None,
    }
}

/// Appends `bytes` with escaped characters; space for the result must have been reserved
fn push_escaped(arena: &mut Arena, bytes: &[u8]) {
    let mut run_start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(escaped) = escape_sequence(b) {
            arena.push_reserved(&bytes[run_start..i]);
            arena.push_reserved(escaped);
            run_start = i + 1;
        }
    }
    arena.push_reserved(&bytes[run_start..]);
}

/// Traversal which encodes a [`PullSource`] into an [`Arena`]
///
/// Every child is followed by a `,`; once all children of a container have been written
/// the trailing `,` is trimmed again before the closing bracket.
pub(crate) struct Serializer<'s, 'w> {
    settings: &'s EncodeSettings,
    arena: &'s mut Arena,
    sink: Option<&'w mut dyn Write>,
    depth: usize,
    /// Whether the children currently being written are array items; object members are
    /// written with their name
    in_array: bool,
    /// Location of the container whose children are currently being written
    path: Path,
    references: ReferenceCache,
}

impl<'s, 'w> Serializer<'s, 'w> {
    pub fn new(
        settings: &'s EncodeSettings,
        arena: &'s mut Arena,
        sink: Option<&'w mut dyn Write>,
    ) -> Self {
        Serializer {
            settings,
            arena,
            sink,
            depth: 0,
            in_array: false,
            path: Path::root(),
            references: ReferenceCache::new(
                settings.cycle_policy,
                settings.null_shared_references,
            ),
        }
    }

    /// Encodes the top-level value
    pub fn encode_root(&mut self, source: &dyn PullSource) -> Result<(), JsonError> {
        match source.shape() {
            Shape::Scalar => self.encode_scalar(&source.scalar()),
            shape => self.encode_container(source, shape),
        }
    }

    /// Writes the remaining staged output to the sink, if any
    pub fn finish(self) -> Result<(), JsonError> {
        if let Some(sink) = self.sink {
            self.arena.flush_to(sink)?;
        }
        Ok(())
    }

    // Low level writing

    fn reserve(&mut self, additional: usize) -> Result<(), JsonError> {
        self.arena.reserve(additional, self.sink.as_deref_mut())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), JsonError> {
        self.reserve(bytes.len())?;
        self.arena.push_reserved(bytes);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), JsonError> {
        self.reserve(1)?;
        self.arena.push_byte_reserved(byte);
        Ok(())
    }

    fn write_indentation(&mut self, depth: usize) -> Result<(), JsonError> {
        let settings = self.settings;
        self.write(settings.line_break.as_bytes())?;
        for _ in 0..depth {
            self.write(settings.indent_unit.as_bytes())?;
        }
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), JsonError> {
        let bytes = value.as_bytes();
        let worst_case_len = bytes.len() * 2 + 2;

        if bytes.len() < SHORT_STRING_THRESHOLD
            && self.arena.len() + worst_case_len <= self.arena.max_size()
        {
            self.reserve(worst_case_len)?;
            self.arena.push_byte_reserved(b'"');
            push_escaped(self.arena, bytes);
            self.arena.push_byte_reserved(b'"');
            return Ok(());
        }

        // Every escaped chunk must fit into an arena which only retains its last byte
        let chunk_size = ESCAPE_CHUNK_SIZE
            .min(self.arena.max_size().saturating_sub(1) / 2)
            .max(1);
        self.write_byte(b'"')?;
        for chunk in bytes.chunks(chunk_size) {
            let escaped_len =
                chunk.len() + chunk.iter().filter(|b| escape_sequence(**b).is_some()).count();
            self.reserve(escaped_len)?;
            push_escaped(self.arena, chunk);
        }
        self.write_byte(b'"')
    }

    // Values

    fn encode_scalar(&mut self, scalar: &Scalar<'_>) -> Result<(), JsonError> {
        match *scalar {
            Scalar::Null => self.write(b"null"),
            Scalar::Bool(true) => self.write(b"true"),
            Scalar::Bool(false) => self.write(b"false"),
            // Numbers are formatted into fixed-size stack buffers first, so only their
            // exact length is reserved
            Scalar::I64(n) => self.write(itoa::Buffer::new().format(n).as_bytes()),
            Scalar::U64(n) => self.write(itoa::Buffer::new().format(n).as_bytes()),
            Scalar::F64(n) if !n.is_finite() => self.write(b"null"),
            Scalar::F64(n) => self.write(ryu::Buffer::new().format_finite(n).as_bytes()),
            Scalar::Decimal(d) => self.write(d.to_string().as_bytes()),
            Scalar::Str(s) => self.write_string(s),
        }
    }

    fn encode_container(&mut self, source: &dyn PullSource, shape: Shape) -> Result<(), JsonError> {
        let Some(identity) = source.identity() else {
            return self.encode_children(source, shape);
        };

        match self.references.visit(identity, &self.path)? {
            Occurrence::First => {
                self.encode_children(source, shape)?;
                self.references.finish(identity);
                Ok(())
            }
            // Pointer objects are no nesting level, neither here nor when reading them
            Occurrence::Pointer(target) => self.write_pointer(&target),
            Occurrence::Null => self.write(b"null"),
        }
    }

    fn encode_children(&mut self, source: &dyn PullSource, shape: Shape) -> Result<(), JsonError> {
        let (open, close) = match shape {
            Shape::Array => (b'[', b']'),
            _ => (b'{', b'}'),
        };
        self.write_byte(open)?;

        self.depth += 1;
        let mut has_children = false;
        if self.depth > self.settings.max_depth {
            match self.settings.depth_policy {
                DepthPolicy::Error => {
                    return Err(JsonError::OutOfDepth {
                        max_depth: self.settings.max_depth,
                    })
                }
                DepthPolicy::Truncate => {
                    log::debug!(
                        "omitting children of {} nested deeper than {}",
                        self.path,
                        self.settings.max_depth
                    );
                }
            }
        } else {
            let was_in_array = std::mem::replace(&mut self.in_array, shape == Shape::Array);
            let result = source.push_children(self);
            self.in_array = was_in_array;
            result?;
            has_children = self.arena.trim_last(b',');
        }
        self.depth -= 1;

        if has_children && self.settings.pretty_print {
            self.write_indentation(self.depth)?;
        }
        self.write_byte(close)
    }

    fn write_pointer(&mut self, target: &Path) -> Result<(), JsonError> {
        log::trace!("writing pointer to {target} at {}", self.path);
        let settings = self.settings;
        self.write(b"{\"$ref\"")?;
        self.write(settings.key_value_separator.as_bytes())?;
        self.write_string(&target.to_ref_string())?;
        self.write_byte(b'}')
    }

    /// Whether an object member with a scalar value passes the configured filters
    fn accepts(&self, name: &str, scalar: &Scalar<'_>) -> bool {
        let settings = self.settings;
        if (settings.ignore_null && *scalar == Scalar::Null)
            || (settings.ignore_zero && scalar.is_zero())
            || (settings.ignore_empty_string && *scalar == Scalar::Str(""))
        {
            return false;
        }
        match &settings.filter {
            Some(filter) => filter.accept(name, scalar.kind(), scalar),
            None => true,
        }
    }
}

impl ChildSink for Serializer<'_, '_> {
    fn child(&mut self, key: Key<'_>, value: &dyn PullSource) -> Result<(), JsonError> {
        let shape = value.shape();
        let scalar = match shape {
            Shape::Scalar => Some(value.scalar()),
            _ => None,
        };

        if let (false, Key::Name(name), Some(scalar)) = (self.in_array, key, &scalar) {
            if !self.accepts(name, scalar) {
                return Ok(());
            }
        }

        if self.settings.pretty_print {
            self.write_indentation(self.depth)?;
        }
        if !self.in_array {
            match key {
                Key::Name(name) => self.write_string(name)?,
                Key::Index(index) => self.write_string(itoa::Buffer::new().format(index))?,
            }
            let settings = self.settings;
            self.write(settings.key_value_separator.as_bytes())?;
        }

        match scalar {
            Some(scalar) => self.encode_scalar(&scalar)?,
            None => {
                let parent = self.path.clone();
                self.path = parent.child(key.to_segment());
                let result = self.encode_container(value, shape);
                self.path = parent;
                result?;
            }
        }
        self.write_byte(b',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arena::DEFAULT_MAX_SIZE,
        value::{Array, Object, Value},
        writer::{encode_into, CyclePolicy},
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn encode(source: &dyn PullSource, settings: &EncodeSettings) -> Result<String, JsonError> {
        let mut arena = Arena::new(settings.initial_capacity, settings.max_arena_size);
        encode_into(source, settings, &mut arena, None)?;
        arena.to_string_checked()
    }

    #[test]
    fn escaping() -> TestResult {
        let settings = EncodeSettings::default();
        assert_eq!(
            r#""a\"b\\c\nd\re\tf\u0001/'""#.replace("\\u0001", "\u{1}"),
            encode(&"a\"b\\c\nd\re\tf\u{1}/'", &settings)?
        );

        let long = "\"é\n".repeat(200);
        let expected = format!("\"{}\"", "\\\"é\\n".repeat(200));
        assert_eq!(expected, encode(&long, &settings)?);
        Ok(())
    }

    #[test]
    fn long_string_small_arena() -> TestResult {
        let settings = EncodeSettings {
            initial_capacity: 1,
            max_arena_size: 500,
            ..Default::default()
        };
        // Worst-case reservation of the whole string exceeds the maximum size
        let value = "a".repeat(299);
        assert_eq!(format!("\"{value}\""), encode(&value, &settings)?);
        Ok(())
    }

    #[test]
    fn numbers() -> TestResult {
        let settings = EncodeSettings::default();
        assert_eq!("-9223372036854775808", encode(&i64::MIN, &settings)?);
        assert_eq!("18446744073709551615", encode(&u64::MAX, &settings)?);
        assert_eq!("0.1", encode(&0.1_f64, &settings)?);
        assert_eq!("1.0", encode(&1.0_f64, &settings)?);
        assert_eq!("-2.2250738585072014e-308", encode(&-f64::MIN_POSITIVE, &settings)?);
        assert_eq!("[null,null]", encode(&vec![f64::NAN, f64::INFINITY], &settings)?);
        Ok(())
    }

    #[test]
    fn trailing_separator() -> TestResult {
        let settings = EncodeSettings::default();
        let empty: Vec<i32> = Vec::new();
        assert_eq!("[]", encode(&empty, &settings)?);
        let value = Value::Array(Array::from(vec![
            Value::Array(Array::new()),
            Value::Array(Array::from(vec![Value::from(1)])),
            Value::Object(Object::new()),
        ]));
        assert_eq!("[[],[1],{}]", encode(&value, &settings)?);
        Ok(())
    }

    #[test]
    fn flush_to_sink() -> TestResult {
        let settings = EncodeSettings {
            initial_capacity: 4,
            max_arena_size: 16,
            ..Default::default()
        };
        let value: Vec<String> = (0..20).map(|i| format!("item{i}")).collect();
        let mut arena = Arena::new(settings.initial_capacity, settings.max_arena_size);
        let mut sink = Vec::<u8>::new();
        encode_into(&value, &settings, &mut arena, Some(&mut sink))?;
        assert!(arena.is_empty());

        let expected = format!(
            "[{}]",
            value.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(",")
        );
        assert_eq!(expected, String::from_utf8(sink)?);

        match encode(&value, &settings) {
            Err(JsonError::OutOfMemory { max_size, .. }) => assert_eq!(16, max_size),
            r => panic!("Unexpected result: {r:?}"),
        }
        Ok(())
    }

    #[test]
    fn depth() -> TestResult {
        let nested = vec![vec![vec![1_i32]]];
        let settings = EncodeSettings {
            max_depth: 3,
            ..Default::default()
        };
        assert_eq!("[[[1]]]", encode(&nested, &settings)?);

        let settings = EncodeSettings {
            max_depth: 2,
            ..Default::default()
        };
        match encode(&nested, &settings) {
            Err(JsonError::OutOfDepth { max_depth }) => assert_eq!(2, max_depth),
            r => panic!("Unexpected result: {r:?}"),
        }

        let settings = EncodeSettings {
            max_depth: 2,
            depth_policy: DepthPolicy::Truncate,
            ..Default::default()
        };
        assert_eq!("[[[]]]", encode(&nested, &settings)?);
        Ok(())
    }

    #[test]
    fn filters() -> TestResult {
        let object: Object = [
            ("n", Value::Null),
            ("z", Value::from(0)),
            ("f", Value::from(0.0)),
            ("e", Value::from("")),
            ("s", Value::from("x")),
            ("_p", Value::from(1)),
        ]
        .into_iter()
        .collect();
        object.insert("a", Array::from(vec![Value::Null, Value::from(0), Value::from("")]));
        let value = Value::Object(object);

        let settings = EncodeSettings::default();
        assert_eq!(
            r#"{"n":null,"z":0,"f":0.0,"e":"","s":"x","_p":1,"a":[null,0,""]}"#,
            encode(&value, &settings)?
        );

        fn skip_private(name: &str, _kind: crate::source::ScalarKind, _value: &Scalar<'_>) -> bool {
            !name.starts_with('_')
        }
        let settings = EncodeSettings {
            ignore_null: true,
            ignore_zero: true,
            ignore_empty_string: true,
            filter: Some(std::sync::Arc::new(skip_private)),
            ..Default::default()
        };
        // Array items are not filtered
        assert_eq!(r#"{"s":"x","a":[null,0,""]}"#, encode(&value, &settings)?);
        Ok(())
    }

    #[test]
    fn pretty() -> TestResult {
        let object: Object = [("a", Value::from(1))].into_iter().collect();
        object.insert(
            "b",
            Array::from(vec![Value::from(true), Value::Object(Object::new())]),
        );
        object.insert("c", Array::new());
        assert_eq!(
            "{\n  \"a\": 1,\n  \"b\": [\n    true,\n    {}\n  ],\n  \"c\": []\n}",
            encode(&Value::Object(object), &EncodeSettings::pretty())?
        );

        let settings = EncodeSettings {
            pretty_print: true,
            indent_unit: "\t".to_owned(),
            line_break: "\r\n".to_owned(),
            ..Default::default()
        };
        assert_eq!("[\r\n\t1,\r\n\t2\r\n]", encode(&vec![1_i32, 2], &settings)?);
        Ok(())
    }

    #[test]
    fn shared_and_cyclic() -> TestResult {
        let shared = Object::new();
        shared.insert("v", 1);
        let root: Array = [Value::Object(shared.clone()), Value::Object(shared.clone())]
            .into_iter()
            .collect();
        let root = Value::Array(root);
        assert_eq!(
            r##"[{"v":1},{"$ref":"#/0"}]"##,
            encode(&root, &EncodeSettings::default())?
        );

        let settings = EncodeSettings {
            cycle_policy: CyclePolicy::EmitNull,
            null_shared_references: true,
            ..Default::default()
        };
        assert_eq!(r#"[{"v":1},null]"#, encode(&root, &settings)?);

        shared.insert("self", shared.clone());
        match encode(&root, &EncodeSettings::default()) {
            Err(JsonError::LoopReference { target, path }) => {
                assert_eq!("#/0", target);
                assert_eq!("#/0/self", path);
            }
            r => panic!("Unexpected result: {r:?}"),
        }

        let settings = EncodeSettings {
            cycle_policy: CyclePolicy::EmitNull,
            ..Default::default()
        };
        assert_eq!(
            r##"[{"v":1,"self":null},{"$ref":"#/0"}]"##,
            encode(&root, &settings)?
        );

        let settings = EncodeSettings {
            cycle_policy: CyclePolicy::EmitPointer,
            ..EncodeSettings::pretty()
        };
        assert_eq!(
            "[\n  {\n    \"v\": 1,\n    \"self\": {\"$ref\": \"#/0\"}\n  },\n  {\"$ref\": \"#/0\"}\n]",
            encode(&root, &settings)?
        );

        shared.insert("self", Value::Null);
        Ok(())
    }

    #[test]
    fn escaped_pointer_path() -> TestResult {
        let shared = Array::new();
        let object: Object = [("a/b\n", Value::Array(shared.clone()))].into_iter().collect();
        object.insert("c", shared);
        assert_eq!(
            r##"{"a/b\n":[],"c":{"$ref":"#/a%2Fb\n"}}"##,
            encode(&Value::Object(object), &EncodeSettings::default())?
        );
        Ok(())
    }

    #[test]
    fn max_size_boundary() -> TestResult {
        let settings = EncodeSettings {
            initial_capacity: 1,
            max_arena_size: 7,
            ..Default::default()
        };
        assert_eq!("[1,2,3]", encode(&vec![1_i32, 2, 3], &settings)?);
        assert!(encode(&vec![1_i32, 2, 3, 4], &settings).is_err());

        let settings = EncodeSettings {
            max_arena_size: DEFAULT_MAX_SIZE,
            ..settings
        };
        assert_eq!("[1,2,3,4]", encode(&vec![1_i32, 2, 3, 4], &settings)?);
        Ok(())
    }
}
