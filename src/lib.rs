#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow needless `return` because that makes it sometimes more obvious that
// an expression is the result of the function
#![allow(clippy::needless_return)]
// Allow `assert_eq!(true, ...)` because in some cases it is used to check a bool
// value and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]
// When `docsrs` configuration flag is set enable banner for features in documentation
// See https://stackoverflow.com/q/61417452
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! jsongraph is a JSON codec for object graphs.
//!
//! It converts between JSON text and in-memory values without runtime reflection: host
//! types describe themselves through the [`PullSource`](source::PullSource) trait for
//! encoding, and are materialized through a [`PushSink`](reader::PushSink) value factory
//! or read with the typed [`Decode`](reader::Decode) API when decoding.
//!
//! Values which are shared or which contain themselves are supported through pointer
//! objects of the form `{"$ref": "#/path/to/value"}`: encoding writes a pointer for every
//! repeated occurrence of a container, and decoding replaces every pointer with the value
//! it points to, so that both locations share the same container instance again.
//!
//! The reader is lenient, see the [`reader`] module documentation for the accepted
//! syntax extensions. The writer always produces JSON as defined by
//! [RFC 8259](https://www.rfc-editor.org/rfc/rfc8259.html), except that only `\`, `"`,
//! line feed, carriage return and tab are escaped in strings.
//!
//! # Terminology
//!
//! This crate uses the same terminology as the JSON specification:
//!
//! - *object*: `{ ... }`
//!   - *member*: Entry in an object. For example the JSON object `{"a": 1}` has the member
//!     `"a": 1` where `"a"` is the member *name* and `1` is the member *value*.
//! - *array*: `[ ... ]`
//! - *literal*:
//!   - *boolean*: `true` or `false`
//!   - `null`
//! - *number*: number value, for example `123.4e+10`
//! - *string*: string value, for example `"text in \"quotes\""`
//!
//! # Usage examples
//!
//! ## Decoding and encoding values
//! ```
//! let value = jsongraph::from_str(r#"{"a": 1, "b": [1, 2, 3], "c": null}"#)?;
//! assert_eq!(r#"{"a":1,"b":[1,2,3],"c":null}"#, jsongraph::to_string(&value)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Shared values
//! ```
//! let value = jsongraph::from_str(r##"{"x": {"v": 1}, "y": {"$ref": "#/x"}}"##)?;
//! let object = value.as_object().unwrap();
//! assert!(object.get("x").unwrap().ptr_eq(&object.get("y").unwrap()));
//!
//! assert_eq!(r##"{"x":{"v":1},"y":{"$ref":"#/x"}}"##, jsongraph::to_string(&value)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Reusing settings and arenas
//! ```
//! # use jsongraph::Codec;
//! # use jsongraph::writer::EncodeSettings;
//! let codec = Codec::new(EncodeSettings::pretty(), Default::default());
//! let value = codec.decode("[1, 2]")?;
//! assert_eq!("[\n  1,\n  2\n]", codec.encode(&value)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Serde integration
//! Optional integration with [Serde](https://docs.rs/serde/latest/serde/) exists to
//! serialize [`Value`](value::Value) and [`Number`](number::Number) with other Serde
//! formats. It can be enabled with the `serde` feature. Values containing cycles
//! cannot be serialized this way.

use std::io::{Read, Write};

pub mod arena;
mod codec;
mod error;
pub mod number;
pub mod path;
pub mod reader;
pub mod source;
pub mod value;
pub mod writer;

#[cfg(feature = "serde")]
mod serde;

pub use codec::Codec;
pub use error::*;

use arena::Arena;
use path::Path;
use reader::{Decode, DecodeSettings, Deserializer, PushSink};
use source::PullSource;
use value::{Value, ValueBuilder};
use writer::EncodeSettings;

/// Handling of arrays and objects nested deeper than the configured maximum depth
#[derive(PartialEq, Eq, Clone, Copy, Default, strum::Display, Debug)]
pub enum DepthPolicy {
    /// Fail with [`JsonError::OutOfDepth`]
    #[default]
    Error,
    /// Omit the content of such containers, keeping them as empty containers
    Truncate,
}

/// Encodes a value as compact JSON string, using the default settings
pub fn to_string(source: &dyn PullSource) -> Result<String, JsonError> {
    to_string_with(source, &EncodeSettings::default())
}

/// Encodes a value as JSON string
pub fn to_string_with(
    source: &dyn PullSource,
    settings: &EncodeSettings,
) -> Result<String, JsonError> {
    let mut arena = Arena::new(settings.initial_capacity, settings.max_arena_size);
    writer::encode_into(source, settings, &mut arena, None)?;
    arena.to_string_checked()
}

/// Encodes the value at `path` below `source` as JSON string
///
/// The path is relative to `source`, and so are pointers written for shared values.
/// Returns `None` if there is no value at `path`.
///
/// # Examples
/// ```
/// # use jsongraph::path::Path;
/// let value = jsongraph::from_str(r#"{"a": [true, {"b": 1}]}"#)?;
/// let path: Path = "#/a/1".parse()?;
/// assert_eq!(
///     Some(r#"{"b":1}"#.to_owned()),
///     jsongraph::to_string_at(&value, &path, &Default::default())?
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn to_string_at(
    source: &dyn PullSource,
    path: &Path,
    settings: &EncodeSettings,
) -> Result<Option<String>, JsonError> {
    let mut encoded = None;
    source::visit_path(source, &path.segments(), &mut |value| {
        encoded = Some(to_string_with(value, settings)?);
        Ok(())
    })?;
    Ok(encoded)
}

/// Encodes a value as compact JSON to a writer, using the default settings
pub fn to_writer<W: Write>(source: &dyn PullSource, output: W) -> Result<(), JsonError> {
    to_writer_with(source, output, &EncodeSettings::default())
}

/// Encodes a value as JSON to a writer
///
/// Whenever the arena reaches [`EncodeSettings::max_arena_size`] its content is written
/// to the writer. Output which was already written is not rolled back if encoding fails.
pub fn to_writer_with<W: Write>(
    source: &dyn PullSource,
    mut output: W,
    settings: &EncodeSettings,
) -> Result<(), JsonError> {
    let mut arena = Arena::new(settings.initial_capacity, settings.max_arena_size);
    let sink: &mut dyn Write = &mut output;
    writer::encode_into(source, settings, &mut arena, Some(sink))
}

/// Decodes a JSON document as [`Value`], using the default settings
pub fn from_str(json: &str) -> Result<Value, JsonError> {
    from_str_with(json, &DecodeSettings::default())
}

/// Decodes a JSON document as [`Value`]
pub fn from_str_with(json: &str, settings: &DecodeSettings) -> Result<Value, JsonError> {
    Deserializer::new(json, settings.clone()).decode_into(&mut ValueBuilder)
}

/// Decodes a JSON document from a reader as [`Value`], using the default settings
///
/// The complete document is read first. The reader is not buffered by this function.
pub fn from_reader<R: Read>(mut reader: R) -> Result<Value, JsonError> {
    let settings = DecodeSettings::default();
    let mut arena = Arena::new(arena::DEFAULT_INITIAL_CAPACITY, settings.max_arena_size);
    arena.fill_from(&mut reader)?;
    from_str_with(arena.as_str_checked()?, &settings)
}

/// Decodes a JSON document with the typed API, using the default settings
///
/// Fails if anything besides whitespace follows the value.
pub fn decode<T: Decode>(json: &str) -> Result<T, JsonError> {
    let mut deserializer = Deserializer::new(json, DecodeSettings::default());
    let value = deserializer.read()?;
    deserializer.finish()?;
    Ok(value)
}

/// Decodes a JSON document into a custom [`PushSink`], using the default settings
pub fn decode_into<S: PushSink>(json: &str, sink: &mut S) -> Result<S::Value, JsonError> {
    Deserializer::new(json, DecodeSettings::default()).decode_into(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn to_writer_flushes() -> TestResult {
        let mut output = Vec::<u8>::new();
        let settings = EncodeSettings {
            initial_capacity: 2,
            max_arena_size: 8,
            ..Default::default()
        };
        let value = from_str(r#"{"name": "value", "items": [1, 2, 3, 4, 5]}"#)?;
        to_writer_with(&value, &mut output, &settings)?;
        assert_eq!(
            r#"{"name":"value","items":[1,2,3,4,5]}"#,
            String::from_utf8(output)?
        );
        Ok(())
    }

    #[test]
    fn reader() -> TestResult {
        let value = from_reader(r#"[1, "a"]"#.as_bytes())?;
        assert_eq!("[1,\"a\"]", to_string(&value)?);

        match from_reader(&[b'"', 0xFF, b'"'][..]) {
            Err(JsonError::IoError(e)) => assert_eq!(std::io::ErrorKind::InvalidData, e.kind()),
            r => panic!("Unexpected result: {r:?}"),
        }
        Ok(())
    }

    #[test]
    fn value_at_path() -> TestResult {
        let value = from_str(r#"{"a": {"b": [1, 2]}}"#)?;
        let settings = EncodeSettings::default();
        assert_eq!(
            Some("2".to_owned()),
            to_string_at(&value, &"#/a/b/1".parse()?, &settings)?
        );
        assert_eq!(None, to_string_at(&value, &"#/a/c".parse()?, &settings)?);
        assert_eq!(
            Some(r#"{"a":{"b":[1,2]}}"#.to_owned()),
            to_string_at(&value, &Path::root(), &settings)?
        );
        Ok(())
    }
}
