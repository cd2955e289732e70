use std::io::{Read, Write};

use crate::{
    arena::ArenaPool,
    error::JsonError,
    path::Path,
    reader::{Decode, DecodeSettings, Deserializer, PushSink},
    source::{visit_path, PullSource},
    value::{Value, ValueBuilder},
    writer::{encode_into, EncodeSettings},
};

/// Encoder and decoder with fixed settings
///
/// A codec keeps a pool of arenas, so repeated calls reuse the arena allocations of
/// previous calls. The codec can be shared between threads; every call checks out its
/// own arena and returns it to the pool afterwards, also when the call fails.
///
/// # Examples
/// ```
/// # use jsongraph::Codec;
/// # use jsongraph::reader::DecodeSettings;
/// # use jsongraph::writer::{CyclePolicy, EncodeSettings};
/// let codec = Codec::new(
///     EncodeSettings {
///         cycle_policy: CyclePolicy::EmitNull,
///         ..Default::default()
///     },
///     DecodeSettings {
///         max_depth: 64,
///         ..Default::default()
///     },
/// );
///
/// let value = codec.decode(r#"{"a": [1, 2]}"#)?;
/// assert_eq!(r#"{"a":[1,2]}"#, codec.encode(&value)?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Codec {
    encode_settings: EncodeSettings,
    decode_settings: DecodeSettings,
    pool: ArenaPool,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(EncodeSettings::default(), DecodeSettings::default())
    }
}

impl Codec {
    /// Creates a codec with the given settings
    pub fn new(encode_settings: EncodeSettings, decode_settings: DecodeSettings) -> Self {
        let pool = ArenaPool::new(encode_settings.initial_capacity);
        Codec {
            encode_settings,
            decode_settings,
            pool,
        }
    }

    /// Settings used for encoding
    pub fn encode_settings(&self) -> &EncodeSettings {
        &self.encode_settings
    }

    /// Settings used for decoding
    pub fn decode_settings(&self) -> &DecodeSettings {
        &self.decode_settings
    }

    // Encoding

    /// Encodes a value as JSON string
    pub fn encode(&self, source: &dyn PullSource) -> Result<String, JsonError> {
        let mut arena = self.pool.checkout(self.encode_settings.max_arena_size);
        encode_into(source, &self.encode_settings, &mut arena, None)?;
        arena.to_string_checked()
    }

    /// Encodes a value as JSON to a writer
    ///
    /// Whenever the arena reaches its maximum size its content is written to the writer.
    pub fn encode_to_writer<W: Write>(
        &self,
        source: &dyn PullSource,
        mut output: W,
    ) -> Result<(), JsonError> {
        let mut arena = self.pool.checkout(self.encode_settings.max_arena_size);
        let sink: &mut dyn Write = &mut output;
        encode_into(source, &self.encode_settings, &mut arena, Some(sink))
    }

    /// Encodes the value at `path` below `source`, `None` if there is no such value
    pub fn encode_at(
        &self,
        source: &dyn PullSource,
        path: &Path,
    ) -> Result<Option<String>, JsonError> {
        let mut encoded = None;
        visit_path(source, &path.segments(), &mut |value| {
            encoded = Some(self.encode(value)?);
            Ok(())
        })?;
        Ok(encoded)
    }

    // Decoding

    /// Decodes a JSON document as [`Value`]
    pub fn decode(&self, json: &str) -> Result<Value, JsonError> {
        self.decode_into(json, &mut ValueBuilder)
    }

    /// Decodes a JSON document into a custom [`PushSink`]
    pub fn decode_into<S: PushSink>(&self, json: &str, sink: &mut S) -> Result<S::Value, JsonError> {
        Deserializer::new(json, self.decode_settings.clone()).decode_into(sink)
    }

    /// Decodes a JSON document with the typed API
    pub fn decode_typed<T: Decode>(&self, json: &str) -> Result<T, JsonError> {
        let mut deserializer = Deserializer::new(json, self.decode_settings.clone());
        let value = deserializer.read()?;
        deserializer.finish()?;
        Ok(value)
    }

    /// Decodes a JSON document from a reader as [`Value`]
    ///
    /// The complete document is staged in a pooled arena first; documents larger than
    /// [`DecodeSettings::max_arena_size`] are rejected with [`JsonError::OutOfMemory`].
    pub fn decode_reader<R: Read>(&self, mut reader: R) -> Result<Value, JsonError> {
        let mut arena = self.pool.checkout(self.decode_settings.max_arena_size);
        arena.fill_from(&mut reader)?;
        self.decode(arena.as_str_checked()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn shareable() {
        assert_send_sync::<Codec>();
    }

    #[test]
    fn arenas_are_reused() -> TestResult {
        let codec = Codec::default();
        assert_eq!(0, codec.pool.available());

        let value = codec.decode_reader(r#"{"a": "b"}"#.as_bytes())?;
        assert_eq!(1, codec.pool.available());
        assert_eq!(r#"{"a":"b"}"#, codec.encode(&value)?);
        assert_eq!(1, codec.pool.available());

        let mut output = Vec::<u8>::new();
        codec.encode_to_writer(&value, &mut output)?;
        assert_eq!(br#"{"a":"b"}"#, output.as_slice());
        assert_eq!(1, codec.pool.available());
        Ok(())
    }

    #[test]
    fn arena_returned_on_error() {
        let codec = Codec::new(
            EncodeSettings {
                max_arena_size: 4,
                ..Default::default()
            },
            DecodeSettings {
                max_arena_size: 4,
                ..Default::default()
            },
        );

        match codec.encode(&"too long") {
            Err(JsonError::OutOfMemory { max_size, .. }) => assert_eq!(4, max_size),
            r => panic!("Unexpected result: {r:?}"),
        }
        assert_eq!(1, codec.pool.available());

        match codec.decode_reader("[1, 2]".as_bytes()) {
            Err(JsonError::OutOfMemory { len, .. }) => assert_eq!(0, len),
            r => panic!("Unexpected result: {r:?}"),
        }
        assert_eq!(1, codec.pool.available());
    }

    #[test]
    fn typed_and_at_path() -> TestResult {
        let codec = Codec::default();
        let numbers: Vec<u8> = codec.decode_typed("[1, 2, 3]")?;
        assert_eq!(vec![1, 2, 3], numbers);

        let value = codec.decode(r#"{"a": [{"b": null}]}"#)?;
        assert_eq!(
            Some(r#"{"b":null}"#.to_owned()),
            codec.encode_at(&value, &"#/a/0".parse()?)?
        );
        assert_eq!(None, codec.encode_at(&value, &"#/a/1".parse()?)?);
        Ok(())
    }
}
