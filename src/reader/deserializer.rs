use std::borrow::Cow;

use crate::{
    error::{JsonError, SyntaxErrorKind, TokenKind},
    number::{classify_number, FromJsonNumber},
    path::{Path, PathSegment},
    value::{Value, ValueBuilder},
    DepthPolicy,
};

use super::{cursor::Cursor, references::DeferredLinks, DecodeSettings, PushSink};

/// Result of decoding one value: either the value, or a `$ref` pointer to be resolved later
enum Slot<V> {
    Value(V),
    Reference(Path),
}

/// Position of a typed read below the top-level value
#[derive(Debug)]
enum TypedSegment<'a> {
    Name(Cow<'a, str>),
    Index(usize),
}

/// Recursive-descent JSON deserializer
///
/// A deserializer reads a single top-level value from a string. The document can be
/// decoded untyped with [`decode_into`](Self::decode_into), or typed with the `read_...`
/// methods. The typed methods read the next value, so after a typed read of the top-level
/// value [`finish`](Self::finish) should be called to verify that no trailing data follows.
///
/// # Examples
/// ```
/// # use jsongraph::reader::*;
/// let mut deserializer = Deserializer::new(r#"{"a": [1, true]}"#, DecodeSettings::default());
///
/// let mut values = Vec::new();
/// deserializer.read_object(|deserializer, name| {
///     assert_eq!("a", name);
///     values.push(deserializer.read_value()?);
///     Ok(())
/// })?;
/// deserializer.finish()?;
///
/// assert_eq!("[1,true]", jsongraph::to_string(&values[0])?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Deserializer<'a> {
    cursor: Cursor<'a>,
    settings: DecodeSettings,
    /// Number of containers entered and not yet left
    depth: usize,
    /// Members and items currently being read by the typed methods
    typed_path: Vec<TypedSegment<'a>>,
}

impl<'a> Deserializer<'a> {
    /// Creates a deserializer for the given document
    pub fn new(input: &'a str, settings: DecodeSettings) -> Self {
        Deserializer {
            cursor: Cursor::new(input),
            settings,
            depth: 0,
            typed_path: Vec::new(),
        }
    }

    /// Verifies that only whitespace follows the top-level value
    pub fn finish(&mut self) -> Result<(), JsonError> {
        self.cursor.skip_whitespace();
        if self.cursor.is_eof() {
            Ok(())
        } else {
            Err(self.cursor.error(SyntaxErrorKind::TrailingData).into())
        }
    }

    /// Enters a container whose opening bracket is at the current position
    ///
    /// Returns `false` if the container is nested too deep and was skipped because
    /// the depth policy is [`DepthPolicy::Truncate`].
    fn enter_container(&mut self) -> Result<bool, JsonError> {
        if self.depth >= self.settings.max_depth {
            match self.settings.depth_policy {
                DepthPolicy::Error => {
                    return Err(JsonError::OutOfDepth {
                        max_depth: self.settings.max_depth,
                    })
                }
                DepthPolicy::Truncate => {
                    log::debug!(
                        "skipping container nested deeper than {} at offset {}",
                        self.settings.max_depth,
                        self.cursor.pos()
                    );
                    self.cursor.skip_value()?;
                    return Ok(false);
                }
            }
        }
        self.depth += 1;
        self.cursor.advance(1);
        Ok(true)
    }

    fn leave_container(&mut self) {
        self.depth -= 1;
    }

    /// Reads a quoted or unquoted member name
    fn read_member_name(&mut self) -> Result<Cow<'a, str>, JsonError> {
        match self.cursor.peek() {
            Some(b'"' | b'\'') => Ok(self.cursor.read_quoted_string()?),
            None => Err(self.cursor.error(SyntaxErrorKind::IncompleteDocument).into()),
            Some(b',' | b':' | b'{' | b'[' | b']') => Err(self
                .cursor
                .error(SyntaxErrorKind::ExpectingMemberNameOrObjectEnd)
                .into()),
            Some(_) => Ok(Cow::Borrowed(self.cursor.read_bare_text())),
        }
    }

    /// Consumes the `,` after a child, or the closing bracket
    ///
    /// Returns `true` if the container has ended.
    fn read_separator(&mut self, closing_bracket: u8) -> Result<bool, JsonError> {
        self.cursor.skip_whitespace();
        match self.cursor.peek() {
            Some(b',') => {
                self.cursor.advance(1);
                Ok(false)
            }
            Some(b) if b == closing_bracket => {
                self.cursor.advance(1);
                Ok(true)
            }
            None => Err(self.cursor.error(SyntaxErrorKind::IncompleteDocument).into()),
            Some(_) => Err(self
                .cursor
                .error(SyntaxErrorKind::MissingCommaOrClosingBracket)
                .into()),
        }
    }

    /// Consumes the closing bracket if it is next, after whitespace
    fn try_close(&mut self, closing_bracket: u8) -> bool {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(closing_bracket) {
            self.cursor.advance(1);
            true
        } else {
            false
        }
    }
}

// Untyped decoding
impl<'a> Deserializer<'a> {
    /// Decodes the complete document into the sink and returns the top-level value
    ///
    /// Fails if anything besides whitespace follows the top-level value. `$ref` pointers
    /// are resolved once the top-level value is complete.
    pub fn decode_into<S: PushSink>(&mut self, sink: &mut S) -> Result<S::Value, JsonError> {
        let value = self.decode_resolved(sink)?;
        self.finish()?;
        Ok(value)
    }

    fn decode_resolved<S: PushSink>(&mut self, sink: &mut S) -> Result<S::Value, JsonError> {
        let mut links = DeferredLinks::new();
        let root = match self.decode_value(sink, &mut links)? {
            Slot::Value(value) => value,
            Slot::Reference(path) => {
                return Err(JsonError::UnresolvedReference {
                    path: path.to_ref_string(),
                    reason: "pointer has no enclosing value",
                })
            }
        };
        if !self.typed_path.is_empty() && !links.is_empty() {
            links.set_base(&self.typed_position())?;
        }
        links.resolve(sink, &root)?;
        Ok(root)
    }

    /// Path of the value the typed methods are currently reading
    fn typed_position(&self) -> Path {
        self.typed_path
            .iter()
            .fold(Path::root(), |path, segment| match segment {
                TypedSegment::Name(name) => path.child(&**name),
                TypedSegment::Index(index) => path.child(*index),
            })
    }

    fn decode_value<S: PushSink>(
        &mut self,
        sink: &mut S,
        links: &mut DeferredLinks<S::Value>,
    ) -> Result<Slot<S::Value>, JsonError> {
        self.cursor.skip_whitespace();
        match self.cursor.classify() {
            None => Err(self.cursor.error(SyntaxErrorKind::IncompleteDocument).into()),
            Some(TokenKind::Object) => self.decode_object(sink, links),
            Some(TokenKind::Array) => self.decode_array(sink, links),
            Some(kind) => self.decode_scalar(sink, kind).map(Slot::Value),
        }
    }

    fn decode_object<S: PushSink>(
        &mut self,
        sink: &mut S,
        links: &mut DeferredLinks<S::Value>,
    ) -> Result<Slot<S::Value>, JsonError> {
        if self.settings.resolve_references {
            if let Some(target) = self.try_read_pointer()? {
                return Ok(Slot::Reference(target));
            }
        }
        if !self.enter_container()? {
            return Ok(Slot::Value(sink.new_object()));
        }

        let object = sink.new_object();
        loop {
            if self.try_close(b'}') {
                break;
            }

            let name = self.read_member_name()?;
            self.cursor.skip_whitespace();
            self.cursor.expect(b':', SyntaxErrorKind::MissingColon)?;

            match self.decode_value(sink, links)? {
                Slot::Value(value) => sink.set_member(&object, name.into_owned(), value),
                Slot::Reference(target) => {
                    let name = name.into_owned();
                    let placeholder = sink.null();
                    sink.set_member(&object, name.clone(), placeholder);
                    links.defer(sink, target, object.clone(), PathSegment::Name(name));
                }
            }

            if self.read_separator(b'}')? {
                break;
            }
        }

        self.leave_container();
        Ok(Slot::Value(object))
    }

    /// Reads the object at the current position if it is a pointer `{"$ref": "..."}`
    ///
    /// A pointer has `$ref` (in any case, quoted or bare) as its only member, with a quoted
    /// string value. Anything else is left unconsumed to be read as regular object. Pointers
    /// do not count as nesting level, matching how they are written.
    fn try_read_pointer(&mut self) -> Result<Option<Path>, JsonError> {
        let mut lookahead = self.cursor.clone();
        lookahead.advance(1);
        lookahead.skip_whitespace();
        let name = match lookahead.peek() {
            Some(b'"' | b'\'') => match lookahead.read_quoted_string() {
                Ok(name) => name,
                Err(_) => return Ok(None),
            },
            Some(b'$') => Cow::Borrowed(lookahead.read_bare_text()),
            _ => return Ok(None),
        };
        if !name.eq_ignore_ascii_case("$ref") {
            return Ok(None);
        }

        lookahead.skip_whitespace();
        if lookahead.peek() != Some(b':') {
            return Ok(None);
        }
        lookahead.advance(1);
        lookahead.skip_whitespace();
        if !matches!(lookahead.peek(), Some(b'"' | b'\'')) {
            return Ok(None);
        }
        let value_pos = lookahead.pos();
        let text = match lookahead.read_quoted_string() {
            Ok(text) => text,
            Err(_) => return Ok(None),
        };
        lookahead.skip_whitespace();
        if lookahead.peek() != Some(b'}') {
            return Ok(None);
        }
        lookahead.advance(1);

        let target = text.parse::<Path>().map_err(|_| {
            lookahead.error_at(SyntaxErrorKind::MalformedReferencePath, value_pos)
        })?;
        self.cursor = lookahead;
        Ok(Some(target))
    }

    fn decode_array<S: PushSink>(
        &mut self,
        sink: &mut S,
        links: &mut DeferredLinks<S::Value>,
    ) -> Result<Slot<S::Value>, JsonError> {
        if !self.enter_container()? {
            return Ok(Slot::Value(sink.new_array()));
        }

        let array = sink.new_array();
        let mut index = 0;
        loop {
            if self.try_close(b']') {
                break;
            }

            match self.decode_value(sink, links)? {
                Slot::Value(value) => sink.push_item(&array, value),
                Slot::Reference(target) => {
                    let placeholder = sink.null();
                    sink.push_item(&array, placeholder);
                    links.defer(sink, target, array.clone(), PathSegment::Index(index));
                }
            }
            index += 1;

            if self.read_separator(b']')? {
                break;
            }
        }

        self.leave_container();
        Ok(Slot::Value(array))
    }

    fn decode_scalar<S: PushSink>(
        &mut self,
        sink: &mut S,
        kind: TokenKind,
    ) -> Result<S::Value, JsonError> {
        let value = match kind {
            TokenKind::String => {
                let text = self.cursor.read_quoted_string()?;
                sink.string(text.into_owned())
            }
            TokenKind::True => {
                self.cursor.match_literal("true")?;
                sink.bool(true)
            }
            TokenKind::False => {
                self.cursor.match_literal("false")?;
                sink.bool(false)
            }
            TokenKind::Null => {
                self.cursor.match_literal("null")?;
                sink.null()
            }
            TokenKind::Undefined => {
                self.cursor.match_literal("undefined")?;
                sink.null()
            }
            TokenKind::Number => match self.cursor.scan_number() {
                Some(run) if self.cursor.is_ending(run.len) => {
                    let literal = self.cursor.take(run.len);
                    match classify_number(literal, &run, self.settings.number_mode) {
                        Some(number) => sink.number(number),
                        None => sink.string(literal.to_owned()),
                    }
                }
                // For example `1a`
                _ => sink.string(self.read_bare_text()?.to_owned()),
            },
            TokenKind::BareText => sink.string(self.read_bare_text()?.to_owned()),
            TokenKind::Object | TokenKind::Array => {
                unreachable!("containers are decoded by the caller")
            }
        };
        Ok(value)
    }

    fn read_bare_text(&mut self) -> Result<&'a str, JsonError> {
        let text = self.cursor.read_bare_text();
        if text.is_empty() {
            return Err(self.cursor.error(SyntaxErrorKind::UnexpectedCharacter).into());
        }
        Ok(text)
    }
}

// Typed decoding
impl<'a> Deserializer<'a> {
    /// Peeks at the kind of the next value without consuming it
    ///
    /// Number literals followed by other text, such as `1a`, are reported as
    /// [`TokenKind::Number`] but can only be read as string.
    pub fn peek(&mut self) -> Result<TokenKind, JsonError> {
        self.cursor.skip_whitespace();
        match self.cursor.classify() {
            Some(kind) => Ok(kind),
            None => Err(self.cursor.error(SyntaxErrorKind::IncompleteDocument).into()),
        }
    }

    fn mismatch<T>(&self, expected: TokenKind, actual: TokenKind) -> Result<T, JsonError> {
        Err(JsonError::TypeMismatch {
            expected,
            actual,
            location: self.cursor.location(),
        })
    }

    /// Reads `null`, or `undefined`
    pub fn read_null(&mut self) -> Result<(), JsonError> {
        match self.peek()? {
            TokenKind::Null => Ok(self.cursor.match_literal("null")?),
            TokenKind::Undefined => Ok(self.cursor.match_literal("undefined")?),
            actual => self.mismatch(TokenKind::Null, actual),
        }
    }

    /// Reads a boolean
    pub fn read_bool(&mut self) -> Result<bool, JsonError> {
        match self.peek()? {
            TokenKind::True => {
                self.cursor.match_literal("true")?;
                Ok(true)
            }
            TokenKind::False => {
                self.cursor.match_literal("false")?;
                Ok(false)
            }
            actual => self.mismatch(TokenKind::True, actual),
        }
    }

    /// Reads a quoted string, or unquoted text
    pub fn read_string(&mut self) -> Result<String, JsonError> {
        match self.peek()? {
            TokenKind::String => Ok(self.cursor.read_quoted_string()?.into_owned()),
            TokenKind::BareText => Ok(self.read_bare_text()?.to_owned()),
            actual => self.mismatch(TokenKind::String, actual),
        }
    }

    /// Reads a number and parses it as `T`
    ///
    /// Fails with [`JsonError::Range`] if the number cannot be represented by `T`.
    pub fn read_number<T: FromJsonNumber>(&mut self) -> Result<T, JsonError> {
        let actual = self.peek()?;
        if actual != TokenKind::Number {
            return self.mismatch(TokenKind::Number, actual);
        }
        let run = match self.cursor.scan_number() {
            Some(run) if self.cursor.is_ending(run.len) => run,
            _ => return self.mismatch(TokenKind::Number, TokenKind::BareText),
        };

        let location = self.cursor.location();
        let literal = self.cursor.take(run.len);
        T::from_json_number(literal).ok_or_else(|| JsonError::Range {
            number: literal.to_owned(),
            target: T::TYPE_NAME,
            location,
        })
    }

    /// Reads an object, calling `f` for every member
    ///
    /// `f` receives the member name and must consume the member value, for example with
    /// [`skip_value`](Self::skip_value) if it is not needed.
    pub fn read_object<F>(&mut self, mut f: F) -> Result<(), JsonError>
    where
        F: FnMut(&mut Self, &str) -> Result<(), JsonError>,
    {
        let actual = self.peek()?;
        if actual != TokenKind::Object {
            return self.mismatch(TokenKind::Object, actual);
        }
        if !self.enter_container()? {
            return Ok(());
        }

        loop {
            if self.try_close(b'}') {
                break;
            }
            let name = self.read_member_name()?;
            self.cursor.skip_whitespace();
            self.cursor.expect(b':', SyntaxErrorKind::MissingColon)?;
            self.typed_path.push(TypedSegment::Name(name.clone()));
            let result = f(self, &name);
            self.typed_path.pop();
            result?;
            if self.read_separator(b'}')? {
                break;
            }
        }
        self.leave_container();
        Ok(())
    }

    /// Reads an array, calling `f` for every item
    ///
    /// `f` must consume the item.
    pub fn read_array<F>(&mut self, mut f: F) -> Result<(), JsonError>
    where
        F: FnMut(&mut Self) -> Result<(), JsonError>,
    {
        let actual = self.peek()?;
        if actual != TokenKind::Array {
            return self.mismatch(TokenKind::Array, actual);
        }
        if !self.enter_container()? {
            return Ok(());
        }

        let mut index = 0;
        loop {
            if self.try_close(b']') {
                break;
            }
            self.typed_path.push(TypedSegment::Index(index));
            let result = f(self);
            self.typed_path.pop();
            result?;
            index += 1;
            if self.read_separator(b']')? {
                break;
            }
        }
        self.leave_container();
        Ok(())
    }

    /// Reads the next value untyped as [`Value`]
    ///
    /// `$ref` pointers are resolved against the document root. Reading a nested value
    /// fails with [`JsonError::UnresolvedReference`] if one of its pointers targets a
    /// value outside of it, because that value is not materialized by this call.
    pub fn read_value(&mut self) -> Result<Value, JsonError> {
        self.decode_resolved(&mut ValueBuilder)
    }

    /// Reads a value of a type implementing [`Decode`](super::Decode)
    pub fn read<T: super::Decode>(&mut self) -> Result<T, JsonError> {
        T::decode(self)
    }

    /// Skips the next value
    pub fn skip_value(&mut self) -> Result<(), JsonError> {
        self.cursor.skip_whitespace();
        Ok(self.cursor.skip_value()?)
    }
}
