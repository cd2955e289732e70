//! Module for decoding JSON documents
//!
//! The [`Deserializer`] reads a document either untyped, materializing it through a
//! [`PushSink`] value factory, or typed, through the methods of the deserializer and the
//! [`Decode`] trait.
//!
//! # Lenient syntax
//! Besides regular JSON the deserializer accepts:
//! - strings quoted with `'`
//! - unquoted member names and unquoted scalar text, read up to the next `,`, `:`, `}` or `]`
//! - the literals `true`, `false` and `null` in any letter case, and `undefined` which is
//!   decoded as `null`
//! - a trailing comma before `}` or `]`
//!
//! # References
//! An object whose only member is `$ref` with a string value (for example
//! `{"$ref": "#/a/0"}`) is a pointer to another value of the document. Once the whole
//! document has been read, each pointer is replaced with the value it points to, so the
//! pointer and its target share the same container instance.

use std::collections::BTreeMap;

use duplicate::duplicate_item;
use indexmap::IndexMap;

use crate::{
    error::{JsonError, TokenKind},
    number::{Decimal, Number, NumberMode},
    path::PathSegment,
    source::Identity,
    value::Value,
    DepthPolicy,
};

mod cursor;
mod deserializer;
mod references;

pub use deserializer::Deserializer;

/// Default maximum nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Settings to customize the deserializer behavior
///
/// These settings are used by [`Deserializer::new`]. To avoid repeating the
/// default values for unchanged settings `..Default::default()` can be used:
/// ```
/// # use jsongraph::reader::DecodeSettings;
/// # use jsongraph::number::NumberMode;
/// DecodeSettings {
///     number_mode: NumberMode::Decimal,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct DecodeSettings {
    /// Maximum nesting depth of arrays and objects
    ///
    /// A document whose containers are nested exactly `max_depth` levels deep is decoded
    /// successfully; how deeper levels are handled is defined by the [`depth_policy`](Self::depth_policy).
    pub max_depth: usize,

    /// Handling of containers nested deeper than [`max_depth`](Self::max_depth)
    ///
    /// With [`DepthPolicy::Truncate`] the content of such a container is skipped and it is
    /// decoded as empty container.
    pub depth_policy: DepthPolicy,

    /// How numbers exceeding the precision of `i64` and `f64` are decoded into untyped slots
    pub number_mode: NumberMode,

    /// Whether `$ref` pointer objects are resolved
    ///
    /// If disabled, pointer objects are decoded as regular objects.
    pub resolve_references: bool,

    /// Maximum number of bytes which are staged when decoding from a reader
    ///
    /// Larger documents are rejected with [`JsonError::OutOfMemory`].
    pub max_arena_size: usize,
}

impl Default for DecodeSettings {
    /// Creates the default decode settings
    ///
    /// - max depth: 20
    /// - depth policy: [`DepthPolicy::Error`]
    /// - number mode: [`NumberMode::Auto`]
    /// - resolve references: true
    /// - max arena size: unlimited
    fn default() -> Self {
        DecodeSettings {
            max_depth: DEFAULT_MAX_DEPTH,
            depth_policy: DepthPolicy::Error,
            number_mode: NumberMode::Auto,
            resolve_references: true,
            max_arena_size: crate::arena::DEFAULT_MAX_SIZE,
        }
    }
}

/// Value factory which materializes decoded documents
///
/// Containers are created empty and children are added to them afterwards. Container
/// handles (`Self::Value`) must refer to the same underlying container when cloned, so
/// that `$ref` pointers can be resolved after the container has been added to its parent.
pub trait PushSink {
    /// Handle of a materialized value
    type Value: Clone;

    /// Creates a `null` value
    fn null(&mut self) -> Self::Value;
    /// Creates a boolean value
    fn bool(&mut self, value: bool) -> Self::Value;
    /// Creates a number value
    fn number(&mut self, value: Number) -> Self::Value;
    /// Creates a string value
    ///
    /// Also used for unquoted text and for numbers which cannot be represented without
    /// loss of precision.
    fn string(&mut self, value: String) -> Self::Value;
    /// Creates an empty object
    fn new_object(&mut self) -> Self::Value;
    /// Creates an empty array
    fn new_array(&mut self) -> Self::Value;

    /// Sets the member of an object; replaces an existing member with the same name
    /// but keeps its position
    fn set_member(&mut self, object: &Self::Value, name: String, value: Self::Value);
    /// Appends an item to an array
    fn push_item(&mut self, array: &Self::Value, value: Self::Value);
    /// Replaces an existing array item
    fn set_item(&mut self, array: &Self::Value, index: usize, value: Self::Value);

    /// Gets the child of a container, `None` if it does not exist
    ///
    /// Members whose name consists of decimal digits can be addressed with
    /// [`PathSegment::Index`] as well.
    fn child(&mut self, container: &Self::Value, segment: &PathSegment) -> Option<Self::Value>;

    /// Identity of a container
    ///
    /// Used to detect pointers whose target passes through another pointer. Sinks which
    /// return `None` (the default) still resolve such pointers if they occur in document
    /// order.
    fn identity(&self, value: &Self::Value) -> Option<Identity> {
        let _ = value;
        None
    }
}

/// Type which can be decoded with a [`Deserializer`]
///
/// # Examples
/// ```
/// # use jsongraph::reader::*;
/// # use jsongraph::JsonError;
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Decode for Point {
///     fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
///         let mut point = Point { x: 0, y: 0 };
///         deserializer.read_object(|deserializer, name| {
///             match name {
///                 "x" => point.x = deserializer.read_number()?,
///                 "y" => point.y = deserializer.read_number()?,
///                 _ => deserializer.skip_value()?,
///             }
///             Ok(())
///         })?;
///         Ok(point)
///     }
/// }
///
/// let point: Point = jsongraph::decode(r#"{"x": 1, "z": [], "y": 2}"#)?;
/// assert_eq!(Point { x: 1, y: 2 }, point);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Decode: Sized {
    /// Reads the next value
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError>;
}

#[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize]; [f32]; [f64]; [Decimal])]
impl Decode for type_template {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        deserializer.read_number()
    }
}

impl Decode for bool {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        deserializer.read_bool()
    }
}

impl Decode for String {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        deserializer.read_string()
    }
}

impl Decode for Value {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        deserializer.read_value()
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        match deserializer.peek()? {
            TokenKind::Null | TokenKind::Undefined => {
                deserializer.read_null()?;
                Ok(None)
            }
            _ => T::decode(deserializer).map(Some),
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        let mut items = Vec::new();
        deserializer.read_array(|deserializer| {
            items.push(T::decode(deserializer)?);
            Ok(())
        })?;
        Ok(items)
    }
}

#[duplicate_item(map_type; [BTreeMap]; [IndexMap])]
impl<T: Decode> Decode for map_type<String, T> {
    fn decode(deserializer: &mut Deserializer<'_>) -> Result<Self, JsonError> {
        let mut map = map_type::new();
        deserializer.read_object(|deserializer, name| {
            let value = T::decode(deserializer)?;
            map.insert(name.to_owned(), value);
            Ok(())
        })?;
        Ok(map)
    }
}
