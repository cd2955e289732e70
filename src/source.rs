//! Pull source abstraction used by the serializer
//!
//! A [`PullSource`] describes a host value without runtime reflection: it reports its
//! [`Shape`], optionally an [`Identity`] used to detect shared and cyclic references, a
//! [`Scalar`] for scalar values, and it pushes its children to a [`ChildSink`].
//!
//! Implementations are provided for the primitive types, strings, `Option`, `Vec`,
//! slices, maps with string keys, the smart pointers `Box`, `Rc` and `Arc`, and
//! [`Value`](crate::value::Value).
//!
//! # Examples
//! ```
//! # use jsongraph::source::*;
//! # use jsongraph::JsonError;
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl PullSource for Point {
//!     fn shape(&self) -> Shape {
//!         Shape::Object
//!     }
//!
//!     fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
//!         sink.child(Key::Name("x"), &self.x)?;
//!         sink.child(Key::Name("y"), &self.y)
//!     }
//! }
//!
//! assert_eq!(r#"{"x":1,"y":2}"#, jsongraph::to_string(&Point { x: 1, y: 2 })?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    rc::Rc,
    sync::Arc,
};

use duplicate::duplicate_item;
use indexmap::IndexMap;

use crate::{
    error::JsonError,
    number::{Decimal, Number},
    path::PathSegment,
};

/// Opaque token identifying one in-memory object instance
///
/// The token must stay stable and unique for the duration of one encoding call. For
/// values behind `Rc` or `Arc` the address of the shared allocation is used.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Identity(usize);

impl Identity {
    /// Creates an identity from an externally supplied stable id
    pub fn from_raw(id: usize) -> Self {
        Identity(id)
    }

    /// Creates an identity from the address of a shared allocation
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Identity(ptr.cast::<()>() as usize)
    }
}

/// Shape of a value
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum Shape {
    /// Scalar value, see [`PullSource::scalar`]
    Scalar,
    /// Sequence of items, written as JSON array
    Array,
    /// Collection of named members, written as JSON object
    Object,
}

/// Key of a child value
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Key<'a> {
    /// Member name within an object
    Name(&'a str),
    /// Item index within an array
    Index(usize),
}

impl Key<'_> {
    /// Whether this key addresses the same child as the path segment
    ///
    /// Member names consisting of decimal digits match index segments, because the
    /// textual path form cannot distinguish them.
    pub fn matches(&self, segment: &PathSegment) -> bool {
        match (self, segment) {
            (Key::Name(name), PathSegment::Name(segment)) => *name == segment.as_str(),
            (Key::Index(index), PathSegment::Index(segment)) => index == segment,
            (Key::Name(name), PathSegment::Index(segment)) => {
                name.parse::<usize>().ok() == Some(*segment)
            }
            (Key::Index(index), PathSegment::Name(segment)) => {
                segment.parse::<usize>().ok() == Some(*index)
            }
        }
    }

    /// Converts the key to an owned path segment
    pub fn to_segment(&self) -> PathSegment {
        match *self {
            Key::Name(name) => PathSegment::Name(name.to_owned()),
            Key::Index(index) => PathSegment::Index(index),
        }
    }
}

/// Scalar value staged by a [`PullSource`]
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Scalar<'a> {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// Signed integer
    I64(i64),
    /// Unsigned integer
    U64(u64),
    /// Floating point number; non-finite values are written as `null`
    F64(f64),
    /// Exact decimal number
    Decimal(Decimal),
    /// String
    Str(&'a str),
}

impl Scalar<'_> {
    /// Declared kind of the scalar
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Null => ScalarKind::Null,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::I64(_) | Scalar::U64(_) => ScalarKind::Integer,
            Scalar::F64(_) => ScalarKind::Float,
            Scalar::Decimal(_) => ScalarKind::Decimal,
            Scalar::Str(_) => ScalarKind::String,
        }
    }

    /// Whether this is a number equal to zero
    pub fn is_zero(&self) -> bool {
        match *self {
            Scalar::I64(n) => n == 0,
            Scalar::U64(n) => n == 0,
            Scalar::F64(n) => n == 0.0,
            Scalar::Decimal(d) => d.mantissa == 0,
            _ => false,
        }
    }
}

impl From<Number> for Scalar<'_> {
    fn from(value: Number) -> Self {
        match value {
            Number::I32(n) => Scalar::I64(n.into()),
            Number::I64(n) => Scalar::I64(n),
            Number::F64(n) => Scalar::F64(n),
            Number::Decimal(d) => Scalar::Decimal(d),
        }
    }
}

/// Kind of a [`Scalar`], passed to [`ValueFilter`](crate::writer::ValueFilter)s
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum ScalarKind {
    /// `null`
    Null,
    /// `true` or `false`
    Bool,
    /// Signed or unsigned integer
    Integer,
    /// Floating point number
    Float,
    /// Exact decimal number
    Decimal,
    /// String
    String,
}

/// Receiver of the children of a [`PullSource`]
pub trait ChildSink {
    /// Accepts the child `value` at `key`
    fn child(&mut self, key: Key<'_>, value: &dyn PullSource) -> Result<(), JsonError>;
}

/// Host value which can be encoded
pub trait PullSource {
    /// Shape of this value
    fn shape(&self) -> Shape;

    /// Identity token, used for detecting shared and cyclic references
    ///
    /// Value-like types return `None` (the default) and are never reference-tracked.
    fn identity(&self) -> Option<Identity> {
        None
    }

    /// Scalar value, only called if the shape is [`Shape::Scalar`]
    fn scalar(&self) -> Scalar<'_> {
        Scalar::Null
    }

    /// Pushes all children to the sink, in order
    ///
    /// Only called if the shape is [`Shape::Array`] or [`Shape::Object`]. Array items
    /// must use [`Key::Index`], object members [`Key::Name`].
    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        let _ = sink;
        Ok(())
    }

    /// Calls `visitor` with the child at `segment`
    ///
    /// Returns whether the child exists. The default implementation looks for the
    /// child using [`push_children`](Self::push_children).
    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        struct Finder<'s, 'v> {
            segment: &'s PathSegment,
            visitor: &'v mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
            found: bool,
        }
        impl ChildSink for Finder<'_, '_> {
            fn child(&mut self, key: Key<'_>, value: &dyn PullSource) -> Result<(), JsonError> {
                if !self.found && key.matches(self.segment) {
                    self.found = true;
                    (self.visitor)(value)?;
                }
                Ok(())
            }
        }

        if self.shape() == Shape::Scalar {
            return Ok(false);
        }
        let mut finder = Finder {
            segment,
            visitor,
            found: false,
        };
        self.push_children(&mut finder)?;
        Ok(finder.found)
    }
}

/// Calls `visitor` with the value at `segments` below `source`
///
/// Returns whether the value exists.
pub fn visit_path(
    source: &dyn PullSource,
    segments: &[&PathSegment],
    visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
) -> Result<bool, JsonError> {
    match segments.split_first() {
        None => {
            visitor(source)?;
            Ok(true)
        }
        Some((first, rest)) => {
            let mut found = false;
            let child_found = source.visit_child(first, &mut |child| {
                found = visit_path(child, rest, visitor)?;
                Ok(())
            })?;
            Ok(child_found && found)
        }
    }
}

#[duplicate_item(type_template; [i8]; [i16]; [i32]; [i64])]
impl PullSource for type_template {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        Scalar::I64((*self).into())
    }
}

#[duplicate_item(type_template; [u8]; [u16]; [u32]; [u64])]
impl PullSource for type_template {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        Scalar::U64((*self).into())
    }
}

#[duplicate_item(type_template scalar_variant target; [isize] [I64] [i64]; [usize] [U64] [u64])]
impl PullSource for type_template {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        // Lossless on all supported platforms
        Scalar::scalar_variant(*self as target)
    }
}

#[duplicate_item(type_template; [f32]; [f64])]
impl PullSource for type_template {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    #[allow(clippy::useless_conversion)] // for f64 -> f64
    fn scalar(&self) -> Scalar<'_> {
        Scalar::F64((*self).into())
    }
}

impl PullSource for bool {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        Scalar::Bool(*self)
    }
}

#[duplicate_item(type_template; [str]; [String])]
impl PullSource for type_template {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        Scalar::Str(self)
    }
}

impl PullSource for Number {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        (*self).into()
    }
}

impl PullSource for Decimal {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn scalar(&self) -> Scalar<'_> {
        Scalar::Decimal(*self)
    }
}

impl<T: PullSource> PullSource for Option<T> {
    fn shape(&self) -> Shape {
        match self {
            Some(value) => value.shape(),
            None => Shape::Scalar,
        }
    }

    fn identity(&self) -> Option<Identity> {
        self.as_ref().and_then(PullSource::identity)
    }

    fn scalar(&self) -> Scalar<'_> {
        match self {
            Some(value) => value.scalar(),
            None => Scalar::Null,
        }
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        match self {
            Some(value) => value.push_children(sink),
            None => Ok(()),
        }
    }

    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        match self {
            Some(value) => value.visit_child(segment, visitor),
            None => Ok(false),
        }
    }
}

// Plain references and boxes are not shared ownership, so they have no identity
// of their own and delegate everything
#[duplicate_item(pointer_type; [&T]; [Box<T>])]
impl<T: PullSource + ?Sized> PullSource for pointer_type {
    fn shape(&self) -> Shape {
        (**self).shape()
    }

    fn identity(&self) -> Option<Identity> {
        (**self).identity()
    }

    fn scalar(&self) -> Scalar<'_> {
        (**self).scalar()
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        (**self).push_children(sink)
    }

    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        (**self).visit_child(segment, visitor)
    }
}

#[duplicate_item(shared_type; [Rc]; [Arc])]
impl<T: PullSource + ?Sized> PullSource for shared_type<T> {
    fn shape(&self) -> Shape {
        (**self).shape()
    }

    /// Identity of the inner value if it has one, otherwise the address of the shared
    /// allocation for arrays and objects
    fn identity(&self) -> Option<Identity> {
        match (**self).identity() {
            Some(identity) => Some(identity),
            None if self.shape() != Shape::Scalar => Some(Identity::of(shared_type::as_ptr(self))),
            None => None,
        }
    }

    fn scalar(&self) -> Scalar<'_> {
        (**self).scalar()
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        (**self).push_children(sink)
    }

    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        (**self).visit_child(segment, visitor)
    }
}

#[duplicate_item(sequence_type; [Vec<T>]; [[T]])]
impl<T: PullSource> PullSource for sequence_type {
    fn shape(&self) -> Shape {
        Shape::Array
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        for (index, item) in self.iter().enumerate() {
            sink.child(Key::Index(index), item)?;
        }
        Ok(())
    }

    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        let index = match segment {
            PathSegment::Index(index) => Some(*index),
            PathSegment::Name(name) => name.parse().ok(),
        };
        match index.and_then(|index| self.get(index)) {
            Some(item) => {
                visitor(item)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[duplicate_item(
    map_type;
    [BTreeMap<String, V>];
    [HashMap<String, V>];
    [IndexMap<String, V>];
)]
impl<V: PullSource> PullSource for map_type {
    fn shape(&self) -> Shape {
        Shape::Object
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        for (name, value) in self {
            sink.child(Key::Name(name), value)?;
        }
        Ok(())
    }

    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        let value = match segment {
            PathSegment::Name(name) => self.get(name.as_str()),
            PathSegment::Index(index) => self.get(index.to_string().as_str()),
        };
        match value {
            Some(value) => {
                visitor(value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    struct Collector(Vec<String>);

    impl ChildSink for Collector {
        fn child(&mut self, key: Key<'_>, value: &dyn PullSource) -> Result<(), JsonError> {
            self.0.push(format!("{key:?}={:?}", value.scalar()));
            Ok(())
        }
    }

    #[test]
    fn scalars() {
        assert_eq!(Scalar::I64(-3), (-3_i8).scalar());
        assert_eq!(Scalar::U64(u64::MAX), u64::MAX.scalar());
        assert_eq!(Scalar::U64(7), 7_usize.scalar());
        assert_eq!(Scalar::F64(1.5), 1.5_f32.scalar());
        assert_eq!(Scalar::Str("a"), "a".scalar());
        assert_eq!(Scalar::Str("b"), "b".to_owned().scalar());
        assert_eq!(Scalar::Null, None::<bool>.scalar());
        assert_eq!(Scalar::Bool(true), Some(true).scalar());
        assert_eq!(Shape::Scalar, None::<Vec<i32>>.shape());
        assert_eq!(ScalarKind::Integer, Scalar::U64(1).kind());
        assert!(Scalar::F64(-0.0).is_zero());
        assert!(!Scalar::Str("").is_zero());
    }

    #[test]
    fn children() -> TestResult {
        let mut collector = Collector(Vec::new());
        vec![1, 2].push_children(&mut collector)?;
        assert_eq!(vec!["Index(0)=I64(1)", "Index(1)=I64(2)"], collector.0);

        let mut map = IndexMap::new();
        map.insert("b".to_owned(), true);
        map.insert("a".to_owned(), false);
        let mut collector = Collector(Vec::new());
        map.push_children(&mut collector)?;
        assert_eq!(
            vec!["Name(\"b\")=Bool(true)", "Name(\"a\")=Bool(false)"],
            collector.0
        );
        Ok(())
    }

    #[test]
    fn identity() {
        let shared = Rc::new(vec![1]);
        let other = Rc::clone(&shared);
        assert!(shared.identity().is_some());
        assert_eq!(shared.identity(), other.identity());
        assert_ne!(shared.identity(), Rc::new(vec![1]).identity());
        assert_eq!(shared.identity(), (&shared).identity());

        // Scalars are never tracked
        assert_eq!(None, Rc::new(1).identity());
        assert_eq!(None, Arc::new("a").identity());
        assert_eq!(None, Box::new(vec![1]).identity());
    }

    #[test]
    fn visit() -> TestResult {
        let mut map = BTreeMap::new();
        map.insert("1".to_owned(), vec![vec![10, 11], vec![12]]);
        let segments = [PathSegment::Index(1), PathSegment::Index(0), PathSegment::Name("1".to_owned())];
        let segments: Vec<&PathSegment> = segments.iter().collect();

        let mut visited = Vec::new();
        let found = visit_path(&map, &segments, &mut |value| {
            visited.push(value.scalar().kind());
            Ok(())
        })?;
        assert!(found);
        assert_eq!(vec![ScalarKind::Integer], visited);

        let found = visit_path(&map, &segments[..1], &mut |value| {
            assert_eq!(Shape::Array, value.shape());
            Ok(())
        })?;
        assert!(found);

        let missing = [&PathSegment::Index(2)];
        assert!(!visit_path(&map, &missing, &mut |_| Ok(()))?);
        Ok(())
    }

    #[test]
    fn key_matching() {
        assert!(Key::Name("a").matches(&PathSegment::Name("a".to_owned())));
        assert!(Key::Name("3").matches(&PathSegment::Index(3)));
        assert!(Key::Index(3).matches(&PathSegment::Name("3".to_owned())));
        assert!(!Key::Index(3).matches(&PathSegment::Index(4)));
        assert_eq!(PathSegment::Index(2), Key::Index(2).to_segment());
    }
}
