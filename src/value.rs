//! Generic value tree
//!
//! [`Value`] is the untyped representation of a JSON document. Arrays and objects are
//! shared containers: cloning an [`Array`] or [`Object`] yields another handle to the same
//! container, which gives every container an identity. This is what allows decoded `$ref`
//! pointers to refer to the identical container instance as their target, and what allows
//! encoding shared and cyclic values.
//!
//! Values containing cycles are never freed unless the cycle is broken, for example by
//! replacing the member which closes the cycle.

use std::{
    cell::{Ref, RefCell},
    fmt::{Debug, Formatter},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    error::JsonError,
    number::Number,
    path::{Path, PathSegment},
    reader::PushSink,
    source::{ChildSink, Identity, Key, PullSource, Scalar, Shape},
};

/// JSON value
#[derive(Clone, Default)]
pub enum Value {
    /// JSON `null`
    #[default]
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(Number),
    /// JSON string
    String(String),
    /// JSON array
    Array(Array),
    /// JSON object
    Object(Object),
}

/// Shared JSON array
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

/// Shared JSON object, preserving the insertion order of its members
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Value>>>);

impl Array {
    /// Creates an empty array
    pub fn new() -> Self {
        Array::default()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the array has no items
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Appends an item
    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Gets the item at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Replaces the item at `index`, returning `false` if there is no such item
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        match self.0.borrow_mut().get_mut(index) {
            Some(item) => {
                *item = value.into();
                true
            }
            None => false,
        }
    }

    /// Borrows the items
    ///
    /// # Panics
    /// Panics if the array is currently being modified.
    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Whether both handles refer to the same array
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the array
    pub fn identity(&self) -> Identity {
        Identity::of(Rc::as_ptr(&self.0))
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Array(Rc::new(RefCell::new(items)))
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Array::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl Object {
    /// Creates an empty object
    pub fn new() -> Self {
        Object::default()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the object has no members
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Sets a member, returning the previous value
    ///
    /// Replacing an existing member keeps its position.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(name.into(), value.into())
    }

    /// Gets the value of a member
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    /// Member names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Borrows the members
    ///
    /// # Panics
    /// Panics if the object is currently being modified.
    pub fn members(&self) -> Ref<'_, IndexMap<String, Value>> {
        self.0.borrow()
    }

    /// Whether both handles refer to the same object
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the object
    pub fn identity(&self) -> Identity {
        Identity::of(Rc::as_ptr(&self.0))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let members = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Object(Rc::new(RefCell::new(members)))
    }
}

impl Value {
    /// Whether the value is `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Gets the value as `bool`, if it is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Gets the value as number, if it is a number
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Gets the value as `str`, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Gets the value as array, if it is an array
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Gets the value as object, if it is an object
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Whether both values are the same array or the same object
    ///
    /// Scalars are never identical, even if they are equal.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Gets the child at `segment`, if this is a container
    ///
    /// Object members whose name consists of decimal digits can be addressed with
    /// [`PathSegment::Index`] as well, and array items with a [`PathSegment::Name`]
    /// consisting of decimal digits.
    pub fn child(&self, segment: &PathSegment) -> Option<Value> {
        match (self, segment) {
            (Value::Array(array), PathSegment::Index(index)) => array.get(*index),
            (Value::Array(array), PathSegment::Name(name)) => array.get(name.parse().ok()?),
            (Value::Object(object), PathSegment::Name(name)) => object.get(name),
            (Value::Object(object), PathSegment::Index(index)) => object.get(&index.to_string()),
            _ => None,
        }
    }

    /// Gets the value at `path` relative to this value
    pub fn pointer(&self, path: &Path) -> Option<Value> {
        let mut current = self.clone();
        for segment in path.segments() {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

#[duplicate::duplicate_item(
    type_template conversion;
    [bool] [Value::Bool];
    [i32] [|n: i32| Value::Number(n.into())];
    [i64] [|n: i64| Value::Number(n.into())];
    [f64] [|n: f64| Value::Number(n.into())];
    [Number] [Value::Number];
    [String] [Value::String];
    [Array] [Value::Array];
    [Object] [Value::Object];
)]
impl From<type_template> for Value {
    fn from(value: type_template) -> Self {
        (conversion)(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Structural equality
///
/// Containers which are identical are equal without comparing their content. Comparing
/// different containers which contain cycles does not terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.items() == *other.items()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        // Member order is significant
        self.ptr_eq(other) || self.members().iter().eq(other.members().iter())
    }
}

/// Nesting depth up to which `Debug` prints containers; cyclic values would otherwise
/// print forever
const MAX_DEBUG_DEPTH: usize = 32;

struct DebugValue<'a> {
    value: &'a Value,
    depth: usize,
}

impl Debug for DebugValue<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let depth = self.depth + 1;
        match self.value {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(_) | Value::Object(_) if depth > MAX_DEBUG_DEPTH => f.write_str(".."),
            Value::Array(array) => f
                .debug_list()
                .entries(array.items().iter().map(|value| DebugValue { value, depth }))
                .finish(),
            Value::Object(object) => f
                .debug_map()
                .entries(
                    object
                        .members()
                        .iter()
                        .map(|(name, value)| (name, DebugValue { value, depth })),
                )
                .finish(),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        DebugValue {
            value: self,
            depth: 0,
        }
        .fmt(f)
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Array")?;
        Debug::fmt(&Value::Array(self.clone()), f)
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object")?;
        Debug::fmt(&Value::Object(self.clone()), f)
    }
}

impl PullSource for Value {
    fn shape(&self) -> Shape {
        match self {
            Value::Array(_) => Shape::Array,
            Value::Object(_) => Shape::Object,
            _ => Shape::Scalar,
        }
    }

    fn identity(&self) -> Option<Identity> {
        match self {
            Value::Array(array) => Some(array.identity()),
            Value::Object(object) => Some(object.identity()),
            _ => None,
        }
    }

    fn scalar(&self) -> Scalar<'_> {
        match self {
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => (*n).into(),
            Value::String(s) => Scalar::Str(s),
            _ => Scalar::Null,
        }
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        match self {
            Value::Array(array) => {
                for (index, item) in array.items().iter().enumerate() {
                    sink.child(Key::Index(index), item)?;
                }
            }
            Value::Object(object) => {
                for (name, value) in object.members().iter() {
                    sink.child(Key::Name(name), value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn visit_child(
        &self,
        segment: &PathSegment,
        visitor: &mut dyn FnMut(&dyn PullSource) -> Result<(), JsonError>,
    ) -> Result<bool, JsonError> {
        match self.child(segment) {
            Some(child) => {
                visitor(&child)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// [`PushSink`] which materializes [`Value`]s
#[derive(Clone, Copy, Default, Debug)]
pub struct ValueBuilder;

impl PushSink for ValueBuilder {
    type Value = Value;

    fn null(&mut self) -> Value {
        Value::Null
    }

    fn bool(&mut self, value: bool) -> Value {
        Value::Bool(value)
    }

    fn number(&mut self, value: Number) -> Value {
        Value::Number(value)
    }

    fn string(&mut self, value: String) -> Value {
        Value::String(value)
    }

    fn new_object(&mut self) -> Value {
        Value::Object(Object::new())
    }

    fn new_array(&mut self) -> Value {
        Value::Array(Array::new())
    }

    fn set_member(&mut self, object: &Value, name: String, value: Value) {
        if let Value::Object(object) = object {
            object.insert(name, value);
        }
    }

    fn push_item(&mut self, array: &Value, value: Value) {
        if let Value::Array(array) = array {
            array.push(value);
        }
    }

    fn set_item(&mut self, array: &Value, index: usize, value: Value) {
        if let Value::Array(array) = array {
            array.set(index, value);
        }
    }

    fn child(&mut self, container: &Value, segment: &PathSegment) -> Option<Value> {
        container.child(segment)
    }

    fn identity(&self, value: &Value) -> Option<Identity> {
        PullSource::identity(value)
    }
}
