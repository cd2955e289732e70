//! Provides integration with [Serde](https://docs.rs/serde/latest/serde/)
//!
//! [`Value`] and [`Number`] implement [`Serialize`], so decoded documents can be written
//! with any Serde format. To enable this optional integration, specify the `serde` feature
//! in your `Cargo.toml` file for the dependency on this crate:
//! ```toml
//! [dependencies]
//! jsongraph = { version = "...", features = ["serde"] }
//! ```
//!
//! Serde has no notion of shared values; a container which occurs multiple times is
//! serialized at every occurrence, and serializing a value which contains itself fails.
//! [`Decimal`](crate::number::Decimal) numbers are serialized as `f64`.

use ::serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{
    number::Number,
    source::{Identity, PullSource},
    value::Value,
};

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Number::I32(n) => serializer.serialize_i32(n),
            Number::I64(n) => serializer.serialize_i64(n),
            Number::F64(n) => serializer.serialize_f64(n),
            Number::Decimal(d) => serializer.serialize_f64(d.to_f64()),
        }
    }
}

/// Value together with the containers enclosing it, to detect cycles
struct Nested<'a> {
    value: &'a Value,
    parent: Option<&'a Nested<'a>>,
}

impl Nested<'_> {
    fn encloses(&self, identity: Identity) -> bool {
        let mut current = Some(self);
        while let Some(nested) = current {
            if nested.value.identity() == Some(identity) {
                return true;
            }
            current = nested.parent;
        }
        false
    }

    fn child<'c>(&'c self, value: &'c Value) -> Nested<'c> {
        Nested {
            value,
            parent: Some(self),
        }
    }
}

impl Serialize for Nested<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(parent) = self.parent {
            if let Some(identity) = self.value.identity() {
                if parent.encloses(identity) {
                    return Err(S::Error::custom("value contains itself"));
                }
            }
        }

        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(array) => {
                let items = array.items();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Object(object) => {
                let members = object.members();
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (name, value) in members.iter() {
                    map.serialize_entry(name, &self.child(value))?;
                }
                map.end()
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Nested {
            value: self,
            parent: None,
        }
        .serialize(serializer)
    }
}
