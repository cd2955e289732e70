//! Common library module for integration tests
// See https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

// Not every test file uses every function
#![allow(dead_code)]

use std::path::PathBuf;

use jsongraph::{number::Number, value::Value};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn get_test_data_file_path() -> PathBuf {
    // Get path of test file, see https://stackoverflow.com/a/30004252
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/test_data.json");
    path
}

#[derive(PartialEq, Debug)]
pub enum JsonEvent {
    ArrayStart,
    ArrayEnd,
    ObjectStart,
    ObjectEnd,
    MemberName(String),

    StringValue(String),
    NumberValue(Number),
    BoolValue(bool),
    NullValue,
}

/// Flattens an acyclic value into events, in document order
pub fn collect_events(value: &Value) -> Vec<JsonEvent> {
    fn collect(value: &Value, events: &mut Vec<JsonEvent>) {
        match value {
            Value::Null => events.push(JsonEvent::NullValue),
            Value::Bool(b) => events.push(JsonEvent::BoolValue(*b)),
            Value::Number(n) => events.push(JsonEvent::NumberValue(*n)),
            Value::String(s) => events.push(JsonEvent::StringValue(s.clone())),
            Value::Array(array) => {
                events.push(JsonEvent::ArrayStart);
                for item in array.items().iter() {
                    collect(item, events);
                }
                events.push(JsonEvent::ArrayEnd);
            }
            Value::Object(object) => {
                events.push(JsonEvent::ObjectStart);
                for (name, value) in object.members().iter() {
                    events.push(JsonEvent::MemberName(name.clone()));
                    collect(value, events);
                }
                events.push(JsonEvent::ObjectEnd);
            }
        }
    }

    let mut events = Vec::new();
    collect(value, &mut events);
    events
}

fn name(name: &str) -> JsonEvent {
    JsonEvent::MemberName(name.to_owned())
}

fn string(value: &str) -> JsonEvent {
    JsonEvent::StringValue(value.to_owned())
}

fn number(value: impl Into<Number>) -> JsonEvent {
    JsonEvent::NumberValue(value.into())
}

/// Gets the events expected for the JSON document at the path returned by [`get_test_data_file_path`]
pub fn get_expected_events() -> Vec<JsonEvent> {
    vec![
        JsonEvent::ObjectStart,
        // Arrays
        name("arrays"),
        JsonEvent::ArrayStart,
        JsonEvent::ArrayStart,
        JsonEvent::ArrayEnd,
        //   Array with single item
        JsonEvent::ArrayStart,
        number(1),
        JsonEvent::ArrayEnd,
        //   Array with multiple items
        JsonEvent::ArrayStart,
        number(1),
        string("a"),
        JsonEvent::BoolValue(true),
        JsonEvent::ObjectStart,
        name("nested"),
        JsonEvent::ArrayStart,
        JsonEvent::ObjectStart,
        name("nested2"),
        JsonEvent::ArrayStart,
        number(2),
        JsonEvent::ArrayEnd,
        JsonEvent::ObjectEnd,
        JsonEvent::ArrayEnd,
        JsonEvent::ObjectEnd,
        JsonEvent::ArrayEnd,
        JsonEvent::ArrayEnd,
        // Objects
        name("objects"),
        JsonEvent::ArrayStart,
        JsonEvent::ObjectStart,
        JsonEvent::ObjectEnd,
        //   Object with single member
        JsonEvent::ObjectStart,
        name("name"),
        number(1),
        JsonEvent::ObjectEnd,
        //   Object with multiple members
        JsonEvent::ObjectStart,
        name("name1"),
        JsonEvent::BoolValue(false),
        name("name2"),
        string("value"),
        name(""),
        number(3),
        JsonEvent::ObjectEnd,
        JsonEvent::ArrayEnd,
        // Strings
        name("strings"),
        JsonEvent::ArrayStart,
        string("string value"),
        string("\0 test \n\t \\ \" /"),
        string("unicode § ಀ ᠅ 𝄆"),
        JsonEvent::ArrayEnd,
        // Numbers
        name("numbers"),
        JsonEvent::ArrayStart,
        number(0),
        number(-1234),
        number(567.89),
        number(100e-10),
        number(i64::MAX),
        number(-2_147_483_649_i64),
        JsonEvent::ArrayEnd,
        // Literals
        name("literals"),
        JsonEvent::ArrayStart,
        JsonEvent::BoolValue(true),
        JsonEvent::BoolValue(false),
        JsonEvent::NullValue,
        JsonEvent::ArrayEnd,
        // Lenient syntax
        name("lenient"),
        JsonEvent::ObjectStart,
        name("unquoted"),
        string("bare text"),
        name("single"),
        string("quoted"),
        name("flags"),
        JsonEvent::ArrayStart,
        JsonEvent::BoolValue(true),
        JsonEvent::NullValue,
        JsonEvent::NullValue,
        JsonEvent::ArrayEnd,
        JsonEvent::ObjectEnd,
        // References
        name("shared"),
        JsonEvent::ObjectStart,
        name("name"),
        number(1),
        JsonEvent::ObjectEnd,
        name("through"),
        number(1),
        JsonEvent::ObjectEnd,
    ]
}
