//! Module for encoding values as JSON
//!
//! The serializer drives a [`PullSource`](crate::source::PullSource) and stages the
//! encoded text in an [`Arena`]. Output is either taken from the arena as a whole, or,
//! when a [`Write`] sink is provided, flushed to the sink whenever the arena reaches
//! its maximum size and once more at the end.
//!
//! # Shared and cyclic values
//! Containers whose source reports an [`Identity`](crate::source::Identity) are tracked
//! while encoding. When the same container is encountered again it is written as pointer
//! object `{"$ref":"#/path/to/first/occurrence"}`, or handled as configured by the
//! [`CyclePolicy`] if the container contains itself.

use std::{fmt::Debug, io::Write, sync::Arc};

use crate::{
    arena::{Arena, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_SIZE},
    error::JsonError,
    reader::DEFAULT_MAX_DEPTH,
    source::{PullSource, Scalar, ScalarKind},
    DepthPolicy,
};

mod references;
mod serializer;

use serializer::Serializer;

/// Handling of containers which are encountered again while they are being encoded
#[derive(PartialEq, Eq, Clone, Copy, Default, strum::Display, Debug)]
pub enum CyclePolicy {
    /// Fail with [`JsonError::LoopReference`]
    ///
    /// Containers which are referenced again after they have been encoded completely
    /// are not a cycle and are written as pointer object.
    #[default]
    Error,
    /// Write `null` for the reference which closes the cycle
    EmitNull,
    /// Write a pointer object for every repeated reference, including cycles
    EmitPointer,
}

/// Predicate deciding whether an object member with a scalar value is written
///
/// Implemented for functions and closures:
/// ```
/// # use jsongraph::source::*;
/// # use jsongraph::writer::*;
/// # use std::sync::Arc;
/// fn skip_private(name: &str, _kind: ScalarKind, _value: &Scalar<'_>) -> bool {
///     !name.starts_with('_')
/// }
///
/// let settings = EncodeSettings {
///     filter: Some(Arc::new(skip_private)),
///     ..Default::default()
/// };
/// # let _ = settings;
/// ```
pub trait ValueFilter {
    /// Whether the member `name` with the given scalar value should be written
    fn accept(&self, name: &str, kind: ScalarKind, value: &Scalar<'_>) -> bool;
}

impl<F: Fn(&str, ScalarKind, &Scalar<'_>) -> bool> ValueFilter for F {
    fn accept(&self, name: &str, kind: ScalarKind, value: &Scalar<'_>) -> bool {
        self(name, kind, value)
    }
}

/// Settings to customize the serializer behavior
///
/// To avoid repeating the default values for unchanged settings `..Default::default()`
/// can be used:
/// ```
/// # use jsongraph::writer::*;
/// EncodeSettings {
///     cycle_policy: CyclePolicy::EmitPointer,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone)]
pub struct EncodeSettings {
    /// Maximum nesting depth of arrays and objects
    ///
    /// Containers nested exactly `max_depth` levels deep are written; how deeper levels
    /// are handled is defined by the [`depth_policy`](Self::depth_policy).
    pub max_depth: usize,

    /// Handling of containers nested deeper than [`max_depth`](Self::max_depth)
    ///
    /// With [`DepthPolicy::Truncate`] such containers are written without their children.
    pub depth_policy: DepthPolicy,

    /// Whether to write every array item and object member on its own line
    ///
    /// Pretty printed output might for example look like this:
    /// ```json
    /// {
    ///   "a": [
    ///     1,
    ///     2
    ///   ]
    /// }
    /// ```
    /// Whereas compact output would look like this:
    /// ```json
    /// {"a":[1,2]}
    /// ```
    pub pretty_print: bool,

    /// Indentation written once per nesting level when pretty printing
    pub indent_unit: String,

    /// Line break written when pretty printing
    pub line_break: String,

    /// Text between a member name and its value, for example `":"` or `": "`
    ///
    /// Must consist of `:` and JSON whitespace for the output to remain valid JSON.
    pub key_value_separator: String,

    /// Whether object members with a `null` value are omitted
    pub ignore_null: bool,

    /// Whether object members with a number value equal to zero are omitted
    pub ignore_zero: bool,

    /// Whether object members with an empty string value are omitted
    pub ignore_empty_string: bool,

    /// Custom filter for object members with scalar values
    ///
    /// Only consulted for members the `ignore_...` settings have not omitted already.
    pub filter: Option<Arc<dyn ValueFilter + Send + Sync>>,

    /// Handling of containers which contain themselves
    pub cycle_policy: CyclePolicy,

    /// Whether repeated references to completely encoded containers are written as `null`
    /// instead of as pointer object
    ///
    /// Only has an effect with [`CyclePolicy::EmitNull`].
    pub null_shared_references: bool,

    /// Initial capacity of arenas created for encoding
    pub initial_capacity: usize,

    /// Maximum number of bytes which are staged in the arena
    ///
    /// When encoding to a [`Write`] sink the staged bytes are flushed to the sink once the
    /// arena reaches this size. Otherwise the encoding fails with [`JsonError::OutOfMemory`].
    pub max_arena_size: usize,
}

impl EncodeSettings {
    /// Creates settings for pretty printed output with two space indentation
    pub fn pretty() -> Self {
        EncodeSettings {
            pretty_print: true,
            key_value_separator: ": ".to_owned(),
            ..Default::default()
        }
    }
}

impl Default for EncodeSettings {
    /// Creates the default encode settings
    ///
    /// - max depth: 20
    /// - depth policy: [`DepthPolicy::Error`]
    /// - pretty print: disabled (= compact JSON will be written)
    /// - indent unit: two spaces
    /// - line break: `\n`
    /// - key value separator: `:`
    /// - ignore null, zero and empty strings: false
    /// - filter: none
    /// - cycle policy: [`CyclePolicy::Error`]
    /// - null shared references: false
    /// - initial capacity: 256 bytes
    /// - max arena size: unlimited
    fn default() -> Self {
        EncodeSettings {
            max_depth: DEFAULT_MAX_DEPTH,
            depth_policy: DepthPolicy::Error,
            pretty_print: false,
            indent_unit: "  ".to_owned(),
            line_break: "\n".to_owned(),
            key_value_separator: ":".to_owned(),
            ignore_null: false,
            ignore_zero: false,
            ignore_empty_string: false,
            filter: None,
            cycle_policy: CyclePolicy::Error,
            null_shared_references: false,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_arena_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl Debug for EncodeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeSettings")
            .field("max_depth", &self.max_depth)
            .field("depth_policy", &self.depth_policy)
            .field("pretty_print", &self.pretty_print)
            .field("indent_unit", &self.indent_unit)
            .field("line_break", &self.line_break)
            .field("key_value_separator", &self.key_value_separator)
            .field("ignore_null", &self.ignore_null)
            .field("ignore_zero", &self.ignore_zero)
            .field("ignore_empty_string", &self.ignore_empty_string)
            .field("filter", &self.filter.as_ref().map(|_| "<filter>"))
            .field("cycle_policy", &self.cycle_policy)
            .field("null_shared_references", &self.null_shared_references)
            .field("initial_capacity", &self.initial_capacity)
            .field("max_arena_size", &self.max_arena_size)
            .finish()
    }
}

/// Encodes `source` into `arena`
///
/// Without `sink` the complete output is staged in the arena. With `sink` the output is
/// flushed to the sink whenever the arena is full, and the remainder at the end; the
/// arena is empty afterwards. Output which was already flushed is not rolled back when
/// encoding fails.
pub fn encode_into(
    source: &dyn PullSource,
    settings: &EncodeSettings,
    arena: &mut Arena,
    sink: Option<&mut dyn Write>,
) -> Result<(), JsonError> {
    let mut serializer = Serializer::new(settings, arena, sink);
    serializer.encode_root(source)?;
    serializer.finish()
}
