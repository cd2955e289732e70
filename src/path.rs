//! Root-relative paths addressing values within a document
//!
//! A [`Path`] is an immutable chain of [`PathSegment`]s linked from the leaf back to the
//! root `#`. Creating a child path is cheap because the parent chain is shared.
//!
//! The textual form is the one used by `$ref` pointer objects: `#` for the root, and
//! otherwise `#` followed by `/`-separated segments, for example `#/users/0/name`.
//! Within member names the characters `/`, `\`, `"` and `%` are percent-escaped.

use std::{
    fmt::{Debug, Display, Formatter},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// One step of a [`Path`]
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum PathSegment {
    /// Name of a JSON object member
    Name(String),
    /// 0-based index of a JSON array item
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Name(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Name(value.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

struct PathNode {
    /// `None` for the root
    link: Option<(Path, PathSegment)>,
    /// Number of segments, excluding the root
    len: usize,
}

/// Immutable path from the document root to a value
#[derive(Clone)]
pub struct Path(Rc<PathNode>);

impl Path {
    /// The root path `#`
    pub fn root() -> Self {
        Path(Rc::new(PathNode { link: None, len: 0 }))
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.0.link.is_none()
    }

    /// Number of segments, not counting the root
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Creates the path of a child value
    pub fn child(&self, segment: impl Into<PathSegment>) -> Path {
        Path(Rc::new(PathNode {
            link: Some((self.clone(), segment.into())),
            len: self.0.len + 1,
        }))
    }

    /// Path of the enclosing value, `None` for the root
    pub fn parent(&self) -> Option<&Path> {
        self.0.link.as_ref().map(|(parent, _)| parent)
    }

    /// Last segment, `None` for the root
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.link.as_ref().map(|(_, segment)| segment)
    }

    /// Segments ordered from the root to the leaf
    pub fn segments(&self) -> Vec<&PathSegment> {
        let mut segments = Vec::with_capacity(self.len());
        let mut current = self;
        while let Some((parent, segment)) = &current.0.link {
            segments.push(segment);
            current = parent;
        }
        segments.reverse();
        segments
    }

    /// Formats the path in the textual `$ref` form
    pub fn to_ref_string(&self) -> String {
        // First pass: exact length
        let mut len = 1;
        let mut current = self;
        while let Some((parent, segment)) = &current.0.link {
            len += 1 + escaped_len(segment);
            current = parent;
        }

        // Second pass: write segments back-to-front, walking from leaf to root
        let mut buf = vec![0_u8; len];
        let mut end = len;
        let mut current = self;
        while let Some((parent, segment)) = &current.0.link {
            match segment {
                PathSegment::Name(name) => {
                    for &b in name.as_bytes().iter().rev() {
                        match escape_byte(b) {
                            Some(escaped) => {
                                end -= 3;
                                buf[end..end + 3].copy_from_slice(&escaped);
                            }
                            None => {
                                end -= 1;
                                buf[end] = b;
                            }
                        }
                    }
                }
                PathSegment::Index(index) => {
                    let mut itoa_buf = itoa::Buffer::new();
                    let digits = itoa_buf.format(*index).as_bytes();
                    end -= digits.len();
                    buf[end..end + digits.len()].copy_from_slice(digits);
                }
            }
            end -= 1;
            buf[end] = b'/';
            current = parent;
        }
        debug_assert_eq!(1, end);
        buf[0] = b'#';

        // Only ASCII bytes are substituted, so the result is always valid UTF-8
        match String::from_utf8(buf) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

fn escape_byte(b: u8) -> Option<[u8; 3]> {
    match b {
        b'/' => Some(*b"%2F"),
        b'\\' => Some(*b"%5C"),
        b'"' => Some(*b"%22"),
        b'%' => Some(*b"%25"),
        _ => None,
    }
}

fn escaped_len(segment: &PathSegment) -> usize {
    match segment {
        PathSegment::Name(name) => name
            .bytes()
            .map(|b| if escape_byte(b).is_some() { 3 } else { 1 })
            .sum(),
        PathSegment::Index(index) => {
            let mut itoa_buf = itoa::Buffer::new();
            itoa_buf.format(*index).len()
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self;
        let mut b = other;
        loop {
            if Rc::ptr_eq(&a.0, &b.0) {
                return true;
            }
            if a.0.len != b.0.len {
                return false;
            }
            match (&a.0.link, &b.0.link) {
                (None, None) => return true,
                (Some((parent_a, segment_a)), Some((parent_b, segment_b))) => {
                    if segment_a != segment_b {
                        return false;
                    }
                    a = parent_a;
                    b = parent_b;
                }
                _ => return false,
            }
        }
    }
}

impl Eq for Path {}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_ref_string())
    }
}

impl Debug for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Path({self})")
    }
}

// Deep chains would otherwise be dropped recursively
impl Drop for PathNode {
    fn drop(&mut self) {
        let mut next = self.link.take();
        while let Some((parent, _)) = next {
            match Rc::try_unwrap(parent.0) {
                Ok(mut node) => next = node.link.take(),
                Err(_) => break,
            }
        }
    }
}

/// Error for a malformed textual path
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("malformed path '{path}': {reason}")]
pub struct PathParseError {
    /// The path which could not be parsed
    pub path: String,
    /// Why parsing failed
    pub reason: &'static str,
}

impl FromStr for Path {
    type Err = PathParseError;

    /// Parses the textual `$ref` form
    ///
    /// Segments consisting only of decimal digits (without leading 0s) are parsed as
    /// [`PathSegment::Index`], all other segments as [`PathSegment::Name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason| PathParseError {
            path: s.to_owned(),
            reason,
        };

        let rest = s.strip_prefix('#').ok_or_else(|| error("does not start with '#'"))?;
        let mut path = Path::root();
        if rest.is_empty() {
            return Ok(path);
        }
        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| error("missing '/' after '#'"))?;

        for raw_segment in rest.split('/') {
            let segment = if is_index(raw_segment) {
                match raw_segment.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => return Err(error("index segment is too large")),
                }
            } else {
                PathSegment::Name(percent_decode(raw_segment).map_err(error)?)
            };
            path = path.child(segment);
        }
        Ok(path)
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'))
}

fn percent_decode(segment: &str) -> Result<String, &'static str> {
    if !segment.contains('%') {
        return Ok(segment.to_owned());
    }

    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or("incomplete percent escape")?;
            let high = hex_value(hex[0]).ok_or("invalid percent escape")?;
            let low = hex_value(hex[1]).ok_or("invalid percent escape")?;
            decoded.push(high << 4 | low);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).map_err(|_| "percent escapes are not valid UTF-8")
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn root() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(0, root.len());
        assert_eq!("#", root.to_ref_string());
        assert_eq!(None, root.parent());

        // A member named "#" is not the root
        let child = root.child("#");
        assert!(!child.is_root());
        assert_eq!("#/#", child.to_ref_string());
    }

    #[test]
    fn format() {
        let path = Path::root()
            .child("users")
            .child(12)
            .child("a/b\\c\"d%e")
            .child("\u{1F600}");
        assert_eq!(4, path.len());
        assert_eq!(
            "#/users/12/a%2Fb%5Cc%22d%25e/\u{1F600}",
            path.to_ref_string()
        );
        assert_eq!(path.to_ref_string(), path.to_string());
    }

    #[test]
    fn equality() {
        let a = Path::root().child("a").child(1);
        let b = Path::root().child("a").child(1);
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, Path::root().child("a"));
        assert_ne!(a, Path::root().child("a").child("1"));
        assert_ne!(a, Path::root().child("b").child(1));
        assert_eq!(Path::root(), Path::root());
    }

    #[test]
    fn parse() -> TestResult {
        assert_eq!(Path::root(), "#".parse()?);
        assert_eq!(
            Path::root()
                .child("x")
                .child(0)
                .child("a/b")
                .child("007")
                .child(""),
            "#/x/0/a%2fb/007/".parse()?
        );

        let path = Path::root().child("k%/\"\\").child(3).child("é");
        assert_eq!(path, path.to_ref_string().parse()?);
        assert_eq!(
            vec![
                &PathSegment::Name("k%/\"\\".to_owned()),
                &PathSegment::Index(3),
                &PathSegment::Name("é".to_owned())
            ],
            path.segments()
        );
        Ok(())
    }

    #[test]
    fn parse_malformed() {
        fn assert_malformed(path: &str, expected_reason: &str) {
            match path.parse::<Path>() {
                Err(e) => {
                    assert_eq!(path, e.path);
                    assert_eq!(expected_reason, e.reason);
                }
                Ok(p) => panic!("unexpected success for '{path}': {p:?}"),
            }
        }

        assert_malformed("", "does not start with '#'");
        assert_malformed("/a", "does not start with '#'");
        assert_malformed("#a", "missing '/' after '#'");
        assert_malformed("#/a%2", "incomplete percent escape");
        assert_malformed("#/a%zz", "invalid percent escape");
        assert_malformed("#/%FF", "percent escapes are not valid UTF-8");
        assert_malformed("#/99999999999999999999999", "index segment is too large");
    }

    #[test]
    fn deep_path_drop() {
        let mut path = Path::root();
        for i in 0..200_000 {
            path = path.child(i);
        }
        assert_eq!(200_000, path.len());
        drop(path);
    }
}
