//! Deferred resolution of `$ref` pointers
//!
//! Pointers are recorded while the document is read, with a `null` placeholder written
//! at their location. Once the root value is complete every pointer is resolved by
//! walking its target path from the root and writing the target into the location.
//!
//! A pointer whose target path passes through the location of another pending pointer
//! (for example `{"a": {"$ref": "#/b"}, "c": {"$ref": "#/a/x"}}`) resolves that
//! pointer first.

use std::collections::HashMap;

use crate::{
    error::JsonError,
    path::{Path, PathSegment},
    reader::PushSink,
    source::Identity,
};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum LinkState {
    Pending,
    InProgress,
    Done,
}

/// Outcome of walking a target path
enum Walk<V> {
    Found(V),
    /// The path passes through the location of a pointer which is not resolved yet
    Blocked(usize),
}

#[derive(Debug)]
struct DeferredLink<V> {
    target: Path,
    container: V,
    key: PathSegment,
    state: LinkState,
}

/// Pending pointers of one decoding call
#[derive(Debug)]
pub(crate) struct DeferredLinks<V> {
    links: Vec<DeferredLink<V>>,
    /// Container identity and stringified key of each link location, to find the link
    /// for a location in constant time
    by_location: HashMap<(Identity, String), usize>,
    /// Number of leading target segments which address the decoded value, when it is
    /// not the document root
    base_len: usize,
}

impl<V: Clone> DeferredLinks<V> {
    pub fn new() -> Self {
        DeferredLinks {
            links: Vec::new(),
            by_location: HashMap::new(),
            base_len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Resolves pointers relative to the value at `base` instead of the document root
    ///
    /// Fails if any pointer targets a value outside of `base`.
    pub fn set_base(&mut self, base: &Path) -> Result<(), JsonError> {
        let prefix = base.segments();
        for link in &self.links {
            let segments = link.target.segments();
            if segments.len() < prefix.len() || segments[..prefix.len()] != prefix[..] {
                return Err(JsonError::UnresolvedReference {
                    path: link.target.to_ref_string(),
                    reason: "target is outside of the decoded value",
                });
            }
        }
        self.base_len = prefix.len();
        Ok(())
    }

    /// Records a pointer to `target` located in `container` at `key`
    pub fn defer<S: PushSink<Value = V>>(
        &mut self,
        sink: &S,
        target: Path,
        container: V,
        key: PathSegment,
    ) {
        let index = self.links.len();
        if let Some(identity) = sink.identity(&container) {
            self.by_location.insert((identity, key.to_string()), index);
        }
        self.links.push(DeferredLink {
            target,
            container,
            key,
            state: LinkState::Pending,
        });
    }

    /// Resolves all pointers in the order they were recorded
    pub fn resolve<S: PushSink<Value = V>>(&mut self, sink: &mut S, root: &V) -> Result<(), JsonError> {
        if self.links.is_empty() {
            return Ok(());
        }
        log::debug!("resolving {} deferred references", self.links.len());
        for index in 0..self.links.len() {
            self.resolve_link(index, sink, root)?;
        }
        Ok(())
    }

    /// Resolves the link at `index` and every pending link its target passes through
    ///
    /// Dependencies are tracked on an explicit stack, so long pointer-to-pointer chains do
    /// not grow the call stack.
    fn resolve_link<S: PushSink<Value = V>>(
        &mut self,
        index: usize,
        sink: &mut S,
        root: &V,
    ) -> Result<(), JsonError> {
        if self.links[index].state == LinkState::Done {
            return Ok(());
        }
        self.links[index].state = LinkState::InProgress;
        let mut stack = vec![index];

        while let Some(&current) = stack.last() {
            match self.walk_target(current, sink, root)? {
                Walk::Found(value) => {
                    let link = &mut self.links[current];
                    match &link.key {
                        PathSegment::Name(name) => {
                            sink.set_member(&link.container, name.clone(), value)
                        }
                        PathSegment::Index(item_index) => {
                            sink.set_item(&link.container, *item_index, value)
                        }
                    }
                    link.state = LinkState::Done;
                    stack.pop();
                }
                Walk::Blocked(dependency) => {
                    let link = &mut self.links[dependency];
                    if link.state == LinkState::InProgress {
                        return Err(JsonError::UnresolvedReference {
                            path: link.target.to_ref_string(),
                            reason: "pointers form a cycle",
                        });
                    }
                    link.state = LinkState::InProgress;
                    stack.push(dependency);
                }
            }
        }
        Ok(())
    }

    /// Walks the target path of the link at `index` from the root
    fn walk_target<S: PushSink<Value = V>>(
        &self,
        index: usize,
        sink: &mut S,
        root: &V,
    ) -> Result<Walk<V>, JsonError> {
        let target = &self.links[index].target;
        let mut current = root.clone();
        for segment in target.segments().into_iter().skip(self.base_len) {
            if let Some(identity) = sink.identity(&current) {
                if let Some(&dependency) = self.by_location.get(&(identity, segment.to_string())) {
                    if self.links[dependency].state != LinkState::Done {
                        return Ok(Walk::Blocked(dependency));
                    }
                }
            }
            current = sink
                .child(&current, segment)
                .ok_or_else(|| JsonError::UnresolvedReference {
                    path: target.to_ref_string(),
                    reason: "target does not exist",
                })?;
        }
        Ok(Walk::Found(current))
    }
}
