//! Tracking of containers which have already been encoded

use std::collections::HashMap;

use crate::{error::JsonError, path::Path, source::Identity, writer::CyclePolicy};

#[derive(Debug)]
struct Entry {
    /// Location of the first occurrence
    path: Path,
    /// Whether the first occurrence has been encoded completely
    finished: bool,
}

/// How a container has to be written
#[derive(PartialEq, Debug)]
pub(crate) enum Occurrence {
    /// First occurrence, encode it normally and call [`ReferenceCache::finish`] afterwards
    First,
    /// Write a pointer to the path of the first occurrence
    Pointer(Path),
    /// Write `null`
    Null,
}

/// Identities of the containers of one encoding call
#[derive(Debug)]
pub(crate) struct ReferenceCache {
    entries: HashMap<Identity, Entry>,
    policy: CyclePolicy,
    null_shared_references: bool,
}

impl ReferenceCache {
    pub fn new(policy: CyclePolicy, null_shared_references: bool) -> Self {
        ReferenceCache {
            entries: HashMap::new(),
            policy,
            null_shared_references,
        }
    }

    /// Looks up the container with `identity` which is about to be written at `path`
    pub fn visit(&mut self, identity: Identity, path: &Path) -> Result<Occurrence, JsonError> {
        let Some(entry) = self.entries.get(&identity) else {
            self.entries.insert(
                identity,
                Entry {
                    path: path.clone(),
                    finished: false,
                },
            );
            return Ok(Occurrence::First);
        };

        match self.policy {
            CyclePolicy::EmitPointer => Ok(Occurrence::Pointer(entry.path.clone())),
            CyclePolicy::Error => {
                if entry.finished {
                    Ok(Occurrence::Pointer(entry.path.clone()))
                } else {
                    Err(JsonError::LoopReference {
                        target: entry.path.to_ref_string(),
                        path: path.to_ref_string(),
                    })
                }
            }
            CyclePolicy::EmitNull => {
                if !entry.finished {
                    log::debug!("writing null for cyclic reference at {path} to {}", entry.path);
                    Ok(Occurrence::Null)
                } else if self.null_shared_references {
                    Ok(Occurrence::Null)
                } else {
                    Ok(Occurrence::Pointer(entry.path.clone()))
                }
            }
        }
    }

    /// Marks the first occurrence of the container with `identity` as completely written
    pub fn finish(&mut self, identity: Identity) {
        if let Some(entry) = self.entries.get_mut(&identity) {
            entry.finished = true;
        }
    }
}
