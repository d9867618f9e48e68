//! Object graph loader.
//!
//! Walks everything reachable from chosen keys of a dictionary, fetching
//! each reference once, so that later stages find every object already in
//! the table's cache. The walk uses an explicit worklist and a visited set
//! of references; cycles terminate and no reference is fetched twice.
//!
//! # Hazard
//!
//! The walk follows every reference it meets. A seed that reaches the
//! catalog, a `/Parent` link or a sibling page will load the whole document.
//! Seed with the resource sub-dictionaries a page actually uses
//! ([`RESOURCE_KEYS`]), never with the page dictionary itself.

use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef, Resolve};
use std::collections::HashSet;

/// Resource categories whose objects the evaluator needs resolved.
pub const RESOURCE_KEYS: &[&str] = &["ExtGState", "ColorSpace", "Pattern", "Shading", "XObject", "Font"];

/// Outcome of one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// References fetched during this walk
    pub fetched: usize,
    /// References whose fetch failed (logged and skipped)
    pub failed: usize,
}

/// Depth-first loader over a resolver.
pub struct ObjectLoader<'a> {
    resolver: &'a dyn Resolve,
    visited: HashSet<ObjectRef>,
}

impl<'a> ObjectLoader<'a> {
    /// Create a loader with an empty visited set.
    pub fn new(resolver: &'a dyn Resolve) -> Self {
        Self {
            resolver,
            visited: HashSet::new(),
        }
    }

    /// References visited so far, across all walks of this loader.
    pub fn visited(&self) -> &HashSet<ObjectRef> {
        &self.visited
    }

    /// Walk the values stored under `keys` in `dict`.
    pub fn load(&mut self, dict: &Dictionary, keys: &[&str]) -> Result<LoadSummary> {
        let seeds: Vec<Object> = keys.iter().filter_map(|k| dict.get(k).cloned()).collect();
        self.walk(seeds)
    }

    /// Walk everything reachable from `value`.
    pub fn load_value(&mut self, value: &Object) -> Result<LoadSummary> {
        self.walk(vec![value.clone()])
    }

    fn walk(&mut self, mut worklist: Vec<Object>) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();

        while let Some(node) = worklist.pop() {
            let node = match node {
                Object::Reference(r) => {
                    if !self.visited.insert(r) {
                        continue;
                    }
                    match self.resolver.fetch(r) {
                        Ok(obj) => {
                            summary.fetched += 1;
                            obj
                        },
                        Err(e) => {
                            log::warn!("Object loader could not fetch {}: {}", r, e);
                            summary.failed += 1;
                            continue;
                        },
                    }
                },
                other => other,
            };
            push_children(&node, &mut worklist);
        }

        log::trace!("Object loader fetched {} objects ({} failed)", summary.fetched, summary.failed);
        Ok(summary)
    }
}

fn may_have_children(value: &Object) -> bool {
    matches!(
        value,
        Object::Reference(_) | Object::Dictionary(_) | Object::Stream(_) | Object::Array(_)
    )
}

/// Queue the children of a node. Stream data is never inspected, only the
/// stream dictionary.
fn push_children(node: &Object, worklist: &mut Vec<Object>) {
    let children: Box<dyn Iterator<Item = &Object>> = match node {
        Object::Dictionary(d) => Box::new(d.values()),
        Object::Stream(s) => Box::new(s.dict.values()),
        Object::Array(items) => Box::new(items.iter()),
        _ => return,
    };
    worklist.extend(children.filter(|v| may_have_children(v)).cloned());
}
