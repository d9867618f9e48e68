//! Document outline (bookmarks) and named destinations.
//!
//! Both structures are linked lists and trees of indirect objects that may be
//! malformed or cyclic, so they are read with explicit worklists and a
//! visited set rather than recursion.

use crate::error::Result;
use crate::fonts::decode_text_string;
use crate::object::{Dictionary, Object, ObjectRef, Resolve};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Upper bound on outline entries read from one document.
const MAX_OUTLINE_ITEMS: usize = 100_000;

/// A single outline item (bookmark) in the document hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineItem {
    /// The title of this bookmark
    pub title: String,

    /// Where the bookmark points, when it can be determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<Destination>,

    /// Child bookmarks under this item
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineItem>,
}

/// A destination in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Destination {
    /// A page of this document (0-based)
    Page {
        /// Page index
        index: usize,
    },
    /// A named destination, looked up in the document's name tables
    Named {
        /// Destination name
        name: String,
    },
}

/// Read the outline tree below the catalog's `/Outlines`.
///
/// `pages` maps page object references to page indices.
pub fn read_outline(
    catalog: &Dictionary,
    resolver: &dyn Resolve,
    pages: &HashMap<ObjectRef, usize>,
) -> Result<Vec<OutlineItem>> {
    let outlines = match catalog.get_resolved("Outlines", resolver)? {
        Some(Object::Dictionary(d)) => d,
        _ => return Ok(Vec::new()),
    };
    let Some(first) = outlines.get("First").cloned() else {
        return Ok(Vec::new());
    };

    struct Node {
        item: OutlineItem,
        parent: Option<usize>,
    }

    let mut nodes: Vec<Option<Node>> = Vec::new();
    let mut visited: HashSet<ObjectRef> = HashSet::new();
    let mut queue: Vec<(Object, Option<usize>)> = vec![(first, None)];

    'lists: while let Some((head, parent)) = queue.pop() {
        let mut next = Some(head);
        while let Some(entry) = next.take() {
            if let Some(r) = entry.as_reference() {
                if !visited.insert(r) {
                    log::warn!("Outline item {} visited twice; stopping this list", r);
                    break;
                }
            }
            let dict = match resolver.resolve(&entry)? {
                Object::Dictionary(d) => d,
                other => {
                    log::warn!("Outline item is a {}", other.type_name());
                    break;
                },
            };

            let title = match dict.get_resolved("Title", resolver)? {
                Some(Object::String(s)) => decode_text_string(&s),
                _ => String::new(),
            };
            let dest = item_destination(&dict, resolver, pages)?;

            let index = nodes.len();
            nodes.push(Some(Node {
                item: OutlineItem {
                    title,
                    dest,
                    children: Vec::new(),
                },
                parent,
            }));
            if nodes.len() >= MAX_OUTLINE_ITEMS {
                log::warn!("Outline truncated at {} items", MAX_OUTLINE_ITEMS);
                break 'lists;
            }

            if let Some(child) = dict.get("First") {
                queue.push((child.clone(), Some(index)));
            }
            next = dict.get("Next").cloned();
        }
    }

    // Children always come after their parent, so assembling from the end
    // completes every subtree before it is attached.
    let mut roots = Vec::new();
    for i in (0..nodes.len()).rev() {
        let Some(mut node) = nodes[i].take() else {
            continue;
        };
        node.item.children.reverse();
        match node.parent.and_then(|p| nodes.get_mut(p)).and_then(Option::as_mut) {
            Some(parent) => parent.item.children.push(node.item),
            None => roots.push(node.item),
        }
    }
    roots.reverse();
    log::debug!("Outline with {} top-level items", roots.len());
    Ok(roots)
}

/// Named destinations from `/Dests` and the `/Names` `/Dests` name tree.
///
/// Entries of the name tree win over the older `/Dests` dictionary.
pub fn read_destinations(
    catalog: &Dictionary,
    resolver: &dyn Resolve,
    pages: &HashMap<ObjectRef, usize>,
) -> Result<BTreeMap<String, Destination>> {
    let mut found = BTreeMap::new();

    if let Some(Object::Dictionary(dests)) = catalog.get_resolved("Dests", resolver)? {
        for (name, value) in dests.iter() {
            if let Some(dest) = resolve_destination(value, resolver, pages)? {
                found.insert(name.as_str().to_string(), dest);
            }
        }
    }

    let names = match catalog.get_resolved("Names", resolver)? {
        Some(Object::Dictionary(d)) => d,
        _ => return Ok(found),
    };
    let Some(tree) = names.get("Dests").cloned() else {
        return Ok(found);
    };

    let mut visited = HashSet::new();
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        if let Some(r) = node.as_reference() {
            if !visited.insert(r) {
                log::warn!("Name tree node {} visited twice", r);
                continue;
            }
        }
        let Object::Dictionary(node) = resolver.resolve(&node)? else {
            continue;
        };
        if let Some(Object::Array(kids)) = node.get_resolved("Kids", resolver)? {
            stack.extend(kids.into_iter().rev());
        }
        if let Some(Object::Array(pairs)) = node.get_resolved("Names", resolver)? {
            for pair in pairs.chunks(2) {
                let [key, value] = pair else {
                    log::warn!("Odd number of entries in a name tree leaf");
                    break;
                };
                let name = match resolver.resolve(key)? {
                    Object::String(s) => decode_text_string(&s),
                    Object::Name(n) => n.as_str().to_string(),
                    other => {
                        log::warn!("Name tree key is a {}", other.type_name());
                        continue;
                    },
                };
                if let Some(dest) = resolve_destination(value, resolver, pages)? {
                    found.insert(name, dest);
                }
            }
        }
    }

    log::debug!("{} named destinations", found.len());
    Ok(found)
}

/// `/Dest`, or the `/D` of a `GoTo` action.
fn item_destination(
    item: &Dictionary,
    resolver: &dyn Resolve,
    pages: &HashMap<ObjectRef, usize>,
) -> Result<Option<Destination>> {
    if let Some(dest) = item.get("Dest") {
        return resolve_destination(dest, resolver, pages);
    }
    if let Some(Object::Dictionary(action)) = item.get_resolved("A", resolver)? {
        if action.get_name("S") == Some("GoTo") {
            if let Some(dest) = action.get("D") {
                return resolve_destination(dest, resolver, pages);
            }
        }
    }
    Ok(None)
}

/// Turn a destination value into a [`Destination`].
///
/// Accepts explicit arrays, names and strings, and dictionaries with `/D`.
pub fn resolve_destination(
    value: &Object,
    resolver: &dyn Resolve,
    pages: &HashMap<ObjectRef, usize>,
) -> Result<Option<Destination>> {
    let mut current = resolver.resolve(value)?;
    // A dictionary wraps the destination in /D; allow a couple of levels.
    for _ in 0..4 {
        match current {
            Object::Array(parts) => {
                return Ok(match parts.first() {
                    Some(Object::Reference(page)) => match pages.get(page) {
                        Some(index) => Some(Destination::Page { index: *index }),
                        None => {
                            log::debug!("Destination page {} is not in the page tree", page);
                            None
                        },
                    },
                    // Remote destinations give a page number directly
                    Some(Object::Integer(n)) if *n >= 0 => Some(Destination::Page { index: *n as usize }),
                    _ => None,
                });
            },
            Object::String(s) => {
                return Ok(Some(Destination::Named {
                    name: decode_text_string(&s),
                }))
            },
            Object::Name(n) => return Ok(Some(Destination::Named { name: n.as_str().to_string() })),
            Object::Dictionary(d) => match d.get_resolved("D", resolver)? {
                Some(inner) => current = inner,
                None => return Ok(None),
            },
            _ => return Ok(None),
        }
    }
    Ok(None)
}
