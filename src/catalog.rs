//! Document catalog: page tree, fonts shared by pages, outline.

use crate::error::{Error, Result};
use crate::fonts::FontCache;
use crate::object::{Dictionary, Object, ObjectRef, Resolve};
use crate::outline::{read_destinations, read_outline, Destination, OutlineItem};
use crate::page::Page;
use std::cell::{OnceCell, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The root of the document's object graph.
#[derive(Debug)]
pub struct Catalog {
    dict: Dictionary,
    page_nodes: RefCell<HashMap<usize, Object>>,
    num_pages: OnceCell<usize>,
    page_indices: OnceCell<HashMap<ObjectRef, usize>>,
    outline: OnceCell<Vec<OutlineItem>>,
    destinations: OnceCell<BTreeMap<String, Destination>>,
    fonts: RefCell<FontCache>,
}

impl Catalog {
    /// Read the catalog dictionary at `root`.
    pub fn new(root: ObjectRef, resolver: &dyn Resolve) -> Result<Catalog> {
        let dict = match resolver.fetch(root)? {
            Object::Dictionary(d) => d,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "catalog dictionary".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        };
        if !dict.is_type("Catalog") {
            log::warn!("Catalog {} has /Type {:?}", root, dict.get_name("Type"));
        }
        Ok(Self::from_dict(dict))
    }

    /// Wrap an already loaded catalog dictionary.
    pub fn from_dict(dict: Dictionary) -> Catalog {
        Catalog {
            dict,
            page_nodes: RefCell::new(HashMap::new()),
            num_pages: OnceCell::new(),
            page_indices: OnceCell::new(),
            outline: OnceCell::new(),
            destinations: OnceCell::new(),
            fonts: RefCell::new(FontCache::new()),
        }
    }

    /// The catalog dictionary.
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// Number of pages, from the root node's `/Count`.
    ///
    /// When the count is missing or invalid the leaves are counted instead.
    pub fn num_pages(&self, resolver: &dyn Resolve) -> Result<usize> {
        if let Some(n) = self.num_pages.get() {
            return Ok(*n);
        }
        let root = self.pages_root(resolver)?;
        let n = match root.get_integer("Count") {
            Some(count) if count >= 0 => count as usize,
            other => {
                log::warn!("Page tree root has /Count {:?}; counting leaves", other);
                self.page_refs(resolver)?.len()
            },
        };
        Ok(*self.num_pages.get_or_init(|| n))
    }

    fn pages_root(&self, resolver: &dyn Resolve) -> Result<Dictionary> {
        match self.dict.get_resolved("Pages", resolver)? {
            Some(Object::Dictionary(d)) => Ok(d),
            other => Err(Error::InvalidObjectType {
                expected: "page tree root".to_string(),
                found: other.map_or("nothing", |o| o.type_name()).to_string(),
            }),
        }
    }

    /// The page-tree leaf for page `index`.
    ///
    /// Subtrees whose `/Count` shows they end before `index` are skipped
    /// without being read. When a node's count equals its number of kids,
    /// the one matching kid is queued directly; it is still checked, since
    /// a kid can itself be an intermediate node.
    pub fn page_node(&self, index: usize, resolver: &dyn Resolve) -> Result<Object> {
        if let Some(node) = self.page_nodes.borrow().get(&index) {
            return Ok(node.clone());
        }

        let pages = self
            .dict
            .get("Pages")
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("catalog without /Pages".to_string()))?;
        let mut stack = vec![pages];
        let mut visited = HashSet::new();
        let mut current = 0usize;

        while let Some(node_obj) = stack.pop() {
            if let Some(r) = node_obj.as_reference() {
                if !visited.insert(r) {
                    return Err(Error::CircularReference(r));
                }
            }
            let node = match resolver.resolve(&node_obj)? {
                Object::Dictionary(d) => d,
                other => {
                    log::warn!("Page tree node is a {}", other.type_name());
                    continue;
                },
            };

            let kids = match node.get_resolved("Kids", resolver)? {
                Some(Object::Array(kids)) if !node.is_type("Page") => kids,
                _ => {
                    if current == index {
                        self.page_nodes.borrow_mut().insert(index, node_obj.clone());
                        return Ok(node_obj);
                    }
                    current += 1;
                    continue;
                },
            };

            if let Some(count) = node.get_integer("Count").filter(|c| *c >= 0).map(|c| c as usize) {
                if current + count <= index {
                    log::trace!("Skipping {} pages under {:?}", count, node_obj.as_reference());
                    current += count;
                    continue;
                }
                if count == kids.len() {
                    if let Some(kid) = kids.get(index - current) {
                        current = index;
                        stack.push(kid.clone());
                        continue;
                    }
                }
            }
            stack.extend(kids.into_iter().rev());
        }

        Err(Error::PageNotFound(index))
    }

    /// Load page `index`.
    pub fn page(&self, index: usize, resolver: &dyn Resolve) -> Result<Page> {
        let node = self.page_node(index, resolver)?;
        Page::load(index, &node, resolver)
    }

    /// References of all pages, in order. Walks the whole tree.
    fn page_refs(&self, resolver: &dyn Resolve) -> Result<Vec<Option<ObjectRef>>> {
        let mut found = Vec::new();
        let mut stack: Vec<Object> = self.dict.get("Pages").cloned().into_iter().collect();
        let mut visited = HashSet::new();
        while let Some(node_obj) = stack.pop() {
            if let Some(r) = node_obj.as_reference() {
                if !visited.insert(r) {
                    log::warn!("Page tree node {} reached twice", r);
                    continue;
                }
            }
            let Object::Dictionary(node) = resolver.resolve(&node_obj)? else {
                continue;
            };
            match node.get_resolved("Kids", resolver)? {
                Some(Object::Array(kids)) if !node.is_type("Page") => stack.extend(kids.into_iter().rev()),
                _ => found.push(node_obj.as_reference()),
            }
        }
        Ok(found)
    }

    /// Map from page object reference to page index.
    pub fn page_indices(&self, resolver: &dyn Resolve) -> Result<&HashMap<ObjectRef, usize>> {
        if let Some(map) = self.page_indices.get() {
            return Ok(map);
        }
        let map = self
            .page_refs(resolver)?
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|r| (r, i)))
            .collect();
        Ok(self.page_indices.get_or_init(|| map))
    }

    /// The outline tree (empty when the document has none).
    pub fn outline(&self, resolver: &dyn Resolve) -> Result<&[OutlineItem]> {
        if let Some(items) = self.outline.get() {
            return Ok(items);
        }
        let items = read_outline(&self.dict, resolver, self.page_indices(resolver)?)?;
        Ok(self.outline.get_or_init(|| items))
    }

    /// Named destinations.
    pub fn destinations(&self, resolver: &dyn Resolve) -> Result<&BTreeMap<String, Destination>> {
        if let Some(dests) = self.destinations.get() {
            return Ok(dests);
        }
        let dests = read_destinations(&self.dict, resolver, self.page_indices(resolver)?)?;
        Ok(self.destinations.get_or_init(|| dests))
    }

    /// The font cache shared by all pages of the document.
    pub fn fonts(&self) -> RefMut<'_, FontCache> {
        self.fonts.borrow_mut()
    }

    /// Drop cached fonts and page lookups.
    pub fn cleanup(&self) {
        let fonts = self.fonts.borrow().len();
        self.fonts.borrow_mut().clear();
        self.page_nodes.borrow_mut().clear();
        log::debug!("Catalog cleanup dropped {} fonts", fonts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Name;

    /// Resolver that records which objects were fetched.
    #[derive(Default)]
    struct Table {
        objects: HashMap<u32, Object>,
        fetched: RefCell<HashSet<u32>>,
    }

    impl Resolve for Table {
        fn fetch(&self, r: ObjectRef) -> Result<Object> {
            self.fetched.borrow_mut().insert(r.id);
            self.objects.get(&r.id).cloned().ok_or(Error::ObjectNotFound(r.id, r.gen))
        }
    }

    fn r(id: u32) -> Object {
        Object::Reference(ObjectRef::new(id, 0))
    }

    fn node(kids: Vec<Object>, count: i64) -> Object {
        let mut d = Dictionary::new();
        d.insert("Type", Object::Name(Name::new("Pages")));
        d.insert("Count", Object::Integer(count));
        d.insert("Kids", Object::Array(kids));
        Object::Dictionary(d)
    }

    fn leaf() -> Object {
        let mut d = Dictionary::new();
        d.insert("Type", Object::Name(Name::new("Page")));
        Object::Dictionary(d)
    }

    fn catalog(pages: u32) -> Catalog {
        let mut d = Dictionary::new();
        d.insert("Type", Object::Name(Name::new("Catalog")));
        d.insert("Pages", r(pages));
        Catalog::from_dict(d)
    }

    /// Root(100) -> A(40 leaves, ids 1000..) and B(60 leaves, ids 2000..).
    fn wide_tree() -> Table {
        let mut table = Table::default();
        let a_kids: Vec<Object> = (0..40).map(|i| r(1000 + i)).collect();
        let b_kids: Vec<Object> = (0..60).map(|i| r(2000 + i)).collect();
        for i in 0..40 {
            table.objects.insert(1000 + i, leaf());
        }
        for i in 0..60 {
            table.objects.insert(2000 + i, leaf());
        }
        table.objects.insert(10, node(a_kids, 40));
        table.objects.insert(11, node(b_kids, 60));
        table.objects.insert(1, node(vec![r(10), r(11)], 100));
        table
    }

    #[test]
    fn test_count_skips_whole_subtree() {
        let table = wide_tree();
        let catalog = catalog(1);

        let node = catalog.page_node(45, &table).unwrap();
        assert_eq!(node.as_reference(), Some(ObjectRef::new(2005, 0)));

        let fetched = table.fetched.borrow();
        assert!(fetched.contains(&10));
        assert!(fetched.contains(&11));
        // No leaf of A was read, and only one leaf of B
        assert!(!fetched.iter().any(|id| (1000..1040).contains(id)));
        assert_eq!(fetched.iter().filter(|id| (2000..2060).contains(*id)).count(), 1);
    }

    #[test]
    fn test_page_lookup_is_memoized() {
        let table = wide_tree();
        let catalog = catalog(1);
        catalog.page_node(3, &table).unwrap();
        table.fetched.borrow_mut().clear();
        catalog.page_node(3, &table).unwrap();
        assert!(table.fetched.borrow().is_empty());
    }

    #[test]
    fn test_uneven_tree_without_shortcut() {
        let mut table = Table::default();
        table.objects.insert(2, leaf());
        table.objects.insert(3, leaf());
        table.objects.insert(4, leaf());
        table.objects.insert(5, node(vec![r(3), r(4)], 2));
        table.objects.insert(1, node(vec![r(2), r(5)], 3));
        let catalog = catalog(1);

        assert_eq!(catalog.num_pages(&table).unwrap(), 3);
        assert_eq!(catalog.page_node(0, &table).unwrap().as_reference(), Some(ObjectRef::new(2, 0)));
        assert_eq!(catalog.page_node(2, &table).unwrap().as_reference(), Some(ObjectRef::new(4, 0)));
        assert!(matches!(catalog.page_node(3, &table), Err(Error::PageNotFound(3))));
    }

    #[test]
    fn test_cycle_in_page_tree() {
        let mut table = Table::default();
        table.objects.insert(1, node(vec![r(2)], 5));
        table.objects.insert(2, node(vec![r(1)], 5));
        let catalog = catalog(1);
        assert!(matches!(catalog.page_node(0, &table), Err(Error::CircularReference(_))));
    }

    #[test]
    fn test_missing_count_counts_leaves() {
        let mut table = Table::default();
        table.objects.insert(2, leaf());
        table.objects.insert(3, leaf());
        let mut root = Dictionary::new();
        root.insert("Kids", Object::Array(vec![r(2), r(3)]));
        table.objects.insert(1, Object::Dictionary(root));
        let catalog = catalog(1);

        assert_eq!(catalog.num_pages(&table).unwrap(), 2);
        let indices = catalog.page_indices(&table).unwrap();
        assert_eq!(indices[&ObjectRef::new(3, 0)], 1);
    }

    #[test]
    fn test_cleanup_clears_fonts() {
        let catalog = catalog(1);
        let font = {
            let mut d = Dictionary::new();
            d.insert("Subtype", Object::Name(Name::new("Type1")));
            d.insert("BaseFont", Object::Name(Name::new("Helvetica")));
            Object::Dictionary(d)
        };
        catalog.fonts().load(&font, &Table::default());
        assert_eq!(catalog.fonts().len(), 1);
        catalog.cleanup();
        assert!(catalog.fonts().is_empty());
    }
}
