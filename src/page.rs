//! Page objects: inherited attributes, boxes and content streams.

use crate::content::{Evaluator, Matrix, OperatorList};
use crate::error::{Error, Result};
use crate::fonts::FontCache;
use crate::object::{Dictionary, Object, ObjectRef, Resolve};
use crate::parser_config::ParserOptions;
use crate::source::ByteSource;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashSet;

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// US Letter, used when no ancestor declares a media box.
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// A normalized rectangle (`x0 <= x1`, `y0 <= y1`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    /// Left
    pub x0: f64,
    /// Bottom
    pub y0: f64,
    /// Right
    pub x1: f64,
    /// Top
    pub y1: f64,
}

impl Rect {
    /// Rectangle from a PDF array; corners may be given in any order.
    pub fn from_array(values: &[f64]) -> Option<Rect> {
        match *values {
            [a, b, c, d, ..] if [a, b, c, d].iter().all(|v| v.is_finite()) => Some(Rect {
                x0: a.min(c),
                y0: b.min(d),
                x1: a.max(c),
                y1: b.max(d),
            }),
            _ => None,
        }
    }

    /// Width.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Overlap of two rectangles, if any.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (r.x0 < r.x1 && r.y0 < r.y1).then_some(r)
    }
}

/// A page with its inherited attributes resolved.
#[derive(Debug, Clone)]
pub struct Page {
    index: usize,
    page_ref: Option<ObjectRef>,
    dict: Dictionary,
    resources: Option<Dictionary>,
    media_box: Rect,
    crop_box: Rect,
    rotate: i64,
}

impl Page {
    /// Build the page at `index` from its page-tree leaf.
    pub fn load(index: usize, leaf: &Object, resolver: &dyn Resolve) -> Result<Page> {
        let page_ref = leaf.as_reference();
        let dict = match resolver.resolve(leaf)? {
            Object::Dictionary(d) => d,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "page dictionary".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        };
        if !dict.is_type("Page") {
            log::warn!("Page {} has /Type {:?}", index, dict.get_name("Type"));
        }

        let inherited = inherited_attributes(&dict, resolver)?;
        let resources = match inherited[0].as_ref() {
            Some(Object::Dictionary(d)) => Some(d.clone()),
            Some(other) => {
                log::warn!("Page {} /Resources is a {}", index, other.type_name());
                None
            },
            None => None,
        };

        let media_box = inherited[1]
            .as_ref()
            .and_then(|o| o.as_number_array())
            .and_then(|v| Rect::from_array(&v))
            .unwrap_or_else(|| {
                log::debug!("Page {} has no usable /MediaBox; using Letter", index);
                DEFAULT_MEDIA_BOX
            });
        let crop_box = inherited[2]
            .as_ref()
            .and_then(|o| o.as_number_array())
            .and_then(|v| Rect::from_array(&v))
            .and_then(|crop| crop.intersect(&media_box))
            .unwrap_or(media_box);
        let rotate = inherited[3].as_ref().and_then(|o| o.as_integer()).unwrap_or(0);
        let rotate = if rotate % 90 == 0 {
            rotate.rem_euclid(360)
        } else {
            log::warn!("Page {} has invalid /Rotate {}", index, rotate);
            0
        };

        Ok(Page {
            index,
            page_ref,
            dict,
            resources,
            media_box,
            crop_box,
            rotate,
        })
    }

    /// Zero-based index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Reference of the page object, when it is indirect.
    pub fn page_ref(&self) -> Option<ObjectRef> {
        self.page_ref
    }

    /// The page dictionary.
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// Resources, own or inherited.
    pub fn resources(&self) -> Option<&Dictionary> {
        self.resources.as_ref()
    }

    /// Media box, own or inherited.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// Crop box, clipped to the media box.
    pub fn crop_box(&self) -> Rect {
        self.crop_box
    }

    /// A box that defaults to the crop box (`BleedBox`, `TrimBox`, `ArtBox`).
    pub fn page_box(&self, name: &str) -> Rect {
        self.dict
            .get(name)
            .and_then(|o| o.as_number_array())
            .and_then(|v| Rect::from_array(&v))
            .and_then(|b| b.intersect(&self.media_box))
            .unwrap_or(self.crop_box)
    }

    /// Rotation in degrees (0, 90, 180 or 270).
    pub fn rotate(&self) -> i64 {
        self.rotate
    }

    /// Transform placing the crop box's lower-left corner at the origin.
    pub fn view_transform(&self) -> Matrix {
        Matrix::translation(-self.crop_box.x0, -self.crop_box.y0)
    }

    /// The page's content as one logical byte sequence.
    ///
    /// An array of content streams is chained segment by segment with a
    /// newline between streams, without copying them into one buffer.
    pub fn content(&self, resolver: &dyn Resolve, options: &ParserOptions) -> Result<ByteSource> {
        let contents = match self.dict.get_resolved("Contents", resolver)? {
            Some(obj) => obj,
            None => return Ok(ByteSource::new(Bytes::new())),
        };

        match contents {
            Object::Stream(stream) => Ok(ByteSource::new(stream.decode_with_options(options)?)),
            Object::Array(parts) => {
                let mut segments = Vec::with_capacity(parts.len() * 2);
                for (i, part) in parts.iter().enumerate() {
                    let stream = match resolver.resolve(part)? {
                        Object::Stream(s) => s,
                        other => {
                            log::warn!("Content part {} of page {} is a {}", i, self.index, other.type_name());
                            continue;
                        },
                    };
                    match stream.decode_with_options(options) {
                        Ok(data) => {
                            if !segments.is_empty() {
                                segments.push(Bytes::from_static(b"\n"));
                            }
                            segments.push(data);
                        },
                        Err(e) => log::warn!("Content part {} of page {} failed to decode: {}", i, self.index, e),
                    }
                }
                Ok(ByteSource::chain(segments))
            },
            Object::Null => Ok(ByteSource::new(Bytes::new())),
            other => Err(Error::InvalidObjectType {
                expected: "content stream or array".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Evaluate the page's content into an operator list.
    pub fn operator_list(&self, resolver: &dyn Resolve, fonts: &mut FontCache, options: ParserOptions) -> Result<OperatorList> {
        let content = self.content(resolver, &options)?;
        log::debug!("Page {}: {} content bytes", self.index, content.len());
        Evaluator::new(resolver, fonts, options).get_operator_list(content, self.resources.as_ref())
    }
}

/// Look up inheritable attributes on the page and then on its ancestors.
fn inherited_attributes(dict: &Dictionary, resolver: &dyn Resolve) -> Result<[Option<Object>; 4]> {
    let mut found: [Option<Object>; 4] = Default::default();
    for (slot, key) in found.iter_mut().zip(INHERITABLE) {
        *slot = dict.get_resolved(key, resolver)?;
    }

    let mut visited = HashSet::new();
    let mut parent = dict.get("Parent").cloned();
    while let Some(node) = parent.take() {
        if found.iter().all(Option::is_some) {
            break;
        }
        if let Some(r) = node.as_reference() {
            if !visited.insert(r) {
                log::warn!("Cycle in /Parent chain at {}", r);
                break;
            }
        }
        let Object::Dictionary(ancestor) = resolver.resolve(&node)? else {
            break;
        };
        for (slot, key) in found.iter_mut().zip(INHERITABLE) {
            if slot.is_none() {
                *slot = ancestor.get_resolved(key, resolver)?;
            }
        }
        parent = ancestor.get("Parent").cloned();
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Name, Stream};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Table {
        objects: HashMap<u32, Object>,
    }

    impl Resolve for Table {
        fn fetch(&self, r: ObjectRef) -> Result<Object> {
            Ok(self.objects.get(&r.id).cloned().unwrap_or(Object::Null))
        }
    }

    fn numbers(values: &[f64]) -> Object {
        Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
    }

    fn stream(data: &'static [u8]) -> Object {
        Object::Stream(Stream::from_dict(Dictionary::new(), Bytes::from_static(data)))
    }

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::from_array(&[100.0, 200.0, 0.0, 50.0]).unwrap();
        assert_eq!((r.x0, r.y0, r.x1, r.y1), (0.0, 50.0, 100.0, 200.0));
        assert_eq!(r.width(), 100.0);
        assert!(Rect::from_array(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_attributes_inherited_from_ancestors() {
        let mut table = Table::default();
        let mut root = Dictionary::new();
        root.insert("Type", Object::Name(Name::new("Pages")));
        root.insert("MediaBox", numbers(&[0.0, 0.0, 300.0, 400.0]));
        root.insert("Rotate", Object::Integer(-90));
        root.insert("Resources", Object::Dictionary(Dictionary::new()));
        table.objects.insert(1, Object::Dictionary(root));

        let mut middle = Dictionary::new();
        middle.insert("Parent", Object::Reference(ObjectRef::new(1, 0)));
        middle.insert("CropBox", numbers(&[10.0, 10.0, 500.0, 500.0]));
        table.objects.insert(2, Object::Dictionary(middle));

        let mut leaf = Dictionary::new();
        leaf.insert("Type", Object::Name(Name::new("Page")));
        leaf.insert("Parent", Object::Reference(ObjectRef::new(2, 0)));
        table.objects.insert(3, Object::Dictionary(leaf));

        let page = Page::load(0, &Object::Reference(ObjectRef::new(3, 0)), &table).unwrap();
        assert_eq!(page.media_box().x1, 300.0);
        // Crop box is clipped to the media box
        assert_eq!(page.crop_box(), Rect { x0: 10.0, y0: 10.0, x1: 300.0, y1: 400.0 });
        assert_eq!(page.rotate(), 270);
        assert!(page.resources().is_some());
        assert_eq!(page.page_box("TrimBox"), page.crop_box());
        assert_eq!(page.page_ref(), Some(ObjectRef::new(3, 0)));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut table = Table::default();
        let mut a = Dictionary::new();
        a.insert("Parent", Object::Reference(ObjectRef::new(2, 0)));
        let mut b = Dictionary::new();
        b.insert("Parent", Object::Reference(ObjectRef::new(1, 0)));
        table.objects.insert(1, Object::Dictionary(a));
        table.objects.insert(2, Object::Dictionary(b));

        let page = Page::load(0, &Object::Reference(ObjectRef::new(1, 0)), &table).unwrap();
        assert_eq!(page.media_box(), DEFAULT_MEDIA_BOX);
    }

    #[test]
    fn test_content_array_is_chained() {
        let mut table = Table::default();
        table.objects.insert(5, stream(b"0 0 m"));
        table.objects.insert(6, stream(b"10 0 l S"));
        let mut leaf = Dictionary::new();
        leaf.insert(
            "Contents",
            Object::Array(vec![Object::Reference(ObjectRef::new(5, 0)), Object::Reference(ObjectRef::new(6, 0))]),
        );
        let page = Page::load(0, &Object::Dictionary(leaf), &table).unwrap();

        let content = page.content(&table, &ParserOptions::default()).unwrap();
        assert_eq!(content.segment_count(), 3);
        assert_eq!(&content.slice(0, content.len())[..], b"0 0 m\n10 0 l S");
    }

    #[test]
    fn test_missing_contents_is_empty() {
        let page = Page::load(0, &Object::Dictionary(Dictionary::new()), &Table::default()).unwrap();
        assert!(page.content(&Table::default(), &ParserOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_non_dictionary_page_is_an_error() {
        let err = Page::load(0, &Object::Integer(3), &Table::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidObjectType { .. }));
    }

    #[test]
    fn test_view_transform_moves_crop_origin() {
        let mut leaf = Dictionary::new();
        leaf.insert("MediaBox", numbers(&[50.0, 60.0, 150.0, 160.0]));
        let page = Page::load(0, &Object::Dictionary(leaf), &Table::default()).unwrap();
        assert_eq!(page.view_transform().transform_point(50.0, 60.0), (0.0, 0.0));
    }
}
