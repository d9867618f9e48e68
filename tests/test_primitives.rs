//! Content streams to primitives, end to end through a document.

mod common;

use common::{init_logging, single_page, PdfBuilder, HELVETICA};
use pdf_primitives::canvas::Orientation;
use pdf_primitives::{PagePrimitives, PaintColor, PdfDocument};

fn primitives(content: &[u8]) -> PagePrimitives {
    init_logging();
    let doc = PdfDocument::new(single_page(content, "")).unwrap();
    doc.page_primitives(0).unwrap()
}

/// One page whose /F1 is a Helvetica font at object 5.
fn text_page(content: &[u8]) -> PdfDocument {
    init_logging();
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>",
        )
        .flate_stream(4, "", content)
        .object(5, HELVETICA)
        .build();
    PdfDocument::new(data).unwrap()
}

// ============================================================================
// Fills and lines
// ============================================================================

#[test]
fn test_red_rectangle_is_one_red_fill() {
    let page = primitives(b"1 0 0 RG 10 10 100 2 re f");
    assert_eq!(page.len(), 1);
    assert!(page.lines.is_empty());
    assert!(page.texts.is_empty());

    let fill = &page.fills[0];
    assert_eq!((fill.x, fill.y, fill.width, fill.height), (10.0, 10.0, 100.0, 2.0));
    assert_eq!(fill.color, PaintColor::Palette(24));
}

#[test]
fn test_explicit_fill_colour_beats_stroke_colour() {
    let page = primitives(b"1 0 0 RG 0 0 1 rg 10 10 100 2 re f");
    assert_eq!(page.fills[0].color, PaintColor::Palette(31));
}

#[test]
fn test_fill_colour() {
    let page = primitives(b"1 0 0 rg 10 10 100 2 re f");
    assert_eq!(page.fills.len(), 1);
    assert_eq!(page.fills[0].color, PaintColor::Palette(24));
}

#[test]
fn test_colour_outside_palette() {
    let page = primitives(b"0.2 0.4 0.6 rg 0 0 50 50 re f");
    assert_eq!(page.fills[0].color, PaintColor::Rgb("#336699".to_string()));
}

#[test]
fn test_cmyk_and_gray_fills() {
    let page = primitives(b"0 1 1 0 k 0 0 50 50 re f 1 g 0 100 50 50 re f");
    assert_eq!(page.fills[0].color, PaintColor::Palette(24));
    assert_eq!(page.fills[1].color, PaintColor::Palette(1));
}

#[test]
fn test_fill_thresholds() {
    // Both sides at the minimum are kept, both below are dropped
    assert_eq!(primitives(b"0 0 2 2 re f").fills.len(), 1);
    assert!(primitives(b"0 0 1.5 1.5 re f").is_empty());

    // One thin side reports a line of that width
    let page = primitives(b"0 0 100 1 re f");
    assert!(page.fills.is_empty());
    assert_eq!(page.lines.len(), 1);
    assert_eq!(page.lines[0].orientation, Orientation::Horizontal);
    assert_eq!(page.lines[0].width, 1.0);
    assert_eq!(page.lines[0].length, 100.0);
}

#[test]
fn test_line_thresholds() {
    // L/W = 11/3 below 4 and W below 4: dropped
    assert!(primitives(b"3 w 0 0 m 11 0 l S").is_empty());
    // L/W = 4: kept
    assert_eq!(primitives(b"3 w 0 0 m 12 0 l S").lines.len(), 1);
    // W = 4: kept although short
    assert_eq!(primitives(b"4 w 0 0 m 0 4 l S").lines.len(), 1);
}

#[test]
fn test_dashed_stroked_rectangle() {
    let page = primitives(b"0.5 w [2 2] 0 d 0 0 100 50 re S");
    assert_eq!(page.lines.len(), 4);
    assert!(page.lines.iter().all(|l| l.dashed));
    let vertical = page.lines.iter().filter(|l| l.orientation == Orientation::Vertical).count();
    assert_eq!(vertical, 2);
}

#[test]
fn test_clip_path_is_flagged() {
    let page = primitives(b"0 0 100 100 re W n 10 10 50 50 re f");
    assert_eq!(page.fills.len(), 1);
    assert!(!page.fills[0].clip);

    let page = primitives(b"0 0 100 100 re W f");
    assert!(page.fills[0].clip);
}

#[test]
fn test_bad_operators_do_not_stop_the_page() {
    let page = primitives(b"0 0 50 re f 1 0 0 rg 0 0 50 50 re f bogus 0 0 20 20 re f");
    assert_eq!(page.fills.len(), 2);
    assert_eq!(page.fills[0].color, PaintColor::Palette(24));
}

// ============================================================================
// Page geometry
// ============================================================================

#[test]
fn test_crop_box_origin() {
    init_logging();
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /CropBox [100 100 400 500] /Contents 4 0 R >>")
        .stream(4, "", b"110 120 50 50 re f")
        .build();
    let doc = PdfDocument::new(data).unwrap();
    let page = doc.page_primitives(0).unwrap();
    assert_eq!((page.width, page.height), (300.0, 400.0));
    assert_eq!((page.fills[0].x, page.fills[0].y), (10.0, 20.0));
}

#[test]
fn test_content_array_is_one_stream() {
    init_logging();
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /Contents [4 0 R 5 0 R] >>")
        .stream(4, "", b"1 0 0 rg 0 0 50")
        .flate_stream(5, "", b"50 re f")
        .build();
    let doc = PdfDocument::new(data).unwrap();
    let page = doc.page_primitives(0).unwrap();
    assert_eq!(page.fills.len(), 1);
    assert_eq!(page.fills[0].width, 50.0);
    // Default media box is US Letter
    assert_eq!((page.width, page.height), (612.0, 792.0));
}

#[test]
fn test_form_xobject_is_inlined() {
    init_logging();
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /Resources << /XObject << /Fm1 5 0 R >> >> /Contents 4 0 R >>",
        )
        .stream(4, "", b"q 2 0 0 2 0 0 cm /Fm1 Do Q 0 0 100 1 re f")
        .stream(
            5,
            "/Type /XObject /Subtype /Form /BBox [0 0 10 10] /Matrix [1 0 0 1 5 5]",
            b"1 0 0 rg 0 0 10 10 re f",
        )
        .build();
    let doc = PdfDocument::new(data).unwrap();
    let page = doc.page_primitives(0).unwrap();

    assert_eq!(page.fills.len(), 1);
    let fill = &page.fills[0];
    assert_eq!((fill.x, fill.y, fill.width, fill.height), (10.0, 10.0, 20.0, 20.0));
    assert_eq!(fill.color, PaintColor::Palette(24));
    // The thin fill after the form uses the restored state
    assert_eq!(page.lines.len(), 1);
    assert_eq!(page.lines[0].color, PaintColor::Palette(0));
}

#[test]
fn test_unbalanced_restore_in_form_keeps_page_colour() {
    init_logging();
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /Resources << /XObject << /Fm1 5 0 R >> >> /Contents 4 0 R >>",
        )
        .stream(4, "", b"q 1 0 0 rg q /Fm1 Do 0 0 50 50 re f Q Q")
        .stream(5, "/Subtype /Form /BBox [0 0 10 10]", b"Q Q Q 0 0 1 rg")
        .build();
    let doc = PdfDocument::new(data).unwrap();
    let page = doc.page_primitives(0).unwrap();
    assert_eq!(page.fills.len(), 1);
    assert_eq!(page.fills[0].color, PaintColor::Palette(24));
}

#[test]
fn test_single_name_flate_filter_is_decoded() {
    let doc = PdfDocument::new(single_page(b"1 0 0 rg 0 0 50 50 re f", "")).unwrap();
    let page = doc.xref().fetch(pdf_primitives::ObjectRef::new(4, 0)).unwrap();
    assert_eq!(&page.as_stream().unwrap().decode().unwrap()[..], b"1 0 0 rg 0 0 50 50 re f");
}

// ============================================================================
// Text
// ============================================================================

#[test]
fn test_hello_text_run() {
    let doc = text_page(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");
    let page = doc.page_primitives(0).unwrap();

    assert_eq!(page.texts.len(), 1);
    let run = &page.texts[0];
    assert_eq!(run.text, "Hello");
    assert_eq!((run.x, run.y), (72.0, 700.0));
    assert_eq!(run.size, 12.0);
    assert_eq!(run.font_id, "font_5_0");
    assert!(run.fill && !run.stroke);
    assert!(page.fills.is_empty() && page.lines.is_empty());
}

#[test]
fn test_scaled_text_and_invisible_mode() {
    let doc = text_page(b"BT /F1 10 Tf 2 0 0 2 50 60 Tm 3 Tr (Hidden) Tj ET");
    let page = doc.page_primitives(0).unwrap();
    let run = &page.texts[0];
    assert_eq!(run.text, "Hidden");
    assert_eq!(run.size, 20.0);
    assert_eq!((run.x, run.y), (50.0, 60.0));
    assert!(!run.fill && !run.stroke);
}

#[test]
fn test_fonts_announced_once_per_document() {
    let doc = text_page(b"BT /F1 12 Tf (a) Tj /F1 10 Tf (b) Tj ET");
    let first = doc.operator_list(0).unwrap();
    assert_eq!(first.new_fonts().len(), 1);
    assert_eq!(first.new_fonts()[0].base_font, "Helvetica");

    let second = doc.operator_list(0).unwrap();
    assert!(second.new_fonts().is_empty());

    // Dropping the cache announces the font again
    doc.cleanup();
    assert_eq!(doc.operator_list(0).unwrap().new_fonts().len(), 1);
}

#[test]
fn test_missing_font_uses_fallback() {
    let page = primitives(b"BT /F9 12 Tf 10 10 Td (abc) Tj ET");
    assert_eq!(page.texts.len(), 1);
    assert_eq!(page.texts[0].text, "abc");
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_primitives_serialize_to_json() {
    let page = primitives(b"1 0 0 rg 10 10 100 20 re f 0 0 1 RG 2 w 0 0 m 0 100 l S");
    let json = serde_json::to_value(&page).unwrap();

    assert_eq!(json["page"], 0);
    assert_eq!(json["fills"][0]["color"], 24);
    assert_eq!(json["fills"][0]["width"], 100.0);
    assert!(json["fills"][0].get("clip").is_none());
    assert_eq!(json["lines"][0]["orientation"], "vertical");
    assert_eq!(json["lines"][0]["color"], 31);

    let back: PagePrimitives = serde_json::from_value(json).unwrap();
    assert_eq!(back, page);
}
