//! Synthetic PDF construction shared by the integration tests.
//!
//! Offsets in the generated cross-reference tables are real, so documents
//! built here open through the normal startxref path.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Route `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Zlib-compress `data`.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Builder for a classic-xref PDF. Object 1 is the catalog by convention.
#[derive(Default)]
pub struct PdfBuilder {
    version: String,
    objects: Vec<(u32, Vec<u8>)>,
    trailer_extra: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.7".to_string(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Add `id 0 obj <body> endobj`.
    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.push((id, body.as_bytes().to_vec()));
        self
    }

    /// Add a stream with a correct /Length. `dict_extra` goes inside the
    /// stream dictionary.
    pub fn stream(mut self, id: u32, dict_extra: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_extra).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((id, body));
        self
    }

    /// Add a FlateDecode stream holding `data`.
    pub fn flate_stream(self, id: u32, dict_extra: &str, data: &[u8]) -> Self {
        let extra = format!("/Filter /FlateDecode {}", dict_extra);
        self.stream(id, &extra, &deflate(data))
    }

    /// Add an object body verbatim (for deliberately broken objects).
    pub fn raw(mut self, id: u32, body: &[u8]) -> Self {
        self.objects.push((id, body.to_vec()));
        self
    }

    /// Extra trailer entries, e.g. `/Info 9 0 R`.
    pub fn trailer(mut self, extra: &str) -> Self {
        self.trailer_extra = extra.to_string();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n", self.version).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        let mut offsets = std::collections::BTreeMap::new();
        for (id, body) in &self.objects {
            offsets.insert(*id, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = offsets.keys().max().map_or(1, |max| max + 1);
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
        for id in 1..size {
            match offsets.get(&id) {
                Some(offset) => out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                size, self.trailer_extra, xref
            )
            .as_bytes(),
        );
        out
    }
}

/// Append an incremental update redefining `objects`; its trailer points
/// back to the previous section with /Prev.
pub fn append_update(base: &[u8], objects: &[(u32, &str)]) -> Vec<u8> {
    let at = base.windows(9).rposition(|w| w == b"startxref").unwrap();
    let prev: usize = std::str::from_utf8(&base[at + 9..])
        .unwrap()
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap();

    let mut out = base.to_vec();
    let mut entries = Vec::new();
    for (id, body) in objects {
        entries.push((*id, out.len()));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(b"xref\n");
    for (id, offset) in &entries {
        out.extend_from_slice(format!("{} 1\n{:010} 00000 n \n", id, offset).as_bytes());
    }
    out.extend_from_slice(format!("trailer\n<< /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n", prev, xref).as_bytes());
    out
}

/// A one-page document with the given content and page resources.
pub fn single_page(content: &[u8], resources: &str) -> Vec<u8> {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << {} >> /Contents 4 0 R >>",
                resources
            ),
        )
        .flate_stream(4, "", content)
        .build()
}

/// A standard Type1 Helvetica font dictionary.
pub const HELVETICA: &str = "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>";
