//! Print the primitives of a PDF as JSON
//!
//! Usage:
//!   pdf2prims <file.pdf>            all pages, plus document info
//!   pdf2prims <file.pdf> <page>     one page (zero-based)
//!   pdf2prims --strict <file.pdf>   fail on recoverable problems
//!
//! Logging goes to stderr and is controlled by RUST_LOG.

use pdf_primitives::{CanvasConfig, Error, PdfDocument, ParserOptions};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    file: PathBuf,
    page: Option<usize>,
    strict: bool,
}

impl Args {
    fn from_args() -> Result<Self, String> {
        let mut file = None;
        let mut page = None;
        let mut strict = false;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--strict" => strict = true,
                "--help" | "-h" => return Err(String::new()),
                _ if file.is_none() => file = Some(PathBuf::from(arg)),
                _ if page.is_none() => {
                    page = Some(arg.parse().map_err(|_| format!("Invalid page index: {}", arg))?);
                },
                _ => return Err(format!("Unexpected argument: {}", arg)),
            }
        }

        Ok(Self {
            file: file.ok_or_else(|| "Missing input file".to_string())?,
            page,
            strict,
        })
    }
}

/// One page in the all-pages output; failed pages keep their error text.
#[derive(Serialize)]
#[serde(untagged)]
enum PageOutput {
    Page(pdf_primitives::PagePrimitives),
    Failed { page: usize, error: String },
}

#[derive(Serialize)]
struct DocumentOutput {
    info: pdf_primitives::DocumentInfo,
    pages: Vec<PageOutput>,
}

fn run(args: &Args) -> Result<String, Error> {
    let options = if args.strict {
        ParserOptions::strict()
    } else {
        ParserOptions::lenient()
    };
    let data = std::fs::read(&args.file)?;
    let doc = PdfDocument::with_options(data, options, CanvasConfig::default())?;
    log::info!("Opened {} ({:?})", args.file.display(), doc);

    let json = match args.page {
        Some(index) => serde_json::to_string_pretty(&doc.page_primitives(index)?),
        None => {
            let pages = doc
                .all_page_primitives()?
                .into_iter()
                .enumerate()
                .map(|(page, result)| match result {
                    Ok(prims) => PageOutput::Page(prims),
                    Err(e) => PageOutput::Failed {
                        page,
                        error: e.to_string(),
                    },
                })
                .collect();
            serde_json::to_string_pretty(&DocumentOutput {
                info: doc.info()?,
                pages,
            })
        },
    };
    json.map_err(|e| Error::InvalidPdf(format!("JSON encoding failed: {}", e)))
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::from_args() {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {}", msg);
            }
            eprintln!("Usage: pdf2prims [--strict] <file.pdf> [page]");
            return ExitCode::from(2);
        },
    };

    match run(&args) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
