//! Run results, in processing order, and their CSV and HTML renderings.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};

use crate::routing::{Outcome, RoutingRecord};

const CSV_HEADER: &str = "file,faces_found,recognized,persons,top1_similarity,action";

/// Ordered collection of per-photo records.
#[derive(Debug, Default, Clone)]
pub struct Report {
    records: Vec<RoutingRecord>,
    skipped: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub matched: usize,
    pub no_match: usize,
    pub no_face: usize,
    pub skipped: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matched, {} without match, {} without face, {} skipped",
            self.matched, self.no_match, self.no_face, self.skipped
        )
    }
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RoutingRecord) {
        self.records.push(record);
    }

    /// Note a photo that could not be analysed. It gets no record.
    pub fn skip(&mut self, filename: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push((filename.into(), reason.into()));
    }

    pub fn records(&self) -> &[RoutingRecord] {
        &self.records
    }

    pub fn skipped(&self) -> &[(String, String)] {
        &self.skipped
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            skipped: self.skipped.len(),
            ..Summary::default()
        };
        for record in &self.records {
            match record.outcome {
                Outcome::Matched { .. } => summary.matched += 1,
                Outcome::NoMatch => summary.no_match += 1,
                Outcome::NoFace => summary.no_face += 1,
            }
        }
        summary
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for r in &self.records {
            let row = [
                r.filename.clone(),
                r.found.to_string(),
                r.outcome.is_matched().to_string(),
                persons(r),
                similarity(r),
                r.action.clone(),
            ];
            let row: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_csv())
    }

    /// Render the HTML table. Thumbnails are read from `photos_dir`.
    pub fn to_html(&self, photos_dir: &Path, thumbnail_width: u32) -> String {
        let mut html = String::from(HTML_HEAD);
        for r in &self.records {
            let recognized = if r.outcome.is_matched() {
                r#"<span class="ok">Yes</span>"#
            } else {
                r#"<span class="no">No</span>"#
            };
            let thumb = thumbnail(&photos_dir.join(&r.filename), thumbnail_width)
                .map(|b64| {
                    format!(
                        r#"<img src="data:image/jpeg;base64,{}" width="{}">"#,
                        b64, thumbnail_width
                    )
                })
                .unwrap_or_else(|e| {
                    log::debug!("no thumbnail for {}: {:#}", r.filename, e);
                    String::new()
                });
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                thumb,
                escape_html(&r.filename),
                recognized,
                escape_html(&persons(r)),
                similarity(r),
                escape_html(&r.action),
            ));
        }
        html.push_str("</table></body></html>\n");
        html
    }

    pub fn write_html(&self, path: &Path, photos_dir: &Path, thumbnail_width: u32) -> Result<()> {
        write_file(path, &self.to_html(photos_dir, thumbnail_width))
    }
}

const HTML_HEAD: &str = r#"<html><head><meta charset="utf-8">
<title>Photo sorting report</title>
<style>
body { font-family: Arial; background:#fafafa; color:#333; }
table { border-collapse: collapse; width:95%; margin:auto; }
th, td { border:1px solid #ccc; padding:8px; text-align:center; }
th { background:#eee; }
tr:nth-child(even){ background:#f9f9f9; }
img { border-radius:8px; }
.ok{ color:green; font-weight:bold; }
.no{ color:red; font-weight:bold; }
</style></head><body>
<h1>Photo sorting report</h1>
<table><tr><th>Photo</th><th>File</th><th>Recognized</th><th>Person(s)</th><th>Similarity</th><th>Action</th></tr>
"#;

/// Matched labels, or the closest label as a hint when nothing matched.
fn persons(r: &RoutingRecord) -> String {
    match r.outcome {
        Outcome::Matched { .. } => r.matched_labels.join(", "),
        Outcome::NoMatch => r.best_label.clone(),
        Outcome::NoFace => String::new(),
    }
}

fn similarity(r: &RoutingRecord) -> String {
    if r.found {
        format!("{:.3}", r.best_score)
    } else {
        String::new()
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Base64 JPEG of the image scaled to `width` pixels wide.
fn thumbnail(path: &Path, width: u32) -> Result<String> {
    let img = image::open(path).with_context(|| format!("reading {}", path.display()))?;
    let (w, h) = img.dimensions();
    let height = ((h as u64 * width as u64) / w.max(1) as u64).max(1) as u32;
    let small = img.resize_exact(width.max(1), height, FilterType::Triangle);

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(small.to_rgb8())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .context("encoding thumbnail")?;
    Ok(BASE64.encode(buf))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
