//! Minimal PDF table writer.
//!
//! Emits a PDF 1.4 file on landscape A4 with an embedded DejaVu Sans font, so
//! any name the font covers is drawn as written. Cells wrap onto extra lines
//! instead of being cut, and rows paginate across as many pages as needed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;

use flate2::{write::ZlibEncoder, Compression};
use once_cell::sync::OnceCell;
use ttf_parser::{Face, GlyphId};

use crate::errors::AppError;

const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MARGIN: f32 = 36.0;
const TITLE_SIZE: f32 = 16.0;
const HEADER_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 9.0;
const LINE_HEIGHT: f32 = 11.0;
const CELL_PADDING: f32 = 3.0;
const FOOTER_SIZE: f32 = 8.0;

const EMPTY_MESSAGE: &str = "No members found.";

const FONT_NAME: &str = "DejaVuSans";
static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static COMPRESSED_FONT: OnceCell<Vec<u8>> = OnceCell::new();

// Fixed object numbers; pages follow from FIRST_PAGE_ID.
const TYPE0_FONT_ID: usize = 3;
const CID_FONT_ID: usize = 4;
const TO_UNICODE_ID: usize = 5;
const DESCRIPTOR_ID: usize = 6;
const FONT_FILE_ID: usize = 7;
const FIRST_PAGE_ID: usize = 8;

/// Table column with a relative width weight.
pub struct Column {
    title: &'static str,
    weight: f32,
}

impl Column {
    pub fn new(title: &'static str, weight: f32) -> Self {
        Self { title, weight }
    }
}

/// The embedded font plus the glyphs used so far.
struct Font {
    face: Face<'static>,
    units_per_em: f32,
    /// glyph id -> first character drawn with it
    used: BTreeMap<u16, char>,
}

impl Font {
    fn load() -> Result<Self, AppError> {
        let face = Face::parse(FONT_BYTES, 0)
            .map_err(|e| AppError::Internal(format!("Embedded font unreadable: {}", e)))?;
        let units_per_em = f32::from(face.units_per_em().max(1));
        Ok(Self {
            face,
            units_per_em,
            used: BTreeMap::new(),
        })
    }

    fn glyph(&self, ch: char) -> u16 {
        self.face.glyph_index(ch).map(|g| g.0).unwrap_or(0)
    }

    /// Advance width in thousandths of an em.
    fn advance(&self, glyph: u16) -> f32 {
        let units = self.face.glyph_hor_advance(GlyphId(glyph)).unwrap_or(0);
        f32::from(units) * 1000.0 / self.units_per_em
    }

    fn scaled(&self, value: i16) -> i32 {
        (f32::from(value) * 1000.0 / self.units_per_em).round() as i32
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: f32 = text.chars().map(|ch| self.advance(self.glyph(ch))).sum();
        units * size / 1000.0
    }

    /// Hex string of two-byte glyph ids for an Identity-H `Tj`.
    fn encode(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 4 + 2);
        out.push('<');
        for ch in text.chars() {
            let glyph = self.glyph(ch);
            self.used.entry(glyph).or_insert(ch);
            let _ = write!(out, "{:04X}", glyph);
        }
        out.push('>');
        out
    }

    /// Greedy word wrap; a word wider than the column is split between characters.
    fn wrap(&self, text: &str, size: f32, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut line = String::new();

        for word in text.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if self.text_width(&candidate, size) <= max_width {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for ch in word.chars() {
                line.push(ch);
                if line.chars().count() > 1 && self.text_width(&line, size) > max_width {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(ch);
                }
            }
        }

        if !line.is_empty() || lines.is_empty() {
            lines.push(line);
        }
        lines
    }
}

struct Layout {
    xs: Vec<f32>,
    widths: Vec<f32>,
}

impl Layout {
    fn new(columns: &[Column]) -> Self {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let total: f32 = columns.iter().map(|c| c.weight).sum::<f32>().max(1.0);

        let mut xs = Vec::with_capacity(columns.len());
        let mut widths = Vec::with_capacity(columns.len());
        let mut x = MARGIN;
        for column in columns {
            let width = usable * column.weight / total;
            xs.push(x);
            widths.push(width);
            x += width;
        }

        Self { xs, widths }
    }
}

/// A row with every cell already broken into lines.
struct WrappedRow {
    cells: Vec<Vec<String>>,
    height: f32,
}

fn header_baseline() -> f32 {
    PAGE_HEIGHT - MARGIN - TITLE_SIZE - 28.0
}

/// Vertical space available for body rows on one page.
fn body_height() -> f32 {
    (header_baseline() - 5.0) - (MARGIN + FOOTER_SIZE)
}

fn wrap_rows(font: &Font, layout: &Layout, rows: &[Vec<String>]) -> Vec<WrappedRow> {
    rows.iter()
        .map(|row| {
            let cells: Vec<Vec<String>> = row
                .iter()
                .zip(&layout.widths)
                .map(|(cell, width)| font.wrap(cell, BODY_SIZE, width - 2.0 * CELL_PADDING))
                .collect();
            let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            WrappedRow {
                cells,
                height: lines as f32 * LINE_HEIGHT + 2.0 * CELL_PADDING,
            }
        })
        .collect()
}

/// Split rows into pages by height. There is always at least one page, and a
/// row taller than a page gets a page of its own.
fn paginate(rows: Vec<WrappedRow>) -> Vec<Vec<WrappedRow>> {
    let available = body_height();
    let mut pages = Vec::new();
    let mut current: Vec<WrappedRow> = Vec::new();
    let mut used = 0.0;

    for row in rows {
        if !current.is_empty() && used + row.height > available {
            pages.push(std::mem::take(&mut current));
            used = 0.0;
        }
        used += row.height;
        current.push(row);
    }
    pages.push(current);
    pages
}

/// Render a titled table to PDF bytes.
pub fn render_table(
    title: &str,
    columns: &[Column],
    rows: &[Vec<String>],
) -> Result<Vec<u8>, AppError> {
    let mut font = Font::load()?;
    let layout = Layout::new(columns);
    let pages = paginate(wrap_rows(&font, &layout, rows));
    let page_count = pages.len();

    let streams: Vec<String> = pages
        .iter()
        .enumerate()
        .map(|(index, page)| {
            page_content(&mut font, title, columns, &layout, page, index + 1, page_count)
        })
        .collect();

    assemble(&font, &streams)
}

fn page_content(
    font: &mut Font,
    title: &str,
    columns: &[Column],
    layout: &Layout,
    rows: &[WrappedRow],
    page_number: usize,
    page_count: usize,
) -> String {
    let mut out = String::new();

    text(&mut out, font, TITLE_SIZE, MARGIN, PAGE_HEIGHT - MARGIN - TITLE_SIZE, title);

    let header_y = header_baseline();
    for (column, x) in columns.iter().zip(&layout.xs) {
        text(&mut out, font, HEADER_SIZE, x + CELL_PADDING, header_y, column.title);
    }
    rule(&mut out, header_y - 5.0, 0.5, 0.0);

    let mut top = header_y - 5.0;
    if rows.is_empty() {
        text(
            &mut out,
            font,
            BODY_SIZE,
            MARGIN + CELL_PADDING,
            top - CELL_PADDING - LINE_HEIGHT + 2.0,
            EMPTY_MESSAGE,
        );
    }

    for row in rows {
        for (lines, x) in row.cells.iter().zip(&layout.xs) {
            for (index, line) in lines.iter().enumerate() {
                let baseline = top - CELL_PADDING - (index + 1) as f32 * LINE_HEIGHT + 2.0;
                text(&mut out, font, BODY_SIZE, x + CELL_PADDING, baseline, line);
            }
        }
        top -= row.height;
        rule(&mut out, top, 0.3, 0.8);
    }

    let footer = format!("Page {} of {}", page_number, page_count);
    let footer_x = PAGE_WIDTH - MARGIN - font.text_width(&footer, FOOTER_SIZE);
    text(&mut out, font, FOOTER_SIZE, footer_x, MARGIN / 2.0, &footer);

    out
}

fn text(out: &mut String, font: &mut Font, size: f32, x: f32, y: f32, value: &str) {
    if value.is_empty() {
        return;
    }
    let encoded = font.encode(value);
    let _ = writeln!(
        out,
        "BT /F1 {} Tf {:.2} {:.2} Td {} Tj ET",
        size, x, y, encoded
    );
}

/// Horizontal line across the table at `y` in the given gray level.
fn rule(out: &mut String, y: f32, width: f32, gray: f32) {
    let _ = writeln!(
        out,
        "{:.2} G {:.2} w {:.2} {:.2} m {:.2} {:.2} l S 0 G",
        gray,
        width,
        MARGIN,
        y,
        PAGE_WIDTH - MARGIN,
        y
    );
}

fn compressed_font() -> Result<&'static [u8], AppError> {
    COMPRESSED_FONT
        .get_or_try_init(|| -> Result<Vec<u8>, AppError> {
            let mut encoder = ZlibEncoder::new(
                Vec::with_capacity(FONT_BYTES.len() / 2),
                Compression::default(),
            );
            encoder.write_all(FONT_BYTES)?;
            Ok(encoder.finish()?)
        })
        .map(Vec::as_slice)
}

fn width_array(font: &Font) -> String {
    let entries: Vec<String> = font
        .used
        .keys()
        .map(|glyph| format!("{} [{}]", glyph, font.advance(*glyph).round() as i32))
        .collect();
    format!("[{}]", entries.join(" "))
}

fn to_unicode_cmap(font: &Font) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let mappings: Vec<(&u16, &char)> = font.used.iter().filter(|(glyph, _)| **glyph != 0).collect();
    for chunk in mappings.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (glyph, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", glyph, utf16);
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

fn stream_object(dict: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

fn assemble(font: &Font, streams: &[String]) -> Result<Vec<u8>, AppError> {
    let page_ids: Vec<usize> = (0..streams.len())
        .map(|i| FIRST_PAGE_ID + 2 * i)
        .collect();

    let bbox = font.face.global_bounding_box();
    let cap_height = font.face.capital_height().unwrap_or(font.face.ascender());
    let cmap = to_unicode_cmap(font);

    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            streams.len()
        )
        .into_bytes(),
        format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
            FONT_NAME, CID_FONT_ID, TO_UNICODE_ID
        )
        .into_bytes(),
        format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {} 0 R /CIDToGIDMap /Identity /W {} >>",
            FONT_NAME,
            DESCRIPTOR_ID,
            width_array(font)
        )
        .into_bytes(),
        stream_object("", cmap.as_bytes()),
        format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 32 /FontBBox [{} {} {} {}] /ItalicAngle 0 /Ascent {} /Descent {} /CapHeight {} /StemV 80 /FontFile2 {} 0 R >>",
            FONT_NAME,
            font.scaled(bbox.x_min),
            font.scaled(bbox.y_min),
            font.scaled(bbox.x_max),
            font.scaled(bbox.y_max),
            font.scaled(font.face.ascender()),
            font.scaled(font.face.descender()),
            font.scaled(cap_height),
            FONT_FILE_ID
        )
        .into_bytes(),
        stream_object(
            &format!("/Filter /FlateDecode /Length1 {}", FONT_BYTES.len()),
            compressed_font()?,
        ),
    ];

    for (stream, page_id) in streams.iter().zip(&page_ids) {
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                TYPE0_FONT_ID,
                page_id + 1
            )
            .into_bytes(),
        );
        objects.push(stream_object("", stream.as_bytes()));
    }

    let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        write!(out, "{} 0 obj\n", index + 1)?;
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1)?;
    for offset in offsets {
        write!(out, "{:010} 00000 n \n", offset)?;
    }
    write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    )?;

    Ok(out)
}

/// Glyph encoding of `text` as it appears in a content stream.
#[cfg(test)]
pub(crate) fn encoded(text: &str) -> String {
    Font::load().expect("embedded font").encode(text)
}
