//! Itinerary export to PDF.
//!
//! Layout is done in millimetres on an A4 page with the origin at the top-left corner.
//! [`PdfCanvas`] converts to PDF points when it writes the content streams.

use super::Booking;
use chrono::NaiveDate;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

const MARGIN: f32 = 20.0;
const BOTTOM: f32 = PAGE_HEIGHT_MM - MARGIN;
const LINE: f32 = 6.0;
const TITLE_LINE: f32 = 7.0;
/// Space under a block's last row, separator included.
const BLOCK_GAP: f32 = 5.0;
/// Characters per line that fit the text column in the title and row fonts.
const TITLE_CHARS: usize = 56;
const ROW_CHARS: usize = 85;
const PT_PER_MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Drawing surface the itinerary is laid out on.
pub trait Canvas {
    fn set_font(&mut self, font: Font, size: f32);

    /// Draws `text` with its baseline at `y`.
    fn text(&mut self, x: f32, y: f32, text: &str);

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);

    /// Starts a new page. Later drawing goes to it.
    fn add_page(&mut self);
}

/// Lays out `bookings`, one block each, breaking pages as needed.
pub fn render_itinerary<C: Canvas + ?Sized>(
    canvas: &mut C,
    bookings: &[&Booking],
    generated_on: NaiveDate,
) {
    canvas.set_font(Font::Bold, 20.0);
    canvas.text(MARGIN, MARGIN + 4.0, "My Caicos Itinerary");
    canvas.set_font(Font::Regular, 10.0);
    canvas.text(
        MARGIN,
        MARGIN + 12.0,
        &format!("Generated on {}", generated_on.format("%B %-d, %Y")),
    );
    canvas.line(MARGIN, MARGIN + 16.0, PAGE_WIDTH_MM - MARGIN, MARGIN + 16.0);

    let mut y = MARGIN + 26.0;
    if bookings.is_empty() {
        canvas.text(MARGIN, y, "No bookings to show.");
        return;
    }

    for booking in bookings {
        let block = BookingBlock::new(booking);
        if y + block.height() > BOTTOM {
            canvas.add_page();
            y = MARGIN;
        }
        block.render(canvas, y);
        y += block.height();
    }
}

/// One booking, already wrapped to the page width.
struct BookingBlock {
    title: Vec<String>,
    rows: Vec<String>,
}

impl BookingBlock {
    fn new(booking: &Booking) -> Self {
        let date = booking
            .primary_date()
            .map(|date| date.format("%a, %b %-d, %Y").to_string())
            .unwrap_or_else(|| "Date to be confirmed".to_string());
        let rows = [
            format!("Category: {}", booking.category()),
            format!("Date: {date}"),
            format!("Status: {}", booking.status),
            format!("Guests: {}", booking.guests),
            format!("Total: ${:.2}", booking.total_price),
        ];
        Self {
            title: wrap(&booking.service_name, TITLE_CHARS),
            rows: rows.iter().flat_map(|row| wrap(row, ROW_CHARS)).collect(),
        }
    }

    fn rows_top(&self, y: f32) -> f32 {
        y + TITLE_LINE * self.title.len() as f32
    }

    fn height(&self) -> f32 {
        self.rows_top(0.0) + LINE * self.rows.len() as f32 + BLOCK_GAP
    }

    fn render<C: Canvas + ?Sized>(&self, canvas: &mut C, y: f32) {
        canvas.set_font(Font::Bold, 13.0);
        for (i, line) in self.title.iter().enumerate() {
            canvas.text(MARGIN, y + TITLE_LINE * i as f32, line);
        }
        canvas.set_font(Font::Regular, 10.0);
        let mut row_y = self.rows_top(y);
        for row in &self.rows {
            canvas.text(MARGIN + 4.0, row_y, row);
            row_y += LINE;
        }
        let rule = row_y - 1.0;
        canvas.line(MARGIN, rule, PAGE_WIDTH_MM - MARGIN, rule);
    }
}

/// Greedy word wrap to at most `width` characters per line. Words longer than a line are
/// split. Always returns at least one line.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for mut word in text.split_whitespace() {
        while word.chars().count() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let split = word
                .char_indices()
                .nth(width)
                .map_or(word.len(), |(at, _)| at);
            lines.push(word[..split].to_string());
            word = &word[split..];
        }
        let used = line.chars().count();
        if used > 0 && used + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// A [`Canvas`] writing a PDF 1.4 document with the standard Helvetica fonts.
#[derive(Debug)]
pub struct PdfCanvas {
    pages: Vec<String>,
    font: Font,
    size: f32,
}

impl Default for PdfCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfCanvas {
    /// A document with one blank page.
    pub fn new() -> Self {
        Self {
            pages: vec![String::new()],
            font: Font::Regular,
            size: 12.0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&mut self) -> &mut String {
        if self.pages.is_empty() {
            self.pages.push(String::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Serializes the document.
    pub fn finish(self) -> Vec<u8> {
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            String::new(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        let mut kids = Vec::with_capacity(self.pages.len());
        for content in &self.pages {
            let page_id = objects.len() + 1;
            kids.push(format!("{page_id} 0 R"));
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH_MM * PT_PER_MM,
                PAGE_HEIGHT_MM * PT_PER_MM,
                page_id + 1,
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}endstream",
                content.len()
            ));
        }
        objects[1] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            self.pages.len()
        );

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{object}\nendobj\n", index + 1));
        }
        let xref = out.len();
        out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            out.push_str(&format!("{offset:010} 00000 n \n"));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        out.into_bytes()
    }
}

impl Canvas for PdfCanvas {
    fn set_font(&mut self, font: Font, size: f32) {
        self.font = font;
        self.size = size;
    }

    fn text(&mut self, x: f32, y: f32, text: &str) {
        let op = format!(
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET\n",
            self.font.resource(),
            self.size,
            x * PT_PER_MM,
            (PAGE_HEIGHT_MM - y) * PT_PER_MM,
            escape(text),
        );
        self.page().push_str(&op);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let op = format!(
            "0.5 w {:.2} {:.2} m {:.2} {:.2} l S\n",
            x1 * PT_PER_MM,
            (PAGE_HEIGHT_MM - y1) * PT_PER_MM,
            x2 * PT_PER_MM,
            (PAGE_HEIGHT_MM - y2) * PT_PER_MM,
        );
        self.page().push_str(&op);
    }

    fn add_page(&mut self) {
        self.pages.push(String::new());
    }
}

/// Escapes a string literal for a WinAnsi-encoded font. Latin-1 characters become octal
/// escapes, anything else becomes `?`.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            '\u{a0}'..='\u{ff}' => escaped.push_str(&format!("\\{:03o}", u32::from(c))),
            _ => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::tests::booking;

    #[derive(Debug, PartialEq)]
    enum Op {
        Font(Font),
        Text(f32, String),
        Line,
        Page,
    }

    #[derive(Default)]
    struct Recorder(Vec<Op>);

    impl Canvas for Recorder {
        fn set_font(&mut self, font: Font, _size: f32) {
            self.0.push(Op::Font(font));
        }

        fn text(&mut self, _x: f32, y: f32, text: &str) {
            self.0.push(Op::Text(y, text.to_string()));
        }

        fn line(&mut self, _x1: f32, _y1: f32, _x2: f32, _y2: f32) {
            self.0.push(Op::Line);
        }

        fn add_page(&mut self) {
            self.0.push(Op::Page);
        }
    }

    fn generated_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[test]
    fn blocks_stay_inside_the_page() {
        let bookings: Vec<_> = (0..14).map(|i| booking(&i.to_string(), "2026-11-01")).collect();
        let refs: Vec<&Booking> = bookings.iter().collect();
        let mut recorder = Recorder::default();
        render_itinerary(&mut recorder, &refs, generated_on());

        let pages = recorder.0.iter().filter(|op| **op == Op::Page).count();
        assert_eq!(pages, 2);
        for op in &recorder.0 {
            if let Op::Text(y, _) = op {
                assert!(*y <= BOTTOM, "text drawn below the margin at {y}");
            }
        }
        let names: Vec<_> = recorder
            .0
            .iter()
            .filter_map(|op| match op {
                Op::Text(_, text) if text.starts_with("Service ") => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn booking_block_lists_its_details() {
        let mut stay = booking("villa", "2026-12-20");
        stay.service_name = "Beach villa".to_string();
        stay.total_price = 640.5;
        let mut recorder = Recorder::default();
        render_itinerary(&mut recorder, &[&stay], generated_on());

        let texts: Vec<_> = recorder
            .0
            .iter()
            .filter_map(|op| match op {
                Op::Text(_, text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            texts,
            [
                "My Caicos Itinerary",
                "Generated on October 15, 2026",
                "Beach villa",
                "Category: activity",
                "Date: Sun, Dec 20, 2026",
                "Status: confirmed",
                "Guests: 2",
                "Total: $640.50",
            ]
        );
    }

    #[test]
    fn long_service_names_wrap_and_grow_the_block() {
        let mut cruise = booking("cruise", "2026-11-03");
        cruise.service_name = "Private sunset catamaran cruise to Little Water Cay with a \
                               snorkelling stop at Smith's Reef and a beach dinner"
            .to_string();
        let next = booking("next", "2026-11-04");
        let mut recorder = Recorder::default();
        render_itinerary(&mut recorder, &[&cruise, &next], generated_on());

        let title: Vec<_> = recorder
            .0
            .iter()
            .filter_map(|op| match op {
                Op::Text(y, text) if *y >= MARGIN + 26.0 && *y < MARGIN + 40.0 => {
                    Some((*y, text.as_str()))
                }
                _ => None,
            })
            .take_while(|(_, text)| !text.starts_with("Category:"))
            .collect();
        assert_eq!(title.len(), 2);
        assert!(title.iter().all(|(_, text)| text.chars().count() <= TITLE_CHARS));
        assert_eq!(
            title.iter().map(|(_, text)| *text).collect::<Vec<_>>().join(" "),
            cruise.service_name
        );
        assert_eq!(title[1].0 - title[0].0, TITLE_LINE);

        let category_y = recorder.0.iter().find_map(|op| match op {
            Op::Text(y, text) if text == "Category: activity" => Some(*y),
            _ => None,
        });
        assert_eq!(category_y, Some(MARGIN + 26.0 + 2.0 * TITLE_LINE));

        let next_y = recorder.0.iter().find_map(|op| match op {
            Op::Text(y, text) if *text == next.service_name => Some(*y),
            _ => None,
        });
        assert_eq!(next_y, Some(MARGIN + 26.0 + 49.0));
    }

    #[test]
    fn wrap_splits_words_longer_than_a_line() {
        assert_eq!(wrap("", 10), [""]);
        assert_eq!(wrap("Grace Bay beach day", 10), ["Grace Bay", "beach day"]);
        assert_eq!(
            wrap("Snorkel Providenciales", 8),
            ["Snorkel", "Providen", "ciales"]
        );
    }

    #[test]
    fn empty_itinerary_says_so() {
        let mut recorder = Recorder::default();
        render_itinerary(&mut recorder, &[], generated_on());
        assert!(recorder
            .0
            .contains(&Op::Text(MARGIN + 26.0, "No bookings to show.".to_string())));
    }

    #[test]
    fn document_structure_is_consistent() {
        let mut canvas = PdfCanvas::new();
        canvas.set_font(Font::Bold, 20.0);
        canvas.text(20.0, 24.0, "Grace Bay (day 1)");
        canvas.add_page();
        canvas.line(20.0, 36.0, 190.0, 36.0);
        assert_eq!(canvas.page_count(), 2);

        let bytes = canvas.finish();
        let pdf = String::from_utf8(bytes).unwrap();
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert!(pdf.contains("/Count 2"));
        assert!(pdf.contains("/F2 20.0 Tf 56.69 773.86 Td (Grace Bay \\(day 1\\)) Tj ET"));

        // Every xref entry points at its object.
        let xref_at: usize = pdf
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        let table = &pdf[xref_at..];
        for (index, entry) in table.lines().skip(3).take(8).enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            assert!(pdf[offset..].starts_with(&format!("{} 0 obj", index + 1)));
        }
    }

    #[test]
    fn non_ascii_text_is_escaped() {
        assert_eq!(escape("Café"), "Caf\\351");
        assert_eq!(escape("a\\b"), "a\\\\b");
        assert_eq!(escape("🌴"), "?");
    }
}
