//! Visit report generation.
//!
//! A report is a pure read over one ticket: the denormalized ticket
//! row, its ordered checklist, its notes and the linked template's
//! solution, rendered into a fixed single-column A4 layout. No side
//! effects; safe to retry.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocumentReference, PdfLayerReference};

use crate::db::{
    get_issue, get_ticket_row, list_notes, list_steps, DbPool, StoreError, TicketListRow,
    TicketNote, TicketStep, RESULT_FAIL, RESULT_PASS,
};

#[derive(Debug)]
pub struct ReportData {
    pub ticket: TicketListRow,
    pub steps: Vec<TicketStep>,
    pub notes: Vec<TicketNote>,
    pub solution: Option<String>,
}

/// Assemble everything the report shows. Fails only when the ticket id
/// does not resolve; a dangling issue reference just leaves the
/// template sections empty.
pub async fn load_report_data(pool: &DbPool, ticket_id: &str) -> Result<ReportData, StoreError> {
    let ticket = get_ticket_row(pool, ticket_id).await?;
    let steps = list_steps(pool, ticket_id).await?;
    let notes = list_notes(pool, ticket_id).await?;

    let solution = match &ticket.issue_id {
        Some(issue_id) => match get_issue(pool, issue_id).await {
            Ok(issue) => issue.solution,
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };

    Ok(ReportData {
        ticket,
        steps,
        notes,
        solution,
    })
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 18.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;

/// Character budget per line at BODY_SIZE within the content width.
const WRAP_COLUMNS: usize = 95;

/// Render the report into PDF bytes.
pub fn render_pdf(data: &ReportData) -> Result<Vec<u8>, printpdf::Error> {
    let (doc, page, layer) = printpdf::PdfDocument::new(
        format!("Visit Report {}", data.ticket.id),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let body = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    {
        let mut w = Writer {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT - MARGIN_TOP,
        };

        let ticket = &data.ticket;

        // Title block
        w.line("VISIT REPORT", &bold, TITLE_SIZE);
        w.line(&format!("Ticket {}", ticket.id), &body, BODY_SIZE);
        w.gap(4.0);

        // Metadata
        let status = match &ticket.completed_at {
            Some(completed) => format!("{} (completed {})", ticket.status, fmt_ts(completed)),
            None => ticket.status.clone(),
        };
        w.kv("Status", &status, &bold, &body);
        w.kv("Site", or_dash(&ticket.site), &bold, &body);
        w.kv("Visit date", or_dash(&ticket.visit_date), &bold, &body);
        w.kv("Category", or_dash(&ticket.category_name), &bold, &body);
        w.kv("Issue", or_dash(&ticket.issue_title), &bold, &body);
        w.kv(
            "Engineer",
            &person(
                &ticket.engineer_first_name,
                &ticket.engineer_last_name,
                &ticket.engineer_email,
            ),
            &bold,
            &body,
        );
        w.kv(
            "Created by",
            &person(
                &ticket.creator_first_name,
                &ticket.creator_last_name,
                &ticket.creator_email,
            ),
            &bold,
            &body,
        );
        w.kv("Created at", &fmt_ts(&ticket.created_at), &bold, &body);
        w.gap(4.0);

        // Visit description
        if let Some(description) = &ticket.description {
            w.heading("Description", &bold);
            w.paragraph(description, &body);
        }

        // Template description
        if let Some(template) = &ticket.issue_description {
            w.heading("Template description", &bold);
            w.paragraph(template, &body);
        }

        // Checklist
        if !data.steps.is_empty() {
            w.heading("Checklist", &bold);
            for step in &data.steps {
                let entry = format!("{} {}", result_marker(step.result.as_deref()), step.step_text);
                w.paragraph(&entry, &body);
            }
            w.gap(2.0);
        }

        // Notes
        if !data.notes.is_empty() {
            w.heading("Notes", &bold);
            for note in &data.notes {
                let entry = format!("[{}] {}", fmt_ts(&note.created_at), note.note_text);
                w.paragraph(&entry, &body);
            }
            w.gap(2.0);
        }

        // Template solution
        if let Some(solution) = &data.solution {
            w.heading("Suggested solution", &bold);
            w.paragraph(solution, &body);
        }

        w.gap(6.0);
        w.line(
            &format!("Generated by fieldlog v{}", env!("CARGO_PKG_VERSION")),
            &body,
            8.0,
        );
    }

    doc.save_to_bytes()
}

/// Cursor-based writer over the document, breaking to a fresh page when
/// the cursor passes the bottom margin.
struct Writer<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl Writer<'_> {
    fn ensure_room(&mut self, needed: f32) {
        if self.y - needed < MARGIN_BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN_TOP;
        }
    }

    fn line(&mut self, text: &str, font: &IndirectFontRef, size: f32) {
        let advance = size * 0.55;
        self.ensure_room(advance);
        self.layer
            .use_text(sanitize(text), size, Mm(MARGIN_LEFT), Mm(self.y), font);
        self.y -= advance;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn heading(&mut self, text: &str, bold: &IndirectFontRef) {
        self.gap(2.0);
        self.line(text, bold, HEADING_SIZE);
    }

    fn kv(&mut self, label: &str, value: &str, bold: &IndirectFontRef, body: &IndirectFontRef) {
        let advance = BODY_SIZE * 0.55;
        self.ensure_room(advance);
        self.layer
            .use_text(sanitize(label), BODY_SIZE, Mm(MARGIN_LEFT), Mm(self.y), bold);
        self.layer.use_text(
            sanitize(value),
            BODY_SIZE,
            Mm(MARGIN_LEFT + 35.0),
            Mm(self.y),
            body,
        );
        self.y -= advance;
    }

    fn paragraph(&mut self, text: &str, body: &IndirectFontRef) {
        for raw_line in text.lines() {
            if raw_line.trim().is_empty() {
                self.gap(2.0);
                continue;
            }
            for wrapped in wrap_text(raw_line, WRAP_COLUMNS) {
                self.line(&wrapped, body, BODY_SIZE);
            }
        }
    }
}

fn result_marker(result: Option<&str>) -> &'static str {
    match result {
        Some(RESULT_PASS) => "[PASS]",
        Some(RESULT_FAIL) => "[FAIL]",
        _ => "[ ]",
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// "First Last (email)" with missing parts dropped; "-" when empty.
fn person(first: &Option<String>, last: &Option<String>, email: &Option<String>) -> String {
    let name = format!(
        "{} {}",
        first.as_deref().unwrap_or(""),
        last.as_deref().unwrap_or("")
    )
    .trim()
    .to_string();

    match (name.is_empty(), email) {
        (false, Some(email)) => format!("{name} ({email})"),
        (false, None) => name,
        (true, Some(email)) => email.clone(),
        (true, None) => "-".to_string(),
    }
}

/// RFC 3339 timestamps rendered as "YYYY-MM-DD HH:MM UTC"; anything
/// unparseable passes through untouched.
fn fmt_ts(value: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .format("%Y-%m-%d %H:%M UTC")
                .to_string()
        })
        .unwrap_or_else(|_| value.to_string())
}

/// The built-in fonts are WinAnsi-encoded; anything outside Latin-1 is
/// replaced rather than silently mangled.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 256 { c } else { '?' })
        .collect()
}

/// Word-wrap a single line to a character budget, hard-splitting words
/// longer than the budget.
fn wrap_text(line: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let mut word = word;
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let (head, tail) = split_at_char_boundary(word, columns);
            lines.push(head.to_string());
            word = tail;
        }

        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= columns {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_at_char_boundary(s: &str, mut at: usize) -> (&str, &str) {
    while at < s.len() && !s.is_char_boundary(at) {
        at -= 1;
    }
    s.split_at(at)
}
