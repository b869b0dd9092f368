//! HTML report for reimbursable transactions.
//!
//! The report is built in two steps: [`ReportContext`] collects the data
//! (reimbursable rows plus the de-duplicated, roster-joined attendee list)
//! and a [`ReportRenderer`] turns it into markup. The built-in
//! [`HtmlReportRenderer`] produces a self-contained page.

use crate::error::{Result, SaisonError};
use crate::reader::TransactionTable;
use crate::roster::{Roster, numeric_id_order};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// One reimbursable row as shown in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub line: usize,
    pub date: String,
    pub merchant: String,
    pub amount: f64,
    pub remarks: String,
    pub attendee_count: Option<usize>,
    pub attendee_ids: Vec<String>,
}

/// Attendee joined with roster details; unknown ids keep blank details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportAttendee {
    pub id: String,
    pub name: String,
    pub title: String,
    pub company: String,
}

/// Data handed to a renderer
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub filename: String,
    pub generated_at: DateTime<Local>,
    pub total_transactions: usize,
    pub total_amount: f64,
    pub transactions: Vec<ReportRow>,
    pub unique_attendees: Vec<ReportAttendee>,
}

impl ReportContext {
    pub fn build(table: &TransactionTable, roster: &Roster, filename: &str) -> Self {
        let transactions: Vec<ReportRow> = table
            .reimbursable_rows()
            .map(|row| ReportRow {
                line: row.line_number,
                date: table.date(row).to_string(),
                merchant: table.merchant(row).to_string(),
                amount: row.amount.unwrap_or_default(),
                remarks: table.remarks(row).to_string(),
                attendee_count: row.attendance.as_ref().map(|a| a.count),
                attendee_ids: row
                    .attendance
                    .as_ref()
                    .map(|a| a.ids.ids().map(str::to_string).collect())
                    .unwrap_or_default(),
            })
            .collect();

        let ids: BTreeSet<&str> = transactions
            .iter()
            .flat_map(|row| row.attendee_ids.iter().map(String::as_str))
            .collect();
        let mut ids: Vec<&str> = ids.into_iter().collect();
        ids.sort_by(|a, b| numeric_id_order(a, b));

        let unique_attendees = ids
            .into_iter()
            .map(|id| match roster.get(id) {
                Some(a) => ReportAttendee {
                    id: a.id.clone(),
                    name: a.name.clone(),
                    title: a.title.clone(),
                    company: a.company.clone(),
                },
                None => ReportAttendee {
                    id: id.to_string(),
                    name: String::new(),
                    title: String::new(),
                    company: String::new(),
                },
            })
            .collect();

        Self {
            filename: filename.to_string(),
            generated_at: Local::now(),
            total_transactions: transactions.len(),
            total_amount: transactions.iter().map(|r| r.amount).sum(),
            transactions,
            unique_attendees,
        }
    }
}

/// Seam for report templating
pub trait ReportRenderer {
    fn render(&self, context: &ReportContext) -> Result<String>;
}

/// Minimal built-in HTML renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportRenderer;

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, ctx: &ReportContext) -> Result<String> {
        let mut html = String::with_capacity(4096);

        html.push_str(&format!(
            "<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>経費レポート - {file}</title>\n</head>\n<body>\n\
             <h1>経費レポート</h1>\n\
             <p>ファイル: {file}<br>作成日時: {generated}<br>件数: {count}<br>合計金額: {total}</p>\n",
            file = escape_html(&ctx.filename),
            generated = ctx.generated_at.format("%Y-%m-%d %H:%M:%S"),
            count = ctx.total_transactions,
            total = format_amount(ctx.total_amount),
        ));

        html.push_str(
            "<h2>対象取引</h2>\n<table>\n<thead><tr><th>利用日</th><th>ご利用店名及び商品名</th>\
             <th>利用金額</th><th>備考</th><th>人数</th><th>参加者ID</th></tr></thead>\n<tbody>\n",
        );
        for row in &ctx.transactions {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&row.date),
                escape_html(&row.merchant),
                format_amount(row.amount),
                escape_html(&row.remarks),
                row.attendee_count.map(|c| c.to_string()).unwrap_or_default(),
                escape_html(&row.attendee_ids.join(", ")),
            ));
        }
        html.push_str("</tbody>\n</table>\n");

        html.push_str(
            "<h2>参加者一覧</h2>\n<table>\n<thead><tr><th>ID</th><th>氏名</th><th>役職</th>\
             <th>会社</th></tr></thead>\n<tbody>\n",
        );
        for attendee in &ctx.unique_attendees {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&attendee.id),
                escape_html(&attendee.name),
                escape_html(&attendee.title),
                escape_html(&attendee.company),
            ));
        }
        html.push_str("</tbody>\n</table>\n</body>\n</html>\n");

        Ok(html)
    }
}

/// Render `context` with `renderer` and write it to `path`
pub fn write_report(
    context: &ReportContext,
    renderer: &dyn ReportRenderer,
    path: &Path,
) -> Result<()> {
    let html = renderer.render(context)?;
    std::fs::write(path, html).map_err(|e| SaisonError::io(path, e))?;
    debug!(
        "Wrote report with {} rows and {} attendees to {}",
        context.total_transactions,
        context.unique_attendees.len(),
        path.display()
    );
    Ok(())
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Whole amounts get thousands separators; fractional amounts print as-is
fn format_amount(amount: f64) -> String {
    if amount.fract() != 0.0 {
        return amount.to_string();
    }
    let digits = format!("{}", amount.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
