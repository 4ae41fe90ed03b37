// 📊 Report Rendering - Text table and CSV export
//
// Amounts are shown in whole thousands ("1 234k"), digits grouped by spaces.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::entities::{LocationTab, Participant};
use crate::error::Currency;
use crate::payroll::Payroll;

// ============================================================================
// NUMBER FORMATTING
// ============================================================================

/// 1234567 → "1 234 567"
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// 1234000 → "1 234k" (truncated to whole thousands)
pub fn format_thousands_k(value: i64) -> String {
    format!("{}k", format_thousands(value / 1000))
}

fn format_points(points: f64) -> String {
    format!("{:.3}", points)
}

// ============================================================================
// TABLE
// ============================================================================

/// Column headers plus one row per participant
fn table(payroll: &Payroll) -> (Vec<String>, Vec<Vec<String>>) {
    let buckets = payroll.participants.item_buckets();

    let mut headers = vec![
        "Name".to_string(),
        "Cash".to_string(),
        "Tax returns".to_string(),
        "Return points".to_string(),
    ];
    headers.extend(buckets.iter().map(|b| format!("LOOT {}", b.label())));

    let rows = payroll
        .participants
        .all()
        .iter()
        .map(|participant| row(participant, &buckets))
        .collect();

    (headers, rows)
}

fn row(participant: &Participant, buckets: &[LocationTab]) -> Vec<String> {
    let mut cells = vec![
        participant.name().to_string(),
        format_thousands_k(participant.cash_after_tax),
        format_thousands_k(participant.total_returns()),
        format_points(participant.return_points),
    ];
    cells.extend(
        buckets
            .iter()
            .map(|b| format_thousands_k(participant.items_after_tax.get(&b.location, &b.tab))),
    );
    cells
}

/// Headline totals followed by the padded participant table
pub fn render_text(payroll: &Payroll) -> String {
    let mut out = String::new();

    let totals = [
        ("Items tax", payroll.items_tax_total),
        ("Cash tax", payroll.cash_tax_total),
        ("Items paid out", payroll.payouts(Currency::Items)),
        ("Cash paid out", payroll.payouts(Currency::Cash)),
        ("Item returns", payroll.returns_received(Currency::Items)),
        ("Cash returns", payroll.returns_received(Currency::Cash)),
    ];
    for (label, value) in totals {
        out.push_str(&format!("{}: {}\n", label, format_thousands_k(value)));
    }
    if !payroll.distribution.is_distributed() {
        out.push_str(&format!(
            "Undistributed returns: {} items, {} cash\n",
            format_thousands_k(payroll.undistributed_items),
            format_thousands_k(payroll.undistributed_cash),
        ));
    }

    let (headers, rows) = table(payroll);
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let pad = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header_line = pad(&headers[..]);
    out.push_str(&header_line);
    out.push('\n');
    out.push_str(&"-".repeat(header_line.chars().count()));
    out.push('\n');
    for r in &rows {
        out.push_str(&pad(&r[..]));
        out.push('\n');
    }

    out
}

// ============================================================================
// CSV
// ============================================================================

/// Same columns as the text table; amounts in raw units
pub fn write_csv<W: Write>(payroll: &Payroll, writer: W) -> Result<()> {
    let buckets = payroll.participants.item_buckets();
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let mut header = vec![
        "name".to_string(),
        "cash".to_string(),
        "returns".to_string(),
        "return_points".to_string(),
    ];
    header.extend(buckets.iter().map(|b| b.label()));
    csv_writer.write_record(&header).context("Failed to write CSV header")?;

    for participant in payroll.participants.all() {
        let mut record = vec![
            participant.name().to_string(),
            participant.cash_after_tax.to_string(),
            participant.total_returns().to_string(),
            participant.return_points.to_string(),
        ];
        record.extend(
            buckets
                .iter()
                .map(|b| participant.items_after_tax.get(&b.location, &b.tab).to_string()),
        );
        csv_writer
            .write_record(&record)
            .with_context(|| format!("Failed to write CSV row for {}", participant.name()))?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn write_csv_file(payroll: &Payroll, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    write_csv(payroll, std::io::BufWriter::new(file))
}

// ============================================================================
// TESTS
// ============================================================================
