//! Transaction table parsing.
//!
//! Turns decoded statement text into a [`TransactionTable`]: pre-header
//! lines, the input header and one [`TransactionRow`] per data record.
//! Rows whose amount does not parse are kept (they are written back out
//! untouched) but flagged as malformed.

use crate::constants::{COLUMN_AMOUNT, COLUMN_DATE, COLUMN_MERCHANT, COLUMN_REMARKS};
use crate::encoding::{Codec, DecodedText};
use crate::error::{Result, SaisonError};
use crate::header::locate_header;
use crate::models::{RowIssue, TransactionRow};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Positions of the required columns in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub date: usize,
    pub merchant: usize,
    pub amount: usize,
    pub remarks: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String], path: &Path) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| SaisonError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };
        Ok(Self {
            date: find(COLUMN_DATE)?,
            merchant: find(COLUMN_MERCHANT)?,
            amount: find(COLUMN_AMOUNT)?,
            remarks: find(COLUMN_REMARKS)?,
        })
    }
}

/// Parsed statement file
#[derive(Debug, Clone)]
pub struct TransactionTable {
    pub source: PathBuf,
    pub codec: Codec,
    pub pre_header: Vec<String>,
    pub headers: Vec<String>,
    pub columns: ColumnIndex,
    pub rows: Vec<TransactionRow>,
    /// Per-row problems found while parsing (malformed amounts, ragged rows)
    pub issues: Vec<RowIssue>,
}

impl TransactionTable {
    pub fn reimbursable_rows(&self) -> impl Iterator<Item = &TransactionRow> {
        self.rows.iter().filter(|row| row.is_reimbursable)
    }

    pub fn date<'a>(&self, row: &'a TransactionRow) -> &'a str {
        row.field(self.columns.date)
    }

    pub fn merchant<'a>(&self, row: &'a TransactionRow) -> &'a str {
        row.field(self.columns.merchant)
    }

    pub fn remarks<'a>(&self, row: &'a TransactionRow) -> &'a str {
        row.field(self.columns.remarks)
    }
}

/// Parse an amount cell such as `15,000`, `"¥5,000"` or `-1200円`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_matches('"')
        .chars()
        .filter(|c| !matches!(c, ',' | '¥' | '￥' | '円' | ' ' | '\u{3000}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse decoded text into a transaction table.
pub fn parse_table(decoded: &DecodedText, path: &Path) -> Result<TransactionTable> {
    let location = locate_header(&decoded.text, path)?;
    let body = &decoded.text[location.byte_offset..];

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SaisonError::csv(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let columns = ColumnIndex::resolve(&headers, path)?;

    let mut rows = Vec::new();
    let mut issues = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| SaisonError::csv(path, e))?;
        let line_number = record
            .position()
            .map(|p| p.line() as usize + location.line_index)
            .unwrap_or(0);
        let fields: Vec<String> = record.iter().map(str::to_string).collect();

        let amount_cell = fields.get(columns.amount).map(String::as_str);
        let amount = match amount_cell {
            Some(cell) => parse_amount(cell),
            None => None,
        };

        if amount.is_none() {
            let reason = match amount_cell {
                Some(cell) => format!("amount '{}' is not numeric", cell),
                None => format!(
                    "row has {} fields, amount column is #{}",
                    fields.len(),
                    columns.amount + 1
                ),
            };
            let err = SaisonError::malformed_row(line_number, reason);
            issues.push(RowIssue {
                line: line_number,
                kind: err.kind().to_string(),
                message: err.to_string(),
            });
        }

        rows.push(TransactionRow::new(line_number, fields, amount));
    }

    debug!(
        "Parsed {} rows ({} malformed) from {}",
        rows.len(),
        issues.len(),
        path.display()
    );

    Ok(TransactionTable {
        source: path.to_path_buf(),
        codec: decoded.codec,
        pre_header: location.pre_header,
        headers,
        columns,
        rows,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_bytes;

    fn table(text: &str) -> Result<TransactionTable> {
        let path = Path::new("202510_card.csv");
        let decoded = decode_bytes(text.as_bytes(), path)?;
        parse_table(&decoded, path)
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("15000"), Some(15000.0));
        assert_eq!(parse_amount(" 15,000 "), Some(15000.0));
        assert_eq!(parse_amount("¥5,000"), Some(5000.0));
        assert_eq!(parse_amount("-1200円"), Some(-1200.0));
        assert_eq!(parse_amount("12.5"), Some(12.5));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_parse_table_with_pre_header() {
        let t = table(
            "カード名称,セゾン\n\
             利用日,ご利用店名及び商品名,利用金額,備考\n\
             2025/10/01,喫茶店,15000,会議費\n\
             2025/10/02,料亭,\"5,000\",接待費\n",
        )
        .unwrap();

        assert_eq!(t.pre_header, vec!["カード名称,セゾン"]);
        assert_eq!(t.headers.len(), 4);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].amount, Some(15000.0));
        assert_eq!(t.rows[1].amount, Some(5000.0));
        assert_eq!(t.rows[0].line_number, 3);
        assert_eq!(t.merchant(&t.rows[1]), "料亭");
        assert!(t.issues.is_empty());
    }

    #[test]
    fn test_column_order_follows_header() {
        let t = table("備考,利用金額,利用日,ご利用店名及び商品名\n会議費,100,2025/10/01,店\n").unwrap();
        assert_eq!(t.columns.remarks, 0);
        assert_eq!(t.columns.amount, 1);
        assert_eq!(t.remarks(&t.rows[0]), "会議費");
        assert_eq!(t.date(&t.rows[0]), "2025/10/01");
        assert_eq!(t.rows[0].amount, Some(100.0));
    }

    #[test]
    fn test_malformed_amount_is_kept_and_reported() {
        let t = table(
            "利用日,ご利用店名及び商品名,利用金額,備考\n\
             2025/10/01,店,不明,会議費\n\
             2025/10/02,店,200,その他\n",
        )
        .unwrap();
        assert_eq!(t.rows.len(), 2);
        assert!(t.rows[0].is_malformed());
        assert_eq!(t.rows[0].fields[2], "不明");
        assert_eq!(t.issues.len(), 1);
        assert_eq!(t.issues[0].kind, "MalformedRowError");
        assert_eq!(t.issues[0].line, 2);
    }

    #[test]
    fn test_short_row_is_malformed() {
        let t = table("利用日,ご利用店名及び商品名,利用金額,備考\n2025/10/01,店\n").unwrap();
        assert_eq!(t.rows.len(), 1);
        assert!(t.rows[0].is_malformed());
        assert_eq!(t.remarks(&t.rows[0]), "");
    }

    #[test]
    fn test_missing_column_propagates() {
        let err = table("利用日,ご利用店名及び商品名,備考\n").unwrap_err();
        assert!(matches!(err, SaisonError::MissingColumn { .. }));
    }
}
