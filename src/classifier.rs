//! Reimbursable-expense classification.
//!
//! A row is reimbursable when its remarks mention either category marker.
//! The markers are checked independently, so a row that matches both is
//! still flagged exactly once.

use crate::constants::CATEGORY_MARKERS;
use crate::reader::TransactionTable;

/// True when `remarks` contains any marker (case-insensitive substring match)
pub fn is_reimbursable(remarks: &str) -> bool {
    let haystack = remarks.to_lowercase();
    CATEGORY_MARKERS
        .iter()
        .any(|marker| haystack.contains(&marker.to_lowercase()))
}

/// Flag reimbursable rows in place; malformed rows are never flagged.
///
/// Returns the number of reimbursable rows.
pub fn classify(table: &mut TransactionTable) -> usize {
    let remarks_index = table.columns.remarks;
    let mut count = 0;
    for row in &mut table.rows {
        row.is_reimbursable = !row.is_malformed() && is_reimbursable(row.field(remarks_index));
        if row.is_reimbursable {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_bytes;
    use crate::reader::parse_table;
    use std::path::Path;

    #[test]
    fn test_markers_match_as_substrings() {
        assert!(is_reimbursable("会議費"));
        assert!(is_reimbursable("接待費"));
        assert!(is_reimbursable("社内会議費（A社）"));
        assert!(is_reimbursable("会議費/接待費"));
        assert!(!is_reimbursable("その他"));
        assert!(!is_reimbursable(""));
        assert!(!is_reimbursable("会議"));
    }

    #[test]
    fn test_classify_skips_malformed_rows() {
        let text = "利用日,ご利用店名及び商品名,利用金額,備考\n\
                    2025/10/01,店,15000,会議費\n\
                    2025/10/02,店,abc,接待費\n\
                    2025/10/03,店,100,その他\n";
        let path = Path::new("202510_a.csv");
        let decoded = decode_bytes(text.as_bytes(), path).unwrap();
        let mut table = parse_table(&decoded, path).unwrap();

        assert_eq!(classify(&mut table), 1);
        assert!(table.rows[0].is_reimbursable);
        assert!(!table.rows[1].is_reimbursable);
        assert!(!table.rows[2].is_reimbursable);
    }
}
