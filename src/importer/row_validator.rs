// ==========================================
// 发票导入系统 - 行校验器
// ==========================================
// 职责: 原始行 → 类型化发票字段 + 有效标志 + 错误列表
// 约束: 纯函数，不返回错误；所有错误累积在结果中
// 行号: 展示行号（表头为第 1 行，首个数据行为第 2 行）
// ==========================================

use crate::domain::invoice::{InvoiceFields, ValidatedRow};
use crate::domain::types::Currency;
use crate::importer::invoice_importer_trait::RawRow;
use chrono::NaiveDate;
use uuid::{Uuid, Variant};

// ===== 源文件列名 =====
pub mod columns {
    pub const INVOICE_ID: &str = "invoice_id";
    pub const SELLER_ID: &str = "seller_id";
    pub const DEBTOR_ID: &str = "debtor_id";
    pub const CURRENCY: &str = "currency";
    pub const AMOUNT: &str = "amount";
    pub const PRODUCT: &str = "product";
    pub const ISSUE_DATE: &str = "issue_date";
    pub const DUE_DATE: &str = "due_date";

    pub const ALL: [&str; 8] = [
        INVOICE_ID, SELLER_ID, DEBTOR_ID, CURRENCY, AMOUNT, PRODUCT, ISSUE_DATE, DUE_DATE,
    ];
}

// ==========================================
// 单字段校验工具
// ==========================================

/// 规范 UUID 文本格式（8-4-4-4-12，版本 1-5，RFC 4122 变体）
pub fn is_valid_uuid(value: &str) -> bool {
    let value = value.trim();
    if value.len() != 36 {
        return false;
    }
    match Uuid::try_parse(value) {
        Ok(uuid) => {
            matches!(uuid.get_version_num(), 1..=5) && uuid.get_variant() == Variant::RFC4122
        }
        Err(_) => false,
    }
}

/// 币种（大小写不敏感）→ 白名单币种
pub fn normalize_currency(value: &str) -> Option<Currency> {
    value.parse::<Currency>().ok()
}

/// 金额：有限数且严格大于 0
pub fn parse_amount(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount > 0.0)
}

/// 日期：严格 YYYY-MM-DD 且为合法日历日期
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let shape_ok = bytes.iter().enumerate().all(|(idx, b)| match idx {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

// ==========================================
// RowValidator
// ==========================================
pub struct RowValidator;

impl RowValidator {
    /// 校验单行
    ///
    /// # 参数
    /// - raw: 原始行（列名 → 文本）
    /// - row_number: 展示行号
    pub fn validate(&self, raw: &RawRow, row_number: usize) -> ValidatedRow {
        let mut errors = Vec::new();
        let mut fields = InvoiceFields::default();

        fields.invoice_id = Self::uuid_field(raw, columns::INVOICE_ID, row_number, &mut errors);
        fields.seller_id = Self::uuid_field(raw, columns::SELLER_ID, row_number, &mut errors);
        fields.debtor_id = Self::uuid_field(raw, columns::DEBTOR_ID, row_number, &mut errors);

        // 币种
        let currency_raw = Self::lookup(raw, columns::CURRENCY);
        if currency_raw.is_empty() {
            errors.push(format!("Row {}: currency is required", row_number));
        } else {
            match normalize_currency(currency_raw) {
                Some(currency) => fields.currency = Some(currency),
                None => errors.push(format!(
                    "Row {}: invalid currency \"{}\" (allowed: {})",
                    row_number,
                    currency_raw,
                    Currency::allowed_codes()
                )),
            }
        }

        // 金额
        let amount_raw = Self::lookup(raw, columns::AMOUNT);
        if amount_raw.is_empty() {
            errors.push(format!("Row {}: amount is required", row_number));
        } else {
            match parse_amount(amount_raw) {
                Some(amount) => fields.amount = Some(amount),
                None => errors.push(format!(
                    "Row {}: amount \"{}\" must be a number greater than 0",
                    row_number, amount_raw
                )),
            }
        }

        // 产品描述
        let product = Self::lookup(raw, columns::PRODUCT);
        if product.is_empty() {
            errors.push(format!("Row {}: product is required", row_number));
        } else {
            fields.product = product.to_string();
        }

        // 日期
        fields.issue_date = Self::date_field(raw, columns::ISSUE_DATE, row_number, &mut errors);
        fields.due_date = Self::date_field(raw, columns::DUE_DATE, row_number, &mut errors);

        // 跨字段：到期日必须晚于开票日
        if let (Some(issue), Some(due)) = (fields.issue_date, fields.due_date) {
            if due <= issue {
                errors.push(format!(
                    "Row {}: due_date {} must be after issue_date {}",
                    row_number, due, issue
                ));
            }
        }

        ValidatedRow {
            row_number,
            fields,
            is_valid: errors.is_empty(),
            validation_errors: errors,
        }
    }

    /// 按列名取值（列名大小写不敏感，值已去空白）
    fn lookup<'a>(raw: &'a RawRow, column: &str) -> &'a str {
        raw.iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(column))
            .map(|(_, value)| value.trim())
            .unwrap_or("")
    }

    fn uuid_field(
        raw: &RawRow,
        column: &str,
        row_number: usize,
        errors: &mut Vec<String>,
    ) -> String {
        let value = Self::lookup(raw, column);
        if value.is_empty() {
            errors.push(format!("Row {}: {} is required", row_number, column));
            return String::new();
        }
        if !is_valid_uuid(value) {
            errors.push(format!(
                "Row {}: {} \"{}\" is not a valid UUID",
                row_number, column, value
            ));
            return String::new();
        }
        value.to_string()
    }

    fn date_field(
        raw: &RawRow,
        column: &str,
        row_number: usize,
        errors: &mut Vec<String>,
    ) -> Option<NaiveDate> {
        let value = Self::lookup(raw, column);
        if value.is_empty() {
            errors.push(format!("Row {}: {} is required", row_number, column));
            return None;
        }
        let parsed = parse_iso_date(value);
        if parsed.is_none() {
            errors.push(format!(
                "Row {}: {} \"{}\" must be a valid date in YYYY-MM-DD format",
                row_number, column, value
            ));
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "123e4567-e89b-12d3-a456-426614174000";
    const ID_B: &str = "9b2f4c1e-3d5a-4f6b-8c7d-0e1f2a3b4c5d";
    const ID_C: &str = "6fa459ea-ee8a-3ca4-894e-db77e160355e";

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn good_row() -> RawRow {
        raw(&[
            ("invoice_id", ID_A),
            ("seller_id", ID_B),
            ("debtor_id", ID_C),
            ("currency", "usd"),
            ("amount", "1500.50"),
            ("product", "  Steel coils  "),
            ("issue_date", "2024-01-15"),
            ("due_date", "2024-02-15"),
        ])
    }

    #[test]
    fn test_uuid_examples() {
        assert!(is_valid_uuid(ID_A));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid(""));
        // 35 字符（少一位）
        assert!(!is_valid_uuid("123e4567-e89b-12d3-a456-42661417400"));
        // 版本号 0 与非 RFC 变体
        assert!(!is_valid_uuid("123e4567-e89b-02d3-a456-426614174000"));
        assert!(!is_valid_uuid("123e4567-e89b-12d3-c456-426614174000"));
        // 无连字符形式不接受
        assert!(!is_valid_uuid("123e4567e89b12d3a456426614174000"));
    }

    #[test]
    fn test_currency_examples() {
        assert_eq!(normalize_currency("usd"), Some(Currency::Usd));
        assert_eq!(normalize_currency("usd").map(|c| c.code()), Some("USD"));
        assert_eq!(normalize_currency("XXX"), None);
        assert_eq!(normalize_currency(""), None);
    }

    #[test]
    fn test_amount_examples() {
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("0.01"), Some(0.01));
    }

    #[test]
    fn test_date_examples() {
        assert_eq!(
            parse_iso_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_iso_date("2023-02-29"), None);
        assert_eq!(parse_iso_date("2024-1-05"), None);
        assert_eq!(parse_iso_date("05/01/2024"), None);
        assert_eq!(parse_iso_date("20240105"), None);
    }

    #[test]
    fn test_valid_row() {
        let row = RowValidator.validate(&good_row(), 2);

        assert!(row.is_valid, "errors: {:?}", row.validation_errors);
        assert!(row.validation_errors.is_empty());
        assert_eq!(row.row_number, 2);
        assert_eq!(row.fields.invoice_id, ID_A);
        assert_eq!(row.fields.currency, Some(Currency::Usd));
        assert_eq!(row.fields.amount, Some(1500.50));
        assert_eq!(row.fields.product, "Steel coils");
        assert_eq!(row.fields.issue_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn test_invalid_currency_single_error() {
        let mut input = good_row();
        input.insert("currency".to_string(), "XXX".to_string());
        let row = RowValidator.validate(&input, 3);

        assert!(!row.is_valid);
        assert_eq!(row.validation_errors.len(), 1);
        assert!(row.validation_errors[0].starts_with("Row 3:"));
        assert!(row.validation_errors[0].contains("currency"));
        // 其它字段不受影响
        assert_eq!(row.fields.amount, Some(1500.50));
        assert_eq!(row.fields.invoice_id, ID_A);
        assert_eq!(row.fields.currency, None);
    }

    #[test]
    fn test_all_errors_accumulated() {
        let input = raw(&[
            ("invoice_id", "not-a-uuid"),
            ("seller_id", ""),
            ("debtor_id", ID_C),
            ("currency", "usd"),
            ("amount", "-5"),
            ("product", "   "),
            ("issue_date", "2024-13-01"),
            ("due_date", "2024-02-15"),
        ]);
        let row = RowValidator.validate(&input, 7);

        assert!(!row.is_valid);
        assert_eq!(row.validation_errors.len(), 5);
        assert!(row.validation_errors.iter().all(|e| e.starts_with("Row 7:")));
        assert_eq!(row.fields.invoice_id, "");
        assert_eq!(row.fields.seller_id, "");
        assert_eq!(row.fields.debtor_id, ID_C);
        assert_eq!(row.fields.currency, Some(Currency::Usd));
        assert_eq!(row.fields.due_date, NaiveDate::from_ymd_opt(2024, 2, 15));
    }

    #[test]
    fn test_due_date_must_follow_issue_date() {
        let mut input = good_row();
        input.insert("due_date".to_string(), "2024-01-15".to_string());
        let row = RowValidator.validate(&input, 2);

        assert!(!row.is_valid);
        assert_eq!(row.validation_errors.len(), 1);
        assert!(row.validation_errors[0].contains("due_date"));
        // 日期字段仍保留
        assert!(row.fields.issue_date.is_some());
        assert!(row.fields.due_date.is_some());
    }

    #[test]
    fn test_missing_columns_are_required() {
        let row = RowValidator.validate(&RawRow::new(), 2);
        assert!(!row.is_valid);
        assert_eq!(row.validation_errors.len(), columns::ALL.len());
    }

    #[test]
    fn test_validity_matches_error_list() {
        for input in [good_row(), RawRow::new()] {
            let row = RowValidator.validate(&input, 2);
            assert_eq!(row.is_valid, row.validation_errors.is_empty());
        }
    }

    #[test]
    fn test_uuid_kept_as_written() {
        let upper = ID_A.to_uppercase();
        let mut input = good_row();
        input.insert("invoice_id".to_string(), upper.clone());

        let row = RowValidator.validate(&input, 2);
        assert!(row.is_valid, "errors: {:?}", row.validation_errors);
        assert_eq!(row.fields.invoice_id, upper);
        assert_eq!(row.fields.seller_id, ID_B);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut input = RawRow::new();
        for (k, v) in good_row() {
            input.insert(format!(" {} ", k.to_uppercase()), v);
        }
        let row = RowValidator.validate(&input, 2);
        assert!(row.is_valid, "errors: {:?}", row.validation_errors);
    }
}
