// ==========================================
// 发票导入系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 约束: 空文件或仅表头 → 0 行，不视为错误
// ==========================================

use crate::domain::types::FileKind;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::invoice_importer_trait::{FileParser, RawRow};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::io::Cursor;

/// 去掉首尾空白与包裹引号
fn clean_field(value: &str) -> String {
    value.trim().trim_matches('"').trim().to_string()
}

/// 跳过开头的空白行，返回首个非空行起的文本
fn skip_leading_blank_lines(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        offset += line.len();
    }
    &text[offset..]
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImportResult<Vec<RawRow>> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}');
        let body = skip_leading_blank_lines(text);
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .trim(Trim::All)
            .from_reader(body.as_bytes());

        // 读取表头
        let headers: Vec<String> = reader.headers()?.iter().map(clean_field).collect();

        // 读取所有行（按位置映射，缺失的尾部字段补空串）
        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                let value = record.get(col_idx).map(clean_field).unwrap_or_default();
                row_map.insert(header.clone(), value);
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    /// 单元格 → 文本；日期单元格输出 YYYY-MM-DD
    fn cell_text(cell: &Data) -> String {
        let text = match cell {
            Data::DateTime(_) | Data::DateTimeIso(_) => cell
                .as_date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| cell.to_string()),
            _ => cell.to_string(),
        };
        clean_field(&text)
    }
}

impl FileParser for ExcelParser {
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImportResult<Vec<RawRow>> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // 只读取第一个 sheet
        let sheet_name = match workbook.sheet_names().first() {
            Some(name) => name.clone(),
            None => return Ok(Vec::new()),
        };
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // 表头：首个非空行
        let mut rows = range
            .rows()
            .skip_while(|row| row.iter().all(|cell| Self::cell_text(cell).is_empty()));
        let header_row = match rows.next() {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };

        let headers: Vec<String> = header_row.iter().map(Self::cell_text).collect();

        // 读取数据行
        let mut records = Vec::new();
        for data_row in rows {
            let mut row_map = HashMap::new();

            for (col_idx, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                let value = data_row
                    .get(col_idx)
                    .map(Self::cell_text)
                    .unwrap_or_default();
                row_map.insert(header.clone(), value);
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据文件类型选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse(&self, kind: FileKind, bytes: &[u8]) -> ImportResult<Vec<RawRow>> {
        match kind {
            FileKind::Csv => CsvParser.parse_to_raw_records(bytes),
            FileKind::Xlsx => ExcelParser.parse_to_raw_records(bytes),
        }
    }

    /// 根据文件名解析（扩展名不在白名单内时报错）
    pub fn parse_named(&self, file_name: &str, bytes: &[u8]) -> ImportResult<Vec<RawRow>> {
        let kind = FileKind::from_file_name(file_name)
            .ok_or_else(|| ImportError::UnsupportedFormat(file_name.to_string()))?;
        self.parse(kind, bytes)
    }
}
