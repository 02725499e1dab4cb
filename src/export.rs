//! CSV 导出
//! 使用 csv crate 做 RFC 4180 转义（含逗号、引号、换行的字段加引号，引号加倍）

use crate::error::AppError;
use chrono::NaiveDate;

/// 导出文件名：`<base>_<YYYY-MM-DD>.csv`
pub fn export_filename(base: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", base, date.format("%Y-%m-%d"))
}

/// 将表头和行写为 CSV 文本
pub fn to_csv<H, R, F>(headers: &[H], rows: R) -> Result<String, AppError>
where
    H: AsRef<str>,
    R: IntoIterator<Item = Vec<F>>,
    F: AsRef<str>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(headers.iter().map(|h| h.as_ref())).map_err(csv_error)?;

    let mut count = 0usize;
    for row in rows {
        writer
            .write_record(row.iter().map(|f| f.as_ref()))
            .map_err(csv_error)?;
        count += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))?;

    tracing::debug!(rows = count, bytes = bytes.len(), "CSV export rendered");

    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

fn csv_error(e: csv::Error) -> AppError {
    tracing::error!("Failed to write CSV record: {:?}", e);
    AppError::Internal(format!("Failed to write CSV record: {}", e))
}
