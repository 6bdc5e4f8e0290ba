// ==========================================
// 分批导入引擎 - CSV 读写器
// ==========================================
// 格式: 首行表头 + 数据行，分隔符可配置（默认 ';'）
// 约束: 完全空白的行在计数与读取中一致地跳过
// ==========================================

use crate::domain::{DataRecord, FileFormat};
use crate::file_io::{FileReader, FileWriter};
use crate::importer::error::{ImportError, ImportResult};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// 默认分隔符
pub const DEFAULT_CSV_DELIMITER: u8 = b';';

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|v| v.trim().is_empty())
}

// ==========================================
// CsvFileReader
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct CsvFileReader {
    delimiter: u8,
}

impl CsvFileReader {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    fn open(&self, path: &Path) -> ImportResult<csv::Reader<File>> {
        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        Ok(ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file))
    }

    fn headers(reader: &mut csv::Reader<File>) -> ImportResult<Vec<String>> {
        Ok(reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect())
    }
}

impl FileReader for CsvFileReader {
    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn get_total_count(&self, path: &Path) -> ImportResult<u64> {
        let mut reader = self.open(path)?;
        let mut count = 0u64;
        for result in reader.records() {
            if !is_blank(&result?) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn read_records(&self, path: &Path, start: u64, length: u64) -> ImportResult<Vec<DataRecord>> {
        let mut reader = self.open(path)?;
        let headers = Self::headers(&mut reader)?;

        let mut records = Vec::new();
        let mut index = 0u64;
        for result in reader.records() {
            let row = result?;
            // 跳过完全空白的行
            if is_blank(&row) {
                continue;
            }
            if index >= start {
                if records.len() as u64 >= length {
                    break;
                }
                let record: DataRecord = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.clone(), v.to_string()))
                    .collect();
                records.push(record);
            }
            index += 1;
        }

        Ok(records)
    }

    fn read_columns(&self, path: &Path) -> ImportResult<Vec<String>> {
        let mut reader = self.open(path)?;
        Self::headers(&mut reader)
    }

    fn for_each_record(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(DataRecord) -> ImportResult<()>,
    ) -> ImportResult<()> {
        let mut reader = self.open(path)?;
        let headers = Self::headers(&mut reader)?;
        for result in reader.records() {
            let row = result?;
            if is_blank(&row) {
                continue;
            }
            visit(
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.clone(), v.to_string()))
                    .collect(),
            )?;
        }
        Ok(())
    }
}

// ==========================================
// CsvFileWriter
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct CsvFileWriter {
    delimiter: u8,
}

impl CsvFileWriter {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl FileWriter for CsvFileWriter {
    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn write_header(&self, path: &Path, columns: &[String]) -> ImportResult<()> {
        let file = File::create(path)?;
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);
        writer.write_record(columns)?;
        writer.flush()?;
        Ok(())
    }

    fn write_records(
        &self,
        path: &Path,
        columns: &[String],
        records: &[DataRecord],
    ) -> ImportResult<()> {
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);

        for record in records {
            writer.write_record(
                columns
                    .iter()
                    .map(|c| record.get(c).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_footer(&self, _path: &Path) -> ImportResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(pairs: &[(&str, &str)]) -> DataRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_count_and_read_window() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "ordernumber;name").unwrap();
        for i in 1..=5 {
            writeln!(temp_file, "SW1000{};Artikel {}", i, i).unwrap();
        }

        let reader = CsvFileReader::new(b';');
        assert_eq!(reader.get_total_count(temp_file.path()).unwrap(), 5);

        let window = reader.read_records(temp_file.path(), 2, 2).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].get("ordernumber"), Some(&"SW10003".to_string()));
        assert_eq!(window[1].get("name"), Some(&"Artikel 4".to_string()));

        let tail = reader.read_records(temp_file.path(), 4, 10).unwrap();
        assert_eq!(tail.len(), 1);

        let past_end = reader.read_records(temp_file.path(), 5, 10).unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_blank_rows_skipped_consistently() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "ordernumber;name").unwrap();
        writeln!(temp_file, "SW10001;A").unwrap();
        writeln!(temp_file, ";").unwrap(); // 空行
        writeln!(temp_file, "SW10002;B").unwrap();

        let reader = CsvFileReader::new(b';');
        assert_eq!(reader.get_total_count(temp_file.path()).unwrap(), 2);

        let second = reader.read_records(temp_file.path(), 1, 1).unwrap();
        assert_eq!(second[0].get("ordernumber"), Some(&"SW10002".to_string()));
    }

    #[test]
    fn test_for_each_record_visits_all_rows_in_order() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "ordernumber;name").unwrap();
        writeln!(temp_file, "SW10001;A").unwrap();
        writeln!(temp_file, ";").unwrap();
        writeln!(temp_file, "SW10002;B").unwrap();

        let reader = CsvFileReader::new(b';');
        let mut seen = Vec::new();
        reader
            .for_each_record(temp_file.path(), &mut |record| {
                seen.push(record["ordernumber"].clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["SW10001", "SW10002"]);
    }

    #[test]
    fn test_file_not_found() {
        let reader = CsvFileReader::new(b';');
        let result = reader.get_total_count(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round_trip.csv");
        let columns = vec!["description".to_string(), "ordernumber".to_string()];
        let records = vec![
            record(&[("ordernumber", "SW10001"), ("description", "  leading space; \"quoted\"")]),
            record(&[("ordernumber", "SW10002"), ("description", "line\nbreak")]),
            record(&[("ordernumber", "SW10003"), ("description", "")]),
        ];

        let writer = CsvFileWriter::new(b';');
        writer.write_header(&path, &columns).unwrap();
        writer.write_records(&path, &columns, &records[..2]).unwrap();
        writer.write_records(&path, &columns, &records[2..]).unwrap();
        writer.write_footer(&path).unwrap();

        let reader = CsvFileReader::new(b';');
        assert_eq!(reader.read_columns(&path).unwrap(), columns);
        assert_eq!(reader.read_records(&path, 0, 10).unwrap(), records);
    }
}
