// ==========================================
// 分批导入引擎 - 文件读写层
// ==========================================
// 职责: 按格式标签分发读取器/写出器
// 支持: CSV（分隔文本）, XML（树形结构）
// ==========================================

pub mod csv_io;
pub mod xml_io;

use crate::domain::{DataRecord, FileFormat, MappingTree};
use crate::importer::error::ImportResult;
use std::path::Path;

pub use csv_io::{CsvFileReader, CsvFileWriter, DEFAULT_CSV_DELIMITER};
pub use xml_io::{XmlFileReader, XmlFileWriter};

// ==========================================
// FileReader Trait
// ==========================================
// 实现者: CsvFileReader, XmlFileReader
// 约束: 流式读取，内存中最多保留一批记录
pub trait FileReader: Send + Sync {
    fn format(&self) -> FileFormat;

    /// 设置映射树（树形格式读取前必须调用；分隔文本忽略）
    fn set_tree(&mut self, _tree: MappingTree) {}

    /// 统计文件中的记录总数
    fn get_total_count(&self, path: &Path) -> ImportResult<u64>;

    /// 从 start 开始读取最多 length 条记录
    fn read_records(&self, path: &Path, start: u64, length: u64) -> ImportResult<Vec<DataRecord>>;

    /// 文件的列（字段）顺序
    fn read_columns(&self, path: &Path) -> ImportResult<Vec<String>>;

    /// 按顺序逐条回调全部记录
    ///
    /// 默认按 STREAM_WINDOW 分窗读取；可顺序扫描的格式应覆盖为单次扫描
    fn for_each_record(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(DataRecord) -> ImportResult<()>,
    ) -> ImportResult<()> {
        let mut start = 0u64;
        loop {
            let window = self.read_records(path, start, STREAM_WINDOW)?;
            let len = window.len() as u64;
            for record in window {
                visit(record)?;
            }
            if len < STREAM_WINDOW {
                return Ok(());
            }
            start += len;
        }
    }
}

/// 流式遍历时每次读取的记录数
pub const STREAM_WINDOW: u64 = 500;

// ==========================================
// FileWriter Trait
// ==========================================
// 实现者: CsvFileWriter, XmlFileWriter
pub trait FileWriter: Send + Sync {
    fn format(&self) -> FileFormat;

    /// 设置映射树（树形格式写出前必须调用；分隔文本忽略）
    fn set_tree(&mut self, _tree: MappingTree) {}

    /// 新建文件并写入文件头
    fn write_header(&self, path: &Path, columns: &[String]) -> ImportResult<()>;

    /// 追加记录（按 columns 顺序）
    fn write_records(
        &self,
        path: &Path,
        columns: &[String],
        records: &[DataRecord],
    ) -> ImportResult<()>;

    /// 写入文件尾
    fn write_footer(&self, path: &Path) -> ImportResult<()>;
}

// ==========================================
// FileIoProvider - 读写器分发
// ==========================================
// 无状态；每次返回新实例，set_tree 不会在任务之间串用
#[derive(Debug, Clone, Copy)]
pub struct FileIoProvider {
    csv_delimiter: u8,
}

impl FileIoProvider {
    pub fn new() -> Self {
        Self {
            csv_delimiter: DEFAULT_CSV_DELIMITER,
        }
    }

    /// 指定 CSV 分隔符
    pub fn with_csv_delimiter(csv_delimiter: u8) -> Self {
        Self { csv_delimiter }
    }

    pub fn csv_delimiter(&self) -> u8 {
        self.csv_delimiter
    }

    pub fn get_reader(&self, format: FileFormat) -> Box<dyn FileReader> {
        match format {
            FileFormat::Csv => Box::new(CsvFileReader::new(self.csv_delimiter)),
            FileFormat::Xml => Box::new(XmlFileReader::new()),
        }
    }

    pub fn get_writer(&self, format: FileFormat) -> Box<dyn FileWriter> {
        match format {
            FileFormat::Csv => Box::new(CsvFileWriter::new(self.csv_delimiter)),
            FileFormat::Xml => Box::new(XmlFileWriter::new()),
        }
    }

    /// 按格式标签获取读取器
    ///
    /// # 返回
    /// - Err(UnsupportedFormat): 标签既不是 csv 也不是 xml
    pub fn get_reader_for_tag(&self, tag: &str) -> ImportResult<Box<dyn FileReader>> {
        Ok(self.get_reader(tag.parse()?))
    }

    /// 按格式标签获取写出器
    pub fn get_writer_for_tag(&self, tag: &str) -> ImportResult<Box<dyn FileWriter>> {
        Ok(self.get_writer(tag.parse()?))
    }
}

impl Default for FileIoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::error::ImportError;

    #[test]
    fn test_dispatch_by_tag() {
        let provider = FileIoProvider::new();
        assert_eq!(provider.get_reader_for_tag("csv").unwrap().format(), FileFormat::Csv);
        assert_eq!(provider.get_reader_for_tag("xml").unwrap().format(), FileFormat::Xml);
        assert_eq!(provider.get_writer_for_tag("csv").unwrap().format(), FileFormat::Csv);
        assert_eq!(provider.get_writer_for_tag("xml").unwrap().format(), FileFormat::Xml);
    }

    #[test]
    fn test_unknown_tag_fails_immediately() {
        let provider = FileIoProvider::new();
        assert!(matches!(
            provider.get_reader_for_tag("json"),
            Err(ImportError::UnsupportedFormat(tag)) if tag == "json"
        ));
        assert!(matches!(
            provider.get_writer_for_tag("xlsx"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }
}
