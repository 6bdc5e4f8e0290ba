// ==========================================
// 分批导入引擎 - XML 读写器
// ==========================================
// 依赖映射树: iteration 节点对应一条记录，
// 其 leaf 子元素（文本）与 attribute（属性）对应记录字段
// 限制: 只识别 iteration 节点的直接子元素
// ==========================================

use crate::domain::{DataRecord, FileFormat, MappingNode, MappingTree, NodeType};
use crate::file_io::{FileReader, FileWriter};
use crate::importer::error::{ImportError, ImportResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

// ==========================================
// 映射树的读取视图
// ==========================================
struct TreeLayout {
    iteration_path: Vec<String>,
    leaves: BTreeMap<String, String>,     // 元素名 -> 字段名
    attributes: BTreeMap<String, String>, // 属性名 -> 字段名
}

impl TreeLayout {
    fn from_tree(tree: Option<&MappingTree>) -> ImportResult<Self> {
        let tree = tree.ok_or(ImportError::MissingMappingTree)?;
        let iteration = tree.iteration_node()?;
        Ok(Self {
            iteration_path: tree.iteration_path()?,
            leaves: children_of(iteration, NodeType::Leaf),
            attributes: children_of(iteration, NodeType::Attribute),
        })
    }
}

fn children_of(node: &MappingNode, node_type: NodeType) -> BTreeMap<String, String> {
    node.children
        .iter()
        .filter(|c| c.node_type == node_type)
        .map(|c| (c.name.clone(), c.field_name().to_string()))
        .collect()
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn open_reader(path: &Path) -> ImportResult<Reader<BufReader<File>>> {
    // 检查文件存在
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(Reader::from_reader(BufReader::new(File::open(path)?)))
}

// ==========================================
// XmlFileReader
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct XmlFileReader {
    tree: Option<MappingTree>,
}

impl XmlFileReader {
    pub fn new() -> Self {
        Self { tree: None }
    }

    fn attributes_into(
        &self,
        layout: &TreeLayout,
        e: &BytesStart<'_>,
        record: &mut DataRecord,
    ) -> ImportResult<()> {
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if let Some(field) = layout.attributes.get(&key) {
                record.insert(field.clone(), attr.unescape_value()?.into_owned());
            }
        }
        Ok(())
    }
}

impl FileReader for XmlFileReader {
    fn format(&self) -> FileFormat {
        FileFormat::Xml
    }

    fn set_tree(&mut self, tree: MappingTree) {
        self.tree = Some(tree);
    }

    fn get_total_count(&self, path: &Path) -> ImportResult<u64> {
        let layout = TreeLayout::from_tree(self.tree.as_ref())?;
        let mut reader = open_reader(path)?;
        let mut buf = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut count = 0u64;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    stack.push(element_name(&e));
                    if stack == layout.iteration_path {
                        count += 1;
                    }
                }
                Event::Empty(e) => {
                    stack.push(element_name(&e));
                    if stack == layout.iteration_path {
                        count += 1;
                    }
                    stack.pop();
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(count)
    }

    fn read_records(&self, path: &Path, start: u64, length: u64) -> ImportResult<Vec<DataRecord>> {
        let layout = TreeLayout::from_tree(self.tree.as_ref())?;
        let depth = layout.iteration_path.len();
        let end = start.saturating_add(length);

        let mut reader = open_reader(path)?;
        let mut buf = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut records = Vec::new();
        let mut seen = 0u64;
        let mut current: Option<DataRecord> = None;
        let mut current_leaf: Option<String> = None;
        let mut text = String::new();

        loop {
            if seen >= end && current.is_none() {
                break;
            }

            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let name = element_name(&e);
                    stack.push(name.clone());
                    if stack == layout.iteration_path {
                        let index = seen;
                        seen += 1;
                        if index >= start && index < end {
                            let mut record = DataRecord::new();
                            self.attributes_into(&layout, &e, &mut record)?;
                            current = Some(record);
                        }
                    } else if current.is_some() && stack.len() == depth + 1 {
                        if let Some(field) = layout.leaves.get(&name) {
                            current_leaf = Some(field.clone());
                            text.clear();
                        }
                    }
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    stack.push(name.clone());
                    if stack == layout.iteration_path {
                        let index = seen;
                        seen += 1;
                        if index >= start && index < end {
                            let mut record = DataRecord::new();
                            self.attributes_into(&layout, &e, &mut record)?;
                            records.push(record);
                        }
                    } else if stack.len() == depth + 1 {
                        if let (Some(record), Some(field)) = (current.as_mut(), layout.leaves.get(&name)) {
                            record.insert(field.clone(), String::new());
                        }
                    }
                    stack.pop();
                }
                Event::Text(t) => {
                    if current_leaf.is_some() {
                        text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(t) => {
                    if current_leaf.is_some() {
                        text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Event::End(_) => {
                    if stack.len() == depth + 1 {
                        if let (Some(record), Some(field)) = (current.as_mut(), current_leaf.take()) {
                            record.insert(field, std::mem::take(&mut text));
                        }
                    }
                    if stack == layout.iteration_path {
                        if let Some(record) = current.take() {
                            records.push(record);
                        }
                    }
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(records)
    }

    fn read_columns(&self, _path: &Path) -> ImportResult<Vec<String>> {
        let layout = TreeLayout::from_tree(self.tree.as_ref())?;
        let mut columns: Vec<String> = layout
            .attributes
            .values()
            .chain(layout.leaves.values())
            .cloned()
            .collect();
        columns.sort();
        columns.dedup();
        Ok(columns)
    }
}

// ==========================================
// XmlFileWriter
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct XmlFileWriter {
    tree: Option<MappingTree>,
}

impl XmlFileWriter {
    pub fn new() -> Self {
        Self { tree: None }
    }

    fn layout(&self) -> ImportResult<(Vec<String>, &MappingNode)> {
        let tree = self.tree.as_ref().ok_or(ImportError::MissingMappingTree)?;
        Ok((tree.iteration_path()?, tree.iteration_node()?))
    }

    fn append_writer(path: &Path) -> ImportResult<Writer<BufWriter<File>>> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Writer::new(BufWriter::new(file)))
    }
}

impl FileWriter for XmlFileWriter {
    fn format(&self) -> FileFormat {
        FileFormat::Xml
    }

    fn set_tree(&mut self, tree: MappingTree) {
        self.tree = Some(tree);
    }

    fn write_header(&self, path: &Path, _columns: &[String]) -> ImportResult<()> {
        let (iteration_path, _) = self.layout()?;
        let mut writer = Writer::new(BufWriter::new(File::create(path)?));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.get_mut().write_all(b"\n")?;
        for name in &iteration_path[..iteration_path.len() - 1] {
            writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
            writer.get_mut().write_all(b"\n")?;
        }

        writer.into_inner().flush()?;
        Ok(())
    }

    fn write_records(
        &self,
        path: &Path,
        _columns: &[String],
        records: &[DataRecord],
    ) -> ImportResult<()> {
        let (_, iteration) = self.layout()?;
        let mut writer = Self::append_writer(path)?;

        for record in records {
            let mut start = BytesStart::new(iteration.name.as_str());
            for node in iteration
                .children
                .iter()
                .filter(|c| c.node_type == NodeType::Attribute)
            {
                if let Some(value) = record.get(node.field_name()) {
                    start.push_attribute((node.name.as_str(), value.as_str()));
                }
            }
            writer.write_event(Event::Start(start))?;

            for node in iteration
                .children
                .iter()
                .filter(|c| c.node_type == NodeType::Leaf)
            {
                if let Some(value) = record.get(node.field_name()) {
                    writer.write_event(Event::Start(BytesStart::new(node.name.as_str())))?;
                    writer.write_event(Event::Text(BytesText::new(value)))?;
                    writer.write_event(Event::End(BytesEnd::new(node.name.as_str())))?;
                }
            }

            writer.write_event(Event::End(BytesEnd::new(iteration.name.as_str())))?;
            writer.get_mut().write_all(b"\n")?;
        }

        writer.into_inner().flush()?;
        Ok(())
    }

    fn write_footer(&self, path: &Path) -> ImportResult<()> {
        let (iteration_path, _) = self.layout()?;
        let mut writer = Self::append_writer(path)?;

        for name in iteration_path[..iteration_path.len() - 1].iter().rev() {
            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
            writer.get_mut().write_all(b"\n")?;
        }

        writer.into_inner().flush()?;
        Ok(())
    }
}
