// ==========================================
// 分批导入引擎 - 未处理数据桶
// ==========================================
// 命名: <输入文件名>-<依赖配置名>-tmp.csv（位于上传目录）
// 晋升: -tmp.csv -> -resolved.csv（原子 rename），
//       已晋升的文件不会被再次选中；晋升后的文件保留在磁盘上
// 写入: 每次 append 返回 BucketUndo，一批内的写入随会话保存一起确认或撤销
// ==========================================

use crate::domain::{DataRecord, FileFormat};
use crate::file_io::{FileIoProvider, STREAM_WINDOW};
use crate::importer::error::ImportResult;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 临时桶文件后缀
pub const TMP_SUFFIX: &str = "-tmp.csv";

/// 已晋升桶文件后缀
pub const RESOLVED_SUFFIX: &str = "-resolved.csv";

// ==========================================
// UploadPathProvider - 上传目录路径解析
// ==========================================
#[derive(Debug, Clone)]
pub struct UploadPathProvider {
    upload_dir: PathBuf,
}

impl UploadPathProvider {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// 上传目录下的完整路径
    pub fn real_path(&self, file_name: &str) -> PathBuf {
        self.upload_dir.join(file_name)
    }

    /// 文件名（含扩展名）
    pub fn file_name_from_path(&self, path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

/// 一批写入前的桶状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketUndo {
    /// 没有写入
    Unchanged,
    /// 本批新建的桶
    Remove(PathBuf),
    /// 本批追加，原长度
    Truncate { path: PathBuf, len: u64 },
    /// 本批重写了表头，旧内容在 backup
    Restore { path: PathBuf, backup: PathBuf },
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn truncate(path: &Path, len: u64) -> std::io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

/// 临时桶文件名
pub fn bucket_file_name(input_base_name: &str, profile_name: &str) -> String {
    format!("{}-{}{}", input_base_name, profile_name, TMP_SUFFIX)
}

/// 晋升后的路径（只替换文件名末尾的标记，不改动目录）
pub fn resolved_path(tmp_path: &Path) -> Option<PathBuf> {
    let file_name = tmp_path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(TMP_SUFFIX)?;
    Some(tmp_path.with_file_name(format!("{}{}", stem, RESOLVED_SUFFIX)))
}

// ==========================================
// UnprocessedDataWriter - 未处理数据的落盘与晋升
// ==========================================
#[derive(Debug, Clone)]
pub struct UnprocessedDataWriter {
    paths: UploadPathProvider,
    io: FileIoProvider,
}

impl UnprocessedDataWriter {
    pub fn new(paths: UploadPathProvider, io: FileIoProvider) -> Self {
        Self { paths, io }
    }

    /// 输入文件 + 依赖配置名 -> 临时桶路径
    pub fn bucket_path(&self, input_file: &Path, profile_name: &str) -> PathBuf {
        let base = self.paths.file_name_from_path(input_file);
        self.paths.real_path(&bucket_file_name(&base, profile_name))
    }

    /// 追加记录到桶文件，首次写入时创建文件与表头
    ///
    /// 表头取首批记录字段的有序并集；后续记录若带来新字段，
    /// 旧记录与新表头先写入同目录的 .part 文件，再 rename 覆盖桶文件
    ///
    /// # 返回
    /// - BucketUndo: 本批写入前的桶状态，会话保存成功后 commit，失败时 rollback
    pub fn append(&self, profile_name: &str, records: &[DataRecord], output_file: &Path) -> ImportResult<BucketUndo> {
        if records.is_empty() {
            return Ok(BucketUndo::Unchanged);
        }

        let incoming: BTreeSet<String> = records.iter().flat_map(|r| r.keys().cloned()).collect();

        if !output_file.exists() {
            let columns: Vec<String> = incoming.into_iter().collect();
            self.write_staged(output_file, &columns, |part| {
                self.io.get_writer(FileFormat::Csv).write_records(part, &columns, records)
            })?;
            debug!(profile = %profile_name, file = %output_file.display(), "创建未处理数据桶");
            self.log_appended(profile_name, output_file, records.len());
            return Ok(BucketUndo::Remove(output_file.to_path_buf()));
        }

        let reader = self.io.get_reader(FileFormat::Csv);
        let mut columns = reader.read_columns(output_file)?;
        let missing: Vec<String> = incoming
            .iter()
            .filter(|c| !columns.contains(c))
            .cloned()
            .collect();

        if missing.is_empty() {
            let len = fs::metadata(output_file)?.len();
            let writer = self.io.get_writer(FileFormat::Csv);
            if let Err(e) = writer.write_records(output_file, &columns, records) {
                truncate(output_file, len)?;
                return Err(e);
            }
            self.log_appended(profile_name, output_file, records.len());
            return Ok(BucketUndo::Truncate {
                path: output_file.to_path_buf(),
                len,
            });
        }

        warn!(
            profile = %profile_name,
            file = %output_file.display(),
            new_columns = ?missing,
            "桶文件出现新字段，重写表头"
        );
        columns.extend(missing);

        let undo = self.write_staged_over(output_file, &columns, records)?;
        self.log_appended(profile_name, output_file, records.len());
        Ok(undo)
    }

    /// 重写表头: 旧记录逐条转写到 .part，追加新记录，保留备份后覆盖
    fn write_staged_over(
        &self,
        output_file: &Path,
        columns: &[String],
        records: &[DataRecord],
    ) -> ImportResult<BucketUndo> {
        let reader = self.io.get_reader(FileFormat::Csv);
        let writer = self.io.get_writer(FileFormat::Csv);

        self.write_staged(output_file, columns, |part| {
            let mut window = Vec::new();
            reader.for_each_record(output_file, &mut |record| {
                window.push(record);
                if window.len() as u64 >= STREAM_WINDOW {
                    writer.write_records(part, columns, &window)?;
                    window.clear();
                }
                Ok(())
            })?;
            writer.write_records(part, columns, &window)?;
            writer.write_records(part, columns, records)
        })
        .map(|()| BucketUndo::Restore {
            path: output_file.to_path_buf(),
            backup: sibling(output_file, ".bak"),
        })
    }

    /// 写入 .part 文件后 rename 到 output_file；覆盖已有文件前先留备份
    fn write_staged<F>(&self, output_file: &Path, columns: &[String], body: F) -> ImportResult<()>
    where
        F: FnOnce(&Path) -> ImportResult<()>,
    {
        let part = sibling(output_file, ".part");
        let written = self
            .io
            .get_writer(FileFormat::Csv)
            .write_header(&part, columns)
            .and_then(|()| body(&part));
        if let Err(e) = written {
            if let Err(rm_err) = remove_if_exists(&part) {
                warn!(file = %part.display(), error = %rm_err, "临时文件清理失败");
            }
            return Err(e);
        }

        if output_file.exists() {
            let backup = sibling(output_file, ".bak");
            remove_if_exists(&backup)?;
            if fs::hard_link(output_file, &backup).is_err() {
                fs::copy(output_file, &backup)?;
            }
        }
        fs::rename(&part, output_file)?;
        Ok(())
    }

    fn log_appended(&self, profile_name: &str, output_file: &Path, count: usize) {
        info!(
            profile = %profile_name,
            file = %output_file.display(),
            count,
            "未处理数据已写入桶文件"
        );
    }

    /// 确认本批写入（删除重写表头时留下的备份）
    pub fn commit(&self, undo: BucketUndo) -> ImportResult<()> {
        if let BucketUndo::Restore { backup, .. } = undo {
            remove_if_exists(&backup)?;
        }
        Ok(())
    }

    /// 撤销本批写入，桶文件恢复到写入前的状态
    pub fn rollback(&self, undo: BucketUndo) -> ImportResult<()> {
        match undo {
            BucketUndo::Unchanged => {}
            BucketUndo::Remove(path) => remove_if_exists(&path)?,
            BucketUndo::Truncate { path, len } => truncate(&path, len)?,
            BucketUndo::Restore { path, backup } => fs::rename(&backup, &path)?,
        }
        Ok(())
    }

    /// 晋升桶文件
    ///
    /// # 返回
    /// - Ok(Some(path)): 已重命名为 -resolved.csv
    /// - Ok(None): 没有待处理的临时桶（包括已晋升过的）
    pub fn promote(&self, input_file: &Path, profile_name: &str) -> ImportResult<Option<PathBuf>> {
        let tmp_path = self.bucket_path(input_file, profile_name);
        if !tmp_path.exists() {
            return Ok(None);
        }

        let target = match resolved_path(&tmp_path) {
            Some(target) => target,
            None => return Ok(None),
        };
        fs::rename(&tmp_path, &target)?;
        info!(from = %tmp_path.display(), to = %target.display(), "未处理数据桶已晋升");
        Ok(Some(target))
    }
}
