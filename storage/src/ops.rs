//! 统一的文件和目录操作
//!
//! 每个操作都是同一个流程：规范化、分类、分派到后端。根伪目录只能被列举，
//! 其余操作返回 [`VfsError::Inval`]。

use vfs::{FileInfo, OpenFlags, VfsError};

use crate::dir::VfsDir;
use crate::file::VfsFile;
use crate::service::{StorageService, Target};

impl StorageService {
    /// 打开文件
    ///
    /// 既没有 `READ` 也没有 `WRITE` 时返回 [`VfsError::Inval`]。
    pub fn open_file(&self, path: &str, flags: OpenFlags) -> Result<VfsFile<'_>, VfsError> {
        if !flags.has_access() {
            return Err(VfsError::Inval);
        }
        match self.target(path)? {
            Target::Root => Err(VfsError::Inval),
            Target::Fat(volume, native) => volume.open(&native, flags).map(VfsFile::Fat),
            Target::Lfs(volume, native) => volume.open(&native, flags).map(VfsFile::Lfs),
        }
    }

    /// 打开目录，空路径返回 [`VfsError::Inval`]
    pub fn open_directory(&self, path: &str) -> Result<VfsDir<'_>, VfsError> {
        if path.is_empty() {
            return Err(VfsError::Inval);
        }
        match self.target(path)? {
            Target::Root => Ok(VfsDir::Root {
                entries: self.table.root_entries(),
                pos: 0,
            }),
            Target::Fat(volume, native) => Ok(VfsDir::Fat {
                dir: volume.open_dir(&native)?,
                parent_emitted: false,
            }),
            Target::Lfs(volume, native) => Ok(VfsDir::Lfs {
                dir: volume.open_dir(&native)?,
                parent_emitted: false,
            }),
        }
    }

    /// 查询元数据
    pub fn fstat(&self, path: &str) -> Result<FileInfo, VfsError> {
        match self.target(path)? {
            Target::Root => Err(VfsError::Inval),
            Target::Fat(volume, native) => volume.stat(&native).map(FileInfo::Fat),
            Target::Lfs(volume, native) => volume.stat(&native).map(FileInfo::Lfs),
        }
    }

    /// 删除文件或空目录
    pub fn unlink(&self, path: &str) -> Result<(), VfsError> {
        match self.target(path)? {
            Target::Root => Err(VfsError::Inval),
            Target::Fat(volume, native) => volume.remove(&native),
            Target::Lfs(volume, native) => volume.remove(&native),
        }
    }

    /// 创建目录，目录已存在时返回成功
    pub fn make_directory(&self, path: &str) -> Result<(), VfsError> {
        match self.target(path)? {
            Target::Root => Err(VfsError::Inval),
            Target::Fat(volume, native) => volume.mkdir(&native),
            Target::Lfs(volume, native) => match volume.mkdir(&native) {
                Err(VfsError::Exist) if volume.stat(&native).is_ok_and(|stat| stat.is_dir) => {
                    Ok(())
                }
                result => result,
            },
        }
    }

    /// 按 `info` 中的 FAT 日期时间设置修改时间；日志结构后端没有时间戳，直接成功
    pub fn utime(&self, path: &str, info: &FileInfo) -> Result<(), VfsError> {
        match self.target(path)? {
            Target::Root => Err(VfsError::Inval),
            Target::Fat(volume, native) => volume.set_times(&native, info.date(), info.time()),
            Target::Lfs(..) => Ok(()),
        }
    }
}
