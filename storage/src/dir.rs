//! 目录句柄
//!
//! 根伪目录按位置计数依次返回挂载点名；真实目录在第一次读取时先合成 `..`，
//! 再委托给原生的目录迭代。列举结束用空名字的条目表示。

use fs::{FatDir, LfsDir};
use vfs::{FatStat, FileAttributes, FileInfo, LfsStat, VfsError};

/// 打开的目录
#[derive(Default)]
pub enum VfsDir<'a> {
    /// 未打开或已关闭
    #[default]
    Closed,
    /// 根伪目录
    Root {
        /// 伪条目
        entries: Vec<&'static str>,
        /// 下一个要返回的位置
        pos: usize,
    },
    /// FAT 目录
    Fat {
        /// 原生目录
        dir: FatDir<'a>,
        /// 是否已返回合成的 `..`
        parent_emitted: bool,
    },
    /// 日志结构目录
    Lfs {
        /// 原生目录
        dir: LfsDir<'a>,
        /// 是否已返回合成的 `..`
        parent_emitted: bool,
    },
}

impl VfsDir<'_> {
    /// 是否持有打开的目录
    pub fn is_open(&self) -> bool {
        !matches!(self, VfsDir::Closed)
    }

    /// 读取下一个条目，名字为空表示列举结束
    pub fn read(&mut self) -> Result<FileInfo, VfsError> {
        match self {
            VfsDir::Closed => Err(VfsError::Inval),
            VfsDir::Root { entries, pos } => {
                let info = match entries.get(*pos) {
                    Some(name) => FileInfo::Root {
                        name: name.to_string(),
                    },
                    None => FileInfo::end_of_dir(),
                };
                *pos += 1;
                Ok(info)
            }
            VfsDir::Fat {
                dir,
                parent_emitted,
            } => {
                if !*parent_emitted {
                    *parent_emitted = true;
                    return Ok(FileInfo::Fat(FatStat {
                        name: String::from(".."),
                        attrib: FileAttributes::DIR,
                        ..FatStat::default()
                    }));
                }
                Ok(FileInfo::Fat(dir.read()?.unwrap_or_default()))
            }
            VfsDir::Lfs {
                dir,
                parent_emitted,
            } => {
                if !*parent_emitted {
                    *parent_emitted = true;
                    return Ok(FileInfo::Lfs(LfsStat {
                        name: String::from(".."),
                        size: 0,
                        is_dir: true,
                    }));
                }
                Ok(FileInfo::Lfs(dir.read()?.unwrap_or_default()))
            }
        }
    }

    /// 回到第一个条目（包括合成的 `..`）
    pub fn rewind(&mut self) -> Result<(), VfsError> {
        match self {
            VfsDir::Closed => Err(VfsError::Inval),
            VfsDir::Root { pos, .. } => {
                *pos = 0;
                Ok(())
            }
            VfsDir::Fat {
                dir,
                parent_emitted,
            } => {
                *parent_emitted = false;
                dir.rewind();
                Ok(())
            }
            VfsDir::Lfs {
                dir,
                parent_emitted,
            } => {
                *parent_emitted = false;
                dir.rewind()
            }
        }
    }

    /// 关闭目录；已关闭时直接成功
    pub fn close(&mut self) -> Result<(), VfsError> {
        match std::mem::take(self) {
            VfsDir::Closed | VfsDir::Root { .. } | VfsDir::Fat { .. } => Ok(()),
            VfsDir::Lfs { dir, .. } => dir.close(),
        }
    }
}
