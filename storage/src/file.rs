//! 文件句柄
//!
//! [`VfsFile`] 是按后端打标签的枚举，每个方法对标签做穷尽匹配。
//! 关闭把句柄恢复为 [`VfsFile::Unopened`]，重复关闭直接成功。

use std::fmt;

use fs::{FatFile, LfsFile};
use vfs::VfsError;

/// 打开的文件
#[derive(Default)]
pub enum VfsFile<'a> {
    /// 未打开或已关闭
    #[default]
    Unopened,
    /// FAT 后端的文件
    Fat(FatFile<'a>),
    /// 日志结构后端的文件
    Lfs(LfsFile<'a>),
}

impl VfsFile<'_> {
    /// 是否持有打开的文件
    pub fn is_open(&self) -> bool {
        !matches!(self, VfsFile::Unopened)
    }

    /// 文件大小
    pub fn size(&mut self) -> Result<u64, VfsError> {
        match self {
            VfsFile::Unopened => Err(VfsError::Inval),
            VfsFile::Fat(file) => file.size(),
            VfsFile::Lfs(file) => file.size(),
        }
    }

    /// 读取数据，返回实际读取的字节数（0 表示文件末尾）
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, VfsError> {
        match self {
            VfsFile::Unopened => Err(VfsError::Inval),
            VfsFile::Fat(file) => file.read(buf),
            VfsFile::Lfs(file) => file.read(buf),
        }
    }

    /// 读取一行（包含结尾的 `\n`），最多 `max_len - 1` 个字节
    ///
    /// 文件末尾没有数据可读时返回 `None`。
    pub fn gets(&mut self, max_len: usize) -> Result<Option<String>, VfsError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() + 1 < max_len {
            if self.read(&mut byte)? == 0 {
                break;
            }
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// 写入数据，返回实际写入的字节数
    pub fn write(&mut self, data: &[u8]) -> Result<usize, VfsError> {
        match self {
            VfsFile::Unopened => Err(VfsError::Inval),
            VfsFile::Fat(file) => file.write(data),
            VfsFile::Lfs(file) => file.write(data),
        }
    }

    /// 写入字符串
    pub fn puts(&mut self, text: &str) -> Result<usize, VfsError> {
        self.write(text.as_bytes())
    }

    /// 写入单个字节
    pub fn putc(&mut self, byte: u8) -> Result<usize, VfsError> {
        self.write(&[byte])
    }

    /// 格式化写入，支持 `write!(file, ...)`
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize, VfsError> {
        let text = fmt::format(args);
        self.write(text.as_bytes())
    }

    /// 当前读写位置
    pub fn tell(&mut self) -> Result<u64, VfsError> {
        match self {
            VfsFile::Unopened => Err(VfsError::Inval),
            VfsFile::Fat(file) => file.tell(),
            VfsFile::Lfs(file) => file.tell(),
        }
    }

    /// 移动读写位置到 `offset`（从文件开头算起）
    pub fn lseek(&mut self, offset: u64) -> Result<u64, VfsError> {
        match self {
            VfsFile::Unopened => Err(VfsError::Inval),
            VfsFile::Fat(file) => file.seek(offset),
            VfsFile::Lfs(file) => file.seek(offset),
        }
    }

    /// 读写位置是否已到文件末尾
    pub fn eof(&mut self) -> Result<bool, VfsError> {
        let pos = self.tell()?;
        Ok(pos >= self.size()?)
    }

    /// 写回数据
    pub fn sync(&mut self) -> Result<(), VfsError> {
        match self {
            VfsFile::Unopened => Err(VfsError::Inval),
            VfsFile::Fat(file) => file.sync(),
            VfsFile::Lfs(file) => file.sync(),
        }
    }

    /// 关闭文件，句柄恢复为未打开状态；已关闭时直接成功
    pub fn close(&mut self) -> Result<(), VfsError> {
        match std::mem::take(self) {
            VfsFile::Unopened => Ok(()),
            VfsFile::Fat(file) => file.close(),
            VfsFile::Lfs(file) => file.close(),
        }
    }
}
