//! FAT 卷、文件和目录句柄
//!
//! 每次调用 `fatfs` 都持有共享的块设备 I/O 互斥锁。内部辅助函数假定调用方已经
//! 持锁，不再重复加锁（自旋锁不可重入）。

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use device::{BlockDriver, Driver, SECTOR_SIZE};
use fatfs::{FileSystem, FormatVolumeOptions, FsOptions};
use sync::SpinLock;
use vfs::{FatStat, FileAttributes, OpenFlags, VfsError, VolumeStats};

use super::{BlockIo, translate};

type FatDirEntry<'a> = fatfs::DirEntry<'a, BlockIo>;

/// FAT 驱动器号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// 驱动器 0：SD 卡
    SdCard,
    /// 驱动器 1：FTL 之上的内部存储
    Internal,
}

/// 拆出原生路径中的驱动器前缀（`0:` / `1:`），没有前缀时为驱动器 0
pub fn split_drive(path: &str) -> (Drive, &str) {
    if let Some(rest) = path.strip_prefix("1:") {
        (Drive::Internal, rest)
    } else if let Some(rest) = path.strip_prefix("0:") {
        (Drive::SdCard, rest)
    } else {
        (Drive::SdCard, path)
    }
}

/// 已挂载的 FAT 卷
pub struct FatVolume {
    fs: FileSystem<BlockIo>,
    drive: Drive,
    io_lock: Arc<SpinLock<()>>,
}

impl FatVolume {
    /// 挂载块设备上的 FAT 卷
    pub fn mount(
        device: Arc<dyn BlockDriver>,
        drive: Drive,
        io_lock: Arc<SpinLock<()>>,
    ) -> Result<Self, VfsError> {
        let id = device.get_id();
        let guard = io_lock.lock();
        let io = BlockIo::new(device).map_err(|e| translate(super::block_io::to_io(e)))?;
        let fs = FileSystem::new(io, FsOptions::new()).map_err(translate)?;
        drop(guard);
        log::info!("[FAT] mounted {} as drive {:?}", id, drive);
        Ok(Self { fs, drive, io_lock })
    }

    /// 在块设备上创建新的 FAT 卷（类型按容量自动选择）
    pub fn format(device: Arc<dyn BlockDriver>, io_lock: &SpinLock<()>) -> Result<(), VfsError> {
        let _guard = io_lock.lock();
        let mut io = BlockIo::new(device).map_err(|e| translate(super::block_io::to_io(e)))?;
        let sectors = (io.len() / SECTOR_SIZE as u64) as u32;
        let options = FormatVolumeOptions::new()
            .bytes_per_sector(SECTOR_SIZE as u16)
            .total_sectors(sectors);
        fatfs::format_volume(&mut io, options).map_err(translate)?;
        io.flush().map_err(translate)?;
        log::info!("[FAT] formatted {} sectors", sectors);
        Ok(())
    }

    /// 卸载卷，写回 FAT 和 FSInfo
    pub fn unmount(self) -> Result<(), VfsError> {
        let _guard = self.io_lock.lock();
        self.fs.unmount().map_err(translate)
    }

    /// 卷容量统计
    pub fn stats(&self) -> Result<VolumeStats, VfsError> {
        let _guard = self.io_lock.lock();
        let stats = self.fs.stats().map_err(translate)?;
        let per_cluster = u64::from(stats.cluster_size()) / SECTOR_SIZE as u64;
        Ok(VolumeStats {
            sector_size: SECTOR_SIZE,
            total_sectors: u64::from(stats.total_clusters()) * per_cluster,
            free_sectors: u64::from(stats.free_clusters()) * per_cluster,
        })
    }

    /// 去掉驱动器前缀和首尾的 `/`，驱动器不匹配时返回 [`VfsError::Inval`]
    fn native<'p>(&self, path: &'p str) -> Result<&'p str, VfsError> {
        let (drive, rest) = split_drive(path);
        if drive != self.drive {
            return Err(VfsError::Inval);
        }
        Ok(rest.trim_matches('/'))
    }

    /// 在父目录中按名字（不区分大小写）查找目录项，调用方持锁
    fn find_entry(&self, rel: &str) -> Result<Option<FatDirEntry<'_>>, VfsError> {
        let (parent, name) = match rel.rfind('/') {
            Some(pos) => (&rel[..pos], &rel[pos + 1..]),
            None => ("", rel),
        };
        let root = self.fs.root_dir();
        let dir = if parent.is_empty() {
            root
        } else {
            root.open_dir(parent).map_err(translate)?
        };
        for entry in dir.iter() {
            let entry = entry.map_err(translate)?;
            if entry.file_name().eq_ignore_ascii_case(name) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// 打开文件
    ///
    /// 创建方式的判断顺序：追加、总是创建（截断）、新建（已存在则失败）、
    /// 打开或创建、只打开已存在的文件。
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<FatFile<'_>, VfsError> {
        let rel = self.native(path)?;
        if rel.is_empty() {
            return Err(VfsError::IsDir);
        }
        let _guard = self.io_lock.lock();
        let root = self.fs.root_dir();
        let file = if flags.is_append() {
            let mut file = root.create_file(rel).map_err(translate)?;
            file.seek(SeekFrom::End(0)).map_err(translate)?;
            file
        } else if flags.contains(OpenFlags::CREATE_ALWAYS) {
            let mut file = root.create_file(rel).map_err(translate)?;
            file.truncate().map_err(translate)?;
            file
        } else if flags.contains(OpenFlags::CREATE_NEW) {
            if self.find_entry(rel)?.is_some() {
                return Err(VfsError::Exist);
            }
            root.create_file(rel).map_err(translate)?
        } else if flags.contains(OpenFlags::OPEN_ALWAYS) {
            root.create_file(rel).map_err(translate)?
        } else {
            root.open_file(rel).map_err(translate)?
        };
        Ok(FatFile {
            file: Some(file),
            flags,
            lock: &self.io_lock,
        })
    }

    /// 打开目录
    pub fn open_dir(&self, path: &str) -> Result<FatDir<'_>, VfsError> {
        let rel = self.native(path)?;
        let _guard = self.io_lock.lock();
        let root = self.fs.root_dir();
        let dir = if rel.is_empty() {
            root
        } else {
            root.open_dir(rel).map_err(translate)?
        };
        let iter = dir.iter();
        Ok(FatDir {
            dir,
            iter,
            lock: &self.io_lock,
        })
    }

    /// 查询元数据，卷根目录没有目录项，返回 [`VfsError::Inval`]
    pub fn stat(&self, path: &str) -> Result<FatStat, VfsError> {
        let rel = self.native(path)?;
        if rel.is_empty() {
            return Err(VfsError::Inval);
        }
        let _guard = self.io_lock.lock();
        let entry = self.find_entry(rel)?.ok_or(VfsError::NoEnt)?;
        Ok(convert_entry(&entry))
    }

    /// 删除文件或空目录
    pub fn remove(&self, path: &str) -> Result<(), VfsError> {
        let rel = self.native(path)?;
        if rel.is_empty() {
            return Err(VfsError::Inval);
        }
        let _guard = self.io_lock.lock();
        self.fs.root_dir().remove(rel).map_err(translate)
    }

    /// 创建目录，目录已存在时视为成功，同名文件已存在时返回 [`VfsError::Exist`]
    pub fn mkdir(&self, path: &str) -> Result<(), VfsError> {
        let rel = self.native(path)?;
        if rel.is_empty() {
            return Ok(());
        }
        let _guard = self.io_lock.lock();
        match self.find_entry(rel)? {
            Some(entry) if entry.is_dir() => Ok(()),
            Some(_) => Err(VfsError::Exist),
            None => {
                self.fs.root_dir().create_dir(rel).map_err(translate)?;
                Ok(())
            }
        }
    }

    /// 卷内重命名，两个路径必须在同一驱动器上
    pub fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        let from = self.native(from)?;
        let to = self.native(to)?;
        if from.is_empty() || to.is_empty() {
            return Err(VfsError::Inval);
        }
        let _guard = self.io_lock.lock();
        let root = self.fs.root_dir();
        root.rename(from, &root, to).map_err(translate)
    }

    /// 设置文件的修改时间（FAT 编码），目录没有可写的时间戳，忽略
    pub fn set_times(&self, path: &str, date: u16, time: u16) -> Result<(), VfsError> {
        let rel = self.native(path)?;
        if rel.is_empty() {
            return Err(VfsError::Inval);
        }
        let _guard = self.io_lock.lock();
        let entry = self.find_entry(rel)?.ok_or(VfsError::NoEnt)?;
        if entry.is_dir() {
            return Ok(());
        }
        let mut file = entry.to_file();
        file.set_modified(convert_timestamp(date, time));
        file.flush().map_err(translate)
    }
}

/// 打开的 FAT 文件
///
/// 内部文件在释放时还会刷新一次，释放同样要在 I/O 锁内进行。
pub struct FatFile<'a> {
    /// 只在释放时取走
    file: Option<fatfs::File<'a, BlockIo>>,
    flags: OpenFlags,
    lock: &'a SpinLock<()>,
}

impl FatFile<'_> {
    /// 读取数据，返回实际读取的字节数（0 表示文件末尾）
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, VfsError> {
        if !self.flags.contains(OpenFlags::READ) {
            return Err(VfsError::Inval);
        }
        let _guard = self.lock.lock();
        let file = self.file.as_mut().ok_or(VfsError::Inval)?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]).map_err(translate)? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    /// 写入数据，返回实际写入的字节数
    ///
    /// 只有卷满会让返回值小于请求的长度；其他错误即使发生在部分写入之后也会返回。
    pub fn write(&mut self, data: &[u8]) -> Result<usize, VfsError> {
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(VfsError::Inval);
        }
        let _guard = self.lock.lock();
        let file = self.file.as_mut().ok_or(VfsError::Inval)?;
        let mut total = 0;
        while total < data.len() {
            match file.write(&data[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => {
                    let full = e.kind() == io::ErrorKind::WriteZero;
                    let err = translate(e);
                    if total > 0 && (full || err == VfsError::NoSpc) {
                        log::warn!("[FAT] volume full after {} bytes", total);
                        break;
                    }
                    return Err(err);
                }
            }
        }
        Ok(total)
    }

    /// 移动读写位置到 `offset`
    pub fn seek(&mut self, offset: u64) -> Result<u64, VfsError> {
        let _guard = self.lock.lock();
        let file = self.file.as_mut().ok_or(VfsError::Inval)?;
        file.seek(SeekFrom::Start(offset)).map_err(translate)
    }

    /// 当前读写位置
    pub fn tell(&mut self) -> Result<u64, VfsError> {
        let _guard = self.lock.lock();
        let file = self.file.as_mut().ok_or(VfsError::Inval)?;
        file.seek(SeekFrom::Current(0)).map_err(translate)
    }

    /// 文件大小
    pub fn size(&mut self) -> Result<u64, VfsError> {
        let _guard = self.lock.lock();
        let file = self.file.as_mut().ok_or(VfsError::Inval)?;
        let pos = file.seek(SeekFrom::Current(0)).map_err(translate)?;
        let end = file.seek(SeekFrom::End(0)).map_err(translate)?;
        file.seek(SeekFrom::Start(pos)).map_err(translate)?;
        Ok(end)
    }

    /// 写回文件数据和目录项
    pub fn sync(&mut self) -> Result<(), VfsError> {
        let _guard = self.lock.lock();
        let file = self.file.as_mut().ok_or(VfsError::Inval)?;
        file.flush().map_err(translate)
    }

    /// 关闭文件，刷新和释放都在锁内完成
    pub fn close(mut self) -> Result<(), VfsError> {
        let _guard = self.lock.lock();
        let mut file = self.file.take().ok_or(VfsError::Inval)?;
        let result = file.flush().map_err(translate);
        drop(file);
        result
    }
}

impl Drop for FatFile<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _guard = self.lock.lock();
            drop(file);
        }
    }
}

/// 打开的 FAT 目录
pub struct FatDir<'a> {
    dir: fatfs::Dir<'a, BlockIo>,
    iter: fatfs::DirIter<'a, BlockIo>,
    lock: &'a SpinLock<()>,
}

impl FatDir<'_> {
    /// 读取下一个目录项，`.` 和 `..` 被跳过；列举结束时返回 `None`
    pub fn read(&mut self) -> Result<Option<FatStat>, VfsError> {
        let _guard = self.lock.lock();
        for entry in self.iter.by_ref() {
            let entry = entry.map_err(translate)?;
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            return Ok(Some(convert_entry(&entry)));
        }
        Ok(None)
    }

    /// 回到第一个目录项
    pub fn rewind(&mut self) {
        let _guard = self.lock.lock();
        self.iter = self.dir.iter();
    }
}

/// 把 `fatfs` 目录项转换为 [`FatStat`]
fn convert_entry(entry: &FatDirEntry<'_>) -> FatStat {
    let modified = entry.modified();
    let date = ((modified.date.year.saturating_sub(1980)) << 9)
        | (modified.date.month << 5)
        | modified.date.day;
    let time = (modified.time.hour << 11) | (modified.time.min << 5) | (modified.time.sec / 2);
    FatStat {
        name: entry.file_name(),
        size: if entry.is_dir() { 0 } else { entry.len() },
        attrib: FileAttributes::from_bits_truncate(entry.attributes().bits()),
        date,
        time,
    }
}

/// 把 FAT 编码的日期时间转换为 `fatfs` 的时间戳
fn convert_timestamp(date: u16, time: u16) -> fatfs::DateTime {
    fatfs::DateTime {
        date: fatfs::Date {
            year: 1980 + (date >> 9),
            month: (date >> 5) & 0x0F,
            day: date & 0x1F,
        },
        time: fatfs::Time {
            hour: time >> 11,
            min: (time >> 5) & 0x3F,
            sec: (time & 0x1F) * 2,
            millis: 0,
        },
    }
}
