//! 日志结构卷、文件和目录句柄
//!
//! 每次原生调用先取共享的块设备 I/O 互斥锁，再取驱动本身的锁。
//! 卷未挂载时所有文件操作返回 [`VfsError::NotReady`]。

use std::sync::Arc;

use device::SECTOR_SIZE;
use sync::SpinLock;
use vfs::{LfsStat, OpenFlags, VfsError, VolumeStats};

use super::{LfsDirId, LfsDriver, LfsError, LfsFileId, LfsInfo, LfsOpenFlags, LfsWhence};

struct LfsInner {
    driver: Box<dyn LfsDriver>,
    mounted: bool,
}

/// 日志结构卷
pub struct LfsVolume {
    inner: SpinLock<LfsInner>,
    io_lock: Arc<SpinLock<()>>,
}

impl LfsVolume {
    /// 包装原生驱动，初始为未挂载
    pub fn new(driver: Box<dyn LfsDriver>, io_lock: Arc<SpinLock<()>>) -> Self {
        Self {
            inner: SpinLock::new(LfsInner {
                driver,
                mounted: false,
            }),
            io_lock,
        }
    }

    /// 持锁调用驱动，不检查挂载状态
    fn with_driver<R>(
        &self,
        f: impl FnOnce(&mut LfsInner) -> Result<R, LfsError>,
    ) -> Result<R, VfsError> {
        let _guard = self.io_lock.lock();
        let mut inner = self.inner.lock();
        f(&mut *inner).map_err(VfsError::from)
    }

    /// 持锁调用已挂载的驱动
    fn with_mounted<R>(
        &self,
        f: impl FnOnce(&mut dyn LfsDriver) -> Result<R, LfsError>,
    ) -> Result<R, VfsError> {
        let _guard = self.io_lock.lock();
        let mut inner = self.inner.lock();
        if !inner.mounted {
            return Err(VfsError::NotReady);
        }
        f(inner.driver.as_mut()).map_err(VfsError::from)
    }

    /// 挂载
    pub fn mount(&self) -> Result<(), VfsError> {
        self.with_driver(|inner| {
            inner.driver.mount()?;
            inner.mounted = true;
            Ok(())
        })?;
        log::info!("[LFS] mounted");
        Ok(())
    }

    /// 卸载，所有打开的句柄随之失效
    pub fn unmount(&self) -> Result<(), VfsError> {
        self.with_driver(|inner| {
            inner.mounted = false;
            inner.driver.unmount()
        })
    }

    /// 在介质上创建空文件系统（卸载状态）
    pub fn format(&self) -> Result<(), VfsError> {
        self.with_driver(|inner| {
            inner.mounted = false;
            inner.driver.format()
        })?;
        log::info!("[LFS] formatted");
        Ok(())
    }

    /// 擦除整个介质
    pub fn erase_media(&self) -> Result<(), VfsError> {
        self.with_driver(|inner| {
            inner.mounted = false;
            inner.driver.erase_media()
        })
    }

    /// 是否已挂载
    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }

    /// 打开文件
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<LfsFile<'_>, VfsError> {
        let id = self.with_mounted(|driver| driver.file_open(path, LfsOpenFlags::from(flags)))?;
        Ok(LfsFile {
            volume: self,
            id,
            flags,
            open: true,
        })
    }

    /// 打开目录
    pub fn open_dir(&self, path: &str) -> Result<LfsDir<'_>, VfsError> {
        let id = self.with_mounted(|driver| driver.dir_open(path))?;
        Ok(LfsDir {
            volume: self,
            id,
            open: true,
        })
    }

    /// 查询元数据
    pub fn stat(&self, path: &str) -> Result<LfsStat, VfsError> {
        self.with_mounted(|driver| driver.stat(path))
            .map(convert_info)
    }

    /// 删除文件或空目录
    pub fn remove(&self, path: &str) -> Result<(), VfsError> {
        self.with_mounted(|driver| driver.remove(path))
    }

    /// 创建目录，已存在时返回 [`VfsError::Exist`]
    pub fn mkdir(&self, path: &str) -> Result<(), VfsError> {
        self.with_mounted(|driver| driver.mkdir(path))
    }

    /// 卷内重命名
    pub fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        self.with_mounted(|driver| driver.rename(from, to))
    }

    /// 卷容量统计（按 512 字节扇区折算）
    pub fn stats(&self) -> Result<VolumeStats, VfsError> {
        let (used, count, size) = self.with_mounted(|driver| {
            Ok((driver.fs_size()?, driver.block_count(), driver.block_size()))
        })?;
        let per_block = u64::from(size) / SECTOR_SIZE as u64;
        Ok(VolumeStats {
            sector_size: SECTOR_SIZE,
            total_sectors: count * per_block,
            free_sectors: count.saturating_sub(used) * per_block,
        })
    }
}

fn convert_info(info: LfsInfo) -> LfsStat {
    LfsStat {
        name: info.name,
        size: info.size,
        is_dir: info.is_dir,
    }
}

/// 打开的日志结构文件，丢弃时自动关闭
pub struct LfsFile<'a> {
    volume: &'a LfsVolume,
    id: LfsFileId,
    flags: OpenFlags,
    open: bool,
}

impl LfsFile<'_> {
    /// 读取数据，返回实际读取的字节数（0 表示文件末尾）
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, VfsError> {
        if !self.flags.contains(OpenFlags::READ) {
            return Err(VfsError::Inval);
        }
        let id = self.id;
        self.volume.with_mounted(|driver| driver.file_read(id, buf))
    }

    /// 写入数据，返回实际写入的字节数
    pub fn write(&mut self, data: &[u8]) -> Result<usize, VfsError> {
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(VfsError::Inval);
        }
        let id = self.id;
        self.volume.with_mounted(|driver| driver.file_write(id, data))
    }

    /// 移动读写位置到 `offset`
    pub fn seek(&mut self, offset: u64) -> Result<u64, VfsError> {
        let offset = i64::try_from(offset).map_err(|_| VfsError::Inval)?;
        let id = self.id;
        self.volume
            .with_mounted(|driver| driver.file_seek(id, offset, LfsWhence::Set))
    }

    /// 当前读写位置
    pub fn tell(&mut self) -> Result<u64, VfsError> {
        let id = self.id;
        self.volume.with_mounted(|driver| driver.file_tell(id))
    }

    /// 文件大小
    pub fn size(&mut self) -> Result<u64, VfsError> {
        let id = self.id;
        self.volume.with_mounted(|driver| driver.file_size(id))
    }

    /// 写回文件
    pub fn sync(&mut self) -> Result<(), VfsError> {
        let id = self.id;
        self.volume.with_mounted(|driver| driver.file_sync(id))
    }

    /// 关闭文件
    pub fn close(mut self) -> Result<(), VfsError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), VfsError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let id = self.id;
        self.volume.with_mounted(|driver| driver.file_close(id))
    }
}

impl Drop for LfsFile<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::debug!("[LFS] close on drop failed: {:?}", e);
        }
    }
}

/// 打开的日志结构目录，丢弃时自动关闭
pub struct LfsDir<'a> {
    volume: &'a LfsVolume,
    id: LfsDirId,
    open: bool,
}

impl LfsDir<'_> {
    /// 读取下一个目录项，原生的 `.` 和 `..` 被跳过；列举结束时返回 `None`
    pub fn read(&mut self) -> Result<Option<LfsStat>, VfsError> {
        let id = self.id;
        loop {
            let entry = self.volume.with_mounted(|driver| driver.dir_read(id))?;
            match entry {
                Some(info) if info.name == "." || info.name == ".." => continue,
                Some(info) => return Ok(Some(convert_info(info))),
                None => return Ok(None),
            }
        }
    }

    /// 回到第一个目录项
    pub fn rewind(&mut self) -> Result<(), VfsError> {
        let id = self.id;
        self.volume.with_mounted(|driver| driver.dir_rewind(id))
    }

    /// 关闭目录
    pub fn close(mut self) -> Result<(), VfsError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), VfsError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let id = self.id;
        self.volume.with_mounted(|driver| driver.dir_close(id))
    }
}

impl Drop for LfsDir<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::debug!("[LFS] directory close on drop failed: {:?}", e);
        }
    }
}
