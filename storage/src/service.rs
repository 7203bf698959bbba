//! 存储服务对象：挂载生命周期、路由和容量查询

use std::sync::Arc;

use device::{BlockDriver, SECTOR_SIZE};
use fs::{Drive, FatVolume, LfsVolume, split_drive};
use ftl::{Ftl, FtlError};
use sync::SpinLock;
use vfs::{
    Backend, DEFAULT_MOUNT, MountTable, PrimaryStorage, StorageLayout, VfsError, resolve_path,
};

use crate::config::{InternalMedia, StorageConfig, StorageMedia, WELL_KNOWN_DIRS};

/// 内部存储的挂载状态
pub(crate) enum InternalStore {
    /// 未配置内部存储
    Absent,
    /// FTL 之上的 FAT
    Fat {
        ftl: Arc<Ftl>,
        volume: Option<FatVolume>,
    },
    /// 日志结构文件系统
    Lfs(LfsVolume),
}

/// 路由结果：后端卷和原生路径
pub(crate) enum Target<'a> {
    Root,
    Fat(&'a FatVolume, String),
    Lfs(&'a LfsVolume, String),
}

/// 存储服务
///
/// 持有全部挂载状态和当前工作目录。由集成代码显式构造，
/// 以引用的方式交给界面、日志等调用方。
pub struct StorageService {
    pub(crate) config: StorageConfig,
    pub(crate) table: MountTable,
    pub(crate) io_lock: Arc<SpinLock<()>>,
    pub(crate) sdcard: Option<Arc<dyn BlockDriver>>,
    pub(crate) sd_volume: Option<FatVolume>,
    pub(crate) internal: InternalStore,
    pub(crate) cwd: String,
}

impl StorageService {
    /// 按配置和设备创建服务对象（尚未挂载，需调用 [`restart`](Self::restart)）
    ///
    /// 设备与存储布局不一致时返回 [`VfsError::Inval`]。
    pub fn new(config: StorageConfig, media: StorageMedia) -> Result<Self, VfsError> {
        media.check(config.layout)?;
        let io_lock = Arc::new(SpinLock::new(()));
        let internal = match media.internal {
            None => InternalStore::Absent,
            Some(InternalMedia::Fat(flash)) => {
                let ftl = Ftl::new(flash, config.ftl).map_err(|e| {
                    log::error!("[Storage] flash translation layer rejected: {}", e);
                    VfsError::Inval
                })?;
                InternalStore::Fat { ftl, volume: None }
            }
            Some(InternalMedia::LittleFs(driver)) => {
                InternalStore::Lfs(LfsVolume::new(driver, io_lock.clone()))
            }
        };
        Ok(Self {
            config,
            table: MountTable::new(config.layout),
            io_lock,
            sdcard: media.sdcard,
            sd_volume: None,
            internal,
            cwd: String::from("/"),
        })
    }

    /// 存储布局
    pub fn layout(&self) -> StorageLayout {
        self.config.layout
    }

    /// 块设备 I/O 互斥锁，后台写入任务与前台文件操作共享
    pub fn io_mutex(&self) -> Arc<SpinLock<()>> {
        self.io_lock.clone()
    }

    /// 卸载全部后端后重新挂载
    ///
    /// 内部存储挂载失败时擦除并重新格式化一次；SD 卡挂载失败时不格式化，
    /// 只报告不可用。挂载之后在 `/DEFAULT` 下创建常用目录。
    pub fn restart(&mut self) {
        log::info!("[Storage] restart");
        self.stop();
        if self.sdcard.is_some() {
            if let Err(e) = self.mount_sd_volume() {
                log::warn!("[Storage] SD card unavailable: {}", e);
            }
        }
        if let Err(e) = self.mount_internal() {
            log::error!("[Storage] internal storage unavailable: {}", e);
        }
        self.create_well_known_dirs();
    }

    /// 卸载全部后端
    pub fn stop(&mut self) {
        if let Some(volume) = self.sd_volume.take() {
            if let Err(e) = volume.unmount() {
                log::warn!("[Storage] SD card unmount failed: {}", e);
            }
        }
        match &mut self.internal {
            InternalStore::Absent => {}
            InternalStore::Fat { ftl, volume } => {
                if let Some(volume) = volume.take() {
                    if let Err(e) = volume.unmount() {
                        log::warn!("[Storage] internal FAT unmount failed: {}", e);
                    }
                }
                ftl.unmount();
            }
            InternalStore::Lfs(volume) => {
                if let Err(e) = volume.unmount() {
                    log::warn!("[Storage] internal unmount failed: {}", e);
                }
            }
        }
    }

    /// 挂载 SD 卡（已挂载时什么也不做）
    pub fn mount_sd(&mut self) -> Result<(), VfsError> {
        if self.sd_volume.is_some() {
            return Ok(());
        }
        self.mount_sd_volume()?;
        if self.config.layout.primary() == PrimaryStorage::SdCard {
            self.create_well_known_dirs();
        }
        Ok(())
    }

    /// 擦除并重新格式化内部存储，然后重新挂载
    pub fn format(&mut self) -> Result<(), VfsError> {
        let io_lock = self.io_lock.clone();
        match &mut self.internal {
            InternalStore::Absent => return Err(VfsError::Inval),
            InternalStore::Fat { ftl, volume } => {
                if let Some(volume) = volume.take() {
                    // 即将整片擦除，写回失败无关紧要
                    let _ = volume.unmount();
                }
                *volume = Some(format_internal_fat(ftl, &io_lock)?);
            }
            InternalStore::Lfs(volume) => {
                volume.erase_media()?;
                volume.format()?;
                volume.mount()?;
            }
        }
        log::info!("[Storage] internal storage formatted");
        if self.config.layout.primary() == PrimaryStorage::Internal {
            self.create_well_known_dirs();
        }
        Ok(())
    }

    fn mount_sd_volume(&mut self) -> Result<(), VfsError> {
        let card = self.sdcard.clone().ok_or(VfsError::NotReady)?;
        let volume = FatVolume::mount(card, Drive::SdCard, self.io_lock.clone())?;
        self.sd_volume = Some(volume);
        log::info!("[Storage] SD card mounted");
        Ok(())
    }

    fn mount_internal(&mut self) -> Result<(), VfsError> {
        let io_lock = self.io_lock.clone();
        match &mut self.internal {
            InternalStore::Absent => Ok(()),
            InternalStore::Fat { ftl, volume } => {
                *volume = Some(mount_internal_fat(ftl, &io_lock)?);
                Ok(())
            }
            InternalStore::Lfs(volume) => {
                if let Err(e) = volume.mount() {
                    log::warn!("[Storage] internal mount failed ({}), reformatting", e);
                    volume.erase_media()?;
                    volume.format()?;
                    volume.mount().map_err(|_| VfsError::NotReady)?;
                }
                Ok(())
            }
        }
    }

    fn create_well_known_dirs(&self) {
        if !self.default_storage_available() {
            return;
        }
        for dir in WELL_KNOWN_DIRS {
            let path = format!("{}/{}", DEFAULT_MOUNT, dir);
            if let Err(message) = self.check_and_create_directory(&path) {
                log::warn!("[Storage] cannot create {}: {}", path, message);
            }
        }
    }

    /// 当前工作目录
    pub fn current_dir(&self) -> &str {
        &self.cwd
    }

    /// 切换工作目录（不检查目标是否存在），空路径返回 [`VfsError::Inval`]
    pub fn change_directory(&mut self, path: &str) -> Result<(), VfsError> {
        if path.is_empty() {
            return Err(VfsError::Inval);
        }
        self.cwd = resolve_path(&self.cwd, path)?;
        Ok(())
    }

    /// 规范化路径并分类到后端
    pub(crate) fn classify(&self, path: &str) -> Result<(Backend, String), VfsError> {
        let full = resolve_path(&self.cwd, path)?;
        Ok(self.table.classify(&full))
    }

    /// 把路径路由到已挂载的后端卷
    pub(crate) fn target(&self, path: &str) -> Result<Target<'_>, VfsError> {
        let (backend, native) = self.classify(path)?;
        log::trace!("[Storage] {} -> {:?} {}", path, backend, native);
        match backend {
            Backend::Root => Ok(Target::Root),
            Backend::Unknown => Err(VfsError::Inval),
            Backend::Fat => {
                let volume = self.fat_volume(split_drive(&native).0)?;
                Ok(Target::Fat(volume, native))
            }
            Backend::Lfs => Ok(Target::Lfs(self.lfs_volume()?, native)),
        }
    }

    fn fat_volume(&self, drive: Drive) -> Result<&FatVolume, VfsError> {
        let volume = match drive {
            Drive::SdCard => self.sd_volume.as_ref(),
            Drive::Internal => match &self.internal {
                InternalStore::Fat { volume, .. } => volume.as_ref(),
                _ => None,
            },
        };
        volume.ok_or(VfsError::NotReady)
    }

    fn lfs_volume(&self) -> Result<&LfsVolume, VfsError> {
        match &self.internal {
            InternalStore::Lfs(volume) if volume.is_mounted() => Ok(volume),
            _ => Err(VfsError::NotReady),
        }
    }

    /// SD 卡是否已挂载
    pub fn sd_card_mounted(&self) -> bool {
        self.sd_volume.is_some()
    }

    /// 内部存储是否已挂载
    pub fn internal_mounted(&self) -> bool {
        match &self.internal {
            InternalStore::Absent => false,
            InternalStore::Fat { volume, .. } => volume.is_some(),
            InternalStore::Lfs(volume) => volume.is_mounted(),
        }
    }

    /// 主存储（`/DEFAULT`）是否可用
    pub fn default_storage_available(&self) -> bool {
        match self.config.layout.primary() {
            PrimaryStorage::SdCard => self.sd_card_mounted(),
            PrimaryStorage::Internal => self.internal_mounted(),
        }
    }

    /// SD 卡上的空闲扇区数，未挂载时为 0
    pub fn sd_get_free_sectors(&self) -> u64 {
        self.sd_volume
            .as_ref()
            .and_then(|volume| volume.stats().ok())
            .map_or(0, |stats| stats.free_sectors)
    }

    /// SD 卡的扇区总数，卡不可用时为 0
    pub fn sd_get_sector_count(&self) -> u64 {
        self.sdcard
            .as_ref()
            .and_then(|card| card.sector_count().ok())
            .map_or(0, |count| count as u64)
    }

    /// 内部存储的扇区总数（512 字节扇区），未挂载时为 0
    pub fn flash_get_no_sectors(&self) -> u64 {
        match &self.internal {
            InternalStore::Fat {
                ftl,
                volume: Some(_),
            } => ftl.logical_sectors() as u64,
            InternalStore::Lfs(volume) => volume.stats().map_or(0, |stats| stats.total_sectors),
            _ => 0,
        }
    }

    /// 内部存储的容量（字节）
    pub fn flash_get_size(&self) -> u64 {
        self.flash_get_no_sectors() * SECTOR_SIZE as u64
    }

    /// 内部存储上的空闲扇区数，未挂载时为 0
    pub fn flash_get_free_sectors(&self) -> u64 {
        let stats = match &self.internal {
            InternalStore::Fat {
                volume: Some(volume),
                ..
            } => volume.stats(),
            InternalStore::Lfs(volume) => volume.stats(),
            _ => return 0,
        };
        stats.map_or(0, |stats| stats.free_sectors)
    }
}

fn convert_ftl_error(err: FtlError) -> VfsError {
    match err {
        FtlError::NotMounted => VfsError::NotReady,
        FtlError::Corrupt => VfsError::Corrupt,
        FtlError::NoSpace => VfsError::NoSpc,
        FtlError::OutOfRange | FtlError::InvalidGeometry => VfsError::Inval,
        FtlError::Flash(_) => VfsError::Io,
    }
}

/// 挂载 FTL 和其上的 FAT，任一层失败时整片擦除、重新格式化后再挂载一次
fn mount_internal_fat(ftl: &Arc<Ftl>, io_lock: &Arc<SpinLock<()>>) -> Result<FatVolume, VfsError> {
    let mounted = ftl
        .mount()
        .map_err(convert_ftl_error)
        .and_then(|_| FatVolume::mount(ftl.clone(), Drive::Internal, io_lock.clone()));
    match mounted {
        Ok(volume) => Ok(volume),
        Err(e) => {
            log::warn!("[Storage] internal FAT mount failed ({}), reformatting", e);
            format_internal_fat(ftl, io_lock).map_err(|e| {
                log::error!("[Storage] internal FAT still unusable: {}", e);
                VfsError::NotReady
            })
        }
    }
}

/// 整片擦除，重建 FTL 和 FAT 并挂载
fn format_internal_fat(
    ftl: &Arc<Ftl>,
    io_lock: &Arc<SpinLock<()>>,
) -> Result<FatVolume, VfsError> {
    ftl.format().map_err(convert_ftl_error)?;
    ftl.mount().map_err(convert_ftl_error)?;
    FatVolume::format(ftl.clone(), io_lock)?;
    FatVolume::mount(ftl.clone(), Drive::Internal, io_lock.clone())
}
