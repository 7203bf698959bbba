//! 存储服务集成测试的公共装配代码

#![allow(dead_code)]

use std::sync::Arc;

use device::{BlockDriver, RamNorFlash, SdCard, SimSdHost};
use fs::{FatVolume, FlashLfs, RamLfs};
use storage::{
    InternalFormat, InternalMedia, PrimaryStorage, StorageConfig, StorageLayout, StorageMedia,
    StorageService,
};
use sync::SpinLock;

/// 模拟 SD 卡的扇区数（4 MiB）
pub const SD_SECTORS: usize = 8192;

/// 测试台：服务对象和可供故障注入的模拟设备
pub struct Rig {
    pub service: StorageService,
    pub host: SimSdHost,
    pub card: Arc<SdCard<SimSdHost>>,
    pub lfs: Option<RamLfs>,
    pub flash: Option<RamNorFlash>,
}

/// 插入的模拟 SD 卡，`formatted` 为真时预先格式化为 FAT
pub fn sd_card(formatted: bool) -> (SimSdHost, Arc<SdCard<SimSdHost>>) {
    let host = SimSdHost::new(SD_SECTORS);
    let card = SdCard::new(host.clone(), 0);
    if formatted {
        FatVolume::format(card.clone(), &SpinLock::new(())).unwrap();
    }
    (host, card)
}

/// SD 卡 + 日志结构内部存储，`/DEFAULT` 指向 `primary`
pub fn dual_lfs(primary: PrimaryStorage) -> Rig {
    test_support::logger::init();
    let (host, card) = sd_card(true);
    let lfs = RamLfs::new(512, 256);
    let layout = StorageLayout::Dual {
        internal: InternalFormat::LittleFs,
        primary,
    };
    let media = StorageMedia {
        sdcard: Some(card.clone() as Arc<dyn BlockDriver>),
        internal: Some(InternalMedia::LittleFs(Box::new(lfs.clone()))),
    };
    let mut service = StorageService::new(StorageConfig::new(layout), media).unwrap();
    service.restart();
    Rig {
        service,
        host,
        card,
        lfs: Some(lfs),
        flash: None,
    }
}

/// SD 卡 + FTL 之上的 FAT 内部存储（2 MiB NOR Flash），`/DEFAULT` 指向内部存储
pub fn dual_fat() -> Rig {
    test_support::logger::init();
    let (host, card) = sd_card(true);
    let flash = RamNorFlash::new(2 * 1024 * 1024, 4096, 256);
    let layout = StorageLayout::Dual {
        internal: InternalFormat::Fat,
        primary: PrimaryStorage::Internal,
    };
    let media = StorageMedia {
        sdcard: Some(card.clone() as Arc<dyn BlockDriver>),
        internal: Some(InternalMedia::Fat(Box::new(flash.clone()))),
    };
    let mut service = StorageService::new(StorageConfig::new(layout), media).unwrap();
    service.restart();
    Rig {
        service,
        host,
        card,
        lfs: None,
        flash: Some(flash),
    }
}

/// 日志结构内部存储直接建在 `flash` 上的服务（已 restart），SD 卡为新插入的空白 FAT 卡
pub fn flash_lfs_service(flash: &RamNorFlash) -> StorageService {
    test_support::logger::init();
    let (_, card) = sd_card(true);
    let layout = StorageLayout::Dual {
        internal: InternalFormat::LittleFs,
        primary: PrimaryStorage::Internal,
    };
    let lfs = FlashLfs::new(Box::new(flash.clone())).unwrap();
    let media = StorageMedia {
        sdcard: Some(card as Arc<dyn BlockDriver>),
        internal: Some(InternalMedia::LittleFs(Box::new(lfs))),
    };
    let mut service = StorageService::new(StorageConfig::new(layout), media).unwrap();
    service.restart();
    service
}

/// 把整个文件读出来
pub fn read_all(service: &StorageService, path: &str) -> Vec<u8> {
    let mut file = service.open_file(path, storage::OpenFlags::READ).unwrap();
    let mut data = Vec::new();
    let mut buf = [0u8; 300];
    loop {
        let n = file.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    file.close().unwrap();
    data
}

/// 创建文件并写入全部内容
pub fn write_file(service: &StorageService, path: &str, data: &[u8]) {
    let mut file = service
        .open_file(
            path,
            storage::OpenFlags::WRITE | storage::OpenFlags::CREATE_ALWAYS,
        )
        .unwrap();
    assert_eq!(file.write(data).unwrap(), data.len());
    file.close().unwrap();
}
