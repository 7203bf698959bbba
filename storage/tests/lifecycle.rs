//! 挂载生命周期、自动格式化和容量查询

mod common;

use std::sync::Arc;

use common::{
    SD_SECTORS, dual_fat, dual_lfs, flash_lfs_service, read_all, sd_card, write_file,
};
use device::{BlockDriver, RamNorFlash};
use fs::RamLfs;
use storage::{
    InternalFormat, InternalMedia, PrimaryStorage, StorageConfig, StorageLayout, StorageMedia,
    StorageService, VfsError, WELL_KNOWN_DIRS,
};
use test_support::pattern;

#[test]
fn test_blank_internal_fat_is_formatted_on_restart() {
    let rig = dual_fat();
    assert!(rig.service.internal_mounted());
    assert!(test_support::logger::contains(
        "[Storage] internal FAT mount failed"
    ));
    for dir in WELL_KNOWN_DIRS {
        let path = format!("/INTERNAL/{}", dir);
        assert!(rig.service.fstat(&path).unwrap().is_dir(), "{}", path);
    }
}

#[test]
fn test_blank_internal_lfs_is_formatted_on_restart() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    assert!(rig.service.internal_mounted());
    assert!(rig.lfs.as_ref().unwrap().is_mounted());
    assert!(rig.service.fstat("/DEFAULT/BACKUP").unwrap().is_dir());
}

#[test]
fn test_internal_data_survives_restart() {
    let mut rig = dual_fat();
    let payload = pattern(2000, 3);
    write_file(&rig.service, "/INTERNAL/RADIO/radio.yml", &payload);
    rig.service.restart();
    assert!(rig.service.internal_mounted());
    assert_eq!(read_all(&rig.service, "/INTERNAL/RADIO/radio.yml"), payload);

    // 新的服务对象在同一片 Flash 上挂载，不需要重新格式化
    rig.service.stop();
    let flash: RamNorFlash = rig.flash.clone().unwrap();
    let (_, card) = sd_card(true);
    let media = StorageMedia {
        sdcard: Some(card as Arc<dyn BlockDriver>),
        internal: Some(InternalMedia::Fat(Box::new(flash))),
    };
    let layout = StorageLayout::Dual {
        internal: InternalFormat::Fat,
        primary: PrimaryStorage::Internal,
    };
    let mut service = StorageService::new(StorageConfig::new(layout), media).unwrap();
    service.restart();
    assert_eq!(read_all(&service, "/INTERNAL/RADIO/radio.yml"), payload);
}

#[test]
fn test_internal_lfs_on_flash_survives_restart() {
    let flash = RamNorFlash::new(512 * 1024, 4096, 256);
    let payload = pattern(10_000, 8);
    {
        let mut service = flash_lfs_service(&flash);
        assert!(service.internal_mounted());
        write_file(&service, "/INTERNAL/RADIO/radio.yml", &payload);
        service.make_directory("/DEFAULT/MODELS/old").unwrap();
        service.stop();
    }

    let service = flash_lfs_service(&flash);
    assert!(service.internal_mounted());
    assert_eq!(read_all(&service, "/INTERNAL/RADIO/radio.yml"), payload);
    assert!(service.fstat("/INTERNAL/MODELS/old").unwrap().is_dir());
    // 128 个 4 KiB 块，每块 8 个扇区
    assert_eq!(service.flash_get_no_sectors(), 1024);
    assert_eq!(service.flash_get_size(), 512 * 1024);
    assert!(service.flash_get_free_sectors() < 1024);
}

#[test]
fn test_corrupt_lfs_is_reformatted() {
    let mut rig = dual_lfs(PrimaryStorage::Internal);
    write_file(&rig.service, "/INTERNAL/lost.txt", b"gone");
    rig.lfs.as_ref().unwrap().corrupt();
    rig.service.restart();
    assert!(rig.service.internal_mounted());
    assert_eq!(
        rig.service.fstat("/INTERNAL/lost.txt").err(),
        Some(VfsError::NoEnt)
    );
    assert!(rig.service.fstat("/INTERNAL/MODELS").unwrap().is_dir());
}

#[test]
fn test_unformatted_sd_is_not_formatted() {
    test_support::logger::init();
    let (host, card) = sd_card(false);
    let media = StorageMedia {
        sdcard: Some(card as Arc<dyn BlockDriver>),
        internal: Some(InternalMedia::LittleFs(Box::new(RamLfs::new(512, 64)))),
    };
    let layout = StorageLayout::Dual {
        internal: InternalFormat::LittleFs,
        primary: PrimaryStorage::SdCard,
    };
    let mut service = StorageService::new(StorageConfig::new(layout), media).unwrap();
    service.restart();
    assert!(!service.sd_card_mounted());
    assert!(service.internal_mounted());
    assert!(!service.default_storage_available());
    assert_eq!(service.fstat("/SDCARD/x").err(), Some(VfsError::NotReady));
    assert_eq!(service.fstat("/DEFAULT/x").err(), Some(VfsError::NotReady));
    assert_eq!(service.sd_get_free_sectors(), 0);
    assert!(host.sector(0).iter().all(|b| *b == 0));
}

#[test]
fn test_sd_inserted_later() {
    test_support::logger::init();
    let (host, card) = sd_card(true);
    host.set_present(false);
    let media = StorageMedia {
        sdcard: Some(card as Arc<dyn BlockDriver>),
        internal: None,
    };
    let mut service =
        StorageService::new(StorageConfig::new(StorageLayout::SdCardOnly), media).unwrap();
    service.restart();
    assert!(!service.sd_card_mounted());
    assert_eq!(service.mount_sd(), Err(VfsError::NotReady));

    host.set_present(true);
    service.mount_sd().unwrap();
    assert!(service.sd_card_mounted());
    assert!(service.fstat("/DEFAULT/LOGS").unwrap().is_dir());
    service.mount_sd().unwrap();
}

#[test]
fn test_format_wipes_internal_storage() {
    for mut rig in [dual_lfs(PrimaryStorage::Internal), dual_fat()] {
        write_file(&rig.service, "/INTERNAL/MODELS/m.yml", b"m");
        rig.service.format().unwrap();
        assert!(rig.service.internal_mounted());
        assert_eq!(
            rig.service.fstat("/INTERNAL/MODELS/m.yml").err(),
            Some(VfsError::NoEnt)
        );
        assert!(rig.service.fstat("/INTERNAL/MODELS").unwrap().is_dir());
    }
}

#[test]
fn test_stop_makes_backends_not_ready() {
    let mut rig = dual_fat();
    rig.service.stop();
    assert!(!rig.service.sd_card_mounted());
    assert!(!rig.service.internal_mounted());
    assert_eq!(rig.service.fstat("/INTERNAL/RADIO").err(), Some(VfsError::NotReady));
    assert_eq!(rig.service.fstat("/SDCARD/a").err(), Some(VfsError::NotReady));
    assert_eq!(rig.service.flash_get_free_sectors(), 0);
}

#[test]
fn test_capacity_queries() {
    let rig = dual_fat();
    let service = &rig.service;
    assert_eq!(service.sd_get_sector_count(), SD_SECTORS as u64);
    let sd_free = service.sd_get_free_sectors();
    assert!(sd_free > 0 && sd_free < SD_SECTORS as u64);

    let sectors = service.flash_get_no_sectors();
    assert!(sectors > 0);
    assert_eq!(service.flash_get_size(), sectors * 512);
    let free_before = service.flash_get_free_sectors();
    assert!(free_before > 0 && free_before <= sectors);
    write_file(service, "/INTERNAL/fill.bin", &pattern(64 * 1024, 1));
    assert!(service.flash_get_free_sectors() < free_before);

    let rig = dual_lfs(PrimaryStorage::Internal);
    // 512 字节块 × 256
    assert_eq!(rig.service.flash_get_no_sectors(), 256);
    assert_eq!(rig.service.flash_get_size(), 128 * 1024);
    assert!(rig.service.flash_get_free_sectors() < 256);
}

#[test]
fn test_sd_transient_faults_are_retried() {
    let rig = dual_lfs(PrimaryStorage::SdCard);
    let payload = pattern(8 * 512, 17);
    write_file(&rig.service, "/SDCARD/retry.bin", &payload);
    for sector in 0..256 {
        rig.host.fail_sector(sector, 1);
    }
    assert_eq!(read_all(&rig.service, "/SDCARD/retry.bin"), payload);
    let stats = rig.card.stats();
    assert!(stats.retries + stats.single_sector_fallbacks > 0);
}

#[test]
fn test_sd_persistent_fault_fails_the_write() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    for sector in 400..SD_SECTORS {
        rig.host.fail_sector(sector, usize::MAX);
    }
    let mut file = rig
        .service
        .open_file(
            "/SDCARD/big.bin",
            storage::OpenFlags::WRITE | storage::OpenFlags::CREATE_ALWAYS,
        )
        .unwrap();
    // 前面的簇写成功之后才遇到坏扇区，仍然必须报错而不是返回部分长度
    assert_eq!(file.write(&pattern(512 * 1024, 4)), Err(VfsError::Io));
    drop(file);
}

#[test]
fn test_card_pulled_mid_session() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    write_file(&rig.service, "/SDCARD/a.txt", b"a");
    rig.host.set_present(false);
    assert_eq!(
        rig.service
            .open_file("/SDCARD/b.txt", storage::OpenFlags::WRITE | storage::OpenFlags::CREATE_NEW)
            .err(),
        Some(VfsError::NotReady)
    );
    assert_eq!(
        rig.service.check_and_create_directory("/SDCARD/NEW"),
        Err("No SD card")
    );
    // 内部存储不受影响
    write_file(&rig.service, "/INTERNAL/ok.txt", b"ok");
}

#[test]
fn test_io_mutex_is_shared() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    let lock = rig.service.io_mutex();
    assert!(Arc::ptr_eq(&lock, &rig.service.io_mutex()));
    drop(lock.lock());
    write_file(&rig.service, "/INTERNAL/after.txt", b"x");
}
