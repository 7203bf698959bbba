//! 路由层：规范化、分类、根伪目录和工作目录

mod common;

use std::sync::Arc;

use common::{dual_fat, dual_lfs, sd_card};
use device::BlockDriver;
use fs::RamLfs;
use storage::{
    FileType, InternalFormat, InternalMedia, OpenFlags, PrimaryStorage, StorageConfig,
    StorageLayout, StorageMedia, StorageService, VfsError,
};

#[test]
fn test_relative_path_resolves_against_cwd() {
    let mut rig = dual_lfs(PrimaryStorage::Internal);
    let service = &mut rig.service;
    service.make_directory("/INTERNAL/X").unwrap();
    service.make_directory("/INTERNAL/X/a").unwrap();
    service.change_directory("/INTERNAL/X").unwrap();
    assert_eq!(service.current_dir(), "/INTERNAL/X");

    common::write_file(service, "a/./b/../c", b"hello");
    assert_eq!(common::read_all(service, "/INTERNAL/X/a/c"), b"hello");
    assert!(service.fstat("/INTERNAL/X/a/c").unwrap().size() == 5);

    service.change_directory("..").unwrap();
    assert_eq!(service.current_dir(), "/INTERNAL");
    assert_eq!(service.change_directory(""), Err(VfsError::Inval));
}

#[test]
fn test_dotdot_at_root_clamps() {
    let mut rig = dual_lfs(PrimaryStorage::Internal);
    rig.service.change_directory("/../..").unwrap();
    assert_eq!(rig.service.current_dir(), "/");
    assert!(rig.service.fstat("/../INTERNAL/RADIO").unwrap().is_dir());
}

#[test]
fn test_unknown_prefix_is_inval_everywhere() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    let service = &rig.service;
    for path in ["/FOO/bar", "/SDCARDX/a.txt", "/internal/x"] {
        assert_eq!(service.fstat(path).err(), Some(VfsError::Inval), "{}", path);
        assert_eq!(
            service.open_file(path, OpenFlags::READ).err(),
            Some(VfsError::Inval)
        );
        assert_eq!(service.open_directory(path).err(), Some(VfsError::Inval));
        assert_eq!(service.make_directory(path), Err(VfsError::Inval));
        assert_eq!(service.unlink(path), Err(VfsError::Inval));
        assert_eq!(service.rename(path, "/SDCARD/x"), Err(VfsError::Inval));
    }
}

#[test]
fn test_root_is_listing_only() {
    let rig = dual_fat();
    let service = &rig.service;
    let mut dir = service.open_directory("/").unwrap();
    let mut names = Vec::new();
    loop {
        let info = dir.read().unwrap();
        if info.name().is_empty() {
            break;
        }
        assert_eq!(info.file_type(), FileType::Dir);
        names.push(info.name().to_string());
    }
    assert_eq!(names, ["INTERNAL", "SDCARD"]);

    dir.rewind().unwrap();
    assert_eq!(dir.read().unwrap().name(), "INTERNAL");
    dir.close().unwrap();
    assert!(!dir.is_open());

    assert_eq!(service.fstat("/").err(), Some(VfsError::Inval));
    assert_eq!(service.unlink("/"), Err(VfsError::Inval));
    assert_eq!(service.make_directory("/"), Err(VfsError::Inval));
    assert_eq!(
        service.open_file("/", OpenFlags::READ).err(),
        Some(VfsError::Inval)
    );
    assert_eq!(service.open_directory("").err(), Some(VfsError::Inval));
}

#[test]
fn test_default_aliases_primary() {
    let rig = dual_lfs(PrimaryStorage::SdCard);
    let service = &rig.service;
    common::write_file(service, "/DEFAULT/MODELS/m.yml", b"sd");
    assert_eq!(common::read_all(service, "/SDCARD/MODELS/m.yml"), b"sd");
    assert_eq!(
        service.fstat("/INTERNAL/MODELS/m.yml").err(),
        Some(VfsError::NoEnt)
    );
}

#[test]
fn test_long_segment_is_rejected() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    let path = format!("/INTERNAL/{}", "n".repeat(256));
    assert_eq!(rig.service.fstat(&path).err(), Some(VfsError::NameTooLong));
}

#[test]
fn test_media_must_match_layout() {
    let (_, card) = sd_card(true);
    let media = StorageMedia {
        sdcard: Some(card as Arc<dyn BlockDriver>),
        internal: None,
    };
    let config = StorageConfig::new(StorageLayout::InternalOnly(InternalFormat::LittleFs));
    assert_eq!(StorageService::new(config, media).err(), Some(VfsError::Inval));

    let media = StorageMedia {
        sdcard: None,
        internal: Some(InternalMedia::LittleFs(Box::new(RamLfs::new(512, 64)))),
    };
    let config = StorageConfig::new(StorageLayout::InternalOnly(InternalFormat::Fat));
    assert_eq!(StorageService::new(config, media).err(), Some(VfsError::Inval));
}

#[test]
fn test_sdcard_only_layout() {
    test_support::logger::init();
    let (_, card) = sd_card(true);
    let media = StorageMedia {
        sdcard: Some(card as Arc<dyn BlockDriver>),
        internal: None,
    };
    let mut service =
        StorageService::new(StorageConfig::new(StorageLayout::SdCardOnly), media).unwrap();
    service.restart();
    assert!(service.default_storage_available());
    assert!(!service.internal_mounted());
    assert_eq!(service.fstat("/INTERNAL/RADIO").err(), Some(VfsError::Inval));
    assert!(service.fstat("/SDCARD/RADIO").unwrap().is_dir());
    assert_eq!(service.format(), Err(VfsError::Inval));
    assert_eq!(service.flash_get_no_sectors(), 0);
}
