//! 复制、重命名、移动和文件查找辅助函数

mod common;

use common::{SD_SECTORS, dual_fat, dual_lfs, read_all, write_file};
use storage::{COPY_BUFFER_SIZE, PrimaryStorage, VfsError};
use test_support::pattern;

#[test]
fn test_copy_spans_many_buffer_chunks() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    let service = &rig.service;
    let payload = pattern(COPY_BUFFER_SIZE * 7 + 13, 21);
    write_file(service, "/SDCARD/src.bin", &payload);

    service
        .copy_file("/SDCARD/src.bin", "/INTERNAL/dst.bin")
        .unwrap();
    service.unlink("/SDCARD/src.bin").unwrap();
    assert_eq!(read_all(service, "/INTERNAL/dst.bin"), payload);
}

#[test]
fn test_copy_refuses_existing_destination() {
    let rig = dual_fat();
    let service = &rig.service;
    write_file(service, "/SDCARD/a.bin", b"aaa");
    write_file(service, "/INTERNAL/a.bin", b"old");
    assert_eq!(
        service.copy_file("/SDCARD/a.bin", "/INTERNAL/a.bin"),
        Err(VfsError::Exist)
    );
    assert_eq!(read_all(service, "/INTERNAL/a.bin"), b"old");
    assert_eq!(
        service.copy_file("/SDCARD/missing", "/INTERNAL/b.bin"),
        Err(VfsError::NoEnt)
    );
    assert_eq!(service.fstat("/INTERNAL/b.bin").err(), Some(VfsError::NoEnt));
}

#[test]
fn test_copy_into_full_volume_reports_no_space() {
    let rig = dual_lfs(PrimaryStorage::SdCard);
    let service = &rig.service;
    // 内部存储只有 128 KiB
    let payload = pattern(200 * 1024, 5);
    write_file(service, "/SDCARD/big.bin", &payload);
    assert_eq!(
        service.copy_file("/SDCARD/big.bin", "/INTERNAL/big.bin"),
        Err(VfsError::NoSpc)
    );
    // 部分写入的目标保留
    assert!(service.fstat("/INTERNAL/big.bin").is_ok());
    assert_eq!(read_all(service, "/SDCARD/big.bin").len(), payload.len());
}

#[test]
fn test_copy_reports_device_fault_instead_of_full_volume() {
    let rig = dual_fat();
    let service = &rig.service;
    let payload = pattern(512 * 1024, 9);
    write_file(service, "/INTERNAL/src.bin", &payload);
    for sector in 400..SD_SECTORS {
        rig.host.fail_sector(sector, usize::MAX);
    }
    assert_eq!(
        service.copy_file("/INTERNAL/src.bin", "/SDCARD/dst.bin"),
        Err(VfsError::Io)
    );
    assert_eq!(read_all(service, "/INTERNAL/src.bin"), payload);
}

#[test]
fn test_copy_file_in_joins_names() {
    let rig = dual_fat();
    let service = &rig.service;
    service.make_directory("/SDCARD/MODELS").unwrap();
    write_file(service, "/SDCARD/MODELS/m1.yml", b"model");
    service
        .copy_file_in("m1.yml", "/SDCARD/MODELS", "/INTERNAL/BACKUP", "m1.bak")
        .unwrap();
    assert_eq!(read_all(service, "/INTERNAL/BACKUP/m1.bak"), b"model");
}

#[test]
fn test_rename_within_backend() {
    for rig in [dual_lfs(PrimaryStorage::Internal), dual_fat()] {
        let service = &rig.service;
        write_file(service, "/INTERNAL/old.txt", b"content");
        service
            .rename("/INTERNAL/old.txt", "/INTERNAL/MODELS/new.txt")
            .unwrap();
        assert_eq!(service.fstat("/INTERNAL/old.txt").err(), Some(VfsError::NoEnt));
        assert_eq!(read_all(service, "/INTERNAL/MODELS/new.txt"), b"content");
    }
}

#[test]
fn test_rename_across_backends_is_copy_then_delete() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    let service = &rig.service;
    let payload = pattern(3000, 9);
    write_file(service, "/INTERNAL/LOGS/log1.csv", &payload);
    service.make_directory("/SDCARD/LOGS").unwrap();

    service
        .rename("/INTERNAL/LOGS/log1.csv", "/SDCARD/LOGS/log1.csv")
        .unwrap();
    assert_eq!(
        service.fstat("/INTERNAL/LOGS/log1.csv").err(),
        Some(VfsError::NoEnt)
    );
    assert_eq!(read_all(service, "/SDCARD/LOGS/log1.csv"), payload);
}

#[test]
fn test_failed_cross_backend_rename_keeps_source() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    let service = &rig.service;
    write_file(service, "/INTERNAL/keep.bin", b"keep");
    assert_eq!(
        service.rename("/INTERNAL/keep.bin", "/SDCARD/NOPE/keep.bin"),
        Err(VfsError::NoEnt)
    );
    assert_eq!(read_all(service, "/INTERNAL/keep.bin"), b"keep");
}

#[test]
fn test_rename_between_fat_drives_is_inval() {
    let rig = dual_fat();
    let service = &rig.service;
    write_file(service, "/SDCARD/a.txt", b"a");
    assert_eq!(
        service.rename("/SDCARD/a.txt", "/INTERNAL/a.txt"),
        Err(VfsError::Inval)
    );
    assert!(service.fstat("/SDCARD/a.txt").is_ok());
}

#[test]
fn test_move_file_reports_message() {
    let rig = dual_fat();
    let service = &rig.service;
    write_file(service, "/SDCARD/shot1.png", b"png");
    service
        .move_file_in("shot1.png", "/SDCARD", "shot1.png", "/INTERNAL/SCREENSHOTS")
        .unwrap();
    assert_eq!(service.fstat("/SDCARD/shot1.png").err(), Some(VfsError::NoEnt));
    assert_eq!(read_all(service, "/INTERNAL/SCREENSHOTS/shot1.png"), b"png");

    assert_eq!(
        service.move_file("/SDCARD/shot1.png", "/INTERNAL/x.png"),
        Err(VfsError::NoEnt.message())
    );
}

#[test]
fn test_pattern_availability() {
    for rig in [dual_lfs(PrimaryStorage::Internal), dual_fat()] {
        let service = &rig.service;
        assert!(!service.is_file_pattern_available("/DEFAULT/MODELS", "foo", Some(".bin.yml"), true));

        write_file(service, "/DEFAULT/MODELS/foo.bin", b"bin");
        assert!(service.is_file_pattern_available("/DEFAULT/MODELS", "foo", Some(".bin.yml"), true));
        assert_eq!(
            service.find_file_pattern("/DEFAULT/MODELS", "foo.txt", ".bin.yml", true),
            Some(".bin")
        );

        write_file(service, "/DEFAULT/MODELS/foo.yml", b"yml");
        assert_eq!(
            service.find_file_pattern("/DEFAULT/MODELS", "foo", ".bin.yml", true),
            Some(".yml")
        );
        assert!(service.is_file_pattern_available("/DEFAULT/MODELS", "foo.bin", None, true));
        assert!(!service.is_file_pattern_available("/DEFAULT/MODELS", "foo", None, true));
    }
}

#[test]
fn test_file_availability_and_directories() {
    for rig in [dual_lfs(PrimaryStorage::Internal), dual_fat()] {
        let service = &rig.service;
        assert!(service.is_file_available("/DEFAULT/MODELS", false));
        assert!(!service.is_file_available("/DEFAULT/MODELS", true));
        assert!(!service.is_file_available("/DEFAULT/MODELS/none", false));
        assert!(!service.is_file_available("/", false));
        assert!(!service.is_file_available("/ELSEWHERE/x", false));
    }
}

#[test]
fn test_find_next_file_index() {
    for rig in [dual_lfs(PrimaryStorage::Internal), dual_fat()] {
        let service = &rig.service;
        write_file(service, "/DEFAULT/SCREENSHOTS/shot1.png", b"1");
        write_file(service, "/DEFAULT/SCREENSHOTS/shot2.png", b"2");

        let mut name = String::from("shot0.png");
        assert_eq!(
            service.find_next_file_index(&mut name, 32, "/DEFAULT/SCREENSHOTS"),
            3
        );
        assert_eq!(name, "shot3.png");

        let mut name = String::from("log.csv");
        assert_eq!(service.find_next_file_index(&mut name, 32, "/DEFAULT/LOGS"), 1);
        assert_eq!(name, "log1.csv");

        let mut name = String::from("shot9.png");
        assert_eq!(service.find_next_file_index(&mut name, 9, "/DEFAULT/SCREENSHOTS"), 0);

        let mut name = String::from("noext");
        assert_eq!(service.find_next_file_index(&mut name, 32, "/DEFAULT/LOGS"), 0);
    }
}
