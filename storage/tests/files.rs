//! 统一文件和目录操作，两种内部存储格式都要覆盖

mod common;

use chrono::NaiveDate;
use common::{Rig, dual_fat, dual_lfs, read_all, write_file};
use storage::{FileInfo, OpenFlags, PrimaryStorage, StorageService, VfsError};
use test_support::pattern;
use vfs::{FatStat, fat_date, fat_time};

fn rigs() -> Vec<Rig> {
    vec![dual_lfs(PrimaryStorage::Internal), dual_fat()]
}

fn list(service: &StorageService, path: &str) -> Vec<String> {
    let mut dir = service.open_directory(path).unwrap();
    let mut names = Vec::new();
    loop {
        let info = dir.read().unwrap();
        if info.name().is_empty() {
            break;
        }
        names.push(info.name().to_string());
    }
    dir.close().unwrap();
    names
}

#[test]
fn test_round_trip_around_sector_size() {
    for rig in rigs() {
        for dir in ["/INTERNAL", "/SDCARD"] {
            for (i, len) in [0usize, 1, 511, 512, 513].into_iter().enumerate() {
                let path = format!("{}/rt{}.bin", dir, len);
                let payload = pattern(len, i as u32);
                write_file(&rig.service, &path, &payload);
                assert_eq!(read_all(&rig.service, &path), payload, "{}", path);
                assert_eq!(rig.service.fstat(&path).unwrap().size(), len as u64);
            }
        }
    }
}

#[test]
fn test_make_directory_is_idempotent() {
    for rig in rigs() {
        let service = &rig.service;
        service.make_directory("/DEFAULT/LOGS/2024").unwrap();
        service.make_directory("/DEFAULT/LOGS/2024").unwrap();
        let names = list(service, "/DEFAULT/LOGS");
        assert_eq!(names.iter().filter(|n| *n == "2024").count(), 1);
        assert!(service.check_and_create_directory("/DEFAULT/LOGS/2024").is_ok());
    }
}

#[test]
fn test_make_directory_over_file_fails() {
    for rig in rigs() {
        for dir in ["/DEFAULT", "/SDCARD"] {
            let path = format!("{}/plain", dir);
            write_file(&rig.service, &path, b"x");
            assert_eq!(rig.service.make_directory(&path), Err(VfsError::Exist), "{}", path);
            assert_eq!(
                rig.service.check_and_create_directory(&path),
                Err(VfsError::Exist.message())
            );
        }
    }
}

#[test]
fn test_listing_synthesizes_parent_first() {
    for rig in rigs() {
        let service = &rig.service;
        write_file(service, "/DEFAULT/MODELS/a.yml", b"a");
        write_file(service, "/DEFAULT/MODELS/b.yml", b"b");
        let names = list(service, "/DEFAULT/MODELS");
        assert_eq!(names[0], "..");
        assert_eq!(names.iter().filter(|n| *n == ".").count(), 0);
        assert_eq!(names.iter().filter(|n| *n == "..").count(), 1);
        let mut files: Vec<_> = names[1..].iter().map(|n| n.to_ascii_lowercase()).collect();
        files.sort();
        assert_eq!(files, ["a.yml", "b.yml"]);

        let mut dir = service.open_directory("/DEFAULT/MODELS").unwrap();
        let parent = dir.read().unwrap();
        assert!(parent.is_dir());
        dir.read().unwrap();
        dir.rewind().unwrap();
        assert_eq!(dir.read().unwrap().name(), "..");
        dir.close().unwrap();
        dir.close().unwrap();
        assert_eq!(dir.read().err(), Some(VfsError::Inval));
    }
}

#[test]
fn test_open_modes() {
    for rig in rigs() {
        let service = &rig.service;
        let path = "/DEFAULT/modes.txt";
        assert_eq!(
            service.open_file(path, OpenFlags::READ).err(),
            Some(VfsError::NoEnt)
        );
        assert_eq!(
            service.open_file(path, OpenFlags::CREATE_NEW).err(),
            Some(VfsError::Inval)
        );

        write_file(service, path, b"first");
        assert_eq!(
            service
                .open_file(path, OpenFlags::CREATE_NEW | OpenFlags::WRITE)
                .err(),
            Some(VfsError::Exist)
        );

        let mut file = service
            .open_file(path, OpenFlags::OPEN_APPEND | OpenFlags::WRITE)
            .unwrap();
        file.puts("+second").unwrap();
        file.close().unwrap();
        assert_eq!(read_all(service, path), b"first+second");

        write_file(service, path, b"new");
        assert_eq!(read_all(service, path), b"new");

        let mut file = service.open_file(path, OpenFlags::READ).unwrap();
        assert_eq!(file.write(b"x").err(), Some(VfsError::Inval));
        file.close().unwrap();
    }
}

#[test]
fn test_text_helpers() {
    for rig in rigs() {
        let service = &rig.service;
        let path = "/DEFAULT/LOGS/flight.csv";
        let mut file = service
            .open_file(path, OpenFlags::WRITE | OpenFlags::CREATE_ALWAYS)
            .unwrap();
        file.puts("time,alt\n").unwrap();
        writeln!(file, "{},{}", 1, 120).unwrap();
        file.putc(b'2').unwrap();
        file.close().unwrap();

        let mut file = service.open_file(path, OpenFlags::READ).unwrap();
        assert_eq!(file.size().unwrap(), 16);
        assert_eq!(file.gets(64).unwrap().as_deref(), Some("time,alt\n"));
        assert_eq!(file.gets(64).unwrap().as_deref(), Some("1,120\n"));
        assert!(!file.eof().unwrap());
        assert_eq!(file.gets(64).unwrap().as_deref(), Some("2"));
        assert!(file.eof().unwrap());
        assert_eq!(file.gets(64).unwrap(), None);

        file.lseek(5).unwrap();
        assert_eq!(file.tell().unwrap(), 5);
        assert_eq!(file.gets(3).unwrap().as_deref(), Some("al"));
        file.close().unwrap();
    }
}

#[test]
fn test_double_close_and_closed_handle() {
    for rig in rigs() {
        let mut file = rig
            .service
            .open_file("/DEFAULT/c.bin", OpenFlags::WRITE | OpenFlags::CREATE_ALWAYS)
            .unwrap();
        assert!(file.is_open());
        file.close().unwrap();
        assert!(!file.is_open());
        file.close().unwrap();
        assert_eq!(file.write(b"x").err(), Some(VfsError::Inval));
        assert_eq!(file.tell().err(), Some(VfsError::Inval));
    }
}

#[test]
fn test_open_without_access_is_inval() {
    for rig in rigs() {
        write_file(&rig.service, "/DEFAULT/a.bin", b"a");
        assert_eq!(
            rig.service
                .open_file("/DEFAULT/a.bin", OpenFlags::OPEN_ALWAYS)
                .err(),
            Some(VfsError::Inval)
        );
    }
}

#[test]
fn test_unlink() {
    for rig in rigs() {
        let service = &rig.service;
        service.make_directory("/DEFAULT/TMP").unwrap();
        write_file(service, "/DEFAULT/TMP/f", b"f");
        assert_eq!(service.unlink("/DEFAULT/TMP"), Err(VfsError::NotEmpty));
        service.unlink("/DEFAULT/TMP/f").unwrap();
        service.unlink("/DEFAULT/TMP").unwrap();
        assert_eq!(service.fstat("/DEFAULT/TMP").err(), Some(VfsError::NoEnt));
        assert_eq!(service.unlink("/DEFAULT/TMP"), Err(VfsError::NoEnt));
    }
}

#[test]
fn test_utime_sets_fat_timestamp() {
    let rig = dual_fat();
    let service = &rig.service;
    write_file(service, "/SDCARD/stamp.txt", b"t");
    let when = NaiveDate::from_ymd_opt(2023, 7, 14)
        .unwrap()
        .and_hms_opt(10, 20, 30)
        .unwrap();
    let info = FileInfo::Fat(FatStat {
        date: fat_date(&when),
        time: fat_time(&when),
        ..FatStat::default()
    });
    service.utime("/SDCARD/stamp.txt", &info).unwrap();
    assert_eq!(
        service.fstat("/SDCARD/stamp.txt").unwrap().modified(),
        Some(when)
    );
}

#[test]
fn test_utime_is_noop_without_timestamps() {
    let rig = dual_lfs(PrimaryStorage::Internal);
    write_file(&rig.service, "/INTERNAL/stamp.txt", b"t");
    let info = rig.service.fstat("/INTERNAL/stamp.txt").unwrap();
    assert_eq!(rig.service.utime("/INTERNAL/stamp.txt", &info), Ok(()));
    assert_eq!(info.modified(), None);
    assert_eq!(rig.service.utime("/", &info), Err(VfsError::Inval));
}
