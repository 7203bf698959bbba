//! 块设备到字节流的适配
//!
//! `fatfs` 以 `Read + Write + Seek` 访问磁盘，而块设备只能按扇区读写。
//! [`BlockIo`] 对齐的整扇区请求直接下发，不足一个扇区的请求经由单扇区缓存
//! 做读-改-写。缓存是直写的，不会持有脏数据。
//!
//! 块设备错误被包装进 `io::Error` 穿过 `fatfs`，在错误翻译时用
//! [`block_error`] 取回，保证“设备未就绪”不会在 FAT 层丢失。

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use device::{BlockDriver, BlockError, SECTOR_SIZE};

const SECTOR: u64 = SECTOR_SIZE as u64;

/// 块设备字节流
pub struct BlockIo {
    device: Arc<dyn BlockDriver>,
    pos: u64,
    len: u64,
    cached: Option<usize>,
    sector_buf: Vec<u8>,
}

impl BlockIo {
    /// 包装块设备，容量取自设备的扇区数
    pub fn new(device: Arc<dyn BlockDriver>) -> Result<Self, BlockError> {
        let sectors = device.sector_count()?;
        Ok(Self {
            device,
            pos: 0,
            len: sectors as u64 * SECTOR,
            cached: None,
            sector_buf: vec![0u8; SECTOR_SIZE],
        })
    }

    /// 设备容量（字节）
    pub fn len(&self) -> u64 {
        self.len
    }

    /// 设备容量是否为 0
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn load(&mut self, sector: usize) -> io::Result<()> {
        if self.cached != Some(sector) {
            self.cached = None;
            self.device
                .read_blocks(sector, &mut self.sector_buf)
                .map_err(to_io)?;
            self.cached = Some(sector);
        }
        Ok(())
    }

    fn invalidate(&mut self, first: usize, count: usize) {
        if let Some(sector) = self.cached {
            if sector >= first && sector < first + count {
                self.cached = None;
            }
        }
    }

    /// 当前位置所在扇区、扇区内偏移以及本次最多可传输的字节数
    fn window(&self, requested: usize) -> (usize, usize, usize) {
        let avail = (self.len - self.pos).min(requested as u64) as usize;
        ((self.pos / SECTOR) as usize, (self.pos % SECTOR) as usize, avail)
    }
}

/// 把块设备错误包装为 `io::Error`
pub fn to_io(err: BlockError) -> io::Error {
    io::Error::other(err)
}

/// 从 `io::Error` 中取回被包装的块设备错误
pub fn block_error(err: &io::Error) -> Option<BlockError> {
    err.get_ref()?.downcast_ref::<BlockError>().copied()
}

impl Read for BlockIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let (sector, offset, avail) = self.window(buf.len());
        let n = if offset == 0 && avail >= SECTOR_SIZE {
            let n = avail / SECTOR_SIZE * SECTOR_SIZE;
            self.device
                .read_blocks(sector, &mut buf[..n])
                .map_err(to_io)?;
            n
        } else {
            let n = avail.min(SECTOR_SIZE - offset);
            self.load(sector)?;
            buf[..n].copy_from_slice(&self.sector_buf[offset..offset + n]);
            n
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for BlockIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.len {
            return Err(to_io(BlockError::OutOfRange));
        }
        let (sector, offset, avail) = self.window(buf.len());
        let n = if offset == 0 && avail >= SECTOR_SIZE {
            let n = avail / SECTOR_SIZE * SECTOR_SIZE;
            self.invalidate(sector, n / SECTOR_SIZE);
            self.device.write_blocks(sector, &buf[..n]).map_err(to_io)?;
            n
        } else {
            let n = avail.min(SECTOR_SIZE - offset);
            self.load(sector)?;
            self.sector_buf[offset..offset + n].copy_from_slice(&buf[..n]);
            if let Err(e) = self.device.write_blocks(sector, &self.sector_buf) {
                self.cached = None;
                return Err(to_io(e));
            }
            n
        };
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device.flush().map_err(to_io)
    }
}

impl Seek for BlockIo {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of device")
        })?;
        self.pos = target;
        Ok(target)
    }
}
