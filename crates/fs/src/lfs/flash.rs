//! NOR Flash 上的日志结构文件系统
//!
//! 块大小等于 Flash 的擦除块大小。块 0 和块 1 是元数据对（见 [`meta`](super::meta)），
//! 其余块存放文件数据。
//!
//! 所有修改都是写时复制的：文件数据写入新分配的块，目录树的新版本写入元数据对中
//! 较旧的一块。新版本写完之前旧版本一直有效，提交前掉电时挂载看到的是上一次提交的
//! 状态。最近一次提交引用的块在下一次提交之前不会被重新分配。

use std::collections::{BTreeMap, BTreeSet};

use device::{FlashError, NorFlash};
use log::{debug, info, warn};

use super::meta::{self, FileData, Node, Superblock};
use super::{
    LfsDirId, LfsDriver, LfsError, LfsFileId, LfsInfo, LfsOpenFlags, LfsWhence, components,
};

/// 元数据对占用的块
const META_BLOCKS: [u32; 2] = [0, 1];

/// 至少需要的块数：元数据对加两个数据块
const MIN_BLOCKS: usize = 4;

/// 补零时每次写入的长度
const ZEROS: [u8; 256] = [0; 256];

type Dir = BTreeMap<String, Node>;

impl From<FlashError> for LfsError {
    fn from(err: FlashError) -> Self {
        warn!("[LFS] {}", err);
        LfsError::IO
    }
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    block_size: u32,
    block_count: u32,
}

impl Geometry {
    fn addr(&self, block: u32) -> usize {
        block as usize * self.block_size as usize
    }

    fn data_blocks(&self) -> u32 {
        self.block_count - META_BLOCKS.len() as u32
    }
}

/// 写缓存：文件中一个块的内容
struct Cache {
    index: usize,
    buf: Vec<u8>,
    dirty: bool,
}

/// 尚未提交的文件内容
struct Pending {
    data: FileData,
    cache: Option<Cache>,
}

struct OpenFile {
    path: Vec<String>,
    pos: u64,
    flags: LfsOpenFlags,
    /// 第一次写入时从目录树复制，同步后清空
    pending: Option<Pending>,
}

struct OpenDir {
    entries: Vec<LfsInfo>,
    pos: usize,
}

/// Flash 和几何参数
struct Media<'a> {
    flash: &'a mut dyn NorFlash,
    geometry: Geometry,
}

impl Media<'_> {
    fn read(&mut self, block: u32, offset: usize, buf: &mut [u8]) -> Result<(), LfsError> {
        self.flash.read(self.geometry.addr(block) + offset, buf)?;
        Ok(())
    }

    /// 擦除 `block` 后从块首写入 `data`
    fn write_block(&mut self, block: u32, data: &[u8]) -> Result<(), LfsError> {
        let addr = self.geometry.addr(block);
        self.flash.erase_block(addr)?;
        self.flash.program(addr, data)?;
        Ok(())
    }

    /// 读取一个元数据块，块为空或校验失败时返回 `None`
    fn read_meta(&mut self, block: u32) -> Result<Option<(Superblock, Dir)>, LfsError> {
        let mut header = [0u8; meta::HEADER_LEN];
        self.read(block, 0, &mut header)?;
        let Some(len) = meta::image_len(&header) else {
            return Ok(None);
        };
        if len > self.geometry.block_size as usize {
            return Ok(None);
        }
        let mut image = vec![0u8; len];
        self.read(block, 0, &mut image)?;
        Ok(meta::decode(&image))
    }
}

fn dir<'a>(root: &'a Dir, path: &[String]) -> Result<&'a Dir, LfsError> {
    let mut cur = root;
    for name in path {
        cur = match cur.get(name) {
            Some(Node::Dir(children)) => children,
            Some(Node::File(_)) => return Err(LfsError::NOTDIR),
            None => return Err(LfsError::NOENT),
        };
    }
    Ok(cur)
}

fn dir_mut<'a>(root: &'a mut Dir, path: &[String]) -> Result<&'a mut Dir, LfsError> {
    let mut cur = root;
    for name in path {
        cur = match cur.get_mut(name) {
            Some(Node::Dir(children)) => children,
            Some(Node::File(_)) => return Err(LfsError::NOTDIR),
            None => return Err(LfsError::NOENT),
        };
    }
    Ok(cur)
}

fn file_data<'a>(root: &'a Dir, path: &[String]) -> Result<&'a FileData, LfsError> {
    let (name, parent) = path.split_last().ok_or(LfsError::ISDIR)?;
    match dir(root, parent)?.get(name) {
        Some(Node::File(data)) => Ok(data),
        Some(Node::Dir(_)) => Err(LfsError::ISDIR),
        None => Err(LfsError::NOENT),
    }
}

fn entry_info(name: &str, node: &Node) -> LfsInfo {
    match node {
        Node::File(data) => LfsInfo {
            name: name.to_string(),
            size: data.size,
            is_dir: false,
        },
        Node::Dir(_) => LfsInfo {
            name: name.to_string(),
            size: 0,
            is_dir: true,
        },
    }
}

fn collect_blocks(dir: &Dir, out: &mut BTreeSet<u32>) {
    for node in dir.values() {
        match node {
            Node::Dir(children) => collect_blocks(children, out),
            Node::File(data) => out.extend(data.blocks.iter().copied()),
        }
    }
}

/// 收集目录树引用的数据块，块号越界、重复引用或块数与文件大小不符时返回 `false`
fn collect_checked(dir: &Dir, geometry: Geometry, out: &mut BTreeSet<u32>) -> bool {
    let block_size = u64::from(geometry.block_size);
    dir.values().all(|node| match node {
        Node::Dir(children) => collect_checked(children, geometry, out),
        Node::File(data) => {
            data.blocks.len() as u64 == data.size.div_ceil(block_size)
                && data.blocks.iter().all(|&block| {
                    block >= META_BLOCKS.len() as u32
                        && block < geometry.block_count
                        && out.insert(block)
                })
        }
    })
}

struct Mounted {
    root: Dir,
    rev: u32,
    /// 当前有效的元数据块
    meta_block: u32,
    /// 最近一次提交引用的数据块
    committed: BTreeSet<u32>,
    files: BTreeMap<LfsFileId, OpenFile>,
    dirs: BTreeMap<LfsDirId, OpenDir>,
    next_id: usize,
    /// 分配游标，从上次分配的位置向后找空闲块，擦除分散到整片
    cursor: u32,
}

impl Mounted {
    fn alloc_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 元数据对、最近一次提交、当前目录树和未提交的文件内容占用的块
    fn blocks_in_use(&self) -> BTreeSet<u32> {
        let mut used: BTreeSet<u32> = META_BLOCKS.into_iter().collect();
        used.extend(self.committed.iter().copied());
        collect_blocks(&self.root, &mut used);
        for file in self.files.values() {
            if let Some(pending) = &file.pending {
                used.extend(pending.data.blocks.iter().copied());
            }
        }
        used
    }

    fn alloc_block(&mut self, geometry: Geometry) -> Result<u32, LfsError> {
        let used = self.blocks_in_use();
        let first = META_BLOCKS.len() as u32;
        let count = geometry.data_blocks();
        let start = self.cursor - first;
        let block = (0..count)
            .map(|step| first + (start + step) % count)
            .find(|block| !used.contains(block))
            .ok_or(LfsError::NOSPC)?;
        self.cursor = first + (block - first + 1) % count;
        Ok(block)
    }

    /// 把目录树写入元数据对中较旧的一块
    fn commit(&mut self, media: &mut Media<'_>) -> Result<(), LfsError> {
        let rev = self.rev.wrapping_add(1);
        let sb = Superblock {
            rev,
            block_size: media.geometry.block_size,
            block_count: media.geometry.block_count,
        };
        let image = meta::encode(&sb, &self.root);
        if image.len() > media.geometry.block_size as usize {
            warn!("[LFS] directory tree does not fit in a metadata block");
            return Err(LfsError::NOSPC);
        }
        let target = META_BLOCKS[1 - self.meta_block as usize];
        media.write_block(target, &image)?;
        self.rev = rev;
        self.meta_block = target;
        self.committed.clear();
        collect_blocks(&self.root, &mut self.committed);
        debug!("[LFS] commit rev {} to block {}", rev, target);
        Ok(())
    }

    /// 修改目录树并提交，修改或提交失败时恢复原来的目录树
    fn update<R>(
        &mut self,
        media: &mut Media<'_>,
        f: impl FnOnce(&mut Dir) -> Result<R, LfsError>,
    ) -> Result<R, LfsError> {
        let saved = self.root.clone();
        let result = match f(&mut self.root) {
            Ok(value) => self.commit(media).map(|()| value),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.root = saved;
        }
        result
    }

    fn pending_mut(&mut self, file: LfsFileId) -> Result<&mut Pending, LfsError> {
        self.files
            .get_mut(&file)
            .and_then(|open| open.pending.as_mut())
            .ok_or(LfsError::BADF)
    }

    /// 把脏的写缓存写入新分配的块
    fn flush_cache(&mut self, media: &mut Media<'_>, file: LfsFileId) -> Result<(), LfsError> {
        let dirty = self
            .files
            .get(&file)
            .and_then(|open| open.pending.as_ref())
            .and_then(|pending| pending.cache.as_ref())
            .is_some_and(|cache| cache.dirty);
        if !dirty {
            return Ok(());
        }
        let block = self.alloc_block(media.geometry)?;
        let pending = self.pending_mut(file)?;
        let Some(cache) = pending.cache.as_mut() else {
            return Ok(());
        };
        media.write_block(block, &cache.buf)?;
        cache.dirty = false;
        match pending.data.blocks.get_mut(cache.index) {
            Some(slot) => *slot = block,
            None => pending.data.blocks.push(block),
        }
        Ok(())
    }

    /// 让写缓存装入文件的第 `index` 块
    fn load_cache(
        &mut self,
        media: &mut Media<'_>,
        file: LfsFileId,
        index: usize,
    ) -> Result<(), LfsError> {
        if self.pending_mut(file)?.cache.as_ref().map(|cache| cache.index) == Some(index) {
            return Ok(());
        }
        self.flush_cache(media, file)?;
        let pending = self.pending_mut(file)?;
        let mut buf = vec![0u8; media.geometry.block_size as usize];
        if let Some(&block) = pending.data.blocks.get(index) {
            media.read(block, 0, &mut buf)?;
        }
        pending.cache = Some(Cache {
            index,
            buf,
            dirty: false,
        });
        Ok(())
    }

    /// 在 `pos` 处写入不跨块的一段，返回写入的字节数
    fn put(
        &mut self,
        media: &mut Media<'_>,
        file: LfsFileId,
        pos: u64,
        bytes: &[u8],
    ) -> Result<usize, LfsError> {
        let block_size = u64::from(media.geometry.block_size);
        let index = (pos / block_size) as usize;
        let offset = (pos % block_size) as usize;
        let len = bytes.len().min(block_size as usize - offset);
        self.load_cache(media, file, index)?;
        let pending = self.pending_mut(file)?;
        let cache = pending.cache.as_mut().ok_or(LfsError::BADF)?;
        cache.buf[offset..offset + len].copy_from_slice(&bytes[..len]);
        cache.dirty = true;
        pending.data.size = pending.data.size.max(pos + len as u64);
        Ok(len)
    }

    fn open(
        &mut self,
        media: &mut Media<'_>,
        path: &str,
        flags: LfsOpenFlags,
    ) -> Result<LfsFileId, LfsError> {
        let path = components(path)?;
        let (name, parent) = path.split_last().ok_or(LfsError::ISDIR)?;
        let existing = match dir(&self.root, parent)?.get(name) {
            Some(Node::Dir(_)) => return Err(LfsError::ISDIR),
            Some(Node::File(data)) => Some(data.size > 0),
            None => None,
        };
        match existing {
            Some(_) if flags.contains(LfsOpenFlags::CREAT | LfsOpenFlags::EXCL) => {
                return Err(LfsError::EXIST);
            }
            Some(true) if flags.contains(LfsOpenFlags::TRUNC) => {
                self.update(media, |root| {
                    let children = dir_mut(root, parent)?;
                    children.insert(name.clone(), Node::File(FileData::default()));
                    Ok(())
                })?;
            }
            Some(_) => {}
            None if !flags.contains(LfsOpenFlags::CREAT) => return Err(LfsError::NOENT),
            None => {
                self.update(media, |root| {
                    let children = dir_mut(root, parent)?;
                    children.insert(name.clone(), Node::File(FileData::default()));
                    Ok(())
                })?;
            }
        }
        let id = self.alloc_id();
        self.files.insert(
            id,
            OpenFile {
                path,
                pos: 0,
                flags,
                pending: None,
            },
        );
        Ok(id)
    }

    fn read(
        &mut self,
        media: &mut Media<'_>,
        file: LfsFileId,
        buf: &mut [u8],
    ) -> Result<usize, LfsError> {
        let open = self.files.get(&file).ok_or(LfsError::BADF)?;
        if !open.flags.contains(LfsOpenFlags::RDONLY) {
            return Err(LfsError::BADF);
        }
        let (data, cache) = match &open.pending {
            Some(pending) => (&pending.data, pending.cache.as_ref()),
            None => (file_data(&self.root, &open.path)?, None),
        };
        let block_size = u64::from(media.geometry.block_size);
        let mut pos = open.pos;
        let mut done = 0;
        while done < buf.len() && pos < data.size {
            let index = (pos / block_size) as usize;
            let offset = pos % block_size;
            let len = ((buf.len() - done) as u64)
                .min(block_size - offset)
                .min(data.size - pos) as usize;
            let offset = offset as usize;
            let out = &mut buf[done..done + len];
            match cache {
                Some(cache) if cache.index == index => {
                    out.copy_from_slice(&cache.buf[offset..offset + len]);
                }
                _ => {
                    let block = *data.blocks.get(index).ok_or(LfsError::CORRUPT)?;
                    media.read(block, offset, out)?;
                }
            }
            done += len;
            pos += len as u64;
        }
        if let Some(open) = self.files.get_mut(&file) {
            open.pos = pos;
        }
        Ok(done)
    }

    fn write(
        &mut self,
        media: &mut Media<'_>,
        file: LfsFileId,
        data: &[u8],
    ) -> Result<usize, LfsError> {
        let open = self.files.get(&file).ok_or(LfsError::BADF)?;
        if !open.flags.contains(LfsOpenFlags::WRONLY) {
            return Err(LfsError::BADF);
        }
        let snapshot = match open.pending {
            Some(_) => None,
            None => Some(file_data(&self.root, &open.path)?.clone()),
        };
        let open = self.files.get_mut(&file).ok_or(LfsError::BADF)?;
        if let Some(data) = snapshot {
            open.pending = Some(Pending { data, cache: None });
        }
        let size = open.pending.as_ref().map_or(0, |pending| pending.data.size);
        if open.flags.contains(LfsOpenFlags::APPEND) {
            open.pos = size;
        }
        let mut pos = open.pos;

        // 写入位置在文件末尾之后时，中间补零
        loop {
            let size = self.pending_mut(file)?.data.size;
            if size >= pos {
                break;
            }
            let gap = (pos - size).min(ZEROS.len() as u64) as usize;
            self.put(media, file, size, &ZEROS[..gap])?;
        }

        let mut written = 0;
        while written < data.len() {
            match self.put(media, file, pos, &data[written..]) {
                Ok(n) => {
                    written += n;
                    pos += n as u64;
                }
                Err(LfsError::NOSPC) if written > 0 => break,
                Err(e) => return Err(e),
            }
            if let Some(open) = self.files.get_mut(&file) {
                open.pos = pos;
            }
        }
        Ok(written)
    }

    /// 写回写缓存并把文件的新内容提交到目录树
    fn sync(&mut self, media: &mut Media<'_>, file: LfsFileId) -> Result<(), LfsError> {
        let open = self.files.get(&file).ok_or(LfsError::BADF)?;
        if open.pending.is_none() {
            return Ok(());
        }
        self.flush_cache(media, file)?;
        let open = self.files.get(&file).ok_or(LfsError::BADF)?;
        let Some(pending) = &open.pending else {
            return Ok(());
        };
        let data = pending.data.clone();
        let path = open.path.clone();
        self.update(media, |root| {
            let (name, parent) = path.split_last().ok_or(LfsError::ISDIR)?;
            match dir_mut(root, parent)?.get_mut(name) {
                Some(Node::File(current)) => {
                    *current = data;
                    Ok(())
                }
                Some(Node::Dir(_)) => Err(LfsError::ISDIR),
                None => Err(LfsError::NOENT),
            }
        })?;
        if let Some(open) = self.files.get_mut(&file) {
            open.pending = None;
        }
        Ok(())
    }

    fn size(&self, file: LfsFileId) -> Result<u64, LfsError> {
        let open = self.files.get(&file).ok_or(LfsError::BADF)?;
        match &open.pending {
            Some(pending) => Ok(pending.data.size),
            None => Ok(file_data(&self.root, &open.path)?.size),
        }
    }

    fn remove(&mut self, media: &mut Media<'_>, path: &str) -> Result<(), LfsError> {
        let path = components(path)?;
        let (name, parent) = path.split_last().ok_or(LfsError::INVAL)?;
        match dir(&self.root, parent)?.get(name) {
            None => return Err(LfsError::NOENT),
            Some(Node::Dir(children)) if !children.is_empty() => return Err(LfsError::NOTEMPTY),
            Some(_) => {}
        }
        self.update(media, |root| {
            dir_mut(root, parent)?.remove(name);
            Ok(())
        })
    }

    fn rename(&mut self, media: &mut Media<'_>, from: &str, to: &str) -> Result<(), LfsError> {
        let from = components(from)?;
        let to = components(to)?;
        let (from_name, from_parent) = from.split_last().ok_or(LfsError::INVAL)?;
        let (to_name, to_parent) = to.split_last().ok_or(LfsError::INVAL)?;
        if to.len() > from.len() && to.starts_with(&from) {
            return Err(LfsError::INVAL);
        }
        let source_is_dir = match dir(&self.root, from_parent)?.get(from_name) {
            Some(node) => matches!(node, Node::Dir(_)),
            None => return Err(LfsError::NOENT),
        };
        if from == to {
            return Ok(());
        }
        match dir(&self.root, to_parent)?.get(to_name) {
            Some(Node::Dir(_)) if !source_is_dir => return Err(LfsError::ISDIR),
            Some(Node::Dir(children)) if !children.is_empty() => {
                return Err(LfsError::NOTEMPTY);
            }
            Some(Node::File(_)) if source_is_dir => return Err(LfsError::NOTDIR),
            _ => {}
        }
        self.update(media, |root| {
            let moved = dir_mut(root, from_parent)?
                .remove(from_name)
                .ok_or(LfsError::NOENT)?;
            dir_mut(root, to_parent)?.insert(to_name.clone(), moved);
            Ok(())
        })
    }

    fn mkdir(&mut self, media: &mut Media<'_>, path: &str) -> Result<(), LfsError> {
        let path = components(path)?;
        let (name, parent) = path.split_last().ok_or(LfsError::EXIST)?;
        if dir(&self.root, parent)?.contains_key(name) {
            return Err(LfsError::EXIST);
        }
        self.update(media, |root| {
            dir_mut(root, parent)?.insert(name.clone(), Node::Dir(BTreeMap::new()));
            Ok(())
        })
    }
}

/// NOR Flash 上的日志结构文件系统
///
/// 块大小取 Flash 的擦除块大小，块数取整片容量。新芯片上没有文件系统，
/// 需要先 [`format`](LfsDriver::format)。
pub struct FlashLfs {
    flash: Box<dyn NorFlash>,
    geometry: Geometry,
    state: Option<Mounted>,
}

impl FlashLfs {
    /// 在 Flash 上创建驱动（未挂载）
    ///
    /// 擦除块放不下元数据块头或块数少于 4 时返回 [`LfsError::INVAL`]。
    pub fn new(flash: Box<dyn NorFlash>) -> Result<Self, LfsError> {
        let block_size = flash.erase_size();
        let block_count = flash.capacity() / block_size.max(1);
        if block_size < 4 * meta::HEADER_LEN
            || block_count < MIN_BLOCKS
            || u32::try_from(block_size).is_err()
            || u32::try_from(block_count).is_err()
        {
            return Err(LfsError::INVAL);
        }
        info!(
            "[LFS] {}: {} blocks of {} bytes",
            flash.get_id(),
            block_count,
            block_size
        );
        Ok(Self {
            flash,
            geometry: Geometry {
                block_size: block_size as u32,
                block_count: block_count as u32,
            },
            state: None,
        })
    }

    fn media(&mut self) -> Media<'_> {
        Media {
            flash: self.flash.as_mut(),
            geometry: self.geometry,
        }
    }

    fn split(&mut self) -> Result<(&mut Mounted, Media<'_>), LfsError> {
        let state = self.state.as_mut().ok_or(LfsError::INVAL)?;
        let media = Media {
            flash: self.flash.as_mut(),
            geometry: self.geometry,
        };
        Ok((state, media))
    }

    fn mounted(&mut self) -> Result<&mut Mounted, LfsError> {
        self.state.as_mut().ok_or(LfsError::INVAL)
    }
}

impl LfsDriver for FlashLfs {
    fn format(&mut self) -> Result<(), LfsError> {
        self.state = None;
        let geometry = self.geometry;
        let sb = Superblock {
            rev: 1,
            block_size: geometry.block_size,
            block_count: geometry.block_count,
        };
        let image = meta::encode(&sb, &BTreeMap::new());
        let mut media = self.media();
        // 先擦掉另一块，旧文件系统较新的元数据不能留下
        media.flash.erase_block(geometry.addr(META_BLOCKS[1]))?;
        media.write_block(META_BLOCKS[0], &image)?;
        Ok(())
    }

    fn mount(&mut self) -> Result<(), LfsError> {
        self.state = None;
        let geometry = self.geometry;
        let mut media = self.media();
        let mut newest: Option<(u32, Superblock, Dir)> = None;
        for block in META_BLOCKS {
            let Some((sb, root)) = media.read_meta(block)? else {
                continue;
            };
            if sb.block_size != geometry.block_size || sb.block_count != geometry.block_count {
                warn!("[LFS] metadata block {} describes another geometry", block);
                continue;
            }
            if newest
                .as_ref()
                .is_none_or(|(_, current, _)| meta::rev_newer(sb.rev, current.rev))
            {
                newest = Some((block, sb, root));
            }
        }
        let Some((meta_block, sb, root)) = newest else {
            return Err(LfsError::CORRUPT);
        };
        let mut committed = BTreeSet::new();
        if !collect_checked(&root, geometry, &mut committed) {
            warn!("[LFS] directory tree references invalid blocks");
            return Err(LfsError::CORRUPT);
        }
        debug!("[LFS] rev {} from metadata block {}", sb.rev, meta_block);
        let first = META_BLOCKS.len() as u32;
        self.state = Some(Mounted {
            root,
            rev: sb.rev,
            meta_block,
            committed,
            files: BTreeMap::new(),
            dirs: BTreeMap::new(),
            next_id: 1,
            cursor: first + sb.rev % geometry.data_blocks(),
        });
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), LfsError> {
        self.state = None;
        Ok(())
    }

    fn erase_media(&mut self) -> Result<(), LfsError> {
        self.state = None;
        self.flash.erase_all()?;
        Ok(())
    }

    fn file_open(&mut self, path: &str, flags: LfsOpenFlags) -> Result<LfsFileId, LfsError> {
        let (state, mut media) = self.split()?;
        state.open(&mut media, path, flags)
    }

    fn file_close(&mut self, file: LfsFileId) -> Result<(), LfsError> {
        let (state, mut media) = self.split()?;
        let synced = state.sync(&mut media, file);
        state.files.remove(&file).ok_or(LfsError::BADF)?;
        synced
    }

    fn file_read(&mut self, file: LfsFileId, buf: &mut [u8]) -> Result<usize, LfsError> {
        let (state, mut media) = self.split()?;
        state.read(&mut media, file, buf)
    }

    fn file_write(&mut self, file: LfsFileId, data: &[u8]) -> Result<usize, LfsError> {
        let (state, mut media) = self.split()?;
        state.write(&mut media, file, data)
    }

    fn file_seek(
        &mut self,
        file: LfsFileId,
        offset: i64,
        whence: LfsWhence,
    ) -> Result<u64, LfsError> {
        let state = self.mounted()?;
        let base = match whence {
            LfsWhence::Set => 0,
            LfsWhence::Cur => state.files.get(&file).ok_or(LfsError::BADF)?.pos as i64,
            LfsWhence::End => state.size(file)? as i64,
        };
        let target = base
            .checked_add(offset)
            .filter(|pos| *pos >= 0)
            .ok_or(LfsError::INVAL)?;
        let open = state.files.get_mut(&file).ok_or(LfsError::BADF)?;
        open.pos = target as u64;
        Ok(open.pos)
    }

    fn file_tell(&mut self, file: LfsFileId) -> Result<u64, LfsError> {
        let state = self.mounted()?;
        state
            .files
            .get(&file)
            .map(|open| open.pos)
            .ok_or(LfsError::BADF)
    }

    fn file_size(&mut self, file: LfsFileId) -> Result<u64, LfsError> {
        self.mounted()?.size(file)
    }

    fn file_sync(&mut self, file: LfsFileId) -> Result<(), LfsError> {
        let (state, mut media) = self.split()?;
        state.sync(&mut media, file)
    }

    fn dir_open(&mut self, path: &str) -> Result<LfsDirId, LfsError> {
        let path = components(path)?;
        let state = self.mounted()?;
        let children = dir(&state.root, &path)?;
        let mut entries = vec![
            LfsInfo {
                name: ".".to_string(),
                size: 0,
                is_dir: true,
            },
            LfsInfo {
                name: "..".to_string(),
                size: 0,
                is_dir: true,
            },
        ];
        entries.extend(children.iter().map(|(name, node)| entry_info(name, node)));
        let id = state.alloc_id();
        state.dirs.insert(id, OpenDir { entries, pos: 0 });
        Ok(id)
    }

    fn dir_read(&mut self, dir: LfsDirId) -> Result<Option<LfsInfo>, LfsError> {
        let state = self.mounted()?;
        let open = state.dirs.get_mut(&dir).ok_or(LfsError::BADF)?;
        let entry = open.entries.get(open.pos).cloned();
        if entry.is_some() {
            open.pos += 1;
        }
        Ok(entry)
    }

    fn dir_rewind(&mut self, dir: LfsDirId) -> Result<(), LfsError> {
        let state = self.mounted()?;
        state.dirs.get_mut(&dir).ok_or(LfsError::BADF)?.pos = 0;
        Ok(())
    }

    fn dir_close(&mut self, dir: LfsDirId) -> Result<(), LfsError> {
        let state = self.mounted()?;
        state.dirs.remove(&dir).map(|_| ()).ok_or(LfsError::BADF)
    }

    fn stat(&mut self, path: &str) -> Result<LfsInfo, LfsError> {
        let path = components(path)?;
        let state = self.mounted()?;
        match path.split_last() {
            None => Ok(LfsInfo {
                name: "/".to_string(),
                size: 0,
                is_dir: true,
            }),
            Some((name, parent)) => dir(&state.root, parent)?
                .get(name)
                .map(|node| entry_info(name, node))
                .ok_or(LfsError::NOENT),
        }
    }

    fn remove(&mut self, path: &str) -> Result<(), LfsError> {
        let (state, mut media) = self.split()?;
        state.remove(&mut media, path)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), LfsError> {
        let (state, mut media) = self.split()?;
        state.rename(&mut media, from, to)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), LfsError> {
        let (state, mut media) = self.split()?;
        state.mkdir(&mut media, path)
    }

    fn fs_size(&mut self) -> Result<u64, LfsError> {
        Ok(self.mounted()?.blocks_in_use().len() as u64)
    }

    fn block_count(&self) -> u64 {
        u64::from(self.geometry.block_count)
    }

    fn block_size(&self) -> u32 {
        self.geometry.block_size
    }
}
