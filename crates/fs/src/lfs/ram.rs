//! 内存中的日志结构文件系统
//!
//! 实现 [`LfsDriver`] 的原生语义（`.`/`..` 目录项、EXCL/TRUNC/APPEND、
//! 按块计算的空间占用），用于主机端测试。每个目录占一对元数据块，
//! 文件按块向上取整计算占用。

use std::collections::BTreeMap;
use std::sync::Arc;

use sync::SpinLock;

use super::{
    LfsDirId, LfsDriver, LfsError, LfsFileId, LfsInfo, LfsOpenFlags, LfsWhence, components,
};

/// 每个目录占用的元数据块数
const DIR_BLOCKS: u64 = 2;

enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

impl Node {
    fn blocks(&self, block_size: u64) -> u64 {
        match self {
            Node::File(data) => (data.len() as u64).div_ceil(block_size),
            Node::Dir(children) => {
                DIR_BLOCKS
                    + children
                        .values()
                        .map(|child| child.blocks(block_size))
                        .sum::<u64>()
            }
        }
    }

    fn info(&self, name: &str) -> LfsInfo {
        match self {
            Node::File(data) => LfsInfo {
                name: name.to_string(),
                size: data.len() as u64,
                is_dir: false,
            },
            Node::Dir(_) => LfsInfo {
                name: name.to_string(),
                size: 0,
                is_dir: true,
            },
        }
    }
}

struct OpenFile {
    path: Vec<String>,
    pos: u64,
    flags: LfsOpenFlags,
}

struct OpenDir {
    entries: Vec<LfsInfo>,
    pos: usize,
}

struct RamLfsState {
    /// `None` 表示介质上没有文件系统
    root: Option<Node>,
    mounted: bool,
    files: BTreeMap<LfsFileId, OpenFile>,
    dirs: BTreeMap<LfsDirId, OpenDir>,
    next_id: usize,
}

impl RamLfsState {
    fn mounted_root(&mut self) -> Result<&mut Node, LfsError> {
        if !self.mounted {
            return Err(LfsError::INVAL);
        }
        self.root.as_mut().ok_or(LfsError::CORRUPT)
    }

    fn alloc_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn close_all(&mut self) {
        self.files.clear();
        self.dirs.clear();
    }
}

/// 内存中的日志结构文件系统
///
/// 新建的介质是空白的（没有文件系统），需要先 [`format`](LfsDriver::format)。
/// 句柄可克隆，测试可以在驱动交给上层之后继续观察和破坏它。
#[derive(Clone)]
pub struct RamLfs {
    state: Arc<SpinLock<RamLfsState>>,
    block_size: u32,
    block_count: u64,
}

impl RamLfs {
    /// 创建 `block_count` 个 `block_size` 字节块的空白介质
    pub fn new(block_size: u32, block_count: u64) -> Self {
        Self {
            state: Arc::new(SpinLock::new(RamLfsState {
                root: None,
                mounted: false,
                files: BTreeMap::new(),
                dirs: BTreeMap::new(),
                next_id: 1,
            })),
            block_size,
            block_count,
        }
    }

    /// 是否已挂载
    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    /// 破坏介质上的文件系统，下次挂载失败
    pub fn corrupt(&self) {
        let mut state = self.state.lock();
        state.root = None;
        state.mounted = false;
        state.close_all();
    }
}

fn node<'a>(root: &'a Node, path: &[String]) -> Result<&'a Node, LfsError> {
    let mut cur = root;
    for name in path {
        cur = match cur {
            Node::Dir(children) => children.get(name).ok_or(LfsError::NOENT)?,
            Node::File(_) => return Err(LfsError::NOTDIR),
        };
    }
    Ok(cur)
}

fn node_mut<'a>(root: &'a mut Node, path: &[String]) -> Result<&'a mut Node, LfsError> {
    let mut cur = root;
    for name in path {
        cur = match cur {
            Node::Dir(children) => children.get_mut(name).ok_or(LfsError::NOENT)?,
            Node::File(_) => return Err(LfsError::NOTDIR),
        };
    }
    Ok(cur)
}

fn children_mut<'a>(
    root: &'a mut Node,
    path: &[String],
) -> Result<&'a mut BTreeMap<String, Node>, LfsError> {
    match node_mut(root, path)? {
        Node::Dir(children) => Ok(children),
        Node::File(_) => Err(LfsError::NOTDIR),
    }
}

fn file_data<'a>(root: &'a Node, path: &[String]) -> Result<&'a Vec<u8>, LfsError> {
    match node(root, path)? {
        Node::File(data) => Ok(data),
        Node::Dir(_) => Err(LfsError::ISDIR),
    }
}

impl LfsDriver for RamLfs {
    fn format(&mut self) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        state.close_all();
        state.root = Some(Node::Dir(BTreeMap::new()));
        state.mounted = false;
        Ok(())
    }

    fn mount(&mut self) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        if state.root.is_none() {
            return Err(LfsError::CORRUPT);
        }
        state.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        state.close_all();
        state.mounted = false;
        Ok(())
    }

    fn erase_media(&mut self) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        state.close_all();
        state.root = None;
        state.mounted = false;
        Ok(())
    }

    fn file_open(&mut self, path: &str, flags: LfsOpenFlags) -> Result<LfsFileId, LfsError> {
        let path = components(path)?;
        let (name, parent) = path.split_last().ok_or(LfsError::ISDIR)?;
        let mut state = self.state.lock();
        let children = children_mut(state.mounted_root()?, parent)?;
        match children.get_mut(name) {
            Some(Node::Dir(_)) => return Err(LfsError::ISDIR),
            Some(Node::File(data)) => {
                if flags.contains(LfsOpenFlags::CREAT | LfsOpenFlags::EXCL) {
                    return Err(LfsError::EXIST);
                }
                if flags.contains(LfsOpenFlags::TRUNC) {
                    data.clear();
                }
            }
            None => {
                if !flags.contains(LfsOpenFlags::CREAT) {
                    return Err(LfsError::NOENT);
                }
                children.insert(name.clone(), Node::File(Vec::new()));
            }
        }
        let id = state.alloc_id();
        state.files.insert(id, OpenFile { path, pos: 0, flags });
        Ok(id)
    }

    fn file_close(&mut self, file: LfsFileId) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        state.files.remove(&file).map(|_| ()).ok_or(LfsError::BADF)
    }

    fn file_read(&mut self, file: LfsFileId, buf: &mut [u8]) -> Result<usize, LfsError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let open = state.files.get_mut(&file).ok_or(LfsError::BADF)?;
        if !open.flags.contains(LfsOpenFlags::RDONLY) {
            return Err(LfsError::BADF);
        }
        let root = state.root.as_ref().ok_or(LfsError::CORRUPT)?;
        let data = file_data(root, &open.path)?;
        let start = (open.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        open.pos = (start + n) as u64;
        Ok(n)
    }

    fn file_write(&mut self, file: LfsFileId, data: &[u8]) -> Result<usize, LfsError> {
        let block_size = u64::from(self.block_size);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let open = state.files.get_mut(&file).ok_or(LfsError::BADF)?;
        if !open.flags.contains(LfsOpenFlags::WRONLY) {
            return Err(LfsError::BADF);
        }
        let root = state.root.as_mut().ok_or(LfsError::CORRUPT)?;
        let used = root.blocks(block_size);
        let contents = match node_mut(root, &open.path)? {
            Node::File(contents) => contents,
            Node::Dir(_) => return Err(LfsError::ISDIR),
        };
        if open.flags.contains(LfsOpenFlags::APPEND) {
            open.pos = contents.len() as u64;
        }
        let start = open.pos as usize;
        let end = start + data.len();
        let old_blocks = (contents.len() as u64).div_ceil(block_size);
        let new_blocks = (end.max(contents.len()) as u64).div_ceil(block_size);
        if used - old_blocks + new_blocks > self.block_count {
            return Err(LfsError::NOSPC);
        }
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(data);
        open.pos = end as u64;
        Ok(data.len())
    }

    fn file_seek(
        &mut self,
        file: LfsFileId,
        offset: i64,
        whence: LfsWhence,
    ) -> Result<u64, LfsError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let open = state.files.get_mut(&file).ok_or(LfsError::BADF)?;
        let base = match whence {
            LfsWhence::Set => 0,
            LfsWhence::Cur => open.pos as i64,
            LfsWhence::End => {
                let root = state.root.as_ref().ok_or(LfsError::CORRUPT)?;
                file_data(root, &open.path)?.len() as i64
            }
        };
        let target = base
            .checked_add(offset)
            .filter(|pos| *pos >= 0)
            .ok_or(LfsError::INVAL)?;
        open.pos = target as u64;
        Ok(open.pos)
    }

    fn file_tell(&mut self, file: LfsFileId) -> Result<u64, LfsError> {
        let state = self.state.lock();
        state
            .files
            .get(&file)
            .map(|open| open.pos)
            .ok_or(LfsError::BADF)
    }

    fn file_size(&mut self, file: LfsFileId) -> Result<u64, LfsError> {
        let state = self.state.lock();
        let open = state.files.get(&file).ok_or(LfsError::BADF)?;
        let root = state.root.as_ref().ok_or(LfsError::CORRUPT)?;
        Ok(file_data(root, &open.path)?.len() as u64)
    }

    fn file_sync(&mut self, file: LfsFileId) -> Result<(), LfsError> {
        let state = self.state.lock();
        if state.files.contains_key(&file) {
            Ok(())
        } else {
            Err(LfsError::BADF)
        }
    }

    fn dir_open(&mut self, path: &str) -> Result<LfsDirId, LfsError> {
        let path = components(path)?;
        let mut state = self.state.lock();
        let children = match node(state.mounted_root()?, &path)? {
            Node::Dir(children) => children,
            Node::File(_) => return Err(LfsError::NOTDIR),
        };
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
        entries.extend(children.iter().map(|(name, child)| child.info(name)));
        let id = state.alloc_id();
        state.dirs.insert(id, OpenDir { entries, pos: 0 });
        Ok(id)
    }

    fn dir_read(&mut self, dir: LfsDirId) -> Result<Option<LfsInfo>, LfsError> {
        let mut state = self.state.lock();
        let open = state.dirs.get_mut(&dir).ok_or(LfsError::BADF)?;
        let entry = open.entries.get(open.pos).cloned();
        if entry.is_some() {
            open.pos += 1;
        }
        Ok(entry)
    }

    fn dir_rewind(&mut self, dir: LfsDirId) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        let open = state.dirs.get_mut(&dir).ok_or(LfsError::BADF)?;
        open.pos = 0;
        Ok(())
    }

    fn dir_close(&mut self, dir: LfsDirId) -> Result<(), LfsError> {
        let mut state = self.state.lock();
        state.dirs.remove(&dir).map(|_| ()).ok_or(LfsError::BADF)
    }

    fn stat(&mut self, path: &str) -> Result<LfsInfo, LfsError> {
        let path = components(path)?;
        let mut state = self.state.lock();
        let target = node(state.mounted_root()?, &path)?;
        Ok(target.info(path.last().map_or("/", String::as_str)))
    }

    fn remove(&mut self, path: &str) -> Result<(), LfsError> {
        let path = components(path)?;
        let (name, parent) = path.split_last().ok_or(LfsError::INVAL)?;
        let mut state = self.state.lock();
        let children = children_mut(state.mounted_root()?, parent)?;
        match children.get(name) {
            None => return Err(LfsError::NOENT),
            Some(Node::Dir(grandchildren)) if !grandchildren.is_empty() => {
                return Err(LfsError::NOTEMPTY);
            }
            Some(_) => {}
        }
        children.remove(name);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), LfsError> {
        let from = components(from)?;
        let to = components(to)?;
        let (from_name, from_parent) = from.split_last().ok_or(LfsError::INVAL)?;
        let (to_name, to_parent) = to.split_last().ok_or(LfsError::INVAL)?;
        if to.len() > from.len() && to.starts_with(&from) {
            return Err(LfsError::INVAL);
        }
        let mut state = self.state.lock();
        let root = state.mounted_root()?;
        let source_is_dir = matches!(node(root, &from)?, Node::Dir(_));
        if from == to {
            return Ok(());
        }
        match node(root, &to) {
            Ok(Node::Dir(children)) => {
                if !source_is_dir {
                    return Err(LfsError::ISDIR);
                }
                if !children.is_empty() {
                    return Err(LfsError::NOTEMPTY);
                }
            }
            Ok(Node::File(_)) if source_is_dir => return Err(LfsError::NOTDIR),
            Ok(Node::File(_)) => {}
            Err(LfsError::NOENT) => {
                if let Node::File(_) = node(root, to_parent)? {
                    return Err(LfsError::NOTDIR);
                }
            }
            Err(e) => return Err(e),
        }
        let moved = children_mut(root, from_parent)?
            .remove(from_name)
            .ok_or(LfsError::NOENT)?;
        children_mut(root, to_parent)?.insert(to_name.clone(), moved);
        Ok(())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), LfsError> {
        let block_size = u64::from(self.block_size);
        let path = components(path)?;
        let (name, parent) = path.split_last().ok_or(LfsError::EXIST)?;
        let mut state = self.state.lock();
        let root = state.mounted_root()?;
        let used = root.blocks(block_size);
        let children = children_mut(root, parent)?;
        if children.contains_key(name) {
            return Err(LfsError::EXIST);
        }
        if used + DIR_BLOCKS > self.block_count {
            return Err(LfsError::NOSPC);
        }
        children.insert(name.clone(), Node::Dir(BTreeMap::new()));
        Ok(())
    }

    fn fs_size(&mut self) -> Result<u64, LfsError> {
        let block_size = u64::from(self.block_size);
        let mut state = self.state.lock();
        Ok(state.mounted_root()?.blocks(block_size))
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }
}
