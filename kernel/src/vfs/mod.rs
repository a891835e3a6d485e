//! In-memory VFS (C11): a growable inode table plus directory entries,
//! path resolution, and a dirty flag SpikeFS syncs against.

pub mod inode;

use alloc::string::String;
use alloc::vec::Vec;

use spin::Mutex;

use crate::config::{INITIAL_INODE_CAPACITY, MAX_INODES};
use crate::error::{FsError, KernelResult};
use inode::{DirEntry, Inode, InodeType, Payload};

pub const ROOT_INODE: u32 = 0;

struct Vfs {
    inodes: Vec<Inode>,
    dirty: bool,
}

impl Vfs {
    fn new() -> Self {
        let mut inodes = Vec::with_capacity(INITIAL_INODE_CAPACITY);
        inodes.push(Inode::new_dir());
        while inodes.len() < INITIAL_INODE_CAPACITY {
            inodes.push(Inode::free());
        }
        let mut vfs = Self { inodes, dirty: false };
        vfs.inode_mut(ROOT_INODE).dir_insert(".", ROOT_INODE).unwrap();
        vfs.inode_mut(ROOT_INODE).dir_insert("..", ROOT_INODE).unwrap();
        vfs
    }

    fn inode(&self, ino: u32) -> &Inode {
        &self.inodes[ino as usize]
    }

    fn inode_mut(&mut self, ino: u32) -> &mut Inode {
        &mut self.inodes[ino as usize]
    }

    /// Grow the table by doubling, capped at `MAX_INODES`.
    fn grow(&mut self) -> KernelResult<()> {
        let new_cap = (self.inodes.len() * 2).min(MAX_INODES);
        if new_cap <= self.inodes.len() {
            return Err(FsError::InodeTableFull.into());
        }
        self.inodes.resize_with(new_cap, Inode::free);
        Ok(())
    }

    fn alloc_inode(&mut self) -> KernelResult<u32> {
        if let Some(pos) = self.inodes.iter().position(|i| i.ty == InodeType::Free) {
            return Ok(pos as u32);
        }
        self.grow()?;
        let pos = self
            .inodes
            .iter()
            .position(|i| i.ty == InodeType::Free)
            .ok_or(FsError::InodeTableFull)?;
        Ok(pos as u32)
    }
}

static VFS: Mutex<Option<Vfs>> = Mutex::new(None);

pub fn vfs_init() {
    *VFS.lock() = Some(Vfs::new());
}

fn mark_dirty() {
    if let Some(vfs) = VFS.lock().as_mut() {
        vfs.dirty = true;
    }
}

pub fn is_dirty() -> bool {
    VFS.lock().as_ref().map(|v| v.dirty).unwrap_or(false)
}

pub fn clear_dirty() {
    if let Some(vfs) = VFS.lock().as_mut() {
        vfs.dirty = false;
    }
}

/// Tokenize and resolve `path` starting from `cwd` (used for relative
/// paths); absolute paths always start at the root. Returns the inode the
/// full path names.
pub fn resolve(path: &str, cwd: u32) -> KernelResult<u32> {
    let (parent, leaf) = resolve_split(path, cwd)?;
    match leaf {
        None => Ok(parent),
        Some(name) => {
            let vfs = VFS.lock();
            let vfs = vfs.as_ref().ok_or(FsError::NotFound)?;
            vfs.inode(parent).lookup(&name)?.ok_or(FsError::NotFound.into())
        }
    }
}

/// Resolve every component but the last, returning `(parent_inode,
/// Some(leaf_name))` for use by create/rename/unlink. A trailing empty
/// leaf (path ends in `/`, or is exactly `/`) yields `(inode, None)`.
pub fn resolve_split(path: &str, cwd: u32) -> KernelResult<(u32, Option<String>)> {
    if path.is_empty() {
        return Err(FsError::InvalidPath.into());
    }
    let mut current = if path.starts_with('/') { ROOT_INODE } else { cwd };
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if components.is_empty() {
        return Ok((ROOT_INODE, None));
    }

    let (dirs, leaf) = components.split_at(components.len() - 1);
    for component in dirs {
        let vfs = VFS.lock();
        let vfs = vfs.as_ref().ok_or(FsError::NotFound)?;
        let inode = vfs.inode(current);
        if inode.ty != InodeType::Dir {
            return Err(FsError::NotADirectory.into());
        }
        current = inode.lookup(component)?.ok_or(FsError::NotFound)?;
    }
    Ok((current, Some(String::from(leaf[0]))))
}

pub fn create_file(path: &str, cwd: u32) -> KernelResult<u32> {
    let (parent, leaf) = resolve_split(path, cwd)?;
    let name = leaf.ok_or(FsError::InvalidPath)?;
    let mut vfs = VFS.lock();
    let vfs = vfs.as_mut().ok_or(FsError::NotFound)?;
    if vfs.inode(parent).lookup(&name)?.is_some() {
        return Err(FsError::AlreadyExists.into());
    }
    let ino = vfs.alloc_inode()?;
    vfs.inodes[ino as usize] = Inode::new_file();
    vfs.inode_mut(parent).dir_insert(&name, ino)?;
    drop(vfs);
    mark_dirty();
    Ok(ino)
}

pub fn mkdir(path: &str, cwd: u32) -> KernelResult<u32> {
    let (parent, leaf) = resolve_split(path, cwd)?;
    let name = leaf.ok_or(FsError::InvalidPath)?;
    let mut vfs = VFS.lock();
    let vfs = vfs.as_mut().ok_or(FsError::NotFound)?;
    if vfs.inode(parent).lookup(&name)?.is_some() {
        return Err(FsError::AlreadyExists.into());
    }
    let ino = vfs.alloc_inode()?;
    vfs.inodes[ino as usize] = Inode::new_dir();
    vfs.inode_mut(ino).dir_insert(".", ino)?;
    vfs.inode_mut(ino).dir_insert("..", parent)?;
    vfs.inode_mut(parent).dir_insert(&name, ino)?;
    vfs.inode_mut(parent).link_count += 1;
    drop(vfs);
    mark_dirty();
    Ok(ino)
}

/// Remove `path`'s directory entry, decrementing the target's link_count
/// and freeing the inode at zero (root is never freed). Non-empty
/// directories (more than `.`/`..`) are rejected.
pub fn unlink(path: &str, cwd: u32) -> KernelResult<()> {
    let (parent, leaf) = resolve_split(path, cwd)?;
    let name = leaf.ok_or(FsError::InvalidPath)?;
    let mut vfs = VFS.lock();
    let vfs = vfs.as_mut().ok_or(FsError::NotFound)?;

    let target = vfs.inode(parent).lookup(&name)?.ok_or(FsError::NotFound)?;
    if vfs.inode(target).ty == InodeType::Dir && vfs.inode(target).dir_entries()?.len() > 2 {
        return Err(FsError::DirectoryNotEmpty.into());
    }

    vfs.inode_mut(parent).dir_remove(&name)?;
    vfs.inode_mut(target).link_count -= 1;
    if vfs.inode(target).link_count == 0 && target != ROOT_INODE {
        vfs.inodes[target as usize] = Inode::free();
    }
    drop(vfs);
    mark_dirty();
    Ok(())
}

pub fn read(ino: u32, offset: usize, buf: &mut [u8]) -> KernelResult<usize> {
    let vfs = VFS.lock();
    let vfs = vfs.as_ref().ok_or(FsError::NotFound)?;
    vfs.inode(ino).read(offset, buf)
}

pub fn write(ino: u32, offset: usize, buf: &[u8]) -> KernelResult<usize> {
    let mut vfs = VFS.lock();
    let vfs = vfs.as_mut().ok_or(FsError::NotFound)?;
    let n = vfs.inode_mut(ino).write(offset, buf)?;
    drop(vfs);
    mark_dirty();
    Ok(n)
}

pub fn size(ino: u32) -> KernelResult<usize> {
    let vfs = VFS.lock();
    let vfs = vfs.as_ref().ok_or(FsError::NotFound)?;
    Ok(vfs.inode(ino).size())
}

/// A flattened description of one inode, used only to cross the
/// VFS/SpikeFS boundary without leaking [`Inode`]'s internals.
pub struct InodeSnapshot {
    pub ty: InodeType,
    pub link_count: u32,
    pub file_data: Vec<u8>,
    pub dir_entries: Vec<(String, u32)>,
}

/// Flatten the whole table for [`crate::spikefs::dump`].
pub fn snapshot() -> Vec<InodeSnapshot> {
    let vfs = VFS.lock();
    let vfs = match vfs.as_ref() {
        Some(v) => v,
        None => return Vec::new(),
    };
    vfs.inodes
        .iter()
        .map(|inode| match &inode.payload {
            Payload::File(data) => InodeSnapshot {
                ty: inode.ty,
                link_count: inode.link_count,
                file_data: data.clone(),
                dir_entries: Vec::new(),
            },
            Payload::Dir(entries) => InodeSnapshot {
                ty: inode.ty,
                link_count: inode.link_count,
                file_data: Vec::new(),
                dir_entries: entries.iter().map(|e: &DirEntry| (String::from(e.name()), e.inode)).collect(),
            },
            Payload::None => InodeSnapshot {
                ty: inode.ty,
                link_count: inode.link_count,
                file_data: Vec::new(),
                dir_entries: Vec::new(),
            },
        })
        .collect()
}

/// Rebuild the table from a [`snapshot`] previously produced (used only by
/// [`crate::spikefs::load`]).
pub fn restore(records: Vec<InodeSnapshot>) {
    let mut inodes = Vec::with_capacity(records.len());
    for record in records {
        let payload = match record.ty {
            InodeType::Free => Payload::None,
            InodeType::File => Payload::File(record.file_data),
            InodeType::Dir => {
                let mut entries = Vec::with_capacity(record.dir_entries.len());
                for (name, ino) in record.dir_entries {
                    if let Ok(entry) = DirEntry::new(&name, ino) {
                        entries.push(entry);
                    }
                }
                Payload::Dir(entries)
            }
        };
        inodes.push(Inode { ty: record.ty, link_count: record.link_count, payload });
    }
    *VFS.lock() = Some(Vfs { inodes, dirty: false });
}
