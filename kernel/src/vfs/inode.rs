//! Inode representation (C11): a tagged FREE/FILE/DIR record whose payload
//! is either a growable byte buffer or a growable directory-entry array.

use alloc::vec::Vec;

use crate::config::INITIAL_DIRENT_CAPACITY;
use crate::error::{FsError, KernelResult};

pub const MAX_NAME_LEN: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Free,
    File,
    Dir,
}

#[derive(Clone)]
pub struct DirEntry {
    pub name: [u8; MAX_NAME_LEN],
    pub name_len: u8,
    pub inode: u32,
}

impl DirEntry {
    pub fn new(name: &str, inode: u32) -> KernelResult<Self> {
        if name.len() > MAX_NAME_LEN {
            return Err(FsError::NameTooLong.into());
        }
        let mut buf = [0u8; MAX_NAME_LEN];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self { name: buf, name_len: name.len() as u8, inode })
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }
}

pub enum Payload {
    None,
    File(Vec<u8>),
    Dir(Vec<DirEntry>),
}

pub struct Inode {
    pub ty: InodeType,
    pub link_count: u32,
    pub payload: Payload,
}

impl Inode {
    pub const fn free() -> Self {
        Self { ty: InodeType::Free, link_count: 0, payload: Payload::None }
    }

    pub fn new_file() -> Self {
        Self { ty: InodeType::File, link_count: 1, payload: Payload::File(Vec::new()) }
    }

    pub fn new_dir() -> Self {
        Self {
            ty: InodeType::Dir,
            link_count: 1,
            payload: Payload::Dir(Vec::with_capacity(INITIAL_DIRENT_CAPACITY)),
        }
    }

    pub fn size(&self) -> usize {
        match &self.payload {
            Payload::File(data) => data.len(),
            Payload::Dir(entries) => entries.len(),
            Payload::None => 0,
        }
    }

    pub fn dir_entries(&self) -> KernelResult<&[DirEntry]> {
        match &self.payload {
            Payload::Dir(entries) => Ok(entries),
            _ => Err(FsError::NotADirectory.into()),
        }
    }

    pub fn lookup(&self, name: &str) -> KernelResult<Option<u32>> {
        Ok(self.dir_entries()?.iter().find(|e| e.name() == name).map(|e| e.inode))
    }

    /// Insert a new directory entry. Doubling growth is implicit in `Vec`.
    pub fn dir_insert(&mut self, name: &str, inode: u32) -> KernelResult<()> {
        match &mut self.payload {
            Payload::Dir(entries) => {
                entries.push(DirEntry::new(name, inode)?);
                Ok(())
            }
            _ => Err(FsError::NotADirectory.into()),
        }
    }

    /// Remove a directory entry by name via O(1) swap-with-last. Returns
    /// the removed entry's target inode.
    pub fn dir_remove(&mut self, name: &str) -> KernelResult<u32> {
        match &mut self.payload {
            Payload::Dir(entries) => {
                let pos = entries
                    .iter()
                    .position(|e| e.name() == name)
                    .ok_or(FsError::NotFound)?;
                let target = entries[pos].inode;
                entries.swap_remove(pos);
                Ok(target)
            }
            _ => Err(FsError::NotADirectory.into()),
        }
    }

    pub fn read(&self, offset: usize, buf: &mut [u8]) -> KernelResult<usize> {
        match &self.payload {
            Payload::File(data) => {
                if offset >= data.len() {
                    return Ok(0);
                }
                let n = buf.len().min(data.len() - offset);
                buf[..n].copy_from_slice(&data[offset..offset + n]);
                Ok(n)
            }
            _ => Err(FsError::NotAFile.into()),
        }
    }

    pub fn write(&mut self, offset: usize, buf: &[u8]) -> KernelResult<usize> {
        match &mut self.payload {
            Payload::File(data) => {
                let end = offset + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset..end].copy_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(FsError::NotAFile.into()),
        }
    }
}
