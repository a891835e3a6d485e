//! SpikeFS (C12): whole-image dump/restore of the VFS over the ATA PIO
//! block device.
//!
//! Layout: one header sector (magic, inode count, and per-inode directory
//! lengths live in the variable region that follows), then the flattened
//! inode records serialized back to back. No journaling, no checksum
//! beyond the header magic.

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{SECTOR_SIZE, SPIKEFS_HEADER_SECTORS, SPIKEFS_MAGIC};
use crate::drivers::storage;
use crate::error::{FsError, KernelError, KernelResult};
use crate::vfs::inode::InodeType;
use crate::vfs::{self, InodeSnapshot};

const MAX_IMAGE_SECTORS: u32 = 2048; // 1 MiB image cap at hobby scale

#[repr(C)]
struct Header {
    magic: u32,
    inode_count: u32,
    payload_len: u32,
}

const HEADER_SIZE: usize = core::mem::size_of::<Header>();

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

/// Serialize every inode as: `ty(1) link_count(4) kind_len(4) kind_bytes`.
/// Files store raw bytes; directories store `(name_len(1) name_bytes
/// inode(4))*`.
fn serialize(records: &[InodeSnapshot]) -> Vec<u8> {
    let mut out = Vec::new();
    for r in records {
        out.push(match r.ty {
            InodeType::Free => 0u8,
            InodeType::File => 1,
            InodeType::Dir => 2,
        });
        put_u32(&mut out, r.link_count);
        match r.ty {
            InodeType::File => {
                put_u32(&mut out, r.file_data.len() as u32);
                out.extend_from_slice(&r.file_data);
            }
            InodeType::Dir => {
                put_u32(&mut out, r.dir_entries.len() as u32);
                for (name, ino) in &r.dir_entries {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    put_u32(&mut out, *ino);
                }
            }
            InodeType::Free => put_u32(&mut out, 0),
        }
    }
    out
}

fn deserialize(buf: &[u8], inode_count: u32) -> KernelResult<Vec<InodeSnapshot>> {
    let mut records = Vec::with_capacity(inode_count as usize);
    let mut off = 0usize;
    for _ in 0..inode_count {
        let ty_byte = *buf.get(off).ok_or(FsError::InvalidPath)?;
        off += 1;
        let link_count = get_u32(buf, off);
        off += 4;
        match ty_byte {
            0 => {
                let _ = get_u32(buf, off);
                off += 4;
                records.push(InodeSnapshot {
                    ty: InodeType::Free,
                    link_count,
                    file_data: Vec::new(),
                    dir_entries: Vec::new(),
                });
            }
            1 => {
                let len = get_u32(buf, off) as usize;
                off += 4;
                let data = buf[off..off + len].to_vec();
                off += len;
                records.push(InodeSnapshot {
                    ty: InodeType::File,
                    link_count,
                    file_data: data,
                    dir_entries: Vec::new(),
                });
            }
            2 => {
                let count = get_u32(buf, off);
                off += 4;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name_len = buf[off] as usize;
                    off += 1;
                    let name = String::from_utf8_lossy(&buf[off..off + name_len]).into_owned();
                    off += name_len;
                    let ino = get_u32(buf, off);
                    off += 4;
                    entries.push((name, ino));
                }
                records.push(InodeSnapshot {
                    ty: InodeType::Dir,
                    link_count,
                    file_data: Vec::new(),
                    dir_entries: entries,
                });
            }
            _ => return Err(FsError::InvalidPath.into()),
        }
    }
    Ok(records)
}

/// Dump the current VFS state to the primary ATA master. Clears the VFS
/// dirty flag on success.
pub fn dump() -> KernelResult<()> {
    let records = vfs::snapshot();
    let payload = serialize(&records);

    let mut header_sector = [0u8; SECTOR_SIZE];
    let header = Header {
        magic: SPIKEFS_MAGIC,
        inode_count: records.len() as u32,
        payload_len: payload.len() as u32,
    };
    header_sector[0..4].copy_from_slice(&header.magic.to_le_bytes());
    header_sector[4..8].copy_from_slice(&header.inode_count.to_le_bytes());
    header_sector[8..12].copy_from_slice(&header.payload_len.to_le_bytes());
    storage::write_sectors(0, SPIKEFS_HEADER_SECTORS as u8, &header_sector)?;

    let sectors_needed = (payload.len() + SECTOR_SIZE - 1) / SECTOR_SIZE;
    if sectors_needed as u32 + SPIKEFS_HEADER_SECTORS > MAX_IMAGE_SECTORS {
        return Err(KernelError::ResourceExhausted { resource: "spikefs image" });
    }
    let mut lba = SPIKEFS_HEADER_SECTORS;
    let mut off = 0usize;
    while off < payload.len() {
        let mut sector = [0u8; SECTOR_SIZE];
        let n = (payload.len() - off).min(SECTOR_SIZE);
        sector[..n].copy_from_slice(&payload[off..off + n]);
        storage::write_sectors(lba, 1, &sector)?;
        lba += 1;
        off += n;
    }
    storage::flush()?;
    vfs::clear_dirty();
    Ok(())
}

/// Load a previously dumped image, replacing the in-memory VFS. Fails with
/// `InvalidPath` if the header magic does not match (no partially-valid
/// image is installed).
pub fn load() -> KernelResult<()> {
    let mut header_sector = [0u8; SECTOR_SIZE];
    storage::read_sectors(0, SPIKEFS_HEADER_SECTORS as u8, &mut header_sector)?;
    let magic = get_u32(&header_sector, 0);
    if magic != SPIKEFS_MAGIC {
        return Err(FsError::InvalidPath.into());
    }
    let inode_count = get_u32(&header_sector, 4);
    let payload_len = get_u32(&header_sector, 8) as usize;

    let sectors_needed = (payload_len + SECTOR_SIZE - 1) / SECTOR_SIZE;
    let mut payload = Vec::with_capacity(sectors_needed * SECTOR_SIZE);
    let mut lba = SPIKEFS_HEADER_SECTORS;
    for _ in 0..sectors_needed {
        let mut sector = [0u8; SECTOR_SIZE];
        storage::read_sectors(lba, 1, &mut sector)?;
        payload.extend_from_slice(&sector);
        lba += 1;
    }
    payload.truncate(payload_len);

    let records = deserialize(&payload, inode_count)?;
    vfs::restore(records);
    Ok(())
}

/// Called by the idle loop: sync to disk only when the VFS has pending
/// mutations.
pub fn sync_if_dirty() {
    if vfs::is_dirty() {
        let _ = dump();
    }
}
