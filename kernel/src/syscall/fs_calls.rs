//! open/close/seek/read/write/getcwd/chdir/mkdir/unlink/pipe/dup syscalls.

use crate::error::{FsError, KernelResult};
use crate::fd;
use crate::process::table::PROCESS_TABLE;
use crate::vfs;

pub const O_CREAT: u32 = 1 << 0;

pub fn sys_write(index: usize, fd: i32, buf: usize, len: usize) -> KernelResult<i32> {
    let mut local = alloc::vec![0u8; len];
    super::copy_from_user(buf, &mut local)?;
    Ok(fd::write(index, fd, &local)? as i32)
}

pub fn sys_read(index: usize, fd: i32, buf: usize, len: usize) -> KernelResult<i32> {
    let mut local = alloc::vec![0u8; len];
    let n = fd::read(index, fd, &mut local)?;
    super::copy_to_user(buf, &local[..n])?;
    Ok(n as i32)
}

pub fn sys_open(index: usize, path_ptr: usize, flags: u32) -> KernelResult<i32> {
    let path = super::read_user_cstr(path_ptr)?;
    let cwd = PROCESS_TABLE.lock().slots[index].cwd_inode;
    let inode = match vfs::resolve(&path, cwd) {
        Ok(ino) => ino,
        Err(_) if flags & O_CREAT != 0 => vfs::create_file(&path, cwd)?,
        Err(e) => return Err(e),
    };
    fd::open_file(index, inode)
}

pub fn sys_close(index: usize, fd: i32) -> KernelResult<i32> {
    fd::close(index, fd)?;
    Ok(0)
}

pub fn sys_seek(index: usize, fd: i32, offset: usize) -> KernelResult<i32> {
    fd::seek(index, fd, offset)?;
    Ok(0)
}

pub fn sys_getcwd(index: usize, buf: usize, len: usize) -> KernelResult<i32> {
    let cwd = PROCESS_TABLE.lock().slots[index].cwd_inode;
    let path = path_of(cwd)?;
    if path.len() + 1 > len {
        return Err(FsError::NameTooLong.into());
    }
    let mut out = alloc::vec![0u8; path.len() + 1];
    out[..path.len()].copy_from_slice(path.as_bytes());
    super::copy_to_user(buf, &out)?;
    Ok(path.len() as i32)
}

/// Reconstruct an absolute path for `ino` by walking `..` to the root.
/// Hobby-scale: O(depth) lookups, no caching.
fn path_of(mut ino: u32) -> KernelResult<alloc::string::String> {
    use alloc::string::String;
    use alloc::vec::Vec;

    if ino == vfs::ROOT_INODE {
        return Ok(String::from("/"));
    }
    let mut components = Vec::new();
    loop {
        let parent = vfs::resolve("..", ino)?;
        let entries = vfs::snapshot();
        let name = entries[parent as usize]
            .dir_entries
            .iter()
            .find(|(_, target)| *target == ino)
            .map(|(name, _)| name.clone())
            .ok_or(FsError::NotFound)?;
        components.push(name);
        if parent == vfs::ROOT_INODE {
            break;
        }
        ino = parent;
    }
    components.reverse();
    Ok(alloc::format!("/{}", components.join("/")))
}

pub fn sys_chdir(index: usize, path_ptr: usize) -> KernelResult<i32> {
    let path = super::read_user_cstr(path_ptr)?;
    let cwd = PROCESS_TABLE.lock().slots[index].cwd_inode;
    let target = vfs::resolve(&path, cwd)?;
    PROCESS_TABLE.lock().slots[index].cwd_inode = target;
    Ok(0)
}

pub fn sys_mkdir(index: usize, path_ptr: usize) -> KernelResult<i32> {
    let path = super::read_user_cstr(path_ptr)?;
    let cwd = PROCESS_TABLE.lock().slots[index].cwd_inode;
    vfs::mkdir(&path, cwd)?;
    Ok(0)
}

pub fn sys_unlink(index: usize, path_ptr: usize) -> KernelResult<i32> {
    let path = super::read_user_cstr(path_ptr)?;
    let cwd = PROCESS_TABLE.lock().slots[index].cwd_inode;
    vfs::unlink(&path, cwd)?;
    Ok(0)
}

pub fn sys_pipe(index: usize, out_ptr: usize) -> KernelResult<i32> {
    let id = crate::pipe::create()?;
    let (read_fd, write_fd) = fd::install_pipe(index, id)?;
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(&read_fd.to_le_bytes());
    out[4..8].copy_from_slice(&write_fd.to_le_bytes());
    super::copy_to_user(out_ptr, &out)?;
    Ok(0)
}

pub fn sys_dup(index: usize, fd: i32) -> KernelResult<i32> {
    fd::dup(index, fd)
}
