//! socket/bind/sendto/recvfrom/closesock and gpu_* adapters.
//!
//! The UDP socket stack and the VirtIO-GPU collaborator these would
//! forward to are both out of scope for this kernel core; every call here
//! resolves to `ENOSYS` so user programs get a stable, documented error
//! instead of an undefined syscall number.

use crate::error::{KernelResult, SyscallError};

pub fn sys_socket_family(nr: u32) -> KernelResult<i32> {
    Err(SyscallError::InvalidSyscall { nr }.into())
}

pub fn sys_gpu() -> KernelResult<i32> {
    Err(SyscallError::InvalidSyscall { nr: super::SYS_GPU }.into())
}
