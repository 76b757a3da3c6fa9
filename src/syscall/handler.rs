//! System Call Handler
//!
//! Dispatches system calls and implements individual syscall handlers.
//!
//! # Security Considerations
//! - The request number is itself read through the validator
//! - Unknown requests kill the caller
//! - Every buffer is validated over its full length before the handler
//!   touches the file system
//! - User data crosses into the kernel through a bounded bounce buffer

use alloc::string::String;
use alloc::vec;

use log::{debug, info, trace, warn};

use super::frame::{CallFrame, TrapFrame};
use super::request::Request;
use crate::config::{CONSOLE_CHUNK, EXIT_FAILURE, MAX_USER_STRING, STDIN_FILENO, STDOUT_FILENO};
use crate::error::SyscallError;
use crate::mm::{
    copy_user_string, validate_user_read, validate_user_write, UserMemory, VirtAddr, PAGE_SIZE,
};
use crate::process::{Pid, Process, System};

/// Value written to the return slot for an ordinary failure.
const FAILURE: u32 = -1i32 as u32;

/// What the trap layer must do once a request has been served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to user mode.
    Resume,
    /// The process has run its exit path; switch away and never return.
    Terminated(i32),
    /// Shut the machine down.
    PowerOff,
}

/// Result of a handler that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Return(u32),
    NoResult,
    Exit(i32),
    Halt,
}

/// Dispatch one system call
///
/// # Arguments
/// * `tf` - Saved user registers; the result goes to `tf.eax`
/// * `proc` - The calling process
/// * `mem` - The calling process's address space
/// * `sys` - Kernel services
///
/// # Security
/// - Fatal errors run the exit path with status -1 and stop the request
/// - Ordinary errors write -1 to the return slot
pub fn dispatch(
    tf: &mut TrapFrame,
    proc: &mut Process,
    mem: &mut dyn UserMemory,
    sys: &System<'_>,
) -> Disposition {
    let request = Request::decode(&mut CallFrame::new(&*mem, tf.stack_pointer()));
    let outcome = request.and_then(|request| {
        trace!("[SYSCALL] {} {} {:?}", proc.pid(), request.name(), request);
        serve(request, proc, mem, sys)
    });

    match outcome {
        Ok(Outcome::Return(value)) => {
            tf.eax = value;
            Disposition::Resume
        }
        Ok(Outcome::NoResult) => Disposition::Resume,
        Ok(Outcome::Exit(status)) => {
            proc.exit(status, sys);
            Disposition::Terminated(status)
        }
        Ok(Outcome::Halt) => Disposition::PowerOff,
        Err(e) if e.is_fatal() => {
            warn!("[SYSCALL] killing {} ({}): {}", proc.name(), proc.pid(), e);
            proc.exit(EXIT_FAILURE, sys);
            Disposition::Terminated(EXIT_FAILURE)
        }
        Err(e) => {
            debug!("[SYSCALL] {} failed: {}", proc.pid(), e);
            tf.eax = FAILURE;
            Disposition::Resume
        }
    }
}

fn serve(
    request: Request,
    proc: &mut Process,
    mem: &mut dyn UserMemory,
    sys: &System<'_>,
) -> Result<Outcome, SyscallError> {
    match request {
        Request::Halt => sys_halt(proc),
        Request::Exit { status } => Ok(Outcome::Exit(status)),
        Request::Exec { cmdline } => sys_exec(proc, &*mem, sys, cmdline),
        Request::Wait { pid } => sys_wait(proc, sys, pid),
        Request::Create { name, initial_size } => sys_create(&*mem, sys, name, initial_size),
        Request::Remove { name } => sys_remove(&*mem, sys, name),
        Request::Open { name } => sys_open(proc, &*mem, sys, name),
        Request::Filesize { fd } => sys_filesize(proc, fd),
        Request::Read { fd, buf, len } => sys_read(proc, mem, sys, fd, buf, len),
        Request::Write { fd, buf, len } => sys_write(proc, &*mem, sys, fd, buf, len),
        Request::Seek { fd, pos } => sys_seek(proc, fd, pos),
        Request::Tell { fd } => sys_tell(proc, fd),
        Request::Close { fd } => sys_close(proc, fd),
    }
}

fn sys_halt(proc: &Process) -> Result<Outcome, SyscallError> {
    info!("[SYSCALL] halt requested by {} ({})", proc.name(), proc.pid());
    Ok(Outcome::Halt)
}

/// Copy a file name or command line. A bad pointer is fatal; a name that
/// isn't UTF-8 is returned as `None` and fails like a missing file.
fn user_str(mem: &dyn UserMemory, addr: VirtAddr) -> Result<Option<String>, SyscallError> {
    let bytes = copy_user_string(mem, addr, MAX_USER_STRING)?;
    Ok(String::from_utf8(bytes).ok())
}

fn sys_exec(
    proc: &Process,
    mem: &dyn UserMemory,
    sys: &System<'_>,
    cmdline: VirtAddr,
) -> Result<Outcome, SyscallError> {
    let cmdline = match user_str(mem, cmdline)? {
        Some(cmdline) => cmdline,
        None => return Err(SyscallError::SpawnFailed),
    };

    let child = sys
        .registry
        .start_child(proc.pid(), || sys.scheduler.start_process(&cmdline))?;
    debug!("[SYSCALL] exec {:?} -> {}", cmdline, child);
    Ok(Outcome::Return(child.as_u32()))
}

fn sys_wait(proc: &Process, sys: &System<'_>, pid: i32) -> Result<Outcome, SyscallError> {
    if pid < 0 {
        return Err(SyscallError::BadWaitTarget);
    }
    let status = sys
        .registry
        .wait(proc.pid(), Pid::new(pid as u32), sys.scheduler)?;
    Ok(Outcome::Return(status as u32))
}

fn sys_create(
    mem: &dyn UserMemory,
    sys: &System<'_>,
    name: VirtAddr,
    initial_size: u32,
) -> Result<Outcome, SyscallError> {
    let created = match user_str(mem, name)? {
        Some(name) => sys.fs.create(&name, initial_size),
        None => false,
    };
    Ok(Outcome::Return(created as u32))
}

fn sys_remove(
    mem: &dyn UserMemory,
    sys: &System<'_>,
    name: VirtAddr,
) -> Result<Outcome, SyscallError> {
    let removed = match user_str(mem, name)? {
        Some(name) => sys.fs.remove(&name),
        None => false,
    };
    Ok(Outcome::Return(removed as u32))
}

fn sys_open(
    proc: &mut Process,
    mem: &dyn UserMemory,
    sys: &System<'_>,
    name: VirtAddr,
) -> Result<Outcome, SyscallError> {
    let name = match user_str(mem, name)? {
        Some(name) => name,
        None => return Ok(Outcome::Return(FAILURE)),
    };
    let file = match sys.fs.open(&name) {
        Some(file) => file,
        None => {
            debug!("[SYSCALL] open {:?}: not found", name);
            return Ok(Outcome::Return(FAILURE));
        }
    };

    let files = proc.files().ok_or(SyscallError::ResourceExhausted)?;
    match files.allocate(file) {
        Ok(fd) => Ok(Outcome::Return(fd.as_i32() as u32)),
        Err(file) => {
            file.close();
            Err(SyscallError::ResourceExhausted)
        }
    }
}

fn sys_filesize(proc: &mut Process, fd: i32) -> Result<Outcome, SyscallError> {
    let file = proc
        .files()
        .and_then(|files| files.lookup(fd))
        .ok_or(SyscallError::InvalidDescriptor)?;
    Ok(Outcome::Return(file.length()))
}

fn sys_read(
    proc: &mut Process,
    mem: &mut dyn UserMemory,
    sys: &System<'_>,
    fd: i32,
    buf: VirtAddr,
    len: u32,
) -> Result<Outcome, SyscallError> {
    let region = validate_user_write(&*mem, buf, len as usize)?;

    if fd == STDIN_FILENO {
        let mut bounce = vec![0u8; region.len().min(PAGE_SIZE)];
        let mut done = 0;
        while done < region.len() {
            let chunk = (region.len() - done).min(bounce.len());
            for byte in bounce[..chunk].iter_mut() {
                *byte = sys.console.get_byte();
            }
            let target = region
                .slice(done, chunk)
                .ok_or(SyscallError::InvalidMemoryAccess)?;
            mem.copy_out(&target, &bounce[..chunk]);
            done += chunk;
        }
        return Ok(Outcome::Return(done as u32));
    }

    let file = proc
        .files()
        .and_then(|files| files.lookup_mut(fd))
        .ok_or(SyscallError::InvalidDescriptor)?;

    let mut bounce = vec![0u8; region.len().min(PAGE_SIZE)];
    let mut done = 0;
    while done < region.len() {
        let chunk = (region.len() - done).min(bounce.len());
        let n = file.read(&mut bounce[..chunk]).min(chunk);
        if n == 0 {
            break;
        }
        let target = region
            .slice(done, n)
            .ok_or(SyscallError::InvalidMemoryAccess)?;
        mem.copy_out(&target, &bounce[..n]);
        done += n;
        if n < chunk {
            break;
        }
    }
    Ok(Outcome::Return(done as u32))
}

fn sys_write(
    proc: &mut Process,
    mem: &dyn UserMemory,
    sys: &System<'_>,
    fd: i32,
    buf: VirtAddr,
    len: u32,
) -> Result<Outcome, SyscallError> {
    let region = validate_user_read(mem, buf, len as usize)?;

    if fd == STDOUT_FILENO {
        let mut bounce = vec![0u8; region.len().min(CONSOLE_CHUNK)];
        let mut done = 0;
        while done < region.len() {
            let chunk = (region.len() - done).min(CONSOLE_CHUNK);
            let source = region
                .slice(done, chunk)
                .ok_or(SyscallError::InvalidMemoryAccess)?;
            mem.copy_in(&source, &mut bounce[..chunk]);
            sys.console.put_bytes(&bounce[..chunk]);
            done += chunk;
        }
        return Ok(Outcome::Return(done as u32));
    }

    let file = proc
        .files()
        .and_then(|files| files.lookup_mut(fd))
        .ok_or(SyscallError::InvalidDescriptor)?;

    let mut bounce = vec![0u8; region.len().min(PAGE_SIZE)];
    let mut done = 0;
    while done < region.len() {
        let chunk = (region.len() - done).min(bounce.len());
        let source = region
            .slice(done, chunk)
            .ok_or(SyscallError::InvalidMemoryAccess)?;
        mem.copy_in(&source, &mut bounce[..chunk]);
        let n = file.write(&bounce[..chunk]).min(chunk);
        done += n;
        if n < chunk {
            break;
        }
    }
    Ok(Outcome::Return(done as u32))
}

fn sys_seek(proc: &mut Process, fd: i32, pos: u32) -> Result<Outcome, SyscallError> {
    let file = proc
        .files()
        .and_then(|files| files.lookup_mut(fd))
        .ok_or(SyscallError::InvalidDescriptor)?;
    file.seek(pos);
    Ok(Outcome::NoResult)
}

fn sys_tell(proc: &mut Process, fd: i32) -> Result<Outcome, SyscallError> {
    let file = proc
        .files()
        .and_then(|files| files.lookup(fd))
        .ok_or(SyscallError::InvalidDescriptor)?;
    Ok(Outcome::Return(file.tell()))
}

fn sys_close(proc: &mut Process, fd: i32) -> Result<Outcome, SyscallError> {
    let file = proc
        .files()
        .and_then(|files| files.release(fd))
        .ok_or(SyscallError::InvalidDescriptor)?;
    file.close();
    trace!("[SYSCALL] closed fd{}", fd);
    Ok(Outcome::NoResult)
}
