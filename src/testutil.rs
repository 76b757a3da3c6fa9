//! Host-side stand-ins for the kernel services the system call layer uses.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::fs::{Console, File, FileSystem};
use crate::mm::{PageFlags, UserMemory, UserRegion, UserRegionMut, VirtAddr, PAGE_SIZE};
use crate::process::{Pid, Scheduler};

/// A sparse user address space with per-page flags.
#[derive(Default)]
pub struct SimMemory {
    pages: BTreeMap<usize, (PageFlags, Vec<u8>)>,
}

impl SimMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every page touching `[base, base + len)`.
    pub fn map(&mut self, base: usize, len: usize, flags: PageFlags) {
        let first = base / PAGE_SIZE;
        let last = (base + len.max(1) - 1) / PAGE_SIZE;
        for page in first..=last {
            self.pages.insert(page, (flags, vec![0; PAGE_SIZE]));
        }
    }

    pub fn unmap(&mut self, addr: usize) {
        self.pages.remove(&(addr / PAGE_SIZE));
    }

    /// Write directly, bypassing validation. Panics on unmapped pages.
    pub fn poke(&mut self, addr: usize, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            let at = addr + i;
            let (_, data) = self.pages.get_mut(&(at / PAGE_SIZE)).expect("poke unmapped");
            data[at % PAGE_SIZE] = *byte;
        }
    }

    pub fn peek(&self, addr: usize, len: usize) -> Vec<u8> {
        (addr..addr + len)
            .map(|at| self.pages.get(&(at / PAGE_SIZE)).expect("peek unmapped").1[at % PAGE_SIZE])
            .collect()
    }

    /// Lay out little-endian 32-bit words starting at `sp`.
    pub fn push_words(&mut self, sp: usize, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.poke(sp + 4 * i, &word.to_le_bytes());
        }
    }
}

impl UserMemory for SimMemory {
    fn page_flags(&self, page: VirtAddr) -> PageFlags {
        self.pages
            .get(&page.page_number())
            .map(|(flags, _)| *flags)
            .unwrap_or(PageFlags::empty())
    }

    fn copy_in(&self, region: &UserRegion, dst: &mut [u8]) {
        assert_eq!(region.len(), dst.len());
        dst.copy_from_slice(&self.peek(region.addr().as_usize(), region.len()));
    }

    fn copy_out(&mut self, region: &UserRegionMut, src: &[u8]) {
        assert_eq!(region.len(), src.len());
        self.poke(region.addr().as_usize(), src);
    }
}

/// In-memory files. Counts every open and close.
#[derive(Default)]
pub struct SimFs {
    files: Mutex<BTreeMap<String, Arc<Mutex<Vec<u8>>>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

pub struct SimFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: usize,
    closed: Arc<AtomicUsize>,
}

impl SimFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, name: &str, contents: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Mutex::new(contents.to_vec())));
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .map(|data| data.lock().unwrap().clone())
    }

    /// An open handle to an anonymous empty file.
    pub fn handle(&self) -> Box<dyn File> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(SimFile {
            data: Arc::default(),
            pos: 0,
            closed: self.closed.clone(),
        })
    }

    pub fn open_file(&self, name: &str) -> Box<dyn File> {
        self.open(name).expect("no such file")
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FileSystem for SimFs {
    fn open(&self, name: &str) -> Option<Box<dyn File>> {
        let data = self.files.lock().unwrap().get(name)?.clone();
        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(SimFile {
            data,
            pos: 0,
            closed: self.closed.clone(),
        }))
    }

    fn create(&self, name: &str, initial_size: u32) -> bool {
        let mut files = self.files.lock().unwrap();
        if name.is_empty() || files.contains_key(name) {
            return false;
        }
        files.insert(
            name.to_string(),
            Arc::new(Mutex::new(vec![0; initial_size as usize])),
        );
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().unwrap().remove(name).is_some()
    }
}

impl File for SimFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let data = self.data.lock().unwrap();
        let start = self.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n;
        n
    }

    // Files don't grow: writes stop at end of file.
    fn write(&mut self, buf: &[u8]) -> usize {
        let mut data = self.data.lock().unwrap();
        let start = self.pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        self.pos += n;
        n
    }

    fn seek(&mut self, pos: u32) {
        self.pos = pos as usize;
    }

    fn tell(&self) -> u32 {
        self.pos as u32
    }

    fn length(&self) -> u32 {
        self.data.lock().unwrap().len() as u32
    }

    fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Console that records output and each write's size.
#[derive(Default)]
pub struct SimConsole {
    output: Mutex<Vec<u8>>,
    writes: Mutex<Vec<usize>>,
    input: Mutex<VecDeque<u8>>,
}

impl SimConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_keys(&self, keys: &[u8]) {
        self.input.lock().unwrap().extend(keys);
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().unwrap().clone()
    }

    pub fn write_sizes(&self) -> Vec<usize> {
        self.writes.lock().unwrap().clone()
    }
}

impl Console for SimConsole {
    fn put_bytes(&self, bytes: &[u8]) {
        self.output.lock().unwrap().extend_from_slice(bytes);
        self.writes.lock().unwrap().push(bytes.len());
    }

    fn get_byte(&self) -> u8 {
        self.input.lock().unwrap().pop_front().unwrap_or(0)
    }
}

/// Scheduler that blocks real threads.
///
/// `yield_until` sleeps on a condition variable; `wake` bumps a generation
/// counter so a wake between a failed check and the sleep is not lost.
pub struct SimScheduler {
    next_pid: AtomicU32,
    refuse_spawn: AtomicBool,
    spawned: Mutex<Vec<String>>,
    generation: Mutex<u64>,
    wakeup: Condvar,
    blocked: AtomicUsize,
}

impl SimScheduler {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(100),
            refuse_spawn: AtomicBool::new(false),
            spawned: Mutex::new(Vec::new()),
            generation: Mutex::new(0),
            wakeup: Condvar::new(),
            blocked: AtomicUsize::new(0),
        }
    }

    pub fn refuse_spawn(&self) {
        self.refuse_spawn.store(true, Ordering::SeqCst);
    }

    /// Command lines passed to `start_process`.
    pub fn spawned(&self) -> Vec<String> {
        self.spawned.lock().unwrap().clone()
    }

    /// How many times a thread went to sleep in `yield_until`.
    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }
}

impl Scheduler for SimScheduler {
    fn start_process(&self, cmdline: &str) -> Option<Pid> {
        self.spawned.lock().unwrap().push(cmdline.to_string());
        if self.refuse_spawn.load(Ordering::SeqCst) {
            return None;
        }
        Some(Pid::new(self.next_pid.fetch_add(1, Ordering::SeqCst)))
    }

    fn yield_until(&self, ready: &mut dyn FnMut() -> bool) {
        loop {
            let seen = *self.generation.lock().unwrap();
            if ready() {
                return;
            }
            self.blocked.fetch_add(1, Ordering::SeqCst);
            let mut generation = self.generation.lock().unwrap();
            while *generation == seen {
                generation = self.wakeup.wait(generation).unwrap();
            }
        }
    }

    fn wake(&self, _pid: Pid) {
        *self.generation.lock().unwrap() += 1;
        self.wakeup.notify_all();
    }

    fn terminate_current(&self) -> ! {
        panic!("process terminated");
    }

    fn power_off(&self) -> ! {
        panic!("power off");
    }
}
