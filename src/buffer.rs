use std::{
    collections::{HashMap, VecDeque},
    mem,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{
    lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard},
    Mutex, MutexGuard, RawRwLock, RwLock,
};

use crate::{
    common::PageId,
    error::{Error, Result},
    file::{File, FileMode},
};

type PageBuf = Box<[u8]>;
type SharedLatchGuard = ArcRwLockReadGuard<RawRwLock, PageBuf>;
type ExclusiveLatchGuard = ArcRwLockWriteGuard<RawRwLock, PageBuf>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    /// A loader thread is bringing the page in; its bytes are not valid yet.
    New,
    /// Bytes are valid and usable.
    Loaded,
    /// An evictor has claimed the frame and may be writing it out.
    Evicting,
    /// The frame was re-fixed while the evictor's write was in flight.
    Reloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameList {
    None,
    Fifo,
    Lru,
}

/// Bookkeeping for one resident page. All fields except the latch contents
/// are guarded by the pool's global mutex.
struct Frame {
    latch: Arc<RwLock<PageBuf>>,
    state: FrameState,
    num_fixed: usize,
    dirty: bool,
    list: FrameList,
}

struct SegmentFile {
    file: File,
    /// Serializes extension of the backing file.
    extend_latch: Mutex<()>,
}

struct Pool {
    frames: HashMap<PageId, Frame>,
    fifo_list: VecDeque<PageId>,
    lru_list: VecDeque<PageId>,
    /// Page buffers not currently backing a frame. Together with the buffers
    /// held by frames this is the entire, fixed-size pool.
    free_buffers: Vec<PageBuf>,
    segment_files: HashMap<u16, Arc<SegmentFile>>,
}

impl Pool {
    fn segment_file(&mut self, directory: &Path, segment_id: u16) -> Result<Arc<SegmentFile>> {
        if let Some(segment) = self.segment_files.get(&segment_id) {
            return Ok(segment.clone());
        }
        let file = File::open(directory.join(segment_id.to_string()), FileMode::Write)?;
        let segment = Arc::new(SegmentFile {
            file,
            extend_latch: Mutex::new(()),
        });
        self.segment_files.insert(segment_id, segment.clone());
        Ok(segment)
    }

    fn remove_from_list(&mut self, page_id: PageId, list: FrameList) {
        let queue = match list {
            FrameList::Fifo => &mut self.fifo_list,
            FrameList::Lru => &mut self.lru_list,
            FrameList::None => unreachable!("frame is in no replacement queue"),
        };
        if let Some(position) = queue.iter().position(|&id| id == page_id) {
            queue.remove(position);
        }
    }
}

/// A page cache with a fixed number of page buffers over segmented files.
///
/// Replacement is two-queue: a page enters the FIFO queue on first fix and
/// is promoted to the LRU queue when fixed again while resident, so a single
/// scan cannot flush the hot set. Eviction writes dirty victims back with the
/// global lock released, using the `Evicting`/`Reloaded` handshake to detect
/// a re-fix that raced the write.
pub struct BufferManager {
    page_size: usize,
    directory: PathBuf,
    pool: Mutex<Pool>,
}

impl BufferManager {
    /// `page_count` buffers of `page_size` bytes are allocated up front;
    /// the pool never grows. Segment files live in `directory`, named by
    /// their decimal segment id.
    pub fn new(page_size: usize, page_count: usize, directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        let free_buffers = (0..page_count)
            .map(|_| vec![0u8; page_size].into_boxed_slice())
            .collect();
        Ok(Self {
            page_size,
            directory,
            pool: Mutex::new(Pool {
                frames: HashMap::new(),
                fifo_list: VecDeque::new(),
                lru_list: VecDeque::new(),
                free_buffers,
                segment_files: HashMap::new(),
            }),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pins the page and latches it in the requested mode, loading it from
    /// its segment file first if it is not resident. Fails with
    /// [`Error::BufferFull`] when every buffer backs a pinned page.
    pub fn fix_page(&self, page_id: PageId, exclusive: bool) -> Result<PageGuard<'_>> {
        let mut pool = self.pool.lock();
        loop {
            let Some(frame) = pool.frames.get_mut(&page_id) else {
                break;
            };
            frame.num_fixed += 1;
            if frame.state == FrameState::New {
                // Another thread is loading this page. Wait for it by passing
                // through the frame's exclusive latch, then re-check: a frame
                // still `New` afterwards means the loader failed.
                let latch = frame.latch.clone();
                MutexGuard::unlocked(&mut pool, || drop(latch.write()));
                let Some(frame) = pool.frames.get_mut(&page_id) else {
                    unreachable!("pinned frame disappeared");
                };
                if frame.state == FrameState::New {
                    frame.num_fixed -= 1;
                    if frame.num_fixed == 0 {
                        pool.frames.remove(&page_id);
                    }
                    continue;
                }
            }
            let frame = pool.frames.get_mut(&page_id).unwrap();
            if frame.state == FrameState::Evicting {
                frame.state = FrameState::Reloaded;
            }
            // Fixed again while resident: hot page, move to the LRU tail.
            let previous_list = frame.list;
            frame.list = FrameList::Lru;
            let latch = frame.latch.clone();
            pool.remove_from_list(page_id, previous_list);
            pool.lru_list.push_back(page_id);
            drop(pool);
            return Ok(PageGuard::acquire(self, page_id, &latch, exclusive));
        }

        // Not resident. Publish a `New` frame pinned once, hold its exclusive
        // latch across the load so concurrent fixers block on it.
        let latch = Arc::new(RwLock::new(PageBuf::default()));
        pool.frames.insert(
            page_id,
            Frame {
                latch: latch.clone(),
                state: FrameState::New,
                num_fixed: 1,
                dirty: false,
                list: FrameList::None,
            },
        );
        let mut load_guard = latch.write_arc();
        match self.load_frame(&mut pool, page_id, &mut load_guard) {
            Ok(()) => {
                let frame = pool.frames.get_mut(&page_id).unwrap();
                frame.state = FrameState::Loaded;
                frame.dirty = false;
                drop(load_guard);
                drop(pool);
                Ok(PageGuard::acquire(self, page_id, &latch, exclusive))
            }
            Err(e) => {
                // Undo the transient frame: recycle its buffer, drop it from
                // the FIFO queue, release the pin. Waiters wake on the latch,
                // observe `New` and retry from scratch.
                let frame = pool.frames.get_mut(&page_id).unwrap();
                let list = frame.list;
                frame.list = FrameList::None;
                let buffer = mem::take(&mut *load_guard);
                if !buffer.is_empty() {
                    pool.free_buffers.push(buffer);
                }
                if list != FrameList::None {
                    pool.remove_from_list(page_id, list);
                }
                let frame = pool.frames.get_mut(&page_id).unwrap();
                frame.num_fixed -= 1;
                if frame.num_fixed == 0 {
                    pool.frames.remove(&page_id);
                }
                drop(load_guard);
                Err(e)
            }
        }
    }

    /// Releases the latch, unpins the page and ORs `dirty` into the frame.
    /// Dropping the guard does the same with the dirty flag it carries.
    pub fn unfix_page(&self, mut guard: PageGuard<'_>, dirty: bool) {
        if dirty {
            guard.dirty = true;
        }
    }

    /// Page ids currently in the FIFO queue, head first. Debug helper; the
    /// caller must ensure no concurrent fixes.
    pub fn fifo_page_ids(&self) -> Vec<PageId> {
        self.pool.lock().fifo_list.iter().copied().collect()
    }

    /// Page ids currently in the LRU queue, least recent first. Debug
    /// helper; the caller must ensure no concurrent fixes.
    pub fn lru_page_ids(&self) -> Vec<PageId> {
        self.pool.lock().lru_list.iter().copied().collect()
    }

    /// Fills the frame buffer behind `load_guard` from disk, or zeroes it if
    /// the page lies beyond the current end of its segment file. Blocking
    /// I/O runs with the global lock released.
    fn load_frame(
        &self,
        pool: &mut MutexGuard<'_, Pool>,
        page_id: PageId,
        load_guard: &mut ExclusiveLatchGuard,
    ) -> Result<()> {
        let buffer = match pool.free_buffers.pop() {
            Some(buffer) => buffer,
            None => self.evict_page(pool)?.ok_or(Error::BufferFull)?,
        };
        **load_guard = buffer;
        pool.fifo_list.push_back(page_id);
        pool.frames.get_mut(&page_id).unwrap().list = FrameList::Fifo;

        let segment = pool.segment_file(&self.directory, page_id.segment_id())?;
        let page_size = self.page_size as u64;
        let segment_page_id = page_id.segment_page_id();
        MutexGuard::unlocked(pool, || {
            let extend_guard = segment.extend_latch.lock();
            if segment.file.size()? < (segment_page_id + 1) * page_size {
                segment.file.resize((segment_page_id + 1) * page_size)?;
                drop(extend_guard);
                load_guard.fill(0);
            } else {
                drop(extend_guard);
                segment
                    .file
                    .read_block(segment_page_id * page_size, load_guard)?;
            }
            Ok(())
        })
    }

    /// Picks a victim (FIFO queue first, then LRU; first unpinned loaded
    /// frame), writes it back if dirty and returns its buffer for reuse.
    /// `Ok(None)` when every frame is pinned.
    fn evict_page(&self, pool: &mut MutexGuard<'_, Pool>) -> Result<Option<PageBuf>> {
        loop {
            let victim = pool
                .fifo_list
                .iter()
                .chain(pool.lru_list.iter())
                .copied()
                .find(|id| {
                    let frame = &pool.frames[id];
                    frame.num_fixed == 0 && frame.state == FrameState::Loaded
                });
            let Some(victim) = victim else {
                return Ok(None);
            };
            let frame = pool.frames.get_mut(&victim).unwrap();
            frame.state = FrameState::Evicting;
            if frame.dirty {
                // Write back a private copy with the global lock released so
                // concurrent fixes of other pages keep making progress. The
                // victim cannot vanish meanwhile: evictors skip `Evicting`
                // frames and a racing fix only flips the state to `Reloaded`.
                let data = frame.latch.read().to_vec();
                let segment = pool.segment_files[&victim.segment_id()].clone();
                let offset = victim.segment_page_id() * self.page_size as u64;
                let write_result =
                    MutexGuard::unlocked(pool, || segment.file.write_block(&data, offset));
                let frame = pool.frames.get_mut(&victim).unwrap();
                if let Err(e) = write_result {
                    frame.state = FrameState::Loaded;
                    return Err(e);
                }
                if frame.state == FrameState::Reloaded {
                    frame.state = FrameState::Loaded;
                    continue;
                }
                frame.dirty = false;
            }
            log::trace!("evicting page {}", victim.0);
            let frame = pool.frames.remove(&victim).unwrap();
            pool.remove_from_list(victim, frame.list);
            let buffer = mem::take(&mut *frame.latch.write());
            return Ok(Some(buffer));
        }
    }
}

impl Drop for BufferManager {
    /// Best-effort write-back of every surviving dirty frame. Failures are
    /// logged, never propagated.
    fn drop(&mut self) {
        let pool = self.pool.get_mut();
        for (page_id, frame) in pool.frames.iter() {
            if !frame.dirty {
                continue;
            }
            let Some(segment) = pool.segment_files.get(&page_id.segment_id()) else {
                continue;
            };
            let data = frame.latch.read();
            let offset = page_id.segment_page_id() * self.page_size as u64;
            if let Err(e) = segment.file.write_block(&data, offset) {
                log::warn!("failed to flush page {} on shutdown: {}", page_id.0, e);
            }
        }
    }
}

enum LatchGuard {
    Shared(SharedLatchGuard),
    Exclusive(ExclusiveLatchGuard),
}

/// A fixed page. Holds the frame latch in the mode it was fixed with and
/// keeps the page pinned; dropping the guard releases the latch first and
/// the pin second, carrying the dirty flag into the frame.
pub struct PageGuard<'a> {
    manager: &'a BufferManager,
    page_id: PageId,
    latch: Option<LatchGuard>,
    dirty: bool,
}

impl<'a> std::fmt::Debug for PageGuard<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<'a> PageGuard<'a> {
    fn acquire(
        manager: &'a BufferManager,
        page_id: PageId,
        latch: &Arc<RwLock<PageBuf>>,
        exclusive: bool,
    ) -> Self {
        let latch = if exclusive {
            LatchGuard::Exclusive(latch.write_arc())
        } else {
            LatchGuard::Shared(latch.read_arc())
        };
        Self {
            manager,
            page_id,
            latch: Some(latch),
            dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        match self.latch.as_ref() {
            Some(LatchGuard::Shared(guard)) => guard,
            Some(LatchGuard::Exclusive(guard)) => guard,
            None => unreachable!("latch released while guard is live"),
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        match self.latch.as_mut() {
            Some(LatchGuard::Exclusive(guard)) => guard,
            _ => panic!("page is not fixed exclusively"),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        // The latch must be released before the pin: eviction relies on
        // "unpinned implies unlatched" to copy the victim's bytes.
        self.latch.take();
        let mut pool = self.manager.pool.lock();
        match pool.frames.get_mut(&self.page_id) {
            Some(frame) => {
                if self.dirty {
                    frame.dirty = true;
                }
                frame.num_fixed -= 1;
            }
            None => unreachable!("unfixed page is not resident"),
        }
    }
}
