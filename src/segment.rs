use std::sync::Arc;

use crate::{buffer::BufferManager, common::PageId};

/// A logical namespace of pages backed by one file, addressed through the
/// buffer manager. Structures living in a segment (such as the B+-tree)
/// embed one and allocate their pages from it.
pub struct Segment {
    segment_id: u16,
    buffer_manager: Arc<BufferManager>,
    next_page_id: u64,
}

impl Segment {
    pub fn new(segment_id: u16, buffer_manager: Arc<BufferManager>) -> Self {
        Self {
            segment_id,
            buffer_manager,
            next_page_id: 0,
        }
    }

    pub fn segment_id(&self) -> u16 {
        self.segment_id
    }

    pub fn buffer_manager(&self) -> &Arc<BufferManager> {
        &self.buffer_manager
    }

    pub fn page_id(&self, segment_page_id: u64) -> PageId {
        PageId::new(self.segment_id, segment_page_id)
    }

    /// Claims the next unused page id in this segment. Ids only ever grow;
    /// there is no free list.
    pub fn allocate_page(&mut self) -> PageId {
        let page_id = PageId::new(self.segment_id, self.next_page_id);
        self.next_page_id += 1;
        page_id
    }
}
