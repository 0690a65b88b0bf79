use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::file::{File, FileMode};

const VALUE_SIZE: usize = std::mem::size_of::<u64>();

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct ChunkCursor {
    value: u64,
    chunk: usize,
    next_offset: u64,
    end_offset: u64,
}

/// Sorts `num_values` unsigned 64-bit integers from `input` into `output`
/// using at most `mem_size` bytes of value storage at a time. Oversized
/// inputs are partitioned into sorted runs spilled to temporary files and
/// k-way merged through a min-heap.
///
/// A no-op unless `input` is opened for reading and `output` for writing.
pub fn external_sort(input: &File, num_values: u64, output: &File, mem_size: usize) -> Result<()> {
    if input.mode() != FileMode::Read || output.mode() != FileMode::Write {
        return Ok(());
    }
    let mem_size = mem_size - mem_size % VALUE_SIZE;
    assert!(mem_size >= VALUE_SIZE);

    output.resize(num_values * VALUE_SIZE as u64)?;
    if num_values == 0 {
        return Ok(());
    }

    let chunk_len = (mem_size / VALUE_SIZE) as u64;
    let num_chunks = num_values.div_ceil(chunk_len) as usize;

    let mut chunk_files = Vec::with_capacity(num_chunks);
    let mut values = Vec::with_capacity(chunk_len as usize);
    for chunk in 0..num_chunks {
        let start = chunk as u64 * chunk_len;
        let len = chunk_len.min(num_values - start);
        values.clear();
        for i in 0..len {
            values.push(read_value(input, start + i)?);
        }
        values.sort_unstable();
        let chunk_file = File::temporary()?;
        for (i, value) in values.iter().enumerate() {
            chunk_file.write_block(&value.to_le_bytes(), (i * VALUE_SIZE) as u64)?;
        }
        log::trace!("spilled chunk {} ({} values)", chunk, len);
        chunk_files.push((chunk_file, len));
    }

    let mut heap = BinaryHeap::with_capacity(num_chunks);
    for (chunk, (file, len)) in chunk_files.iter().enumerate() {
        heap.push(Reverse(ChunkCursor {
            value: read_value(file, 0)?,
            chunk,
            next_offset: 1,
            end_offset: *len,
        }));
    }

    let mut write_offset = 0u64;
    while let Some(Reverse(cursor)) = heap.pop() {
        output.write_block(
            &cursor.value.to_le_bytes(),
            write_offset * VALUE_SIZE as u64,
        )?;
        write_offset += 1;
        if cursor.next_offset < cursor.end_offset {
            let (file, _) = &chunk_files[cursor.chunk];
            heap.push(Reverse(ChunkCursor {
                value: read_value(file, cursor.next_offset)?,
                chunk: cursor.chunk,
                next_offset: cursor.next_offset + 1,
                end_offset: cursor.end_offset,
            }));
        }
    }
    Ok(())
}

fn read_value(file: &File, offset: u64) -> Result<u64> {
    let mut buf = [0u8; VALUE_SIZE];
    file.read_block(offset * VALUE_SIZE as u64, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
