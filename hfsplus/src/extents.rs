//! Extents-overflow traversal (C9) and the fork-reading layer built on top
//! of it (C13, ambient): presents a file's data or resource fork as a
//! contiguous `Read + Seek` stream once its full extent list — inline plus
//! any continuation extents pulled from the extents-overflow B-tree — has
//! been resolved.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use crate::btree::{self, BTreeReader};
use crate::cache::NodeCache;
use crate::error::{HfsPlusError, Result};
use crate::extent;
use crate::key::{self, ExtentKey};
use crate::node::{self, Node};
use crate::volume::{ExtentDescriptor, ForkData};

/// Single-descent exact-match search for `(cnid, fork_kind, start_block)`,
/// mirroring `catalog::search`'s shape but over the extents key order.
fn search<R: Read + Seek>(
    btree: &BTreeReader<ExtentKey>,
    cache: &NodeCache<ExtentKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    target_cnid: u32,
    target_fork_kind: u8,
    target_start_block: u32,
) -> Result<Option<(Arc<Node<ExtentKey>>, usize, usize)>> {
    if btree.header.root_node == 0 {
        return Ok(None);
    }
    let target = (target_cnid, target_fork_kind, target_start_block);

    let mut node_number = btree.header.root_node;
    let mut level = btree::ROOT_LEVEL;
    let mut hops = 0u32;

    loop {
        hops += 1;
        if hops > btree.header.depth.min(node::MAX_LEVEL as u16) as u32 {
            return Err(HfsPlusError::DepthExceeded(hops));
        }
        let node = btree.get_node(reader, cache, abort, level, node_number)?;

        match node.descriptor.kind {
            node::NODE_KIND_LEAF => {
                for i in 0..node.record_count() {
                    let key = node.cached_key_or_decode(i, |d| key::decode_extent_key_hfsplus(d))?;
                    let order = (key.cnid, key.fork_kind, key.start_block);
                    if order >= target {
                        return Ok(Some((node, i, level)));
                    }
                }
                return Ok(None);
            }
            node::NODE_KIND_INDEX => {
                let mut chosen = None;
                for i in 0..node.record_count() {
                    let key = node.cached_key_or_decode(i, |d| key::decode_extent_key_hfsplus(d))?;
                    let order = (key.cnid, key.fork_kind, key.start_block);
                    if order <= target {
                        chosen = Some(i);
                    } else {
                        break;
                    }
                }
                let i = match chosen {
                    Some(i) => i,
                    None => return Ok(None),
                };
                let key = node.cached_key_or_decode(i, |d| key::decode_extent_key_hfsplus(d))?;
                let record = node.record_data(i)?;
                node_number = extract_child_number(record, key.payload_offset)?;
                level += 1;
            }
            other => {
                return Err(HfsPlusError::Malformed(format!(
                    "unexpected node kind {other} during extents-overflow descent"
                )))
            }
        }
    }
}

fn extract_child_number(record: &[u8], payload_offset: usize) -> Result<u32> {
    if payload_offset + 4 > record.len() {
        return Err(HfsPlusError::Malformed(
            "index record missing its 4-byte child pointer".to_string(),
        ));
    }
    Ok(u32::from_be_bytes(
        record[payload_offset..payload_offset + 4].try_into().unwrap(),
    ))
}

fn decode_eight_extents(payload: &[u8]) -> Result<[ExtentDescriptor; 8]> {
    if payload.len() < 64 {
        return Err(HfsPlusError::Malformed(
            "extents-overflow record shorter than its 8-extent block".to_string(),
        ));
    }
    let mut extents = [ExtentDescriptor::default(); 8];
    for (i, extent) in extents.iter_mut().enumerate() {
        let off = i * 8;
        extent.start_block = u32::from_be_bytes(payload[off..off + 4].try_into().unwrap());
        extent.block_count = u32::from_be_bytes(payload[off + 4..off + 8].try_into().unwrap());
    }
    Ok(extents)
}

/// C9: resolve a fork's full extent list — its up-to-8 inline extents plus
/// any continuation extents recorded in the extents-overflow B-tree —
/// stopping once the accumulated block count reaches `inline.total_blocks`.
pub fn extents_of<R: Read + Seek>(
    btree: &BTreeReader<ExtentKey>,
    cache: &NodeCache<ExtentKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    cnid: u32,
    fork_kind: u8,
    inline: &ForkData,
) -> Result<Vec<ExtentDescriptor>> {
    let mut extents: Vec<ExtentDescriptor> = inline
        .extents
        .iter()
        .filter(|e| e.block_count > 0)
        .cloned()
        .collect();
    let mut accumulated: u64 = extents.iter().map(|e| e.block_count as u64).sum();
    let total_blocks = inline.total_blocks as u64;
    if accumulated >= total_blocks {
        return Ok(extents);
    }

    let start_block = accumulated as u32;
    let (mut current, mut idx, level) =
        match search(btree, cache, reader, abort, cnid, fork_kind, start_block)? {
            Some(found) => found,
            None => return Ok(extents),
        };

    loop {
        if idx >= current.record_count() {
            let next = current.descriptor.forward_link;
            if next == 0 {
                break;
            }
            current = btree.get_node(reader, cache, abort, level, next)?;
            idx = 0;
            continue;
        }
        let key = current.cached_key_or_decode(idx, |d| key::decode_extent_key_hfsplus(d))?;
        if key.cnid != cnid || key.fork_kind != fork_kind {
            break;
        }
        let record_bytes = current.record_data(idx)?;
        let batch = decode_eight_extents(&record_bytes[key.payload_offset..])?;
        for extent in batch {
            if extent.block_count == 0 {
                break;
            }
            accumulated += extent.block_count as u64;
            extents.push(extent);
            if accumulated >= total_blocks {
                return Ok(extents);
            }
        }
        idx += 1;
    }

    Ok(extents)
}

/// A `Read + Seek` stream over a fork's already-fully-resolved extent list.
pub struct ForkReader<'a, R> {
    reader: &'a Mutex<R>,
    extents: Vec<ExtentDescriptor>,
    block_size: u32,
    logical_size: u64,
    position: u64,
}

impl<'a, R: Read + Seek> ForkReader<'a, R> {
    pub fn new(reader: &'a Mutex<R>, extents: Vec<ExtentDescriptor>, logical_size: u64, block_size: u32) -> Self {
        ForkReader {
            reader,
            extents,
            block_size,
            logical_size,
            position: 0,
        }
    }
}

impl<R: Read + Seek> Read for ForkReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.position >= self.logical_size {
            return Ok(0);
        }
        let remaining = (self.logical_size - self.position) as usize;
        let to_read = buf.len().min(remaining);
        if to_read == 0 {
            return Ok(0);
        }

        let (image_offset, extent_remaining) = extent::locate(self.position, &self.extents, self.block_size)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e.to_string()))?;
        let chunk = to_read.min(extent_remaining as usize);

        let mut guard = self.reader.lock().unwrap();
        guard.seek(SeekFrom::Start(image_offset))?;
        guard.read_exact(&mut buf[..chunk])?;
        drop(guard);

        self.position += chunk as u64;
        Ok(chunk)
    }
}

impl<R: Read + Seek> Seek for ForkReader<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.position as i64 + offset,
            SeekFrom::End(offset) => self.logical_size as i64 + offset,
        };
        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of fork",
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }
}

/// Stream an entire fork to `writer` given its already-resolved extent list.
/// Returns the number of bytes written.
pub fn copy_fork<R: Read + Seek, W: Write>(
    reader: &Mutex<R>,
    extents: Vec<ExtentDescriptor>,
    logical_size: u64,
    block_size: u32,
    writer: &mut W,
) -> Result<u64> {
    let mut fork_reader = ForkReader::new(reader, extents, logical_size, block_size);
    let written = std::io::copy(&mut fork_reader, writer)?;
    Ok(written)
}

pub use key::{FORK_KIND_DATA, FORK_KIND_RESOURCE};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fork(extents: &[(u32, u32)], total_blocks: u32, logical_size: u64) -> ForkData {
        let mut fd = ForkData {
            logical_size,
            clump_size: 0,
            total_blocks,
            extents: [ExtentDescriptor::default(); 8],
        };
        for (i, (start, count)) in extents.iter().enumerate() {
            fd.extents[i] = ExtentDescriptor {
                start_block: *start,
                block_count: *count,
            };
        }
        fd
    }

    #[test]
    fn fork_reader_reads_across_resolved_extents() {
        let block_size = 16u32;
        let mut image = vec![0xAAu8; block_size as usize * 4];
        for (i, b) in image[0..block_size as usize].iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in image[block_size as usize * 2..block_size as usize * 3]
            .iter_mut()
            .enumerate()
        {
            *b = (100 + i) as u8;
        }
        let cursor = Mutex::new(Cursor::new(image));
        let extents = vec![
            ExtentDescriptor {
                start_block: 0,
                block_count: 1,
            },
            ExtentDescriptor {
                start_block: 2,
                block_count: 1,
            },
        ];
        let mut fr = ForkReader::new(&cursor, extents, block_size as u64 * 2, block_size);
        let mut out = vec![0u8; block_size as usize * 2];
        fr.read_exact(&mut out).unwrap();
        assert_eq!(out[0], 0);
        assert_eq!(out[block_size as usize], 100);
    }

    #[test]
    fn extents_of_returns_inline_only_when_no_overflow() {
        let btree_header_node = {
            let mut data = vec![0u8; 512];
            data[8] = node::NODE_KIND_HEADER as u8;
            data[16..20].copy_from_slice(&0u32.to_be_bytes()); // root_node = 0 -> no tree
            data[32..34].copy_from_slice(&512u16.to_be_bytes());
            data
        };
        let mut cursor = Cursor::new(btree_header_node);
        let extents = vec![ExtentDescriptor {
            start_block: 0,
            block_count: 1,
        }];
        let btree: BTreeReader<ExtentKey> =
            BTreeReader::open(&mut cursor, extents, 512, 512).unwrap();
        let cache = NodeCache::new(2);
        let reader = Mutex::new(cursor);
        let abort = AtomicBool::new(false);

        let inline = fork(&[(10, 2)], 2, 2 * 512);
        let resolved =
            extents_of(&btree, &cache, &reader, &abort, 99, FORK_KIND_DATA, &inline).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].start_block, 10);
    }

    #[test]
    fn extents_of_pulls_continuation_from_overflow_tree() {
        let node_size = 512u16;

        let mut overflow_record = vec![0u8; 12];
        overflow_record[0..2].copy_from_slice(&10u16.to_be_bytes()); // key_len
        overflow_record[2] = FORK_KIND_DATA;
        overflow_record[4..8].copy_from_slice(&99u32.to_be_bytes());
        overflow_record[8..12].copy_from_slice(&8u32.to_be_bytes()); // start_block = 8
        let mut continuation = vec![ExtentDescriptor::default(); 8];
        continuation[0] = ExtentDescriptor { start_block: 20, block_count: 1 };
        continuation[1] = ExtentDescriptor { start_block: 21, block_count: 1 };
        for e in &continuation {
            overflow_record.extend_from_slice(&e.start_block.to_be_bytes());
            overflow_record.extend_from_slice(&e.block_count.to_be_bytes());
        }

        let mut leaf = vec![0u8; node_size as usize];
        leaf[8] = node::NODE_KIND_LEAF as u8;
        leaf[10..12].copy_from_slice(&1u16.to_be_bytes()); // record_count
        let record_start = 14usize;
        leaf[record_start..record_start + overflow_record.len()].copy_from_slice(&overflow_record);
        let record_end = record_start + overflow_record.len();
        leaf[node_size as usize - 2..].copy_from_slice(&(record_start as u16).to_be_bytes());
        leaf[node_size as usize - 4..node_size as usize - 2]
            .copy_from_slice(&(record_end as u16).to_be_bytes());

        let mut header = vec![0u8; node_size as usize];
        header[8] = node::NODE_KIND_HEADER as u8;
        header[14..16].copy_from_slice(&1u16.to_be_bytes()); // depth
        header[16..20].copy_from_slice(&1u32.to_be_bytes()); // root_node
        header[32..34].copy_from_slice(&node_size.to_be_bytes());

        let mut image = header;
        image.extend_from_slice(&leaf);

        let extents = vec![ExtentDescriptor {
            start_block: 0,
            block_count: 2,
        }];
        let mut cursor = Cursor::new(image);
        let btree: BTreeReader<ExtentKey> = BTreeReader::open(
            &mut cursor,
            extents,
            node_size as u64 * 2,
            node_size as u32,
        )
        .unwrap();
        let cache = NodeCache::new(2);
        let reader = Mutex::new(cursor);
        let abort = AtomicBool::new(false);

        let inline_extents: Vec<(u32, u32)> = (0..8).map(|i| (i * 2, 1)).collect();
        let inline = fork(&inline_extents, 10, 10 * 512);

        let resolved =
            extents_of(&btree, &cache, &reader, &abort, 99, FORK_KIND_DATA, &inline).unwrap();
        assert_eq!(resolved.len(), 10);
        assert_eq!(resolved[8].start_block, 20);
        assert_eq!(resolved[9].start_block, 21);
    }
}
