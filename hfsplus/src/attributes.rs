//! Attributes traversal: collects the named extended-attribute records for
//! a CNID from the attributes B-tree.
//!
//! Shaped like the extents-overflow traversal (descend on an exact-match
//! key, then walk forward across leaf boundaries) but keyed by
//! `(cnid, name, start_block)` rather than `(cnid, fork_kind, start_block)`.
//! Attribute payloads are decoded only as far as their discriminated record
//! type (inline / fork data / extents) — the semantic content of a named
//! attribute (ACLs, `com.apple.ResourceFork`, ...) is the caller's concern.

use std::io::{Read, Seek};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use byteorder::{BigEndian, ReadBytesExt};

use crate::btree::{self, BTreeReader};
use crate::cache::NodeCache;
use crate::error::{HfsPlusError, Result};
use crate::key::{self, AttributeKey};
use crate::name;
use crate::node;
use crate::volume::ForkData;

const ATTR_RECORD_INLINE: u32 = 0x10;
const ATTR_RECORD_FORK_DATA: u32 = 0x20;
const ATTR_RECORD_EXTENTS: u32 = 0x30;

/// A decoded extended-attribute record body. Inline attributes carry their
/// bytes directly; fork/extents records describe a separate fork the caller
/// streams via [`crate::extents::ForkReader`] or [`crate::extents`]'s
/// fork-reading helpers.
#[derive(Debug, Clone)]
pub enum AttributeBody {
    Inline(Vec<u8>),
    Fork(ForkData),
    /// A continuation of a fork-data attribute's extent list, keyed by the
    /// `start_block` it picks up from.
    Extents([crate::volume::ExtentDescriptor; 8]),
}

/// An attribute record: the name it was stored under plus its decoded body.
#[derive(Debug, Clone)]
pub struct AttributeRecord {
    pub cnid: u32,
    pub name: Vec<u16>,
    pub start_block: u32,
    pub body: AttributeBody,
}

fn decode_record(data: &[u8]) -> Result<AttributeBody> {
    if data.len() < 4 {
        return Err(HfsPlusError::Malformed(
            "attribute record shorter than its 4-byte type tag".to_string(),
        ));
    }
    let record_type = u32::from_be_bytes(data[0..4].try_into().unwrap());
    match record_type {
        ATTR_RECORD_INLINE => {
            if data.len() < 16 {
                return Err(HfsPlusError::Malformed(
                    "inline attribute record too short".to_string(),
                ));
            }
            let attr_size = u32::from_be_bytes(data[12..16].try_into().unwrap()) as usize;
            let end = 16 + attr_size;
            if end > data.len() {
                return Err(HfsPlusError::Malformed(format!(
                    "inline attribute size {attr_size} overruns its record"
                )));
            }
            Ok(AttributeBody::Inline(data[16..end].to_vec()))
        }
        ATTR_RECORD_FORK_DATA => {
            if data.len() < 8 + 80 {
                return Err(HfsPlusError::Malformed(
                    "fork-data attribute record too short".to_string(),
                ));
            }
            let mut cursor = std::io::Cursor::new(&data[8..]);
            let fork = read_fork_data(&mut cursor)?;
            Ok(AttributeBody::Fork(fork))
        }
        ATTR_RECORD_EXTENTS => {
            if data.len() < 8 + 64 {
                return Err(HfsPlusError::Malformed(
                    "extents attribute record too short".to_string(),
                ));
            }
            let mut extents = [crate::volume::ExtentDescriptor::default(); 8];
            let mut cursor = std::io::Cursor::new(&data[8..]);
            for extent in &mut extents {
                extent.start_block = cursor.read_u32::<BigEndian>()?;
                extent.block_count = cursor.read_u32::<BigEndian>()?;
            }
            Ok(AttributeBody::Extents(extents))
        }
        other => Err(HfsPlusError::Malformed(format!(
            "unknown attribute record type: 0x{other:08X}"
        ))),
    }
}

fn read_fork_data<R: Read>(reader: &mut R) -> Result<ForkData> {
    let logical_size = reader.read_u64::<BigEndian>()?;
    let clump_size = reader.read_u32::<BigEndian>()?;
    let total_blocks = reader.read_u32::<BigEndian>()?;
    let mut extents = [crate::volume::ExtentDescriptor::default(); 8];
    for extent in &mut extents {
        extent.start_block = reader.read_u32::<BigEndian>()?;
        extent.block_count = reader.read_u32::<BigEndian>()?;
    }
    Ok(ForkData {
        logical_size,
        clump_size,
        total_blocks,
        extents,
    })
}

/// Ordering used for attributes-tree descent: `cnid`, then name. Used only
/// to find the floor leaf for a bare `cnid` (target name is always empty,
/// which sorts before every real attribute name), so `start_block` never
/// needs to be part of the comparison here.
fn index_order(key: &AttributeKey, target_cnid: u32, target_name: &[u16], fold: bool) -> std::cmp::Ordering {
    key.cnid
        .cmp(&target_cnid)
        .then_with(|| name::compare(&key.name, target_name, fold))
}

/// C10: collect every attribute record belonging to `cnid`, in on-disk
/// (name, start_block) order. Thread-record-free: the attributes B-tree has
/// no sentinel entries, every leaf record under `cnid` is a real attribute.
pub fn attributes_of<R: Read + Seek>(
    btree: &BTreeReader<AttributeKey>,
    cache: &NodeCache<AttributeKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    cnid: u32,
    fold: bool,
) -> Result<Vec<AttributeRecord>> {
    if btree.header.root_node == 0 && btree.header.node_count == 0 {
        return Ok(Vec::new());
    }

    // Descend to the leftmost leaf that could hold `cnid`'s first record,
    // using an empty target name so index descent lands left of everything
    // sharing that cnid (mirrors catalog::list_directory's Q4 shape).
    let mut node_number = btree.header.root_node;
    let mut level = btree::ROOT_LEVEL;
    let mut hops = 0u32;

    let first_leaf = loop {
        hops += 1;
        if hops > btree.header.depth.min(node::MAX_LEVEL as u16) as u32 {
            return Err(HfsPlusError::DepthExceeded(hops));
        }
        let node = btree.get_node(reader, cache, abort, level, node_number)?;
        match node.descriptor.kind {
            node::NODE_KIND_LEAF => break node,
            node::NODE_KIND_INDEX => {
                let mut chosen = None;
                for i in 0..node.record_count() {
                    let key = node.cached_key_or_decode(i, |d| key::decode_attribute_key(d))?;
                    if index_order(key, cnid, &[], fold) != std::cmp::Ordering::Greater {
                        chosen = Some(i);
                    } else {
                        break;
                    }
                }
                let i = match chosen {
                    Some(i) => i,
                    None => return Ok(Vec::new()),
                };
                let key = node.cached_key_or_decode(i, |d| key::decode_attribute_key(d))?;
                let record = node.record_data(i)?;
                node_number = extract_child_number(record, key.payload_offset)?;
                level += 1;
            }
            other => {
                return Err(HfsPlusError::Malformed(format!(
                    "unexpected node kind {other} during attributes descent"
                )))
            }
        }
    };

    let leaf_level = level;
    let mut results = Vec::new();
    let mut current = first_leaf;
    let mut idx = 0usize;

    loop {
        if idx >= current.record_count() {
            let next = current.descriptor.forward_link;
            if next == 0 {
                break;
            }
            current = btree.get_node(reader, cache, abort, leaf_level, next)?;
            idx = 0;
            continue;
        }
        let key = current.cached_key_or_decode(idx, |d| key::decode_attribute_key(d))?;
        if key.cnid < cnid {
            idx += 1;
            continue;
        }
        if key.cnid > cnid {
            break;
        }
        let record_bytes = current.record_data(idx)?;
        let body = decode_record(&record_bytes[key.payload_offset..])?;
        results.push(AttributeRecord {
            cnid: key.cnid,
            name: key.name.clone(),
            start_block: key.start_block,
            body,
        });
        idx += 1;
    }

    Ok(results)
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
