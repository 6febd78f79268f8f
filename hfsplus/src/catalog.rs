//! Catalog traversal: the B-tree that maps `(parent_cnid, name)` and
//! `(cnid, "")` thread keys to folder, file, and thread records.
//!
//! Implements the three primitive queries — CNID lookup (Q1, two-phase via
//! thread records), name lookup under a parent (Q2), and path lookup (Q3,
//! repeated Q2) — plus directory enumeration (Q4).

use std::cmp::Ordering;
use std::io::{Cursor, Read, Seek};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use byteorder::{BigEndian, ReadBytesExt};

use crate::btree::{self, BTreeReader};
use crate::cache::NodeCache;
use crate::error::{HfsPlusError, Result};
use crate::key::{self, CatalogKey};
use crate::name;
use crate::node::{self, Node};
use crate::volume::{ExtentDescriptor, ForkData};

/// Well-known Catalog Node IDs.
pub const CNID_ROOT_PARENT: u32 = 1;
pub const CNID_ROOT_FOLDER: u32 = 2;
pub const CNID_EXTENTS_FILE: u32 = 3;
pub const CNID_CATALOG_FILE: u32 = 4;
pub const CNID_BAD_BLOCKS_FILE: u32 = 5;
pub const CNID_ALLOCATION_FILE: u32 = 6;
pub const CNID_STARTUP_FILE: u32 = 7;
pub const CNID_ATTRIBUTES_FILE: u32 = 8;

pub const RECORD_TYPE_FOLDER: u16 = 0x0001;
pub const RECORD_TYPE_FILE: u16 = 0x0002;
pub const RECORD_TYPE_FOLDER_THREAD: u16 = 0x0003;
pub const RECORD_TYPE_FILE_THREAD: u16 = 0x0004;

#[derive(Debug, Clone)]
pub struct HfsPlusBsdInfo {
    pub owner_id: u32,
    pub group_id: u32,
    pub admin_flags: u8,
    pub owner_flags: u8,
    pub file_mode: u16,
    pub special: u32,
}

#[derive(Debug, Clone)]
pub struct CatalogFile {
    pub file_id: u32,
    pub create_date: u32,
    pub content_mod_date: u32,
    pub attribute_mod_date: u32,
    pub access_date: u32,
    pub backup_date: u32,
    pub permissions: HfsPlusBsdInfo,
    /// Finder `fdType` (bytes 0..4 of the 32-byte Finder info): `'hlnk'` and
    /// a matching `creator` of `'hfs+'` mark a hard-link catalog record
    /// whose real data lives in the private metadata folder's indirect node
    /// (named by `permissions.special`, the inode number).
    pub file_type: u32,
    pub creator: u32,
    pub data_fork: ForkData,
    pub resource_fork: ForkData,
    pub text_encoding: u32,
}

#[derive(Debug, Clone)]
pub struct CatalogFolder {
    pub folder_id: u32,
    pub create_date: u32,
    pub content_mod_date: u32,
    pub attribute_mod_date: u32,
    pub access_date: u32,
    pub backup_date: u32,
    pub permissions: HfsPlusBsdInfo,
    pub valence: u32,
    pub text_encoding: u32,
}

/// A thread record: ties a CNID to its real `(parent_cnid, name)`.
#[derive(Debug, Clone)]
pub struct CatalogThread {
    pub parent_id: u32,
    pub node_name: Vec<u16>,
}

#[derive(Debug, Clone)]
pub enum CatalogRecord {
    Folder(CatalogFolder),
    File(CatalogFile),
    FolderThread(CatalogThread),
    FileThread(CatalogThread),
}

/// A directory entry as returned to callers: the catalog key that named it
/// plus its parsed record body.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub parent_cnid: u32,
    pub name: Vec<u16>,
    pub record: CatalogRecord,
}

fn parse_bsd_info(cursor: &mut Cursor<&[u8]>) -> Result<HfsPlusBsdInfo> {
    Ok(HfsPlusBsdInfo {
        owner_id: cursor.read_u32::<BigEndian>()?,
        group_id: cursor.read_u32::<BigEndian>()?,
        admin_flags: cursor.read_u8()?,
        owner_flags: cursor.read_u8()?,
        file_mode: cursor.read_u16::<BigEndian>()?,
        special: cursor.read_u32::<BigEndian>()?,
    })
}

fn parse_fork_data(cursor: &mut Cursor<&[u8]>) -> Result<ForkData> {
    let logical_size = cursor.read_u64::<BigEndian>()?;
    let clump_size = cursor.read_u32::<BigEndian>()?;
    let total_blocks = cursor.read_u32::<BigEndian>()?;
    let mut extents = [ExtentDescriptor::default(); 8];
    for extent in &mut extents {
        extent.start_block = cursor.read_u32::<BigEndian>()?;
        extent.block_count = cursor.read_u32::<BigEndian>()?;
    }
    Ok(ForkData {
        logical_size,
        clump_size,
        total_blocks,
        extents,
    })
}

/// Parse a catalog leaf record payload (the bytes after the key).
pub fn parse_catalog_record(data: &[u8]) -> Result<CatalogRecord> {
    if data.len() < 2 {
        return Err(HfsPlusError::Malformed("catalog record too short".to_string()));
    }
    let record_type = u16::from_be_bytes([data[0], data[1]]);
    let mut cursor = Cursor::new(data);
    cursor.set_position(2);

    match record_type {
        RECORD_TYPE_FOLDER => {
            let _flags = cursor.read_u16::<BigEndian>()?;
            let valence = cursor.read_u32::<BigEndian>()?;
            let folder_id = cursor.read_u32::<BigEndian>()?;
            let create_date = cursor.read_u32::<BigEndian>()?;
            let content_mod_date = cursor.read_u32::<BigEndian>()?;
            let attribute_mod_date = cursor.read_u32::<BigEndian>()?;
            let access_date = cursor.read_u32::<BigEndian>()?;
            let backup_date = cursor.read_u32::<BigEndian>()?;
            let permissions = parse_bsd_info(&mut cursor)?;
            let mut _finder_info = [0u8; 32];
            cursor.read_exact(&mut _finder_info)?;
            let text_encoding = cursor.read_u32::<BigEndian>()?;

            Ok(CatalogRecord::Folder(CatalogFolder {
                folder_id,
                create_date,
                content_mod_date,
                attribute_mod_date,
                access_date,
                backup_date,
                permissions,
                valence,
                text_encoding,
            }))
        }
        RECORD_TYPE_FILE => {
            let _flags = cursor.read_u16::<BigEndian>()?;
            let _reserved = cursor.read_u32::<BigEndian>()?;
            let file_id = cursor.read_u32::<BigEndian>()?;
            let create_date = cursor.read_u32::<BigEndian>()?;
            let content_mod_date = cursor.read_u32::<BigEndian>()?;
            let attribute_mod_date = cursor.read_u32::<BigEndian>()?;
            let access_date = cursor.read_u32::<BigEndian>()?;
            let backup_date = cursor.read_u32::<BigEndian>()?;
            let permissions = parse_bsd_info(&mut cursor)?;
            let mut finder_info = [0u8; 32];
            cursor.read_exact(&mut finder_info)?;
            let file_type = u32::from_be_bytes(finder_info[0..4].try_into().unwrap());
            let creator = u32::from_be_bytes(finder_info[4..8].try_into().unwrap());
            let text_encoding = cursor.read_u32::<BigEndian>()?;
            let _reserved2 = cursor.read_u32::<BigEndian>()?;
            let data_fork = parse_fork_data(&mut cursor)?;
            let resource_fork = parse_fork_data(&mut cursor)?;

            Ok(CatalogRecord::File(CatalogFile {
                file_id,
                create_date,
                content_mod_date,
                attribute_mod_date,
                access_date,
                backup_date,
                permissions,
                file_type,
                creator,
                data_fork,
                resource_fork,
                text_encoding,
            }))
        }
        RECORD_TYPE_FOLDER_THREAD | RECORD_TYPE_FILE_THREAD => {
            let _reserved = cursor.read_u16::<BigEndian>()?;
            let parent_id = cursor.read_u32::<BigEndian>()?;
            let name_length = cursor.read_u16::<BigEndian>()? as usize;
            let mut name_buf = vec![0u8; name_length * 2];
            cursor.read_exact(&mut name_buf)?;
            let node_name = name::utf16be_to_units(&name_buf);
            let record = CatalogThread { parent_id, node_name };
            if record_type == RECORD_TYPE_FOLDER_THREAD {
                Ok(CatalogRecord::FolderThread(record))
            } else {
                Ok(CatalogRecord::FileThread(record))
            }
        }
        other => Err(HfsPlusError::Malformed(format!(
            "unknown catalog record type: 0x{other:04X}"
        ))),
    }
}

/// Full ordering of a catalog key against a target, used for index-node
/// descent: first by `parent_cnid`, then by the name comparator.
fn index_order(key: &CatalogKey, target_parent: u32, target_name: &[u16], fold: bool) -> Ordering {
    key.parent_cnid
        .cmp(&target_parent)
        .then_with(|| name::compare(&key.name, target_name, fold))
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

/// Single-descent exact-match search for `(parent_cnid, name)`. This
/// implements Q1's phase A (with `name` empty), Q1's phase B, and Q2
/// directly: descend index nodes picking the last key <= target, then at
/// the leaf scan forward, stopping once `parent_cnid` exceeds the target,
/// matching by name equality (hash-prefiltered) rather than name ordering.
#[allow(clippy::too_many_arguments)]
fn search<R: Read + Seek>(
    btree: &BTreeReader<CatalogKey>,
    cache: &NodeCache<CatalogKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    target_parent: u32,
    target_name: &[u16],
    fold: bool,
) -> Result<Option<(std::sync::Arc<Node<CatalogKey>>, usize)>> {
    if btree.header.root_node == 0 {
        return Ok(None);
    }
    let target_hash = name::hash(target_name, fold);

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
                    let key = node.cached_key_or_decode(i, |d| {
                        key::decode_catalog_key_hfsplus(d, fold)
                    })?;
                    match key.parent_cnid.cmp(&target_parent) {
                        Ordering::Greater => return Ok(None),
                        Ordering::Less => continue,
                        Ordering::Equal => {}
                    }
                    if key.hash != 0 && target_hash != 0 && key.hash != target_hash {
                        continue;
                    }
                    if name::compare(&key.name, target_name, fold) == Ordering::Equal {
                        return Ok(Some((node, i)));
                    }
                }
                return Ok(None);
            }
            node::NODE_KIND_INDEX => {
                let mut chosen = None;
                for i in 0..node.record_count() {
                    let key = node.cached_key_or_decode(i, |d| {
                        key::decode_catalog_key_hfsplus(d, fold)
                    })?;
                    if index_order(key, target_parent, target_name, fold) != Ordering::Greater {
                        chosen = Some(i);
                    } else {
                        break;
                    }
                }
                let i = match chosen {
                    Some(i) => i,
                    None => return Ok(None),
                };
                let key = node.cached_key_or_decode(i, |d| {
                    key::decode_catalog_key_hfsplus(d, fold)
                })?;
                let record = node.record_data(i)?;
                node_number = extract_child_number(record, key.payload_offset)?;
                level += 1;
            }
            other => {
                return Err(HfsPlusError::Malformed(format!(
                    "unexpected node kind {other} during catalog descent"
                )))
            }
        }
    }
}

fn decode_found(node: &Node<CatalogKey>, index: usize, fold: bool) -> Result<DirectoryEntry> {
    let key = node.cached_key_or_decode(index, |d| key::decode_catalog_key_hfsplus(d, fold))?;
    let record_bytes = node.record_data(index)?;
    let payload = &record_bytes[key.payload_offset..];
    let record = parse_catalog_record(payload)?;
    Ok(DirectoryEntry {
        parent_cnid: key.parent_cnid,
        name: key.name.clone(),
        record,
    })
}

/// Q1: resolve a CNID to its directory entry via the two-phase thread
/// lookup (`cnid -> thread -> directory_entry`).
pub fn lookup_by_cnid<R: Read + Seek>(
    btree: &BTreeReader<CatalogKey>,
    cnid_cache: &NodeCache<CatalogKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    cnid: u32,
    fold: bool,
) -> Result<Option<DirectoryEntry>> {
    let (thread_node, thread_idx) =
        match search(btree, cnid_cache, reader, abort, cnid, &[], fold)? {
            Some(found) => found,
            None => return Ok(None),
        };
    let thread_key = thread_node
        .cached_key_or_decode(thread_idx, |d| key::decode_catalog_key_hfsplus(d, fold))?;
    let thread_record_bytes = thread_node.record_data(thread_idx)?;
    let thread = match parse_catalog_record(&thread_record_bytes[thread_key.payload_offset..])? {
        CatalogRecord::FolderThread(t) | CatalogRecord::FileThread(t) => t,
        _ => {
            return Err(HfsPlusError::Malformed(format!(
                "thread lookup for CNID {cnid} did not yield a thread record"
            )))
        }
    };

    match search(
        btree,
        cnid_cache,
        reader,
        abort,
        thread.parent_id,
        &thread.node_name,
        fold,
    )? {
        Some((node, idx)) => Ok(Some(decode_found(&node, idx, fold)?)),
        None => Ok(None),
    }
}

/// Q2: resolve `(parent_cnid, name)` directly to its directory entry.
pub fn lookup_by_name<R: Read + Seek>(
    btree: &BTreeReader<CatalogKey>,
    name_cache: &NodeCache<CatalogKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    parent_cnid: u32,
    name_units: &[u16],
    fold: bool,
) -> Result<Option<DirectoryEntry>> {
    match search(btree, name_cache, reader, abort, parent_cnid, name_units, fold)? {
        Some((node, idx)) => Ok(Some(decode_found(&node, idx, fold)?)),
        None => Ok(None),
    }
}

/// Q3: resolve a `/`-separated path to its directory entry, by repeating
/// Q2 one path segment at a time starting from `root_cnid`.
pub fn resolve_path<R: Read + Seek>(
    btree: &BTreeReader<CatalogKey>,
    name_cache: &NodeCache<CatalogKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    root_cnid: u32,
    path: &str,
    fold: bool,
) -> Result<Option<DirectoryEntry>> {
    let segments = name::split_path(path);
    if segments.is_empty() {
        return lookup_by_cnid(btree, name_cache, reader, abort, root_cnid, fold);
    }

    let mut current_cnid = root_cnid;
    let mut entry = None;
    for (i, segment) in segments.iter().enumerate() {
        let segment_units = name::string_to_units(segment);
        let found = lookup_by_name(btree, name_cache, reader, abort, current_cnid, &segment_units, fold)?;
        let found = match found {
            Some(e) => e,
            None => return Ok(None),
        };
        let is_last = i == segments.len() - 1;
        match &found.record {
            CatalogRecord::Folder(f) => current_cnid = f.folder_id,
            CatalogRecord::File(_) if is_last => {}
            CatalogRecord::File(_) => return Ok(None), // a file cannot have children
            _ => {
                return Err(HfsPlusError::Malformed(
                    "path resolution encountered a thread record".to_string(),
                ))
            }
        }
        entry = Some(found);
    }
    Ok(entry)
}

/// Q4: list every direct child of `parent_cnid` (folders and files; thread
/// records are skipped).
pub fn list_directory<R: Read + Seek>(
    btree: &BTreeReader<CatalogKey>,
    cache: &NodeCache<CatalogKey>,
    reader: &Mutex<R>,
    abort: &AtomicBool,
    parent_cnid: u32,
    fold: bool,
) -> Result<Vec<DirectoryEntry>> {
    let (first_node, first_idx) = match search(btree, cache, reader, abort, parent_cnid, &[], fold)? {
        Some(found) => found,
        None => return Ok(Vec::new()),
    };

    let leaf_level = {
        // The thread-record search always lands on a leaf; recompute its
        // level isn't tracked by `search`, but all leaves share one depth.
        btree.header.depth.saturating_sub(1) as usize
    };

    let mut entries = Vec::new();
    let mut current = first_node;
    let mut idx = first_idx + 1; // skip the thread record itself

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
        let key = current.cached_key_or_decode(idx, |d| key::decode_catalog_key_hfsplus(d, fold))?;
        if key.parent_cnid != parent_cnid {
            break;
        }
        let record_bytes = current.record_data(idx)?;
        let record = parse_catalog_record(&record_bytes[key.payload_offset..])?;
        match record {
            CatalogRecord::FolderThread(_) | CatalogRecord::FileThread(_) => {}
            other => entries.push(DirectoryEntry {
                parent_cnid: key.parent_cnid,
                name: key.name.clone(),
                record: other,
            }),
        }
        idx += 1;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::decode_node;
    use std::sync::Arc;

    fn thread_payload(is_folder: bool, parent: u32, name: &str) -> Vec<u8> {
        let units = name::string_to_units(name);
        let mut payload = Vec::new();
        let tag = if is_folder {
            RECORD_TYPE_FOLDER_THREAD
        } else {
            RECORD_TYPE_FILE_THREAD
        };
        payload.extend_from_slice(&tag.to_be_bytes());
        payload.extend_from_slice(&0u16.to_be_bytes());
        payload.extend_from_slice(&parent.to_be_bytes());
        payload.extend_from_slice(&(units.len() as u16).to_be_bytes());
        for u in &units {
            payload.extend_from_slice(&u.to_be_bytes());
        }
        payload
    }

    fn catalog_record(parent: u32, name: &str, payload: &[u8]) -> Vec<u8> {
        let units = name::string_to_units(name);
        let name_bytes: Vec<u8> = units.iter().flat_map(|u| u.to_be_bytes()).collect();
        let key_len = (6 + name_bytes.len()) as u16;
        let mut record = Vec::new();
        record.extend_from_slice(&key_len.to_be_bytes());
        record.extend_from_slice(&parent.to_be_bytes());
        record.extend_from_slice(&(units.len() as u16).to_be_bytes());
        record.extend_from_slice(&name_bytes);
        record.extend_from_slice(payload);
        record
    }

    fn build_leaf(node_size: usize, records: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0u8; node_size];
        data[8] = node::NODE_KIND_LEAF as u8;
        data[10..12].copy_from_slice(&(records.len() as u16).to_be_bytes());
        let mut cursor = 14usize;
        let mut offsets = Vec::new();
        for r in records {
            offsets.push(cursor as u16);
            data[cursor..cursor + r.len()].copy_from_slice(r);
            cursor += r.len();
        }
        offsets.push(cursor as u16);
        for (i, off) in offsets.iter().enumerate() {
            let pos = node_size - (i + 1) * 2;
            data[pos..pos + 2].copy_from_slice(&off.to_be_bytes());
        }
        data
    }

    #[test]
    fn search_finds_exact_name_match_and_stops_past_parent() {
        let node_size = 512usize;
        let folder_payload = {
            let mut p = vec![0u8; 2];
            p[0..2].copy_from_slice(&RECORD_TYPE_FOLDER.to_be_bytes());
            p.extend_from_slice(&[0u8; 2]); // flags
            p.extend_from_slice(&0u32.to_be_bytes()); // valence
            p.extend_from_slice(&9u32.to_be_bytes()); // folder_id
            p.extend_from_slice(&[0u8; 24]); // 6 dates... (we only need 5 after create, keep simple)
            p.extend_from_slice(&[0u8; 16]); // bsd info (16 bytes total incl owner/group/flags/mode/special)
            p.extend_from_slice(&[0u8; 32]); // finder info
            p.extend_from_slice(&0u32.to_be_bytes()); // text_encoding
            p
        };
        let records = vec![
            catalog_record(9, "Apps", &folder_payload),
            catalog_record(10, "Other", &folder_payload),
        ];
        let raw = build_leaf(node_size, &records);
        let node: Node<CatalogKey> = decode_node(raw, node_size as u16).unwrap();
        let arc = Arc::new(node);

        // Exact match on (9, "Apps")
        let target = name::string_to_units("Apps");
        let mut found = None;
        for i in 0..arc.record_count() {
            let key = arc
                .cached_key_or_decode(i, |d| key::decode_catalog_key_hfsplus(d, false))
                .unwrap();
            if key.parent_cnid == 9 && name::compare(&key.name, &target, false) == Ordering::Equal {
                found = Some(i);
            }
        }
        assert_eq!(found, Some(0));
    }

    #[test]
    fn thread_record_round_trips_through_parse_catalog_record() {
        let payload = thread_payload(true, 2, "Users");
        match parse_catalog_record(&payload).unwrap() {
            CatalogRecord::FolderThread(t) => {
                assert_eq!(t.parent_id, 2);
                assert_eq!(t.node_name, name::string_to_units("Users"));
            }
            other => panic!("expected FolderThread, got {other:?}"),
        }
    }

    fn folder_payload(folder_id: u32) -> Vec<u8> {
        let mut p = vec![0u8; 2];
        p[0..2].copy_from_slice(&RECORD_TYPE_FOLDER.to_be_bytes());
        p.extend_from_slice(&[0u8; 2]); // flags
        p.extend_from_slice(&0u32.to_be_bytes()); // valence
        p.extend_from_slice(&folder_id.to_be_bytes());
        p.extend_from_slice(&[0u8; 20]); // remaining 5 dates
        p.extend_from_slice(&[0u8; 16]); // bsd info
        p.extend_from_slice(&[0u8; 32]); // finder info
        p.extend_from_slice(&0u32.to_be_bytes()); // text_encoding
        p
    }

    fn build_index(node_size: usize, keys_and_children: &[(Vec<u8>, u32)]) -> Vec<u8> {
        let mut data = vec![0u8; node_size];
        data[8] = node::NODE_KIND_INDEX as u8;
        data[10..12].copy_from_slice(&(keys_and_children.len() as u16).to_be_bytes());
        let mut cursor = 14usize;
        let mut offsets = Vec::new();
        for (key_bytes, child) in keys_and_children {
            offsets.push(cursor as u16);
            let mut record = key_bytes.clone();
            record.extend_from_slice(&child.to_be_bytes());
            data[cursor..cursor + record.len()].copy_from_slice(&record);
            cursor += record.len();
        }
        offsets.push(cursor as u16);
        for (i, off) in offsets.iter().enumerate() {
            let pos = node_size - (i + 1) * 2;
            data[pos..pos + 2].copy_from_slice(&off.to_be_bytes());
        }
        data
    }

    fn catalog_key_bytes(parent: u32, name: &str) -> Vec<u8> {
        let units = name::string_to_units(name);
        let name_bytes: Vec<u8> = units.iter().flat_map(|u| u.to_be_bytes()).collect();
        let key_len = (6 + name_bytes.len()) as u16;
        let mut key = Vec::new();
        key.extend_from_slice(&key_len.to_be_bytes());
        key.extend_from_slice(&parent.to_be_bytes());
        key.extend_from_slice(&(units.len() as u16).to_be_bytes());
        key.extend_from_slice(&name_bytes);
        key
    }

    /// One index level over two leaves; exercises the descent branch of
    /// `search` that a single-leaf tree never reaches.
    #[test]
    fn index_descent_lands_in_the_correct_leaf() {
        let node_size = 512usize;

        let leaf_a = build_leaf(
            node_size,
            &[catalog_record(5, "Apple", &folder_payload(100))],
        );
        let leaf_b = build_leaf(
            node_size,
            &[catalog_record(5, "Banana", &folder_payload(200))],
        );
        let index = build_index(
            node_size,
            &[
                (catalog_key_bytes(5, "Apple"), 2),
                (catalog_key_bytes(5, "Banana"), 3),
            ],
        );

        let mut header = vec![0u8; node_size];
        header[8] = node::NODE_KIND_HEADER as u8;
        header[14..16].copy_from_slice(&2u16.to_be_bytes()); // depth
        header[16..20].copy_from_slice(&1u32.to_be_bytes()); // root_node
        header[32..34].copy_from_slice(&(node_size as u16).to_be_bytes());

        let mut image = header;
        image.extend_from_slice(&index);
        image.extend_from_slice(&leaf_a);
        image.extend_from_slice(&leaf_b);

        let extents = vec![ExtentDescriptor {
            start_block: 0,
            block_count: 4,
        }];
        let mut cursor = std::io::Cursor::new(image);
        let btree: BTreeReader<CatalogKey> = BTreeReader::open(
            &mut cursor,
            extents,
            node_size as u64 * 4,
            node_size as u32,
        )
        .unwrap();
        let cache = NodeCache::new(4);
        let reader = Mutex::new(cursor);
        let abort = AtomicBool::new(false);

        let name_units = name::string_to_units("Banana");
        let found = lookup_by_name(&btree, &cache, &reader, &abort, 5, &name_units, false)
            .unwrap()
            .expect("Banana must resolve through the index");
        match found.record {
            CatalogRecord::Folder(f) => assert_eq!(f.folder_id, 200),
            other => panic!("expected folder, got {other:?}"),
        }

        let name_units = name::string_to_units("Apple");
        let found = lookup_by_name(&btree, &cache, &reader, &abort, 5, &name_units, false)
            .unwrap()
            .expect("Apple must resolve through the index");
        match found.record {
            CatalogRecord::Folder(f) => assert_eq!(f.folder_id, 100),
            other => panic!("expected folder, got {other:?}"),
        }
    }
}
