//! Decodes the on-disk key variants into semantic key objects: catalog keys,
//! extents-overflow keys, and attribute keys (HFS+/HFSX only).

use crate::error::{HfsPlusError, Result};
use crate::name;

/// A catalog key: `(parent_cnid, name)`, plus the byte offset of the record
/// payload that follows it and the name's comparator hash (computed eagerly
/// at decode time, since the owning `Node` already defers the decode itself
/// until first access).
#[derive(Clone)]
pub struct CatalogKey {
    pub parent_cnid: u32,
    pub name: Vec<u16>,
    pub hash: u32,
    pub payload_offset: usize,
}

fn check_len(record: &[u8], needed: usize) -> Result<()> {
    if record.len() < needed {
        return Err(HfsPlusError::Malformed(format!(
            "record of {} bytes too short for a {}-byte key",
            record.len(),
            needed
        )));
    }
    Ok(())
}

/// Decode an HFS+ catalog key: `key_len (u16), parent_cnid (u32), name_len
/// (u16), name (UTF-16BE, 2*name_len bytes)`.
pub fn decode_catalog_key_hfsplus(record: &[u8], fold: bool) -> Result<CatalogKey> {
    check_len(record, 8)?;
    let key_len = u16::from_be_bytes([record[0], record[1]]) as usize;
    let parent_cnid = u32::from_be_bytes(record[2..6].try_into().unwrap());
    let name_len = u16::from_be_bytes([record[6], record[7]]) as usize;

    if name_len > (u16::MAX as usize) / 2 {
        return Err(HfsPlusError::Malformed(format!(
            "catalog key name_len {name_len} exceeds u16::MAX / 2"
        )));
    }
    let name_end = 8 + name_len * 2;
    check_len(record, name_end)?;
    if 2 + key_len > record.len() {
        return Err(HfsPlusError::Malformed(format!(
            "catalog key_len {key_len} overruns the {}-byte record",
            record.len()
        )));
    }

    let name = name::utf16be_to_units(&record[8..name_end]);
    let hash = name::hash(&name, fold);
    Ok(CatalogKey {
        parent_cnid,
        name,
        hash,
        payload_offset: 2 + key_len,
    })
}

/// An extents-overflow key: `(cnid, fork_kind, start_block)`.
#[derive(Clone)]
pub struct ExtentKey {
    pub cnid: u32,
    pub fork_kind: u8,
    pub start_block: u32,
    pub payload_offset: usize,
}

pub const FORK_KIND_DATA: u8 = 0x00;
pub const FORK_KIND_RESOURCE: u8 = 0xff;

/// Decode an HFS+ extents key: `key_len (u16), fork_kind (u8), _pad (u8),
/// cnid (u32), start_block (u32)`.
pub fn decode_extent_key_hfsplus(record: &[u8]) -> Result<ExtentKey> {
    check_len(record, 12)?;
    let key_len = u16::from_be_bytes([record[0], record[1]]) as usize;
    let fork_kind = record[2];
    let cnid = u32::from_be_bytes(record[4..8].try_into().unwrap());
    let start_block = u32::from_be_bytes(record[8..12].try_into().unwrap());
    if 2 + key_len > record.len() {
        return Err(HfsPlusError::Malformed(format!(
            "extent key_len {key_len} overruns the {}-byte record",
            record.len()
        )));
    }
    Ok(ExtentKey {
        cnid,
        fork_kind,
        start_block,
        payload_offset: 2 + key_len,
    })
}

/// An attribute key: `(cnid, start_block, name)`.
#[derive(Clone)]
pub struct AttributeKey {
    pub cnid: u32,
    pub start_block: u32,
    pub name: Vec<u16>,
    pub payload_offset: usize,
}

/// Decode an attribute key: `key_len (u16), _pad (u16), cnid (u32),
/// start_block (u32), name_len (u16), name (UTF-16BE, 2*name_len bytes)`.
pub fn decode_attribute_key(record: &[u8]) -> Result<AttributeKey> {
    check_len(record, 14)?;
    let key_len = u16::from_be_bytes([record[0], record[1]]) as usize;
    let cnid = u32::from_be_bytes(record[4..8].try_into().unwrap());
    let start_block = u32::from_be_bytes(record[8..12].try_into().unwrap());
    let name_len = u16::from_be_bytes([record[12], record[13]]) as usize;
    if name_len > (u16::MAX as usize) / 2 {
        return Err(HfsPlusError::Malformed(format!(
            "attribute key name_len {name_len} exceeds u16::MAX / 2"
        )));
    }
    let name_end = 14 + name_len * 2;
    check_len(record, name_end)?;
    if 2 + key_len > record.len() {
        return Err(HfsPlusError::Malformed(format!(
            "attribute key_len {key_len} overruns the {}-byte record",
            record.len()
        )));
    }
    let name = name::utf16be_to_units(&record[14..name_end]);
    Ok(AttributeKey {
        cnid,
        start_block,
        name,
        payload_offset: 2 + key_len,
    })
}
