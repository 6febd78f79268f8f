//! Integration test exercising the full façade end to end: a hand-built
//! HFS+ image with an empty root directory (scenario S1 in the design
//! notes this repo was built against).

use std::io::Cursor;

use byteorder::{BigEndian, WriteBytesExt};

use hfsplus::catalog::CatalogRecord;
use hfsplus::{FsOptions, HfsVolume};

const BLOCK_SIZE: u32 = 512;
const NODE_SIZE: u16 = 512;

fn write_fork(buf: &mut Vec<u8>, logical_size: u64, total_blocks: u32, start_block: u32, block_count: u32) {
    buf.write_u64::<BigEndian>(logical_size).unwrap();
    buf.write_u32::<BigEndian>(0).unwrap(); // clump_size
    buf.write_u32::<BigEndian>(total_blocks).unwrap();
    buf.write_u32::<BigEndian>(start_block).unwrap();
    buf.write_u32::<BigEndian>(block_count).unwrap();
    for _ in 0..7 {
        buf.write_u32::<BigEndian>(0).unwrap();
        buf.write_u32::<BigEndian>(0).unwrap();
    }
}

fn build_volume_header(catalog_start_block: u32, catalog_block_count: u32, extents_start_block: u32) -> Vec<u8> {
    let mut h = Vec::new();
    h.write_u16::<BigEndian>(0x482B).unwrap(); // signature
    h.write_u16::<BigEndian>(4).unwrap(); // version
    h.write_u32::<BigEndian>(0).unwrap(); // attributes
    h.write_u32::<BigEndian>(0).unwrap(); // last_mounted_version
    h.write_u32::<BigEndian>(0).unwrap(); // journal_info_block
    h.write_u32::<BigEndian>(0).unwrap(); // create_date
    h.write_u32::<BigEndian>(0).unwrap(); // modify_date
    h.write_u32::<BigEndian>(0).unwrap(); // backup_date
    h.write_u32::<BigEndian>(0).unwrap(); // checked_date
    h.write_u32::<BigEndian>(0).unwrap(); // file_count
    h.write_u32::<BigEndian>(1).unwrap(); // folder_count
    h.write_u32::<BigEndian>(BLOCK_SIZE).unwrap();
    h.write_u32::<BigEndian>(1000).unwrap(); // total_blocks
    h.write_u32::<BigEndian>(0).unwrap(); // free_blocks
    h.write_u32::<BigEndian>(0).unwrap(); // next_allocation
    h.write_u32::<BigEndian>(0).unwrap(); // rsrc_clump_size
    h.write_u32::<BigEndian>(0).unwrap(); // data_clump_size
    h.write_u32::<BigEndian>(16).unwrap(); // next_catalog_id
    h.write_u32::<BigEndian>(0).unwrap(); // write_count
    h.write_u64::<BigEndian>(0).unwrap(); // encoding_bitmap
    for _ in 0..8 {
        h.write_u32::<BigEndian>(0).unwrap(); // finder_info
    }
    write_fork(&mut h, 0, 0, 0, 0); // allocation_file, unused
    write_fork(&mut h, NODE_SIZE as u64, 1, extents_start_block, 1); // extents_file
    write_fork(
        &mut h,
        NODE_SIZE as u64 * catalog_block_count as u64,
        catalog_block_count,
        catalog_start_block,
        catalog_block_count,
    ); // catalog_file
    write_fork(&mut h, 0, 0, 0, 0); // attributes_file, none on this volume
    write_fork(&mut h, 0, 0, 0, 0); // startup_file
    h
}

fn header_node(depth: u16, root_node: u32, node_count: u32, key_compare_type: u8) -> Vec<u8> {
    let mut data = vec![0u8; NODE_SIZE as usize];
    data[8] = 1; // NODE_KIND_HEADER
    data[14..16].copy_from_slice(&depth.to_be_bytes());
    data[16..20].copy_from_slice(&root_node.to_be_bytes());
    data[32..34].copy_from_slice(&NODE_SIZE.to_be_bytes());
    data[36..40].copy_from_slice(&node_count.to_be_bytes());
    data[51] = key_compare_type;
    data
}

fn catalog_key_and_payload(parent_cnid: u32, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(&6u16.to_be_bytes()); // key_len: parent(4) + name_len(2)
    record.extend_from_slice(&parent_cnid.to_be_bytes());
    record.extend_from_slice(&0u16.to_be_bytes()); // name_len = 0
    record.extend_from_slice(payload);
    record
}

fn folder_payload(folder_id: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0x0001u16.to_be_bytes()); // RECORD_TYPE_FOLDER
    p.extend_from_slice(&0u16.to_be_bytes()); // flags
    p.extend_from_slice(&0u32.to_be_bytes()); // valence
    p.extend_from_slice(&folder_id.to_be_bytes());
    p.extend_from_slice(&[0u8; 4 * 5]); // create/content_mod/attr_mod/access/backup dates
    p.extend_from_slice(&[0u8; 16]); // BSD info
    p.extend_from_slice(&[0u8; 32]); // finder info
    p.extend_from_slice(&0u32.to_be_bytes()); // text_encoding
    p
}

fn thread_payload(parent_id: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0x0003u16.to_be_bytes()); // RECORD_TYPE_FOLDER_THREAD
    p.extend_from_slice(&0u16.to_be_bytes()); // reserved
    p.extend_from_slice(&parent_id.to_be_bytes());
    p.extend_from_slice(&0u16.to_be_bytes()); // name_len = 0
    p
}

fn leaf_node(records: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0u8; NODE_SIZE as usize];
    data[8] = 0xFF; // NODE_KIND_LEAF (-1 as u8)
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
        let pos = NODE_SIZE as usize - (i + 1) * 2;
        data[pos..pos + 2].copy_from_slice(&off.to_be_bytes());
    }
    data
}

fn build_empty_volume_image() -> Vec<u8> {
    // Block layout: extents-overflow B-tree at block 10 (header node only,
    // empty tree); catalog B-tree at block 20 (header + one leaf).
    let extents_start = 10u32;
    let catalog_start = 20u32;
    let catalog_blocks = 2u32;

    let mut image = vec![0u8; 30 * BLOCK_SIZE as usize];

    let vh = build_volume_header(catalog_start, catalog_blocks, extents_start);
    image[1024..1024 + vh.len()].copy_from_slice(&vh);

    let extents_header = header_node(0, 0, 0, 0xBC);
    let eo = (extents_start as usize) * BLOCK_SIZE as usize;
    image[eo..eo + NODE_SIZE as usize].copy_from_slice(&extents_header);

    let catalog_header = header_node(1, 1, 2, 0xBC);
    let co = (catalog_start as usize) * BLOCK_SIZE as usize;
    image[co..co + NODE_SIZE as usize].copy_from_slice(&catalog_header);

    let root_folder_record = catalog_key_and_payload(1, &folder_payload(2));
    let root_thread_record = catalog_key_and_payload(2, &thread_payload(1));
    let leaf = leaf_node(&[root_folder_record, root_thread_record]);
    let lo = co + NODE_SIZE as usize;
    image[lo..lo + NODE_SIZE as usize].copy_from_slice(&leaf);

    image
}

#[test]
fn empty_volume_root_has_no_children() {
    let image = build_empty_volume_image();
    let volume = HfsVolume::open(Cursor::new(image), FsOptions::default()).unwrap();

    assert_eq!(volume.list_directory(2).unwrap().len(), 0);

    let root = volume.entry_by_path("/").unwrap().expect("root must resolve");
    match root.record {
        CatalogRecord::Folder(f) => assert_eq!(f.folder_id, 2),
        other => panic!("expected root folder, got {other:?}"),
    }

    assert!(volume.entry_by_name(2, "absent").unwrap().is_none());
}

#[test]
fn walk_over_empty_volume_yields_no_entries() {
    let image = build_empty_volume_image();
    let volume = HfsVolume::open(Cursor::new(image), FsOptions::default()).unwrap();
    assert!(volume.walk().unwrap().is_empty());
}

#[test]
fn stat_on_missing_path_returns_none() {
    let image = build_empty_volume_image();
    let volume = HfsVolume::open(Cursor::new(image), FsOptions::default()).unwrap();
    assert!(volume.stat("/nope").unwrap().is_none());
}
