//! Ambient entry-metadata mapping (C14): turns a catalog [`DirectoryEntry`]
//! into the caller-facing [`DirEntry`] / [`FileStat`] shapes, including BSD
//! symlink detection (`S_IFLNK`) and hard-link indirection.
//!
//! A hard-linked file's catalog record carries Finder type `'hlnk'` /
//! creator `'hfs+'`; its BSD `special` field (which overlaps the on-disk
//! `rawDevice` union member) then holds the CNID of the indirect node
//! living in the volume's private metadata folder. This module only
//! detects and surfaces that indirection — resolving it to the indirect
//! node's own catalog entry is the facade's job (it already owns
//! `entry_by_cnid`).

use crate::catalog::{CatalogRecord, DirectoryEntry};
use crate::error::{HfsPlusError, Result};
use crate::name;

/// BSD file-type mask and the symlink bit within it, as stored in
/// `HfsPlusBsdInfo::file_mode`.
pub const S_IFMT: u16 = 0xF000;
pub const S_IFLNK: u16 = 0xA000;

/// Finder type/creator stamped on a hard-link catalog record.
pub const HARD_LINK_FILE_TYPE: u32 = u32::from_be_bytes(*b"hlnk");
pub const HARD_LINK_CREATOR: u32 = u32::from_be_bytes(*b"hfs+");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// A file catalog record that indirects to another CNID (the private
    /// metadata folder's indirect node) rather than carrying its own forks.
    HardLink,
}

/// A directory entry returned by `list_directory` / `entry_by_*`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub cnid: u32,
    pub kind: EntryKind,
    pub size: u64,
    pub create_date: u32,
    pub modify_date: u32,
    /// Set only for [`EntryKind::HardLink`]: the CNID of the indirect node.
    pub indirect_node_id: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct HfsPermissions {
    pub owner_id: u32,
    pub group_id: u32,
    pub mode: u16,
}

/// Detailed file/directory metadata, as returned by `stat`.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub cnid: u32,
    pub kind: EntryKind,
    pub size: u64,
    pub create_date: u32,
    pub modify_date: u32,
    pub permissions: HfsPermissions,
    pub data_fork_extents: u32,
    pub resource_fork_size: u64,
    pub indirect_node_id: Option<u32>,
}

/// An entry yielded by `walk`, alongside its full `/`-separated path.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: String,
    pub entry: DirEntry,
}

fn classify_file(file: &crate::catalog::CatalogFile) -> (EntryKind, Option<u32>) {
    if file.permissions.file_mode & S_IFMT == S_IFLNK {
        return (EntryKind::Symlink, None);
    }
    if file.file_type == HARD_LINK_FILE_TYPE && file.creator == HARD_LINK_CREATOR {
        return (EntryKind::HardLink, Some(file.permissions.special));
    }
    (EntryKind::File, None)
}

fn thread_record_error() -> HfsPlusError {
    HfsPlusError::Malformed("directory entry resolved to a thread record, not a folder or file".to_string())
}

pub fn to_dir_entry(entry: &DirectoryEntry) -> Result<DirEntry> {
    let name = name::units_to_string(&entry.name);
    match &entry.record {
        CatalogRecord::Folder(folder) => Ok(DirEntry {
            name,
            cnid: folder.folder_id,
            kind: EntryKind::Directory,
            size: 0,
            create_date: folder.create_date,
            modify_date: folder.content_mod_date,
            indirect_node_id: None,
        }),
        CatalogRecord::File(file) => {
            let (kind, indirect_node_id) = classify_file(file);
            Ok(DirEntry {
                name,
                cnid: file.file_id,
                kind,
                size: file.data_fork.logical_size,
                create_date: file.create_date,
                modify_date: file.content_mod_date,
                indirect_node_id,
            })
        }
        CatalogRecord::FolderThread(_) | CatalogRecord::FileThread(_) => Err(thread_record_error()),
    }
}

pub fn to_file_stat(entry: &DirectoryEntry) -> Result<FileStat> {
    match &entry.record {
        CatalogRecord::Folder(folder) => Ok(FileStat {
            cnid: folder.folder_id,
            kind: EntryKind::Directory,
            size: 0,
            create_date: folder.create_date,
            modify_date: folder.content_mod_date,
            permissions: HfsPermissions {
                owner_id: folder.permissions.owner_id,
                group_id: folder.permissions.group_id,
                mode: folder.permissions.file_mode,
            },
            data_fork_extents: 0,
            resource_fork_size: 0,
            indirect_node_id: None,
        }),
        CatalogRecord::File(file) => {
            let (kind, indirect_node_id) = classify_file(file);
            Ok(FileStat {
                cnid: file.file_id,
                kind,
                size: file.data_fork.logical_size,
                create_date: file.create_date,
                modify_date: file.content_mod_date,
                permissions: HfsPermissions {
                    owner_id: file.permissions.owner_id,
                    group_id: file.permissions.group_id,
                    mode: file.permissions.file_mode,
                },
                data_fork_extents: file
                    .data_fork
                    .extents
                    .iter()
                    .filter(|e| e.block_count > 0)
                    .count() as u32,
                resource_fork_size: file.resource_fork.logical_size,
                indirect_node_id,
            })
        }
        CatalogRecord::FolderThread(_) | CatalogRecord::FileThread(_) => Err(thread_record_error()),
    }
}
