pub mod attributes;
pub mod btree;
pub mod cache;
pub mod catalog;
pub mod entry;
pub mod error;
pub mod extent;
pub mod extents;
pub mod key;
pub mod name;
pub mod node;
pub mod volume;

pub use entry::{DirEntry, EntryKind, FileStat, HfsPermissions, WalkEntry};
pub use error::{HfsPlusError, Result};
pub use volume::VolumeHeader;

use std::io::{Read, Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::debug;

use attributes::AttributeRecord;
use btree::BTreeReader;
use cache::NodeCache;
use catalog::{CatalogKey, DirectoryEntry};
use key::{AttributeKey, ExtentKey, FORK_KIND_DATA};
use volume::ExtentDescriptor;

/// Case folding and node-cache tuning a caller can override at open time.
/// Passed directly to `open` rather than read from a config file.
#[derive(Debug, Clone, Copy)]
pub struct FsOptions {
    /// Force case-folded (case-insensitive) or binary name comparison.
    /// Left `None`, folding is derived from the catalog B-tree's
    /// `key_compare_type`, falling back to the volume's HFSX signature.
    pub case_folding_override: Option<bool>,
    /// The `K` constant in the per-level node cache capacity `K*(level+1)`.
    pub cache_k: usize,
}

impl Default for FsOptions {
    fn default() -> Self {
        FsOptions {
            case_folding_override: None,
            cache_k: 16,
        }
    }
}

/// High-level HFS+/HFSX volume reader: owns the three B-tree readers plus
/// their caches (the catalog B-tree gets two, see [`cache`]) and serializes
/// access to the external image behind a mutex.
pub struct HfsVolume<R> {
    reader: Mutex<R>,
    header: VolumeHeader,
    fold: bool,
    abort: AtomicBool,

    catalog_btree: BTreeReader<CatalogKey>,
    catalog_cache_by_cnid: NodeCache<CatalogKey>,
    catalog_cache_by_name: NodeCache<CatalogKey>,

    extents_btree: BTreeReader<ExtentKey>,
    extents_cache: NodeCache<ExtentKey>,

    attributes_btree: Option<BTreeReader<AttributeKey>>,
    attributes_cache: NodeCache<AttributeKey>,
}

fn derive_fold(key_compare_type: u8, is_hfsx: bool, override_: Option<bool>) -> bool {
    if let Some(fold) = override_ {
        return fold;
    }
    match key_compare_type {
        0xCF => true,
        0xBC => false,
        _ => !is_hfsx,
    }
}

impl<R: Read + Seek> HfsVolume<R> {
    /// Open and validate an HFS+/HFSX volume, bootstrapping the
    /// extents-overflow B-tree first (it never has its own overflow, so its
    /// node vector is built directly from its inline descriptor) and using
    /// it to resolve the catalog's (and, if present, attributes') full
    /// extent lists before those B-trees are opened in turn.
    pub fn open(reader: R, options: FsOptions) -> Result<Self> {
        let mut reader = reader;
        let header = VolumeHeader::parse(&mut reader)?;
        debug!(
            block_size = header.block_size,
            is_hfsx = header.is_hfsx,
            "parsed HFS+ volume header"
        );

        let extents_inline: Vec<ExtentDescriptor> = header
            .extents_file
            .extents
            .iter()
            .filter(|e| e.block_count > 0)
            .cloned()
            .collect();
        let extents_btree: BTreeReader<ExtentKey> = BTreeReader::open(
            &mut reader,
            extents_inline,
            header.extents_file.logical_size,
            header.block_size,
        )?;
        let extents_cache: NodeCache<ExtentKey> = NodeCache::new(options.cache_k);

        let reader = Mutex::new(reader);
        let abort = AtomicBool::new(false);

        let catalog_extents = extents::extents_of(
            &extents_btree,
            &extents_cache,
            &reader,
            &abort,
            catalog::CNID_CATALOG_FILE,
            FORK_KIND_DATA,
            &header.catalog_file,
        )?;

        let mut guard = reader.lock().unwrap();
        let catalog_btree: BTreeReader<CatalogKey> = BTreeReader::open(
            &mut *guard,
            catalog_extents,
            header.catalog_file.logical_size,
            header.block_size,
        )?;
        drop(guard);

        let fold = derive_fold(
            catalog_btree.header.key_compare_type,
            header.is_hfsx,
            options.case_folding_override,
        );
        debug!(fold, "derived catalog name-comparison mode");

        let catalog_cache_by_cnid: NodeCache<CatalogKey> = NodeCache::new(options.cache_k);
        let catalog_cache_by_name: NodeCache<CatalogKey> = NodeCache::new(options.cache_k);

        let (attributes_btree, attributes_cache) = if header.attributes_file.total_blocks > 0
            || header.attributes_file.extents.iter().any(|e| e.block_count > 0)
        {
            let attr_extents = extents::extents_of(
                &extents_btree,
                &extents_cache,
                &reader,
                &abort,
                catalog::CNID_ATTRIBUTES_FILE,
                FORK_KIND_DATA,
                &header.attributes_file,
            )?;
            let mut guard = reader.lock().unwrap();
            let attr_btree: BTreeReader<AttributeKey> = BTreeReader::open(
                &mut *guard,
                attr_extents,
                header.attributes_file.logical_size,
                header.block_size,
            )?;
            drop(guard);
            (Some(attr_btree), NodeCache::new(options.cache_k))
        } else {
            (None, NodeCache::new(options.cache_k))
        };

        Ok(HfsVolume {
            reader,
            header,
            fold,
            abort,
            catalog_btree,
            catalog_cache_by_cnid,
            catalog_cache_by_name,
            extents_btree,
            extents_cache,
            attributes_btree,
            attributes_cache,
        })
    }

    /// Access the parsed volume header.
    pub fn volume_header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Signal cancellation to any traversal currently reading through this
    /// volume; the in-flight call unwinds with [`HfsPlusError::Aborted`].
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Q1: resolve a CNID to its directory entry.
    pub fn entry_by_cnid(&self, cnid: u32) -> Result<Option<DirectoryEntry>> {
        catalog::lookup_by_cnid(
            &self.catalog_btree,
            &self.catalog_cache_by_cnid,
            &self.reader,
            &self.abort,
            cnid,
            self.fold,
        )
    }

    /// Q2: resolve `(parent_cnid, name)` directly to its directory entry.
    pub fn entry_by_name(&self, parent_cnid: u32, name: &str) -> Result<Option<DirectoryEntry>> {
        let units = name::string_to_units(name);
        catalog::lookup_by_name(
            &self.catalog_btree,
            &self.catalog_cache_by_name,
            &self.reader,
            &self.abort,
            parent_cnid,
            &units,
            self.fold,
        )
    }

    /// Q3: resolve a `/`-separated path to its directory entry.
    pub fn entry_by_path(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        catalog::resolve_path(
            &self.catalog_btree,
            &self.catalog_cache_by_name,
            &self.reader,
            &self.abort,
            catalog::CNID_ROOT_FOLDER,
            path,
            self.fold,
        )
    }

    /// Q4: list every direct child of `parent_cnid`.
    pub fn list_directory(&self, parent_cnid: u32) -> Result<Vec<DirectoryEntry>> {
        catalog::list_directory(
            &self.catalog_btree,
            &self.catalog_cache_by_cnid,
            &self.reader,
            &self.abort,
            parent_cnid,
            self.fold,
        )
    }

    /// C9: resolve a fork's full extent list (inline plus any continuation
    /// extents recorded in the extents-overflow B-tree).
    pub fn extents_of(
        &self,
        cnid: u32,
        fork_kind: u8,
        inline: &volume::ForkData,
    ) -> Result<Vec<ExtentDescriptor>> {
        extents::extents_of(
            &self.extents_btree,
            &self.extents_cache,
            &self.reader,
            &self.abort,
            cnid,
            fork_kind,
            inline,
        )
    }

    /// C10: collect every named attribute record belonging to `cnid`. A
    /// volume with no attributes file returns an empty list.
    pub fn attributes_of(&self, cnid: u32) -> Result<Vec<AttributeRecord>> {
        let btree = match &self.attributes_btree {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        attributes::attributes_of(
            btree,
            &self.attributes_cache,
            &self.reader,
            &self.abort,
            cnid,
            self.fold,
        )
    }

    /// Metadata for a file or directory at `path`.
    pub fn stat(&self, path: &str) -> Result<Option<FileStat>> {
        match self.entry_by_path(path)? {
            Some(entry) => Ok(Some(entry::to_file_stat(&entry)?)),
            None => Ok(None),
        }
    }

    /// Open a file's data fork for streaming `Read + Seek` access.
    pub fn open_file(&self, path: &str) -> Result<Option<extents::ForkReader<'_, R>>> {
        let entry = match self.entry_by_path(path)? {
            Some(e) => e,
            None => return Ok(None),
        };
        let file = match &entry.record {
            catalog::CatalogRecord::File(f) => f,
            _ => {
                return Err(HfsPlusError::Malformed(format!(
                    "{path} is not a file"
                )))
            }
        };
        let resolved = self.extents_of(file.file_id, FORK_KIND_DATA, &file.data_fork)?;
        Ok(Some(extents::ForkReader::new(
            &self.reader,
            resolved,
            file.data_fork.logical_size,
            self.header.block_size,
        )))
    }

    /// Stream a file's data fork to `writer`, returning the number of bytes
    /// written.
    pub fn read_file_to<W: Write>(&self, path: &str, mut writer: W) -> Result<u64> {
        let mut reader = match self.open_file(path)? {
            Some(r) => r,
            None => {
                return Err(HfsPlusError::Malformed(format!(
                    "{path} does not exist"
                )))
            }
        };
        let written = std::io::copy(&mut reader, &mut writer)?;
        Ok(written)
    }

    /// Recursively enumerate every entry under the root directory,
    /// depth-first, alongside its full `/`-separated path.
    pub fn walk(&self) -> Result<Vec<WalkEntry>> {
        let mut entries = Vec::new();
        self.walk_recursive(catalog::CNID_ROOT_FOLDER, "", &mut entries)?;
        Ok(entries)
    }

    fn walk_recursive(&self, parent_cnid: u32, parent_path: &str, out: &mut Vec<WalkEntry>) -> Result<()> {
        for child in self.list_directory(parent_cnid)? {
            let dir_entry = entry::to_dir_entry(&child)?;
            let full_path = if parent_path.is_empty() {
                format!("/{}", dir_entry.name)
            } else {
                format!("{parent_path}/{}", dir_entry.name)
            };
            let is_dir = dir_entry.kind == EntryKind::Directory;
            let cnid = dir_entry.cnid;
            out.push(WalkEntry {
                path: full_path.clone(),
                entry: dir_entry,
            });
            if is_dir {
                self.walk_recursive(cnid, &full_path, out)?;
            }
        }
        Ok(())
    }
}
