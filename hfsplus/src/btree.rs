//! Generic B-tree reader: bootstraps from the header node, resolves node
//! numbers to raw bytes via the node vector, and hands back decoded nodes
//! through a caller-supplied [`NodeCache`].

use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::cache::NodeCache;
use crate::error::{HfsPlusError, Result};
use crate::node::{self, Node};
use crate::volume::ExtentDescriptor;

/// The root node is always fetched at cache level 0; any deeper level is
/// the parent's level plus one.
pub const ROOT_LEVEL: usize = 0;

#[derive(Debug, Clone, Copy)]
pub struct BTreeHeader {
    pub depth: u16,
    pub root_node: u32,
    pub leaf_record_count: u32,
    pub first_leaf_node: u32,
    pub last_leaf_node: u32,
    pub node_size: u16,
    pub max_key_size: u16,
    pub node_count: u32,
    pub free_node_count: u32,
    pub key_compare_type: u8,
    pub attributes: u32,
}

/// Resolves node N's raw bytes by walking a fully-resolved extent list
/// (inline extents plus any continuation extents already folded in by the
/// extents-overflow traversal at open time).
struct NodeVector {
    extents: Vec<ExtentDescriptor>,
    block_size: u32,
    node_size: u16,
    total_nodes: u32,
}

impl NodeVector {
    fn read_node<R: Read + Seek>(&self, reader: &mut R, node_number: u32) -> Result<Vec<u8>> {
        if node_number >= self.total_nodes {
            return Err(HfsPlusError::OutOfRange(format!(
                "node {node_number} >= total node count {}",
                self.total_nodes
            )));
        }
        let logical_offset = node_number as u64 * self.node_size as u64;
        let (image_offset, extent_remaining) =
            crate::extent::locate(logical_offset, &self.extents, self.block_size)?;
        if extent_remaining < self.node_size as u64 {
            return Err(HfsPlusError::Malformed(format!(
                "node {node_number} straddles an extent boundary"
            )));
        }
        let mut buf = vec![0u8; self.node_size as usize];
        reader.seek(SeekFrom::Start(image_offset))?;
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// A generic B-tree reader, instantiated once per key type `K` (catalog,
/// extents overflow, or attributes). Does not own a cache: callers pass one
/// in explicitly, which is what lets the catalog B-tree be shared by two
/// independent caches (one per query shape) without duplicating the reader.
pub struct BTreeReader<K> {
    pub header: BTreeHeader,
    vector: NodeVector,
    _marker: std::marker::PhantomData<K>,
}

impl<K> BTreeReader<K> {
    /// Open a B-tree whose fork is already fully resolved into
    /// `resolved_extents` (see the node-vector documentation in `extent.rs`
    /// / the design notes on the bootstrap problem).
    pub fn open<R: Read + Seek>(
        reader: &mut R,
        resolved_extents: Vec<ExtentDescriptor>,
        fork_logical_size: u64,
        block_size: u32,
    ) -> Result<Self> {
        // Read the first 512 bytes: descriptor (14) + header record, enough
        // to learn node_size before we can size further reads.
        let (image_offset, extent_remaining) =
            crate::extent::locate(0, &resolved_extents, block_size)?;
        if extent_remaining < 512 {
            return Err(HfsPlusError::Malformed(
                "B-tree header node shorter than 512 bytes".to_string(),
            ));
        }
        let mut head = vec![0u8; 512];
        reader.seek(SeekFrom::Start(image_offset))?;
        reader.read_exact(&mut head)?;

        let kind = head[8] as i8;
        if kind != node::NODE_KIND_HEADER {
            return Err(HfsPlusError::Malformed(format!(
                "expected header node (kind {}), found kind {kind}",
                node::NODE_KIND_HEADER
            )));
        }

        let depth = u16::from_be_bytes([head[14], head[15]]);
        let root_node = u32::from_be_bytes(head[16..20].try_into().unwrap());
        let leaf_record_count = u32::from_be_bytes(head[20..24].try_into().unwrap());
        let first_leaf_node = u32::from_be_bytes(head[24..28].try_into().unwrap());
        let last_leaf_node = u32::from_be_bytes(head[28..32].try_into().unwrap());
        let node_size = u16::from_be_bytes([head[32], head[33]]);
        let max_key_size = u16::from_be_bytes([head[34], head[35]]);
        let node_count = u32::from_be_bytes(head[36..40].try_into().unwrap());
        let free_node_count = u32::from_be_bytes(head[40..44].try_into().unwrap());
        // offset 44..46 reserved1, 46..50 clump size, 50 btree_type,
        // 51 key_compare_type, 52..56 attributes (HFS+ extensions).
        let key_compare_type = head[51];
        let attributes = u32::from_be_bytes(head[52..56].try_into().unwrap());

        if !node_size.is_power_of_two() || !(512..=65536).contains(&node_size) {
            return Err(HfsPlusError::Malformed(format!(
                "node_size {node_size} is not a power of two in [512, 65536]"
            )));
        }
        if depth > node::MAX_LEVEL as u16 {
            return Err(HfsPlusError::DepthExceeded(depth as u32));
        }

        let total_nodes =
            node_count.max(fork_logical_size.div_ceil(node_size as u64) as u32);

        let header = BTreeHeader {
            depth,
            root_node,
            leaf_record_count,
            first_leaf_node,
            last_leaf_node,
            node_size,
            max_key_size,
            node_count,
            free_node_count,
            key_compare_type,
            attributes,
        };

        let vector = NodeVector {
            extents: resolved_extents,
            block_size,
            node_size,
            total_nodes,
        };

        Ok(BTreeReader {
            header,
            vector,
            _marker: std::marker::PhantomData,
        })
    }

    /// Fetch a node at the given cache level, reading through to the image
    /// on a cache miss. Polls `abort` before doing any I/O.
    pub fn get_node<R: Read + Seek>(
        &self,
        reader: &Mutex<R>,
        cache: &NodeCache<K>,
        abort: &AtomicBool,
        level: usize,
        node_number: u32,
    ) -> Result<Arc<Node<K>>> {
        if abort.load(Ordering::SeqCst) {
            return Err(HfsPlusError::Aborted);
        }
        if let Some(node) = cache.get(level, node_number) {
            return Ok(node);
        }
        let raw = {
            let mut guard = reader.lock().unwrap();
            self.vector.read_node(&mut *guard, node_number)?
        };
        let node = match node::decode_node(raw, self.header.node_size) {
            Ok(n) => Arc::new(n),
            Err(e) => {
                warn!(node_number, "rejecting malformed node: {e}");
                return Err(e);
            }
        };
        cache.insert(level, node_number, node.clone());
        Ok(node)
    }

    pub fn get_root<R: Read + Seek>(
        &self,
        reader: &Mutex<R>,
        cache: &NodeCache<K>,
        abort: &AtomicBool,
    ) -> Result<Arc<Node<K>>> {
        self.get_node(reader, cache, abort, ROOT_LEVEL, self.header.root_node)
    }

    pub fn get_child<R: Read + Seek>(
        &self,
        reader: &Mutex<R>,
        cache: &NodeCache<K>,
        abort: &AtomicBool,
        current_level: usize,
        child_number: u32,
    ) -> Result<Arc<Node<K>>> {
        self.get_node(reader, cache, abort, current_level + 1, child_number)
    }
}
