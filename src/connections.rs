//! Connection graph construction (§4.11).
//!
//! FBX 7.0+ stores connections explicitly in a top-level `Connections`
//! block (`C: "OO"|"OP", src, dst[, prop]`). Pre-7000 files have no such
//! block; parent/child nesting and attribute attachment imply the same
//! edges, so they're synthesized here from the node tree shape instead.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind, Result};
use crate::node_tree::{NodeTree, Value};
use crate::scene::Connection;

/// Builds the full, deduplicated, dually-sorted connection list.
pub struct ConnectionGraph {
    pub connections: Vec<Connection>,
}

impl ConnectionGraph {
    /// Reads an explicit `Connections` block (version >= 7000).
    pub fn from_connections_block(tree: &NodeTree, connections_node: u32, id_to_element: &HashMap<i64, u32>, root_id: i64, opts: &crate::options::LoadOptions, warnings: &mut Vec<crate::error::Warning>) -> Result<Self> {
        let mut connections = Vec::new();
        for &child in &tree.node(connections_node).children {
            let node = tree.node(child);
            if node.name.as_str() != "C" {
                continue;
            }
            let kind = node.values.first().and_then(Value::as_str).unwrap_or("");
            let src_fbx_id = node.values.get(1).and_then(Value::as_i64);
            let dst_fbx_id = node.values.get(2).and_then(Value::as_i64);
            let (Some(src_fbx_id), Some(dst_fbx_id)) = (src_fbx_id, dst_fbx_id) else { continue };

            let src = resolve_or_root(src_fbx_id, id_to_element, root_id, opts.allow_nodes_out_of_root, opts.strict)?;
            let src = match src {
                Some(s) => s,
                None => {
                    warnings.push(crate::error::Warning { kind: root_or_missing_kind(src_fbx_id, root_id, id_to_element.len()), offset: None });
                    if is_broken_retainable(src_fbx_id, root_id, opts.connect_broken_elements) {
                        crate::scene::NO_INDEX
                    } else {
                        continue;
                    }
                }
            };
            let dst = resolve_or_root(dst_fbx_id, id_to_element, root_id, opts.allow_nodes_out_of_root, opts.strict)?;
            let dst = match dst {
                Some(d) => d,
                None => {
                    warnings.push(crate::error::Warning { kind: root_or_missing_kind(dst_fbx_id, root_id, id_to_element.len()), offset: None });
                    if is_broken_retainable(dst_fbx_id, root_id, opts.connect_broken_elements) {
                        crate::scene::NO_INDEX
                    } else {
                        continue;
                    }
                }
            };

            let (src_prop, dst_prop) = match kind {
                "OP" | "PO" => (node.values.get(3).and_then(Value::as_str).map(str::to_string), None),
                _ => (None, None),
            };
            connections.push(Connection { src, dst, src_prop, dst_prop });
        }
        Ok(Self::finish(connections))
    }

    /// Synthesizes connections for pre-7000 files from parent/child nesting
    /// (`Model` nodes contain `NodeAttribute`-referencing children
    /// implicitly via `Model::<name>, Model::Matrix` linkage) — the
    /// reference format for pre-7000 connection semantics, reconstructed
    /// from nesting and name-reference order since there is no explicit
    /// `Connections` block to read.
    pub fn from_implicit_links(links: Vec<(u32, u32, Option<String>)>) -> Self {
        let connections = links.into_iter().map(|(src, dst, prop)| Connection { src, dst, src_prop: prop, dst_prop: None }).collect();
        Self::finish(connections)
    }

    fn finish(mut connections: Vec<Connection>) -> Self {
        connections.sort_by_key(|c| (c.src, c.dst));
        connections.dedup();
        Self { connections }
    }

    pub fn sorted_by_src(&self) -> Vec<u32> {
        let mut idx: Vec<u32> = (0..self.connections.len() as u32).collect();
        idx.sort_by_key(|&i| (self.connections[i as usize].src, self.connections[i as usize].dst));
        idx
    }

    pub fn sorted_by_dst(&self) -> Vec<u32> {
        let mut idx: Vec<u32> = (0..self.connections.len() as u32).collect();
        idx.sort_by_key(|&i| (self.connections[i as usize].dst, self.connections[i as usize].src));
        idx
    }

    /// Populates each `Element::connections_src`/`connections_dst` view
    /// with indices into `self.connections`.
    pub fn attach_views(&self, elements: &mut [crate::scene::Element]) {
        for (idx, conn) in self.connections.iter().enumerate() {
            if let Some(e) = elements.get_mut(conn.src as usize) {
                e.connections_src.push(idx as u32);
            }
            if let Some(e) = elements.get_mut(conn.dst as usize) {
                e.connections_dst.push(idx as u32);
            }
        }
    }

    pub fn targets_of(&self, src: u32) -> impl Iterator<Item = u32> + '_ {
        self.connections.iter().filter(move |c| c.src == src).map(|c| c.dst)
    }

    /// Like [`Self::targets_of`] but keeps the full edge, for callers that
    /// need `dst_prop` (e.g. wiring an `AnimValue` to the specific property
    /// of the model it animates).
    pub fn edges_from(&self, src: u32) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.iter().filter(move |c| c.src == src)
    }

    pub fn sources_of(&self, dst: u32) -> impl Iterator<Item = u32> + '_ {
        self.connections.iter().filter(move |c| c.dst == dst).map(|c| c.src)
    }
}

/// Sentinel element id a connection is redirected to when it names the
/// document root and `allow_nodes_out_of_root` keeps the edge instead of
/// dropping it. No real `Element` ever has this id (it reuses `NO_INDEX`),
/// so downstream element lookups against it simply miss rather than alias
/// an unrelated element.
pub const ROOT_ELEMENT_ID: u32 = crate::scene::NO_INDEX;

/// Resolves a `fbx_id` that a connection references to an element index.
///
/// `id == root_fbx_id` (or `0`) names the document root, which has no
/// element of its own: with `redirect_to_root` set the edge is kept,
/// pointed at [`ROOT_ELEMENT_ID`]; otherwise (or for any other id that
/// isn't in `id_to_element`) this returns `Ok(None)` in tolerant mode and
/// an `ElementConnectedToRoot`/`BadIndex` error when `strict` demands a
/// hard failure instead of a dropped edge.
pub fn resolve_or_root(id: i64, id_to_element: &HashMap<i64, u32>, root_fbx_id: i64, redirect_to_root: bool, strict: bool) -> Result<Option<u32>> {
    if id == root_fbx_id || id == 0 {
        if redirect_to_root {
            return Ok(Some(ROOT_ELEMENT_ID));
        }
        if strict {
            return Err(Error::new(ErrorKind::ElementConnectedToRoot { fbx_id: id }));
        }
        return Ok(None);
    }
    match id_to_element.get(&id) {
        Some(&e) => Ok(Some(e)),
        None if strict => Err(Error::new(ErrorKind::BadIndex { fault: crate::error::IndexFault::OutOfRange, index: id, len: id_to_element.len() })),
        None => Ok(None),
    }
}

/// Picks the warning kind for an id `resolve_or_root` dropped in tolerant
/// mode: the dedicated root-connection warning when the id named the
/// document root, the generic out-of-range warning otherwise.
fn root_or_missing_kind(id: i64, root_fbx_id: i64, len: usize) -> ErrorKind {
    if id == root_fbx_id || id == 0 {
        ErrorKind::ElementConnectedToRoot { fbx_id: id }
    } else {
        ErrorKind::BadIndex { fault: crate::error::IndexFault::OutOfRange, index: id, len }
    }
}

/// Whether a genuinely-unresolved (non-root) connection endpoint should be
/// kept as a broken edge (`connect_broken_elements`) rather than dropped.
/// Root endpoints are governed by `allow_nodes_out_of_root`/`resolve_or_root`
/// instead, not this option.
fn is_broken_retainable(fbx_id: i64, root_fbx_id: i64, connect_broken_elements: bool) -> bool {
    connect_broken_elements && fbx_id != root_fbx_id && fbx_id != 0
}
