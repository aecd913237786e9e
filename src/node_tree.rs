//! The uniform `{name, values[], children[]}` tree produced by either
//! tokenizer before semantic interpretation begins (§4.7).
//!
//! Both the binary and ASCII front ends build the same `NodeTree` shape so
//! everything downstream — `PropertyReader`, `ElementReader`,
//! `ConnectionGraph` — is tokenizer-agnostic and doesn't care which front
//! end produced the tree.

use crate::scene::{DomNode, DomValue};
use crate::string_pool::StringHandle;

/// A single typed scalar or array value attached to a node (§4.5/§4.6).
#[derive(Clone, Debug)]
pub enum Value<'a> {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(StringHandle<'a>),
    Blob(&'a [u8]),
    ArrayI32(&'a [i32]),
    ArrayI64(&'a [i64]),
    ArrayF32(&'a [f32]),
    ArrayF64(&'a [f64]),
    ArrayBool(&'a [bool]),
}

impl<'a> Value<'a> {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(b) => Some(b as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::F32(v) => Some(v as i64),
            Value::F64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Bool(b) => Some(b as i64 as f64),
            Value::I16(v) => Some(v as f64),
            Value::I32(v) => Some(v as f64),
            Value::I64(v) => Some(v as f64),
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Value::String(h) => Some(h.as_str()),
            _ => None,
        }
    }

    pub fn as_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            Value::ArrayF64(a) => Some(a.to_vec()),
            Value::ArrayF32(a) => Some(a.iter().map(|v| *v as f64).collect()),
            Value::ArrayI32(a) => Some(a.iter().map(|v| *v as f64).collect()),
            Value::ArrayI64(a) => Some(a.iter().map(|v| *v as f64).collect()),
            _ => None,
        }
    }

    pub fn as_i64_array(&self) -> Option<Vec<i64>> {
        match self {
            Value::ArrayI64(a) => Some(a.to_vec()),
            Value::ArrayI32(a) => Some(a.iter().map(|v| *v as i64).collect()),
            _ => None,
        }
    }
}

/// A node in the uniform parse tree. `name` and `values` are interned /
/// arena-owned; `children` are indices into the owning `NodeTree::nodes`
/// arena rather than owned recursively, so the tree can be walked lazily
/// without materializing every subtree up front (§4.7: "supports both eager
/// and lazy traversal").
#[derive(Clone, Debug)]
pub struct RawNode<'a> {
    pub name: StringHandle<'a>,
    pub values: Vec<Value<'a>>,
    pub children: Vec<u32>,
}

/// Owns every `RawNode` produced by a parse, addressed by dense index.
pub struct NodeTree<'a> {
    pub nodes: Vec<RawNode<'a>>,
    pub roots: Vec<u32>,
}

impl<'a> NodeTree<'a> {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), roots: Vec::new() }
    }

    pub fn push(&mut self, node: RawNode<'a>) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: u32) -> &RawNode<'a> {
        &self.nodes[id as usize]
    }

    /// Finds the first direct child of `id` named `name`.
    pub fn find(&self, id: u32, name: &str) -> Option<u32> {
        self.node(id).children.iter().copied().find(|&c| self.node(c).name.as_str() == name)
    }

    /// Finds the first direct child of a root list named `name`.
    pub fn find_root(&self, name: &str) -> Option<u32> {
        self.roots.iter().copied().find(|&c| self.node(c).name.as_str() == name)
    }

    pub fn children_named<'t>(&'t self, id: u32, name: &'t str) -> impl Iterator<Item = u32> + 't {
        self.node(id).children.iter().copied().filter(move |&c| self.node(c).name.as_str() == name)
    }

    pub fn get_val_at(&self, id: u32, index: usize) -> Option<&Value<'a>> {
        self.node(id).values.get(index)
    }

    pub fn get_val1_f64(&self, id: u32) -> Option<f64> {
        self.get_val_at(id, 0).and_then(Value::as_f64)
    }

    pub fn get_val1_str(&self, id: u32) -> Option<&'a str> {
        self.get_val_at(id, 0).and_then(Value::as_str)
    }

    pub fn get_val1_i64(&self, id: u32) -> Option<i64> {
        self.get_val_at(id, 0).and_then(Value::as_i64)
    }

    pub fn get_val2_f64(&self, id: u32) -> Option<(f64, f64)> {
        let n = self.node(id);
        Some((n.values.get(0)?.as_f64()?, n.values.get(1)?.as_f64()?))
    }

    pub fn get_val3_f64(&self, id: u32) -> Option<(f64, f64, f64)> {
        let n = self.node(id);
        Some((n.values.get(0)?.as_f64()?, n.values.get(1)?.as_f64()?, n.values.get(2)?.as_f64()?))
    }

    /// Depth of `id` below the deepest root, used to enforce the 32-level
    /// nesting cap shared by both tokenizers.
    pub fn depth(&self, mut id: u32, parent_of: &std::collections::HashMap<u32, u32>) -> u32 {
        let mut depth = 0;
        while let Some(&p) = parent_of.get(&id) {
            depth += 1;
            id = p;
        }
        depth
    }

    /// Detaches the whole tree into owned [`DomNode`]s, for `retain_dom`.
    pub fn to_dom(&self) -> Vec<DomNode> {
        self.roots.iter().map(|&id| self.to_dom_node(id)).collect()
    }

    fn to_dom_node(&self, id: u32) -> DomNode {
        let node = self.node(id);
        DomNode {
            name: node.name.as_str().to_string(),
            values: node.values.iter().map(to_dom_value).collect(),
            children: node.children.iter().map(|&c| self.to_dom_node(c)).collect(),
        }
    }
}

fn to_dom_value(value: &Value) -> DomValue {
    match *value {
        Value::Bool(b) => DomValue::Bool(b),
        Value::I16(v) => DomValue::I16(v),
        Value::I32(v) => DomValue::I32(v),
        Value::I64(v) => DomValue::I64(v),
        Value::F32(v) => DomValue::F32(v),
        Value::F64(v) => DomValue::F64(v),
        Value::String(h) => DomValue::String(h.as_str().to_string()),
        Value::Blob(b) => DomValue::Blob(b.to_vec()),
        Value::ArrayI32(a) => DomValue::ArrayI32(a.to_vec()),
        Value::ArrayI64(a) => DomValue::ArrayI64(a.to_vec()),
        Value::ArrayF32(a) => DomValue::ArrayF32(a.to_vec()),
        Value::ArrayF64(a) => DomValue::ArrayF64(a.to_vec()),
        Value::ArrayBool(a) => DomValue::ArrayBool(a.to_vec()),
    }
}

impl<'a> Default for NodeTree<'a> {
    fn default() -> Self {
        Self::new()
    }
}
