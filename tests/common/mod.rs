//! Hand-rolled binary FBX buffer builder shared by the integration tests
//! that need a byte-exact fixture instead of a text one.
//!
//! Mirrors the node-record shape documented in `fbxscene`'s binary
//! tokenizer: `[end_offset:4][num_properties:4][property_list_len:4]
//! [name_len:1][name][properties...][children...][null record:13]`, with
//! narrow (`u32`) offsets throughout since every fixture here targets a
//! pre-7500 version.

pub const MAGIC: &[u8] = b"Kaydara FBX Binary  \x00";

pub struct NodeBuilder {
    name: &'static str,
    num_properties: u32,
    properties: Vec<u8>,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    pub fn new(name: &'static str) -> Self {
        Self { name, num_properties: 0, properties: Vec::new(), children: Vec::new() }
    }

    pub fn prop_i64(mut self, v: i64) -> Self {
        self.properties.push(b'L');
        self.properties.extend_from_slice(&v.to_le_bytes());
        self.num_properties += 1;
        self
    }

    pub fn prop_string(mut self, s: &str) -> Self {
        self.properties.push(b'S');
        self.properties.extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.properties.extend_from_slice(s.as_bytes());
        self.num_properties += 1;
        self
    }

    pub fn prop_f64_array(mut self, values: &[f64]) -> Self {
        self.properties.push(b'd');
        self.properties.extend_from_slice(&(values.len() as u32).to_le_bytes());
        self.properties.extend_from_slice(&0u32.to_le_bytes()); // encoding: raw
        let byte_len = values.len() * 8;
        self.properties.extend_from_slice(&(byte_len as u32).to_le_bytes());
        for v in values {
            self.properties.extend_from_slice(&v.to_le_bytes());
        }
        self.num_properties += 1;
        self
    }

    pub fn prop_i32_array(mut self, values: &[i32]) -> Self {
        self.properties.push(b'i');
        self.properties.extend_from_slice(&(values.len() as u32).to_le_bytes());
        self.properties.extend_from_slice(&0u32.to_le_bytes());
        let byte_len = values.len() * 4;
        self.properties.extend_from_slice(&(byte_len as u32).to_le_bytes());
        for v in values {
            self.properties.extend_from_slice(&v.to_le_bytes());
        }
        self.num_properties += 1;
        self
    }

    pub fn child(mut self, c: NodeBuilder) -> Self {
        self.children.push(c);
        self
    }

    /// Encodes this node (and its subtree) starting at absolute file offset
    /// `start_pos`, returning the full byte range including its trailing
    /// null record.
    fn encode(&self, start_pos: usize) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        let header_len = 4 + 4 + 4 + 1 + name_bytes.len() + self.properties.len();
        let mut pos = start_pos + header_len;
        let mut children_bytes = Vec::new();
        for child in &self.children {
            let enc = child.encode(pos);
            pos += enc.len();
            children_bytes.extend(enc);
        }
        children_bytes.extend_from_slice(&[0u8; 13]);
        pos += 13;

        let end_offset = pos as u32;
        let mut out = Vec::with_capacity(header_len + children_bytes.len());
        out.extend_from_slice(&end_offset.to_le_bytes());
        out.extend_from_slice(&self.num_properties.to_le_bytes());
        out.extend_from_slice(&(self.properties.len() as u32).to_le_bytes());
        out.push(name_bytes.len() as u8);
        out.extend_from_slice(name_bytes);
        out.extend_from_slice(&self.properties);
        out.extend_from_slice(&children_bytes);
        out
    }
}

/// Assembles a complete binary FBX file: header + every root node +
/// trailing top-level null record.
pub fn build_binary_fbx(version: u32, roots: Vec<NodeBuilder>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[0x1A, 0x00]);
    buf.extend_from_slice(&version.to_le_bytes());

    let mut pos = buf.len();
    for root in &roots {
        let enc = root.encode(pos);
        pos += enc.len();
        buf.extend_from_slice(&enc);
    }
    buf.extend_from_slice(&[0u8; 13]);
    buf
}
