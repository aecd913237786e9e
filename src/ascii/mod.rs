//! ASCII FBX tokenizer (§4.6).
//!
//! Older FBX exports (and many hand-edited ones) use a text form: each node
//! is `Name: value, value, ... {` followed by nested nodes and a closing
//! `}`. Arrays are written either inline comma-separated or as `*N { a: v,
//! v, ... }`. This module turns that grammar into the same [`NodeTree`]
//! shape the binary tokenizer produces, so every downstream reader is
//! format-agnostic.

use crate::arena::Arena;
use crate::error::{Error, ErrorKind, Result};
use crate::node_tree::{NodeTree, RawNode, Value};
use crate::options::LoadOptions;
use crate::string_pool::StringPool;

struct Scanner<'s> {
    data: &'s [u8],
    pos: usize,
}

impl<'s> Scanner<'s> {
    fn new(data: &'s [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(b',') => {
                    self.pos += 1;
                }
                Some(b';') => {
                    while let Some(b) = self.peek() {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Parses a complete ASCII FBX byte buffer into a [`NodeTree`].
pub fn parse<'a>(
    data: &[u8],
    arena: &'a Arena,
    pool: &mut StringPool<'a>,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
) -> Result<NodeTree<'a>> {
    let mut sc = Scanner::new(data);
    let mut tree = NodeTree::new();
    sc.skip_trivia();
    while !sc.eof() {
        let id = parse_node(&mut sc, arena, pool, opts, warnings, &mut tree, 0)
            .map_err(|e| e.frame("ascii::parse", "reading top-level node"))?;
        tree.roots.push(id);
        sc.skip_trivia();
    }
    Ok(tree)
}

fn parse_node<'a>(
    sc: &mut Scanner,
    arena: &'a Arena,
    pool: &mut StringPool<'a>,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
    tree: &mut NodeTree<'a>,
    depth: u32,
) -> Result<u32> {
    if depth >= opts.max_node_depth {
        return Err(Error::at(ErrorKind::BadNodeNesting { depth, max_depth: opts.max_node_depth }, sc.offset()));
    }

    let name_bytes = read_identifier(sc)?;
    let name = pool
        .intern(name_bytes, false, opts.unicode_error_handling, warnings)
        .map_err(|e| e.frame("ascii::parse_node", "interning node name"))?;
    sc.skip_trivia();
    if sc.peek() != Some(b':') {
        return Err(Error::at(ErrorKind::BadValueType { expected: ":", found: sc.peek().unwrap_or(0) as char }, sc.offset()));
    }
    sc.bump();
    sc.skip_trivia();

    let mut values = Vec::new();
    while let Some(b) = sc.peek() {
        if b == b'{' || b == b'\n' || b == b'\r' {
            break;
        }
        if b == b'*' {
            values.push(read_array_literal(sc, arena, opts)?);
        } else {
            values.push(read_scalar(sc, arena, pool, opts, warnings)?);
        }
        sc.skip_trivia();
    }

    let mut children = Vec::new();
    sc.skip_trivia();
    if sc.peek() == Some(b'{') {
        sc.bump();
        sc.skip_trivia();
        while sc.peek() != Some(b'}') {
            if sc.eof() {
                return Err(Error::at(ErrorKind::TruncatedFile, sc.offset()));
            }
            let child = parse_node(sc, arena, pool, opts, warnings, tree, depth + 1)?;
            children.push(child);
            sc.skip_trivia();
        }
        sc.bump();
    }

    Ok(tree.push(RawNode { name, values, children }))
}

fn read_identifier<'s>(sc: &mut Scanner<'s>) -> Result<&'s [u8]> {
    let start = sc.pos;
    while let Some(b) = sc.peek() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
            sc.pos += 1;
        } else {
            break;
        }
    }
    if sc.pos == start {
        return Err(Error::at(ErrorKind::BadValueType { expected: "identifier", found: sc.peek().unwrap_or(0) as char }, sc.offset()));
    }
    Ok(&sc.data[start..sc.pos])
}

fn read_scalar<'a>(
    sc: &mut Scanner,
    arena: &'a Arena,
    pool: &mut StringPool<'a>,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
) -> Result<Value<'a>> {
    match sc.peek() {
        Some(b'"') => read_quoted_string(sc, arena, pool, opts, warnings),
        Some(b) if b == b'-' || b == b'+' || b.is_ascii_digit() || b == b'.' => read_number(sc),
        Some(b'N') | Some(b'I') => {
            // `nan(0x...)` / `ind(0x...)` float tolerances, distinguished by
            // their first character; read the whole token and coerce.
            let start = sc.pos;
            while let Some(b) = sc.peek() {
                if b.is_ascii_alphanumeric() || b == b'(' || b == b')' || b == b'x' {
                    sc.pos += 1;
                } else {
                    break;
                }
            }
            let token = std::str::from_utf8(&sc.data[start..sc.pos]).unwrap_or("");
            if token.starts_with("nan") {
                Ok(Value::F64(f64::NAN))
            } else if token.starts_with("ind") {
                Ok(Value::F64(f64::INFINITY))
            } else {
                Err(Error::at(ErrorKind::BadValueType { expected: "number", found: token.chars().next().unwrap_or('?') }, sc.offset()))
            }
        }
        other => Err(Error::at(ErrorKind::BadValueType { expected: "value", found: other.unwrap_or(0) as char }, sc.offset())),
    }
}

fn read_number<'a>(sc: &mut Scanner) -> Result<Value<'a>> {
    let start = sc.pos;
    if matches!(sc.peek(), Some(b'-') | Some(b'+')) {
        sc.pos += 1;
    }
    let mut is_float = false;
    while let Some(b) = sc.peek() {
        match b {
            b'0'..=b'9' => sc.pos += 1,
            b'.' => {
                is_float = true;
                sc.pos += 1;
            }
            b'e' | b'E' => {
                is_float = true;
                sc.pos += 1;
                if matches!(sc.peek(), Some(b'-') | Some(b'+')) {
                    sc.pos += 1;
                }
            }
            _ => break,
        }
    }
    let text = std::str::from_utf8(&sc.data[start..sc.pos]).map_err(|_| Error::at(ErrorKind::InvalidUtf8, sc.offset()))?;
    if is_float {
        text.parse::<f64>().map(Value::F64).map_err(|_| Error::at(ErrorKind::BadValueType { expected: "float", found: '?' }, sc.offset()))
    } else {
        text.parse::<i64>().map(Value::I64).map_err(|_| Error::at(ErrorKind::BadValueType { expected: "integer", found: '?' }, sc.offset()))
    }
}

fn read_quoted_string<'a>(
    sc: &mut Scanner,
    arena: &'a Arena,
    pool: &mut StringPool<'a>,
    opts: &LoadOptions,
    warnings: &mut Vec<crate::error::Warning>,
) -> Result<Value<'a>> {
    sc.bump(); // opening quote
    let mut decoded = Vec::new();
    loop {
        match sc.bump() {
            None => return Err(Error::at(ErrorKind::TruncatedFile, sc.offset())),
            Some(b'"') => break,
            // `&quot;`-style escapes used by some exporters; anything else
            // following `&` is passed through literally.
            Some(b'&') => {
                let rest = &sc.data[sc.pos..];
                if rest.starts_with(b"quot;") {
                    decoded.push(b'"');
                    sc.pos += 5;
                } else if rest.starts_with(b"amp;") {
                    decoded.push(b'&');
                    sc.pos += 4;
                } else {
                    decoded.push(b'&');
                }
            }
            Some(b) => decoded.push(b),
        }
    }
    let _ = arena;
    let handle = pool
        .intern(&decoded, true, opts.unicode_error_handling, warnings)
        .map_err(|e| e.frame("ascii::read_quoted_string", "interning string literal"))?;
    Ok(Value::String(handle))
}

/// Reads a `*N { a: v0,v1,... }` array literal. The element type of the
/// nested `a:` line determines the array's `Value` variant; a blob of raw
/// base64 inside a quoted string after `a:` is also accepted for binary
/// payloads some exporters inline this way.
fn read_array_literal<'a>(sc: &mut Scanner, arena: &'a Arena, _opts: &LoadOptions) -> Result<Value<'a>> {
    sc.bump(); // '*'
    let start = sc.pos;
    while matches!(sc.peek(), Some(b) if b.is_ascii_digit()) {
        sc.pos += 1;
    }
    let _count: usize = std::str::from_utf8(&sc.data[start..sc.pos]).unwrap_or("0").parse().unwrap_or(0);
    sc.skip_trivia();
    if sc.peek() != Some(b'{') {
        return Err(Error::at(ErrorKind::BadArrayType { expected: "{", found: sc.peek().unwrap_or(0) as char }, sc.offset()));
    }
    sc.bump();
    sc.skip_trivia();
    // Expect `a:` label introducing the comma-separated payload.
    let label = read_identifier(sc)?;
    if label != b"a" {
        return Err(Error::at(ErrorKind::BadArrayType { expected: "a", found: '?' }, sc.offset()));
    }
    sc.skip_trivia();
    if sc.peek() == Some(b':') {
        sc.bump();
    }
    sc.skip_trivia();

    let mut floats = Vec::new();
    let mut ints = Vec::new();
    let mut is_float = false;
    while sc.peek() != Some(b'}') {
        if sc.eof() {
            return Err(Error::at(ErrorKind::TruncatedFile, sc.offset()));
        }
        match read_number(sc)? {
            Value::F64(v) => {
                is_float = true;
                floats.push(v);
            }
            Value::I64(v) => ints.push(v),
            _ => unreachable!(),
        }
        sc.skip_trivia();
    }
    sc.bump(); // '}'

    if is_float {
        for v in ints {
            floats.push(v as f64);
        }
        let out = arena.alloc_slice::<f64>(floats.len())?;
        out.copy_from_slice(&floats);
        Ok(Value::ArrayF64(out))
    } else {
        let out = arena.alloc_slice::<i64>(ints.len())?;
        out.copy_from_slice(&ints);
        Ok(Value::ArrayI64(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AllocatorOptions;

    fn setup() -> (Arena, LoadOptions) {
        (Arena::new(AllocatorOptions::default()), LoadOptions::default())
    }

    #[test]
    fn parses_simple_node_with_scalars() {
        let (arena, opts) = setup();
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let src = b"Version: 7400\n";
        let tree = parse(src, &arena, &mut pool, &opts, &mut warnings).unwrap();
        assert_eq!(tree.roots.len(), 1);
        let node = tree.node(tree.roots[0]);
        assert_eq!(node.name.as_str(), "Version");
        assert_eq!(node.values[0].as_i64(), Some(7400));
    }

    #[test]
    fn parses_nested_scope() {
        let (arena, opts) = setup();
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let src = b"Model: \"Cube\", \"Mesh\" {\n  Version: 232\n}\n";
        let tree = parse(src, &arena, &mut pool, &opts, &mut warnings).unwrap();
        let node = tree.node(tree.roots[0]);
        assert_eq!(node.name.as_str(), "Model");
        assert_eq!(node.children.len(), 1);
        assert_eq!(tree.node(node.children[0]).name.as_str(), "Version");
    }

    #[test]
    fn parses_array_literal() {
        let (arena, opts) = setup();
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let src = b"Vertices: *6 {\n  a: 0,0,0,1,1,1\n}\n";
        let tree = parse(src, &arena, &mut pool, &opts, &mut warnings).unwrap();
        let node = tree.node(tree.roots[0]);
        match &node.values[0] {
            Value::ArrayF64(a) => assert_eq!(a.len(), 6),
            Value::ArrayI64(a) => assert_eq!(a.len(), 6),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn rejects_overdeep_nesting() {
        let (arena, mut opts) = setup();
        opts.max_node_depth = 2;
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let src = b"A: 1 {\n  B: 2 {\n    C: 3 {\n    }\n  }\n}\n";
        let err = parse(src, &arena, &mut pool, &opts, &mut warnings).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadNodeNesting { .. }));
    }
}
