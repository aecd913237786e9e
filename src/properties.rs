//! Property block reading (§4.9).
//!
//! Both `Properties60` (FBX 6.1 and earlier, 5 columns) and `Properties70`
//! (FBX 7.0+, 4+ columns with different historical type-name spellings) are
//! normalized here into the same internal `PropertyType` set before
//! `PropertySet::insert` ever sees them, so every object reader downstream
//! works against one vocabulary regardless of source version.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::node_tree::{NodeTree, Value};
use crate::scene::{Property, PropertyFlags, PropertySet, PropertyType};

lazy_static! {
    /// Historical FBX type-string -> internal `PropertyType` table. Entries
    /// come from both `Properties60` (`"Vector3D"`, `"Bool"`, ...) and
    /// `Properties70` (`"Vector3D"`, `"bool"`, `"Color"`, `"ColorRGB"`, ...)
    /// name spellings observed across exporter versions.
    static ref TYPE_TABLE: HashMap<&'static str, PropertyType> = {
        let mut m = HashMap::new();
        m.insert("Bool", PropertyType::Boolean);
        m.insert("bool", PropertyType::Boolean);
        m.insert("Integer", PropertyType::Integer);
        m.insert("int", PropertyType::Integer);
        m.insert("Enum", PropertyType::Integer);
        m.insert("enum", PropertyType::Integer);
        m.insert("Number", PropertyType::Number);
        m.insert("double", PropertyType::Number);
        m.insert("Float", PropertyType::Number);
        m.insert("float", PropertyType::Number);
        m.insert("KTime", PropertyType::Number);
        m.insert("Vector", PropertyType::Vector3);
        m.insert("Vector3D", PropertyType::Vector3);
        m.insert("Vector3", PropertyType::Vector3);
        m.insert("Lcl Translation", PropertyType::Vector3);
        m.insert("Lcl Rotation", PropertyType::Vector3);
        m.insert("Lcl Scaling", PropertyType::Vector3);
        m.insert("Color", PropertyType::Color);
        m.insert("ColorRGB", PropertyType::Color);
        m.insert("ColorAndAlpha", PropertyType::Color);
        m.insert("String", PropertyType::String);
        m.insert("KString", PropertyType::String);
        m.insert("object", PropertyType::String);
        m.insert("DateTime", PropertyType::DateTime);
        m.insert("Blob", PropertyType::Blob);
        m.insert("Compound", PropertyType::Compound);
        m
    };
}

fn type_from_name(name: &str) -> PropertyType {
    TYPE_TABLE.get(name).copied().unwrap_or(PropertyType::String)
}

fn flags_from_str(flags_str: &str) -> PropertyFlags {
    let mut flags = PropertyFlags::empty();
    if flags_str.contains('A') {
        flags.insert(PropertyFlags::ANIMATABLE);
    }
    if flags_str.contains('U') {
        flags.insert(PropertyFlags::USER);
    }
    if flags_str.contains('H') {
        flags.insert(PropertyFlags::HIDDEN);
    }
    if flags_str.contains('L') {
        flags.insert(PropertyFlags::LOCKED);
    }
    if flags_str.contains('M') {
        flags.insert(PropertyFlags::MUTED);
    }
    if flags_str.contains('O') {
        flags.insert(PropertyFlags::OVERRIDE);
    }
    flags
}

/// Reads a `Properties70`/`Properties60` node's children into a
/// [`PropertySet`]. Duplicate names collapse to the last value, recorded as
/// a warning by the caller via the returned count (§8 invariant: "P.props
/// sorted, unique").
pub fn read_properties(tree: &NodeTree, properties_node: u32, warnings: &mut Vec<crate::error::Warning>) -> PropertySet {
    let mut set = PropertySet::new();
    for &child in &tree.node(properties_node).children {
        let node = tree.node(child);
        // `P: "Name", "Type", "Label", "Flags", value...` (70-column form)
        // or `Property: "Name", "Type", "Flags", value` (60-column form).
        // Both are read positionally since the name itself
        // (`P`/`Property`) already told the tokenizer which scope it's in.
        let name = match node.values.first().and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => continue,
        };
        let type_name = node.values.get(1).and_then(Value::as_str).unwrap_or("");
        let ty = type_from_name(type_name);
        let is_70_form = node.values.len() > 4 || node.name.as_str() == "P";
        let (flags_idx, value_start) = if is_70_form { (3, 4) } else { (2, 3) };
        let flags_str = node.values.get(flags_idx).and_then(Value::as_str).unwrap_or("");
        let flags = flags_from_str(flags_str);

        let mut prop = Property::new(name, ty);
        prop.flags = flags;
        match ty {
            PropertyType::Vector3 | PropertyType::Color => {
                for i in 0..3 {
                    if let Some(v) = node.values.get(value_start + i).and_then(Value::as_f64) {
                        prop.value_real[i] = v;
                    }
                }
            }
            PropertyType::String | PropertyType::DateTime => {
                prop.value_str = node.values.get(value_start).and_then(Value::as_str).unwrap_or("").to_string();
            }
            PropertyType::Blob => {
                if let Some(Value::Blob(b)) = node.values.get(value_start) {
                    prop.value_blob = b.to_vec();
                }
            }
            PropertyType::Boolean | PropertyType::Integer => {
                prop.value_int = node.values.get(value_start).and_then(Value::as_i64).unwrap_or(0);
                prop.value_real[0] = prop.value_int as f64;
            }
            PropertyType::Number => {
                prop.value_real[0] = node.values.get(value_start).and_then(Value::as_f64).unwrap_or(0.0);
            }
            PropertyType::Compound => {}
        }

        if set.insert(prop) {
            warnings.push(crate::error::Warning {
                kind: crate::error::ErrorKind::DuplicateOverride { element_id: 0, property: type_name.to_string() },
                offset: None,
            });
        }
    }
    set
}

/// Locates and reads a node's `Properties70`/`Properties60` child, if any.
pub fn read_properties_of(tree: &NodeTree, object_node: u32, warnings: &mut Vec<crate::error::Warning>) -> PropertySet {
    if let Some(p) = tree.find(object_node, "Properties70") {
        return read_properties(tree, p, warnings);
    }
    if let Some(p) = tree.find(object_node, "Properties60") {
        return read_properties(tree, p, warnings);
    }
    PropertySet::new()
}

/// Reads the top-level `Definitions` block into per-`(class, subtype)`
/// default property sets, keyed the same way `ElementReader` classifies an
/// object so `apply_template` can look one up by an element's own class and
/// subtype strings.
pub fn read_templates(tree: &NodeTree, warnings: &mut Vec<crate::error::Warning>) -> HashMap<(String, String), std::rc::Rc<PropertySet>> {
    let mut templates = HashMap::new();
    let Some(defs) = tree.find_root("Definitions") else { return templates };
    for &object_type in &tree.node(defs).children {
        if tree.node(object_type).name.as_str() != "ObjectType" {
            continue;
        }
        let class_name = match tree.get_val1_str(object_type) {
            Some(s) => s.to_string(),
            None => continue,
        };
        for &pt in &tree.node(object_type).children {
            if tree.node(pt).name.as_str() != "PropertyTemplate" {
                continue;
            }
            let subtype = tree.get_val1_str(pt).unwrap_or("").to_string();
            let props = read_properties_of(tree, pt, warnings);
            templates.insert((class_name.clone(), subtype), std::rc::Rc::new(props));
        }
    }
    templates
}

/// Chains `element_props.defaults` to the template matching `(class,
/// subtype)`, if the file declared one (§3: "Template" provides the
/// defaults an instance's own `Properties70` overrides).
pub fn apply_template(props: &mut PropertySet, templates: &HashMap<(String, String), std::rc::Rc<PropertySet>>, class_name: &str, subtype: &str) {
    if let Some(template) = templates.get(&(class_name.to_string(), subtype.to_string())) {
        props.defaults = Some(template.clone());
    }
}
