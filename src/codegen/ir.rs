// Descriptor walker and intermediate representation.
//
// The walker descends one FileDescriptorProto into a tree of message/enum
// nodes carrying everything the emitter needs: namespaced names, field
// metadata with wire-codec method tags, defaults, and cross-file import
// requirements resolved against the request-wide identifier table.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{bail, Result};

use crate::descriptor::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, Type,
};

use super::comments::CommentMap;
use super::names::{lower_camel, normalize_type_name, relative_import};

/// Where a fully qualified proto name lives and how generated code refers
/// to it. For enums the zero-valued enumerator rides along because field
/// defaults need it.
pub struct Identifier {
    pub file_name: String,
    pub namespaced_name: String,
    pub enum_zero: Option<String>,
}

/// `fully.qualified.proto.Name` -> location, spanning every file in the
/// request. Built once before any file is walked.
#[derive(Default)]
pub struct IdentifierTable {
    identifiers: HashMap<String, Identifier>,
}

impl IdentifierTable {
    pub fn build(files: &[FileDescriptorProto]) -> IdentifierTable {
        let mut table = IdentifierTable::default();
        for file in files {
            for message in &file.message_type {
                table.add_message(file, &qualify(&file.package, &message.name), &message.name, message);
            }
            for e in &file.enum_type {
                table.add_enum(file, &qualify(&file.package, &e.name), &e.name, e);
            }
        }
        table
    }

    fn add_message(
        &mut self,
        file: &FileDescriptorProto,
        full_name: &str,
        namespaced_name: &str,
        message: &DescriptorProto,
    ) {
        self.identifiers.insert(
            full_name.to_string(),
            Identifier {
                file_name: file.name.clone(),
                namespaced_name: namespaced_name.to_string(),
                enum_zero: None,
            },
        );
        for nested in &message.nested_type {
            self.add_message(
                file,
                &format!("{full_name}.{}", nested.name),
                &format!("{namespaced_name}.{}", nested.name),
                nested,
            );
        }
        for e in &message.enum_type {
            self.add_enum(
                file,
                &format!("{full_name}.{}", e.name),
                &format!("{namespaced_name}.{}", e.name),
                e,
            );
        }
    }

    fn add_enum(
        &mut self,
        file: &FileDescriptorProto,
        full_name: &str,
        namespaced_name: &str,
        e: &EnumDescriptorProto,
    ) {
        let enum_zero = e
            .value
            .iter()
            .find(|v| v.number == 0)
            .map(|v| v.name.clone());
        self.identifiers.insert(
            full_name.to_string(),
            Identifier {
                file_name: file.name.clone(),
                namespaced_name: namespaced_name.to_string(),
                enum_zero,
            },
        );
    }

    pub fn lookup(&self, type_name: &str) -> Option<&Identifier> {
        self.identifiers.get(normalize_type_name(type_name))
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

pub enum IrNode {
    Message(MessageNode),
    Enum(EnumNode),
}

impl IrNode {
    pub fn name(&self) -> &str {
        match self {
            IrNode::Message(m) => &m.name,
            IrNode::Enum(e) => &e.name,
        }
    }

    pub fn namespaced_name(&self) -> &str {
        match self {
            IrNode::Message(m) => &m.namespaced_name,
            IrNode::Enum(e) => &e.namespaced_name,
        }
    }
}

pub struct MessageNode {
    pub name: String,
    pub namespaced_name: String,
    pub leading_comments: Option<String>,
    /// Synthetic entry message of a `map<K,V>` field; no public codec
    /// surface, only the internal `_writeMessage`/`_readMessage` pair.
    pub is_map: bool,
    pub fields: Vec<Field>,
    pub children: Vec<IrNode>,
}

impl MessageNode {
    /// Direct child with the given namespaced name (map entry lookup).
    pub fn child(&self, namespaced_name: &str) -> Option<&IrNode> {
        self.children
            .iter()
            .find(|c| c.namespaced_name() == namespaced_name)
    }
}

pub struct EnumNode {
    pub name: String,
    pub namespaced_name: String,
    pub leading_comments: Option<String>,
    pub values: Vec<EnumValue>,
}

pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub leading_comments: Option<String>,
}

pub struct Field {
    /// Generated-code attribute name (lower camel of the proto name).
    pub name: String,
    pub proto_name: String,
    pub json_name: String,
    pub index: i32,
    pub repeated: bool,
    pub optional: bool,
    pub map: bool,
    pub r#type: Type,
    /// Wire-codec method tags consumed verbatim by the emitter.
    pub read: &'static str,
    pub write: &'static str,
    pub read_packed: Option<&'static str>,
    /// Full generated type expression, minus optionality.
    pub ts_type: String,
    /// JSON-side counterpart (64-bit integers and bytes become strings).
    pub ts_type_json: String,
    /// Qualified reference for codec delegation: a sibling or imported
    /// message/enum, or the map entry message.
    pub type_ref: Option<String>,
    pub default_value: String,
    pub leading_comments: Option<String>,
}

#[derive(Default)]
pub struct FileIr {
    pub file_name: String,
    pub package: String,
    pub nodes: Vec<IrNode>,
    pub imports: Vec<FileImport>,
}

pub struct FileImport {
    /// Relative module specifier of the other generated file.
    pub module: String,
    pub symbols: Vec<String>,
}

impl FileIr {
    /// True when some field carries bytes; gates the base64 helper import.
    pub fn uses_bytes(&self) -> bool {
        fn node_uses_bytes(node: &IrNode) -> bool {
            match node {
                IrNode::Message(m) => {
                    m.fields.iter().any(|f| f.r#type == Type::Bytes)
                        || m.children.iter().any(node_uses_bytes)
                }
                IrNode::Enum(_) => false,
            }
        }
        self.nodes.iter().any(node_uses_bytes)
    }
}

/// Walk one file into its IR, resolving references through `table`.
pub fn walk_file(file: &FileDescriptorProto, table: &IdentifierTable) -> Result<FileIr> {
    let mut walker = Walker {
        file,
        table,
        comments: CommentMap::build(file),
        imports: BTreeMap::new(),
    };

    let mut nodes = Vec::new();
    for (i, message) in file.message_type.iter().enumerate() {
        let full_name = qualify(&file.package, &message.name);
        let node = walker.walk_message(message, &full_name, &message.name, &[4, i as i32])?;
        nodes.push(IrNode::Message(node));
    }
    for (i, e) in file.enum_type.iter().enumerate() {
        nodes.push(IrNode::Enum(walker.walk_enum(e, &e.name, &[5, i as i32])?));
    }

    let imports = walker
        .imports
        .into_iter()
        .map(|(target, symbols)| FileImport {
            module: relative_import(&file.name, &target),
            symbols: symbols.into_iter().collect(),
        })
        .collect();

    Ok(FileIr {
        file_name: file.name.clone(),
        package: file.package.clone(),
        nodes,
        imports,
    })
}

struct Walker<'a> {
    file: &'a FileDescriptorProto,
    table: &'a IdentifierTable,
    comments: CommentMap,
    /// target file name -> imported top-level symbols
    imports: BTreeMap<String, BTreeSet<String>>,
}

impl Walker<'_> {
    fn walk_message(
        &mut self,
        message: &DescriptorProto,
        full_name: &str,
        namespaced_name: &str,
        path: &[i32],
    ) -> Result<MessageNode> {
        let mut seen_numbers = HashSet::new();
        for field in &message.field {
            if !seen_numbers.insert(field.number) {
                bail!(
                    "duplicate field number {} in message {full_name}",
                    field.number
                );
            }
        }

        let is_map = message.is_map_entry();
        if is_map
            && !(message.field.len() == 2
                && message.field[0].name == "key"
                && message.field[0].number == 1
                && message.field[1].name == "value"
                && message.field[1].number == 2)
        {
            bail!("malformed map entry {full_name}");
        }

        let mut fields = Vec::new();
        for (j, field) in message.field.iter().enumerate() {
            let mut comment_path = path.to_vec();
            comment_path.extend([2, j as i32]);
            fields.push(self.walk_field(field, message, full_name, &comment_path)?);
        }

        let mut children = Vec::new();
        for (n, nested) in message.nested_type.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.extend([3, n as i32]);
            let node = self.walk_message(
                nested,
                &format!("{full_name}.{}", nested.name),
                &format!("{namespaced_name}.{}", nested.name),
                &child_path,
            )?;
            children.push(IrNode::Message(node));
        }
        for (n, e) in message.enum_type.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.extend([4, n as i32]);
            let node = self.walk_enum(e, &format!("{namespaced_name}.{}", e.name), &child_path)?;
            children.push(IrNode::Enum(node));
        }

        Ok(MessageNode {
            name: message.name.clone(),
            namespaced_name: namespaced_name.to_string(),
            leading_comments: self.comments.leading(path).map(str::to_string),
            is_map,
            fields,
            children,
        })
    }

    fn walk_enum(
        &self,
        e: &EnumDescriptorProto,
        namespaced_name: &str,
        path: &[i32],
    ) -> Result<EnumNode> {
        if !e.value.iter().any(|v| v.number == 0) {
            bail!("enum {} has no zero value", e.name);
        }
        let values = e
            .value
            .iter()
            .enumerate()
            .map(|(v, value)| {
                let mut value_path = path.to_vec();
                value_path.extend([2, v as i32]);
                EnumValue {
                    name: value.name.clone(),
                    number: value.number,
                    leading_comments: self.comments.leading(&value_path).map(str::to_string),
                }
            })
            .collect();
        Ok(EnumNode {
            name: e.name.clone(),
            namespaced_name: namespaced_name.to_string(),
            leading_comments: self.comments.leading(path).map(str::to_string),
            values,
        })
    }

    fn walk_field(
        &mut self,
        field: &FieldDescriptorProto,
        container: &DescriptorProto,
        container_full_name: &str,
        comment_path: &[i32],
    ) -> Result<Field> {
        let Some(field_type) = field.r#type() else {
            bail!(
                "field {container_full_name}.{} has unsupported type {}",
                field.name,
                field.r#type
            );
        };
        if field_type == Type::Group {
            bail!("field {container_full_name}.{} uses the group wire type", field.name);
        }

        let mut repeated = field.is_repeated();
        let optional = field.proto3_optional;
        if repeated && optional {
            bail!(
                "field {container_full_name}.{} is both repeated and optional",
                field.name
            );
        }

        // A map is a repeated field whose message type is a sibling-nested
        // entry marked map_entry.
        let mut map_entry: Option<(&DescriptorProto, &Identifier)> = None;
        if repeated && field_type == Type::Message {
            let target = normalize_type_name(&field.type_name);
            let entry = container
                .nested_type
                .iter()
                .find(|n| n.is_map_entry() && format!("{container_full_name}.{}", n.name) == target);
            if let Some(entry) = entry {
                let identifier = self
                    .table
                    .lookup(target)
                    .expect("entry messages are registered with their parent");
                map_entry = Some((entry, identifier));
            }
        }
        let map = map_entry.is_some();
        if map {
            repeated = false;
        }

        let name = lower_camel(&field.name);
        let json_name = if field.json_name.is_empty() {
            name.clone()
        } else {
            field.json_name.clone()
        };

        let (ts_type, ts_type_json, type_ref, default_value);
        if let Some((entry, identifier)) = map_entry {
            let value_field = &entry.field[1];
            let value =
                self.element_type(value_field, &format!("{container_full_name}.{}", entry.name))?;
            ts_type = format!("Record<string, {}>", value.ts_type);
            ts_type_json = format!("Record<string, {}>", value.ts_type_json);
            type_ref = Some(identifier.namespaced_name.clone());
            default_value = "{}".to_string();
        } else {
            let element = self.element_type(field, container_full_name)?;
            if repeated {
                ts_type = format!("{}[]", element.ts_type);
                ts_type_json = format!("{}[]", element.ts_type_json);
                default_value = "[]".to_string();
            } else {
                ts_type = element.ts_type;
                ts_type_json = element.ts_type_json;
                default_value = element.default_value;
            }
            type_ref = element.type_ref;
        }

        let (read, write, read_packed) = codec_tags(field_type, repeated, map);

        Ok(Field {
            name,
            proto_name: field.name.clone(),
            json_name,
            index: field.number,
            repeated,
            optional,
            map,
            r#type: field_type,
            read,
            write,
            read_packed,
            ts_type,
            ts_type_json,
            type_ref,
            default_value,
            leading_comments: self.comments.leading(comment_path).map(str::to_string),
        })
    }

    /// Type expression, JSON counterpart, reference and default for one
    /// element (the field itself, or a map entry's value field).
    fn element_type(
        &mut self,
        field: &FieldDescriptorProto,
        container_full_name: &str,
    ) -> Result<ElementType> {
        let field_type = field.r#type().expect("checked by walk_field");
        let scalar = match field_type {
            Type::Int32
            | Type::Uint32
            | Type::Sint32
            | Type::Fixed32
            | Type::Sfixed32
            | Type::Float
            | Type::Double => Some(("number", "number", "0")),
            Type::Int64 | Type::Uint64 | Type::Sint64 | Type::Fixed64 | Type::Sfixed64 => {
                Some(("bigint", "string", "0n"))
            }
            Type::Bool => Some(("boolean", "boolean", "false")),
            Type::String => Some(("string", "string", "\"\"")),
            Type::Bytes => Some(("Uint8Array", "string", "new Uint8Array()")),
            Type::Enum | Type::Message => None,
            Type::Group => unreachable!("rejected by walk_field"),
        };
        if let Some((ts, ts_json, default)) = scalar {
            return Ok(ElementType {
                ts_type: ts.to_string(),
                ts_type_json: ts_json.to_string(),
                type_ref: None,
                default_value: default.to_string(),
            });
        }

        let Some(identifier) = self.table.lookup(&field.type_name) else {
            bail!(
                "field {container_full_name}.{} references unknown type {}",
                field.name,
                field.type_name
            );
        };
        if identifier.file_name != self.file.name {
            let top_level = identifier
                .namespaced_name
                .split('.')
                .next()
                .expect("namespaced names are non-empty")
                .to_string();
            let symbols = self.imports.entry(identifier.file_name.clone()).or_default();
            if field_type == Type::Message {
                symbols.insert(format!("{top_level}JSON"));
            }
            symbols.insert(top_level);
        }

        let reference = identifier.namespaced_name.clone();
        let default_value = match field_type {
            Type::Enum => {
                let Some(zero) = &identifier.enum_zero else {
                    bail!(
                        "enum {} referenced by {container_full_name}.{} has no zero value",
                        field.type_name,
                        field.name
                    );
                };
                format!("\"{zero}\"")
            }
            _ => format!("{reference}.initialize()"),
        };

        Ok(ElementType {
            ts_type: reference.clone(),
            ts_type_json: reference.clone(),
            type_ref: Some(reference),
            default_value,
        })
    }
}

struct ElementType {
    ts_type: String,
    ts_type_json: String,
    type_ref: Option<String>,
    default_value: String,
}

/// Wire-codec method tags keyed by `(type, repeated, map)`. Repeated
/// scalars write packed (the proto3 default) and carry a packed read tag so
/// decoders accept both encodings.
fn codec_tags(field_type: Type, repeated: bool, map: bool) -> (&'static str, &'static str, Option<&'static str>) {
    if map {
        return ("readMessage", "writeRepeatedMessage", None);
    }
    let (read, write, packed_read, packed_write) = match field_type {
        Type::Double => ("readDouble", "writeDouble", "readPackedDouble", "writePackedDouble"),
        Type::Float => ("readFloat", "writeFloat", "readPackedFloat", "writePackedFloat"),
        Type::Int64 => ("readInt64", "writeInt64", "readPackedInt64", "writePackedInt64"),
        Type::Uint64 => ("readUint64", "writeUint64", "readPackedUint64", "writePackedUint64"),
        Type::Int32 => ("readInt32", "writeInt32", "readPackedInt32", "writePackedInt32"),
        Type::Fixed64 => ("readFixed64", "writeFixed64", "readPackedFixed64", "writePackedFixed64"),
        Type::Fixed32 => ("readFixed32", "writeFixed32", "readPackedFixed32", "writePackedFixed32"),
        Type::Bool => ("readBool", "writeBool", "readPackedBool", "writePackedBool"),
        Type::Uint32 => ("readUint32", "writeUint32", "readPackedUint32", "writePackedUint32"),
        Type::Enum => ("readEnum", "writeEnum", "readPackedEnum", "writePackedEnum"),
        Type::Sfixed32 => ("readSfixed32", "writeSfixed32", "readPackedSfixed32", "writePackedSfixed32"),
        Type::Sfixed64 => ("readSfixed64", "writeSfixed64", "readPackedSfixed64", "writePackedSfixed64"),
        Type::Sint32 => ("readSint32", "writeSint32", "readPackedSint32", "writePackedSint32"),
        Type::Sint64 => ("readSint64", "writeSint64", "readPackedSint64", "writePackedSint64"),
        Type::String => {
            return if repeated {
                ("readString", "writeRepeatedString", None)
            } else {
                ("readString", "writeString", None)
            }
        }
        Type::Bytes => {
            return if repeated {
                ("readBytes", "writeRepeatedBytes", None)
            } else {
                ("readBytes", "writeBytes", None)
            }
        }
        Type::Message => {
            return if repeated {
                ("readMessage", "writeRepeatedMessage", None)
            } else {
                ("readMessage", "writeMessage", None)
            }
        }
        Type::Group => unreachable!("rejected by walk_field"),
    };
    if repeated {
        (read, packed_write, Some(packed_read))
    } else {
        (read, write, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        EnumValueDescriptorProto, Label, MessageOptions,
    };

    fn scalar_field(name: &str, number: i32, field_type: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: name.to_string(),
            number,
            label: Label::Optional as i32,
            r#type: field_type as i32,
            ..Default::default()
        }
    }

    fn repeated_field(name: &str, number: i32, field_type: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            label: Label::Repeated as i32,
            ..scalar_field(name, number, field_type)
        }
    }

    fn simple_enum(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
        EnumDescriptorProto {
            name: name.to_string(),
            value: values
                .iter()
                .map(|(n, number)| EnumValueDescriptorProto {
                    name: n.to_string(),
                    number: *number,
                })
                .collect(),
        }
    }

    fn file(name: &str, package: &str) -> FileDescriptorProto {
        FileDescriptorProto {
            name: name.to_string(),
            package: package.to_string(),
            syntax: "proto3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn scalar_fields_get_types_and_tags() {
        let mut f = file("m.proto", "");
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![
                scalar_field("n", 1, Type::Int32),
                scalar_field("big_value", 2, Type::Int64),
                scalar_field("data", 3, Type::Bytes),
                repeated_field("xs", 4, Type::Int32),
                repeated_field("names", 5, Type::String),
            ],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        let ir = walk_file(&f, &table).unwrap();

        let IrNode::Message(m) = &ir.nodes[0] else {
            panic!("expected message")
        };
        assert_eq!(m.fields[0].ts_type, "number");
        assert_eq!(m.fields[0].read, "readInt32");
        assert_eq!(m.fields[0].write, "writeInt32");
        assert_eq!(m.fields[0].read_packed, None);

        assert_eq!(m.fields[1].name, "bigValue");
        assert_eq!(m.fields[1].proto_name, "big_value");
        assert_eq!(m.fields[1].json_name, "bigValue");
        assert_eq!(m.fields[1].ts_type, "bigint");
        assert_eq!(m.fields[1].ts_type_json, "string");
        assert_eq!(m.fields[1].default_value, "0n");

        assert_eq!(m.fields[2].ts_type, "Uint8Array");
        assert!(ir.uses_bytes());

        assert!(m.fields[3].repeated);
        assert_eq!(m.fields[3].ts_type, "number[]");
        assert_eq!(m.fields[3].write, "writePackedInt32");
        assert_eq!(m.fields[3].read_packed, Some("readPackedInt32"));
        assert_eq!(m.fields[3].default_value, "[]");

        assert_eq!(m.fields[4].write, "writeRepeatedString");
        assert_eq!(m.fields[4].read_packed, None);
    }

    #[test]
    fn json_name_override_wins() {
        let mut f = file("m.proto", "");
        let mut field = scalar_field("foo_bar", 1, Type::String);
        field.json_name = "fooOverride".to_string();
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![field],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        let ir = walk_file(&f, &table).unwrap();
        let IrNode::Message(m) = &ir.nodes[0] else { panic!() };
        assert_eq!(m.fields[0].name, "fooBar");
        assert_eq!(m.fields[0].json_name, "fooOverride");
    }

    #[test]
    fn nested_references_are_namespaced() {
        let mut f = file("tree.proto", "forest");
        f.message_type.push(DescriptorProto {
            name: "Tree".to_string(),
            field: vec![FieldDescriptorProto {
                name: "root".to_string(),
                number: 1,
                label: Label::Optional as i32,
                r#type: Type::Message as i32,
                type_name: ".forest.Tree.Node".to_string(),
                ..Default::default()
            }],
            nested_type: vec![DescriptorProto {
                name: "Node".to_string(),
                field: vec![FieldDescriptorProto {
                    name: "children".to_string(),
                    number: 1,
                    label: Label::Repeated as i32,
                    r#type: Type::Message as i32,
                    type_name: ".forest.Tree.Node".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        let ir = walk_file(&f, &table).unwrap();

        let IrNode::Message(tree) = &ir.nodes[0] else { panic!() };
        assert_eq!(tree.fields[0].ts_type, "Tree.Node");
        assert_eq!(tree.fields[0].default_value, "Tree.Node.initialize()");
        let IrNode::Message(node) = &tree.children[0] else { panic!() };
        assert_eq!(node.namespaced_name, "Tree.Node");
        // cyclic self reference resolves by name
        assert_eq!(node.fields[0].ts_type, "Tree.Node[]");
        assert!(ir.imports.is_empty());
    }

    #[test]
    fn cross_file_reference_imports() {
        let mut other = file("pkg/other.proto", "pkg");
        other.message_type.push(DescriptorProto {
            name: "Other".to_string(),
            ..Default::default()
        });
        let mut f = file("main.proto", "pkg");
        f.dependency.push("pkg/other.proto".to_string());
        f.message_type.push(DescriptorProto {
            name: "Main".to_string(),
            field: vec![FieldDescriptorProto {
                name: "other".to_string(),
                number: 1,
                label: Label::Optional as i32,
                r#type: Type::Message as i32,
                type_name: ".pkg.Other".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let table = IdentifierTable::build(&[other, f.clone()]);
        let ir = walk_file(&f, &table).unwrap();
        assert_eq!(ir.imports.len(), 1);
        assert_eq!(ir.imports[0].module, "./pkg/other.pb");
        assert_eq!(ir.imports[0].symbols, vec!["Other", "OtherJSON"]);
    }

    #[test]
    fn map_fields_become_records() {
        let mut f = file("mm.proto", "");
        f.message_type.push(DescriptorProto {
            name: "Mm".to_string(),
            field: vec![FieldDescriptorProto {
                name: "m".to_string(),
                number: 1,
                label: Label::Repeated as i32,
                r#type: Type::Message as i32,
                type_name: ".Mm.MEntry".to_string(),
                ..Default::default()
            }],
            nested_type: vec![DescriptorProto {
                name: "MEntry".to_string(),
                field: vec![
                    scalar_field("key", 1, Type::String),
                    scalar_field("value", 2, Type::Int32),
                ],
                options: Some(MessageOptions { map_entry: true }),
                ..Default::default()
            }],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        let ir = walk_file(&f, &table).unwrap();

        let IrNode::Message(mm) = &ir.nodes[0] else { panic!() };
        let field = &mm.fields[0];
        assert!(field.map);
        assert!(!field.repeated);
        assert_eq!(field.ts_type, "Record<string, number>");
        assert_eq!(field.type_ref.as_deref(), Some("Mm.MEntry"));
        assert_eq!(field.default_value, "{}");
        let IrNode::Message(entry) = &mm.children[0] else { panic!() };
        assert!(entry.is_map);
    }

    #[test]
    fn enum_defaults_use_zero_value() {
        let mut f = file("e.proto", "");
        f.enum_type.push(simple_enum("E", &[("A", 0), ("B", 1)]));
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![FieldDescriptorProto {
                name: "e".to_string(),
                number: 1,
                label: Label::Optional as i32,
                r#type: Type::Enum as i32,
                type_name: ".E".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        let ir = walk_file(&f, &table).unwrap();
        let IrNode::Message(m) = &ir.nodes[0] else { panic!() };
        assert_eq!(m.fields[0].default_value, "\"A\"");
        assert_eq!(m.fields[0].read, "readEnum");
    }

    #[test]
    fn walker_errors_are_fatal() {
        // duplicate field number
        let mut f = file("dup.proto", "");
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![
                scalar_field("a", 1, Type::Int32),
                scalar_field("b", 1, Type::Int32),
            ],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        assert!(walk_file(&f, &table).is_err());

        // missing type reference
        let mut f = file("missing.proto", "");
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![FieldDescriptorProto {
                name: "x".to_string(),
                number: 1,
                label: Label::Optional as i32,
                r#type: Type::Message as i32,
                type_name: ".Nowhere".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        assert!(walk_file(&f, &table).is_err());

        // enum without zero value
        let mut f = file("zero.proto", "");
        f.enum_type.push(simple_enum("E", &[("ONE", 1)]));
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        assert!(walk_file(&f, &table).is_err());

        // group wire type
        let mut f = file("group.proto", "");
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![scalar_field("g", 1, Type::Group)],
            ..Default::default()
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        assert!(walk_file(&f, &table).is_err());
    }

    #[test]
    fn comments_attach_to_nodes_and_fields() {
        use crate::descriptor::{Location, SourceCodeInfo};
        let mut f = file("c.proto", "");
        f.message_type.push(DescriptorProto {
            name: "M".to_string(),
            field: vec![scalar_field("x", 1, Type::Int32)],
            ..Default::default()
        });
        f.source_code_info = Some(SourceCodeInfo {
            location: vec![
                Location {
                    path: vec![4, 0],
                    leading_comments: Some(" The message.\n".to_string()),
                },
                Location {
                    path: vec![4, 0, 2, 0],
                    leading_comments: Some(" The field.\n".to_string()),
                },
            ],
        });
        let table = IdentifierTable::build(std::slice::from_ref(&f));
        let ir = walk_file(&f, &table).unwrap();
        let IrNode::Message(m) = &ir.nodes[0] else { panic!() };
        assert_eq!(m.leading_comments.as_deref(), Some(" The message.\n"));
        assert_eq!(m.fields[0].leading_comments.as_deref(), Some(" The field.\n"));
    }
}
