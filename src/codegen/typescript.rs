// TypeScript / JavaScript emitter.
//
// Renders one file IR into a single source string, in fixed order: banner,
// runtime imports, plugin imports, cross-file imports, type declarations,
// plugin services, binary codec block, JSON codec block. JavaScript mode
// emits the same codec objects with annotations and casts stripped and no
// declarations block; declaration-only mode emits only the declarations.

use super::config::{Config, Language};
use super::ir::{EnumNode, Field, FileIr, IrNode, MessageNode};
use crate::descriptor::Type;

pub fn emit_file(
    ir: &FileIr,
    config: &Config,
    language: Language,
    plugin_imports: &[String],
    plugin_services: &[String],
) -> String {
    let emitter = Emitter {
        ir,
        config,
        language,
        declaration_only: language == Language::TypeScript && config.typescript.emit_declaration_only,
        p: Printer::default(),
    };
    emitter.emit(plugin_imports, plugin_services)
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent -= 1;
        self.line(text);
    }

    /// `} else {` and friends: close the previous block and open the next
    /// on one line.
    fn chain(&mut self, text: &str) {
        self.indent -= 1;
        self.line(text);
        self.indent += 1;
    }
}

struct Emitter<'a> {
    ir: &'a FileIr,
    config: &'a Config,
    language: Language,
    declaration_only: bool,
    p: Printer,
}

/// `M.Inner` -> `MJSON.Inner`: the JSON codec suffix applies to the
/// top-level symbol only.
fn json_ref(reference: &str) -> String {
    match reference.split_once('.') {
        Some((top, rest)) => format!("{top}JSON.{rest}"),
        None => format!("{reference}JSON"),
    }
}

fn is_64bit(field_type: Type) -> bool {
    matches!(
        field_type,
        Type::Int64 | Type::Uint64 | Type::Sint64 | Type::Fixed64 | Type::Sfixed64
    )
}

fn is_float(field_type: Type) -> bool {
    matches!(field_type, Type::Float | Type::Double)
}

impl Emitter<'_> {
    /// Annotation text, dropped in JavaScript mode.
    fn ann(&self, annotation: &str) -> String {
        match self.language {
            Language::TypeScript => annotation.to_string(),
            Language::JavaScript => String::new(),
        }
    }

    fn cast(&self, expr: &str, target: &str) -> String {
        match self.language {
            Language::TypeScript => format!("{expr} as {target}"),
            Language::JavaScript => expr.to_string(),
        }
    }

    fn emit(mut self, plugin_imports: &[String], plugin_services: &[String]) -> String {
        self.p
            .line(&format!("// Generated by protoc-gen-tspb from {}. DO NOT EDIT!", self.ir.file_name));
        self.p.line("/* eslint-disable */");
        self.p.blank();

        self.emit_runtime_imports();
        if !self.declaration_only {
            for import in plugin_imports {
                for line in import.lines() {
                    self.p.line(line);
                }
            }
            if !plugin_imports.is_empty() {
                self.p.blank();
            }
        }
        self.emit_cross_file_imports();

        if self.language == Language::TypeScript {
            for node in &self.ir.nodes {
                self.emit_node_types(node, true);
            }
        }

        if !self.declaration_only {
            for service in plugin_services {
                for line in service.lines() {
                    self.p.line(line);
                }
                self.p.blank();
            }
        }

        if !self.declaration_only {
            self.p.line("//========================================//");
            self.p.line("//          Protobuf Encode / Decode      //");
            self.p.line("//========================================//");
            self.p.blank();
            for node in &self.ir.nodes {
                self.emit_node_codec(node, true);
            }

            self.p.line("//========================================//");
            self.p.line("//        JSON Encode / Decode            //");
            self.p.line("//========================================//");
            self.p.blank();
            for node in &self.ir.nodes {
                self.emit_node_json(node, true);
            }
        }

        self.p.out
    }

    fn emit_runtime_imports(&mut self) {
        if self.declaration_only {
            return;
        }
        let mut symbols = vec!["BinaryReader", "BinaryWriter"];
        if self.ir.uses_bytes() {
            symbols.insert(0, "decodeBase64Bytes");
            symbols.push("encodeBase64Bytes");
            symbols.sort_unstable();
        }
        if self.language == Language::TypeScript {
            self.p.line("import type { ByteSource } from \"tspb\";");
        }
        self.p
            .line(&format!("import {{ {} }} from \"tspb\";", symbols.join(", ")));
        self.p.blank();
    }

    fn emit_cross_file_imports(&mut self) {
        if self.ir.imports.is_empty() {
            return;
        }
        for import in &self.ir.imports {
            let symbols: Vec<&str> = if self.declaration_only {
                import
                    .symbols
                    .iter()
                    .filter(|s| !s.ends_with("JSON"))
                    .map(String::as_str)
                    .collect()
            } else {
                import.symbols.iter().map(String::as_str).collect()
            };
            if symbols.is_empty() {
                continue;
            }
            let keyword = if self.declaration_only {
                "import type"
            } else {
                "import"
            };
            self.p.line(&format!(
                "{keyword} {{ {} }} from \"{}\";",
                symbols.join(", "),
                import.module
            ));
        }
        self.p.blank();
    }

    fn emit_comments(&mut self, comments: Option<&str>) {
        let Some(comments) = comments else { return };
        for line in comments.lines() {
            self.p.line(format!("//{line}").trim_end());
        }
    }

    //========================================//
    // Type declarations
    //========================================//

    fn emit_node_types(&mut self, node: &IrNode, top_level: bool) {
        match node {
            IrNode::Message(m) => self.emit_message_types(m, top_level),
            IrNode::Enum(e) => self.emit_enum_type(e),
        }
    }

    fn emit_message_types(&mut self, m: &MessageNode, top_level: bool) {
        self.emit_comments(m.leading_comments.as_deref());
        self.p.open(&format!("export interface {} {{", m.name));
        for field in &m.fields {
            self.emit_comments(field.leading_comments.as_deref());
            if field.optional {
                self.p
                    .line(&format!("{}?: {} | null;", field.name, field.ts_type));
            } else {
                self.p.line(&format!("{}: {};", field.name, field.ts_type));
            }
        }
        self.p.close("}");
        self.p.blank();

        if !m.children.is_empty() {
            let keyword = if top_level {
                "export declare namespace"
            } else {
                "export namespace"
            };
            self.p.open(&format!("{keyword} {} {{", m.name));
            for child in &m.children {
                self.emit_node_types(child, false);
            }
            self.p.close("}");
            self.p.blank();
        }
    }

    fn emit_enum_type(&mut self, e: &EnumNode) {
        self.emit_comments(e.leading_comments.as_deref());
        let union = e
            .values
            .iter()
            .map(|v| format!("\"{}\"", v.name))
            .collect::<Vec<_>>()
            .join(" | ");
        self.p.line(&format!("export type {} = {union};", e.name));
        self.p.blank();
    }

    //========================================//
    // Binary codec
    //========================================//

    fn emit_node_codec(&mut self, node: &IrNode, top_level: bool) {
        match node {
            IrNode::Message(m) => self.emit_message_codec(m, top_level),
            IrNode::Enum(e) => self.emit_enum_codec(e, top_level),
        }
    }

    fn emit_message_codec(&mut self, m: &MessageNode, top_level: bool) {
        let reference = &m.namespaced_name;
        if top_level {
            self.p.open(&format!("export const {} = {{", m.name));
        } else {
            self.p.open(&format!("{}: {{", m.name));
        }

        if !m.is_map {
            self.emit_binary_encode(m, reference);
            self.emit_binary_decode(reference);
            self.emit_initialize(m, reference, false);
        }
        self.emit_binary_write_message(m, reference);
        self.emit_binary_read_message(m, reference);

        for child in &m.children {
            self.emit_node_codec(child, false);
        }

        if top_level {
            self.p.close("};");
            self.p.blank();
        } else {
            self.p.close("},");
        }
    }

    fn emit_binary_encode(&mut self, m: &MessageNode, reference: &str) {
        self.p.line("/**");
        self.p.line(&format!(" * Serializes {reference} to protobuf."));
        self.p.line(" */");
        if m.fields.is_empty() {
            // Empty messages short-circuit to an empty byte sequence.
            self.p.open(&format!(
                "encode: function (_msg{}){} {{",
                self.ann(&format!("?: Partial<{reference}>")),
                self.ann(": Uint8Array")
            ));
            self.p.line("return new Uint8Array();");
            self.p.close("},");
            self.p.blank();
            return;
        }
        self.p.open(&format!(
            "encode: function (msg{}){} {{",
            self.ann(&format!(": Partial<{reference}>")),
            self.ann(": Uint8Array")
        ));
        self.p.line("const writer = new BinaryWriter();");
        self.p.line(&format!("{reference}._writeMessage(msg, writer);"));
        self.p.line("return writer.getResultBuffer();");
        self.p.close("},");
        self.p.blank();
    }

    fn emit_binary_decode(&mut self, reference: &str) {
        self.p.line("/**");
        self.p
            .line(&format!(" * Deserializes {reference} from protobuf."));
        self.p.line(" */");
        self.p.open(&format!(
            "decode: function (bytes{}){} {{",
            self.ann(": ByteSource"),
            self.ann(&format!(": {reference}"))
        ));
        self.p.line(&format!(
            "return {reference}._readMessage({reference}.initialize(), new BinaryReader(bytes));"
        ));
        self.p.close("},");
        self.p.blank();
    }

    fn emit_initialize(&mut self, m: &MessageNode, reference: &str, json: bool) {
        self.p.line("/**");
        self.p.line(&format!(
            " * Initializes {reference} with all fields set to their default value."
        ));
        self.p.line(" */");
        self.p.open(&format!(
            "initialize: function (msg{}){} {{",
            self.ann(&format!("?: Partial<{reference}>")),
            self.ann(&format!(": {reference}"))
        ));
        self.p.open("return {");
        for field in &m.fields {
            if field.optional {
                continue;
            }
            let default = if json && field.r#type == Type::Message && !field.repeated && !field.map
            {
                // The nested initializer lives on the JSON codec object.
                format!("{}.initialize()", json_ref(field.type_ref.as_deref().unwrap()))
            } else {
                field.default_value.clone()
            };
            self.p.line(&format!("{}: {default},", field.name));
        }
        self.p.line("...msg,");
        self.p.close("};");
        self.p.close("},");
        self.p.blank();
    }

    fn emit_binary_write_message(&mut self, m: &MessageNode, reference: &str) {
        self.p.line("/**");
        self.p.line(" * @private");
        self.p.line(" */");
        let msg_name = if m.fields.is_empty() { "_msg" } else { "msg" };
        self.p.open(&format!(
            "_writeMessage: function ({msg_name}{}, writer{}){} {{",
            self.ann(&format!(": Partial<{reference}>")),
            self.ann(": BinaryWriter"),
            self.ann(": BinaryWriter")
        ));
        for field in &m.fields {
            self.emit_binary_field_write(field);
        }
        self.p.line("return writer;");
        self.p.close("},");
        self.p.blank();
    }

    fn emit_binary_field_write(&mut self, field: &Field) {
        let value = format!("msg.{}", field.name);
        let index = field.index;

        if field.map {
            let entry_ref = field.type_ref.as_deref().unwrap();
            self.p.open(&format!("if ({value}) {{"));
            let entries = self.cast(
                &format!("Object.entries({value}).map(([key, value]) => ({{ key, value }}))"),
                "any",
            );
            self.p.line(&format!(
                "writer.{}({index}, {entries}, {entry_ref}._writeMessage);",
                field.write
            ));
            self.p.close("}");
            return;
        }

        if field.repeated {
            self.p.open(&format!("if ({value}?.length) {{"));
            let elements = if is_64bit(field.r#type) {
                self.cast(&format!("{value}.map((v) => v.toString())"), "any")
            } else if field.r#type == Type::Enum {
                let enum_ref = field.type_ref.as_deref().unwrap();
                format!("{value}.map({enum_ref}._toInt)")
            } else if field.r#type == Type::Message {
                self.cast(&value, "any")
            } else {
                value.clone()
            };
            self.p
                .line(&format!("writer.{}({index}, {elements});", field.write));
            self.p.close("}");
            return;
        }

        // Emit guard per field shape, then the write itself.
        let guard = if field.optional {
            format!("{value} != undefined")
        } else if field.r#type == Type::Bytes {
            format!("{value}?.length")
        } else if field.r#type == Type::Enum {
            let enum_ref = field.type_ref.as_deref().unwrap();
            format!("{value} && {enum_ref}._toInt({value})")
        } else {
            value.clone()
        };
        self.p.open(&format!("if ({guard}) {{"));
        match field.r#type {
            Type::Message => {
                let message_ref = field.type_ref.as_deref().unwrap();
                self.p.line(&format!(
                    "writer.{}({index}, {value}, {message_ref}._writeMessage);",
                    field.write
                ));
            }
            Type::Enum => {
                let enum_ref = field.type_ref.as_deref().unwrap();
                self.p.line(&format!(
                    "writer.{}({index}, {enum_ref}._toInt({value}));",
                    field.write
                ));
            }
            _ if is_64bit(field.r#type) => {
                let as_string = self.cast(&format!("{value}.toString()"), "any");
                self.p
                    .line(&format!("writer.{}({index}, {as_string});", field.write));
            }
            _ => {
                self.p
                    .line(&format!("writer.{}({index}, {value});", field.write));
            }
        }
        self.p.close("}");
    }

    fn emit_binary_read_message(&mut self, m: &MessageNode, reference: &str) {
        self.p.line("/**");
        self.p.line(" * @private");
        self.p.line(" */");
        let msg_name = if m.fields.is_empty() { "_msg" } else { "msg" };
        self.p.open(&format!(
            "_readMessage: function ({msg_name}{}, reader{}){} {{",
            self.ann(&format!(": {reference}")),
            self.ann(": BinaryReader"),
            self.ann(&format!(": {reference}"))
        ));
        self.p.open("while (reader.nextField()) {");
        self.p.line("const field = reader.getFieldNumber();");
        self.p.open("switch (field) {");
        for field in &m.fields {
            self.p.open(&format!("case {}: {{", field.index));
            self.emit_binary_field_read(m, field);
            self.p.line("break;");
            self.p.close("}");
        }
        self.p.open("default: {");
        self.p.line("reader.skipField();");
        self.p.line("break;");
        self.p.close("}");
        self.p.close("}");
        self.p.close("}");
        self.p.line(&format!("return {msg_name};"));
        self.p.close("},");
        self.p.blank();
    }

    /// Element read expression, with enum and 64-bit routing applied.
    fn read_expr(&self, field: &Field) -> String {
        let base = format!("reader.{}()", field.read);
        if is_64bit(field.r#type) {
            format!("BigInt({base})")
        } else if field.r#type == Type::Enum {
            let enum_ref = field.type_ref.as_deref().unwrap();
            format!("{enum_ref}._fromInt({base})")
        } else {
            base
        }
    }

    fn emit_binary_field_read(&mut self, m: &MessageNode, field: &Field) {
        let target = format!("msg.{}", field.name);

        if field.map {
            let entry_ref = field.type_ref.as_deref().unwrap();
            let entry = self.map_entry(m, field);
            let key_default = &entry.fields[0].default_value;
            let value_default = &entry.fields[1].default_value;
            self.p.line(&format!(
                "const entry = {{ key: {key_default}, value: {value_default} }};"
            ));
            self.p
                .line(&format!("reader.readMessage(entry, {entry_ref}._readMessage);"));
            self.p
                .line(&format!("{target}[entry.key.toString()] = entry.value;"));
            return;
        }

        if field.repeated {
            if field.r#type == Type::Message {
                let message_ref = field.type_ref.as_deref().unwrap();
                self.p.line(&format!("const m = {message_ref}.initialize();"));
                self.p
                    .line(&format!("reader.readMessage(m, {message_ref}._readMessage);"));
                self.p.line(&format!("{target}.push(m);"));
                return;
            }
            let Some(read_packed) = field.read_packed else {
                // strings and bytes: always one element per wire record
                self.p
                    .line(&format!("{target}.push(reader.{}());", field.read));
                return;
            };
            // Both encodings are accepted regardless of what the writer
            // chose.
            self.p.open("if (reader.isDelimited()) {");
            let packed = format!("reader.{read_packed}()");
            let elements = if is_64bit(field.r#type) {
                format!("{packed}.map(BigInt)")
            } else if field.r#type == Type::Enum {
                let enum_ref = field.type_ref.as_deref().unwrap();
                format!("{packed}.map({enum_ref}._fromInt)")
            } else {
                packed
            };
            self.p.line(&format!("{target}.push(...{elements});"));
            self.p.chain("} else {");
            self.p
                .line(&format!("{target}.push({});", self.read_expr(field)));
            self.p.close("}");
            return;
        }

        if field.r#type == Type::Message {
            let message_ref = field.type_ref.as_deref().unwrap();
            if field.optional {
                self.p
                    .line(&format!("{target} = {message_ref}.initialize();"));
            }
            self.p.line(&format!(
                "reader.readMessage({target}, {message_ref}._readMessage);"
            ));
            return;
        }

        self.p.line(&format!("{target} = {};", self.read_expr(field)));
    }

    fn map_entry<'b>(&self, m: &'b MessageNode, field: &Field) -> &'b MessageNode {
        let entry_ref = field.type_ref.as_deref().unwrap();
        match m.child(entry_ref) {
            Some(IrNode::Message(entry)) => entry,
            _ => unreachable!("map fields always reference a sibling entry message"),
        }
    }

    fn emit_enum_codec(&mut self, e: &EnumNode, top_level: bool) {
        self.emit_comments(e.leading_comments.as_deref());
        if top_level {
            self.p.open(&format!("export const {} = {{", e.name));
        } else {
            self.p.open(&format!("{}: {{", e.name));
        }
        for value in &e.values {
            self.emit_comments(value.leading_comments.as_deref());
            self.p.line(&format!("{}: \"{}\",", value.name, value.name));
        }

        let reference = &e.namespaced_name;
        self.p.line("/**");
        self.p.line(" * @private");
        self.p.line(" */");
        self.p.open(&format!(
            "_fromInt: function (i{}){} {{",
            self.ann(": number"),
            self.ann(&format!(": {reference}"))
        ));
        self.p.open("switch (i) {");
        for value in &e.values {
            self.p.open(&format!("case {}: {{", value.number));
            self.p.line(&format!("return \"{}\";", value.name));
            self.p.close("}");
        }
        self.p.open("default: {");
        // Unknown enumerators survive as raw numbers.
        self.p.line(&format!(
            "return {};",
            self.cast(&self.cast("i", "unknown"), reference)
        ));
        self.p.close("}");
        self.p.close("}");
        self.p.close("},");

        self.p.line("/**");
        self.p.line(" * @private");
        self.p.line(" */");
        self.p.open(&format!(
            "_toInt: function (i{}){} {{",
            self.ann(&format!(": {reference}")),
            self.ann(": number")
        ));
        self.p.open("switch (i) {");
        for value in &e.values {
            self.p.open(&format!("case \"{}\": {{", value.name));
            self.p.line(&format!("return {};", value.number));
            self.p.close("}");
        }
        self.p.open("default: {");
        self.p.line(&format!(
            "return {};",
            self.cast(&self.cast("i", "unknown"), "number")
        ));
        self.p.close("}");
        self.p.close("}");
        self.p.close("},");

        if top_level {
            match self.language {
                Language::TypeScript => self.p.close("} as const;"),
                Language::JavaScript => self.p.close("};"),
            }
            self.p.blank();
        } else {
            self.p.close("},");
        }
    }

    //========================================//
    // JSON codec
    //========================================//

    fn emit_node_json(&mut self, node: &IrNode, top_level: bool) {
        match node {
            IrNode::Message(m) => self.emit_message_json(m, top_level),
            IrNode::Enum(e) => {
                // Enumerator names are their own JSON form; the binary-block
                // object serves both codecs.
                if top_level {
                    self.p
                        .line(&format!("export const {}JSON = {};", e.name, e.name));
                    self.p.blank();
                }
            }
        }
    }

    fn emit_message_json(&mut self, m: &MessageNode, top_level: bool) {
        let reference = json_ref(&m.namespaced_name);
        if top_level {
            self.p.open(&format!("export const {}JSON = {{", m.name));
        } else {
            self.p.open(&format!("{}: {{", m.name));
        }

        if !m.is_map {
            self.emit_json_encode(m, &reference, &m.namespaced_name);
            self.emit_json_decode(&reference, &m.namespaced_name);
            self.emit_initialize(m, &m.namespaced_name, true);
        }
        self.emit_json_write_message(m, &m.namespaced_name);
        self.emit_json_read_message(m, &m.namespaced_name);

        for child in &m.children {
            self.emit_node_json(child, false);
        }

        if top_level {
            self.p.close("};");
            self.p.blank();
        } else {
            self.p.close("},");
        }
    }

    fn emit_json_encode(&mut self, m: &MessageNode, reference: &str, type_name: &str) {
        self.p.line("/**");
        self.p
            .line(&format!(" * Serializes {type_name} to JSON."));
        self.p.line(" */");
        if m.fields.is_empty() {
            self.p.open(&format!(
                "encode: function (_msg{}){} {{",
                self.ann(&format!("?: Partial<{type_name}>")),
                self.ann(": string")
            ));
            self.p.line("return \"{}\";");
            self.p.close("},");
            self.p.blank();
            return;
        }
        self.p.open(&format!(
            "encode: function (msg{}){} {{",
            self.ann(&format!(": Partial<{type_name}>")),
            self.ann(": string")
        ));
        self.p
            .line(&format!("return JSON.stringify({reference}._writeMessage(msg));"));
        self.p.close("},");
        self.p.blank();
    }

    fn emit_json_decode(&mut self, reference: &str, type_name: &str) {
        self.p.line("/**");
        self.p
            .line(&format!(" * Deserializes {type_name} from JSON."));
        self.p.line(" */");
        self.p.open(&format!(
            "decode: function (json{}){} {{",
            self.ann(": string"),
            self.ann(&format!(": {type_name}"))
        ));
        self.p.line(&format!(
            "return {reference}._readMessage({reference}.initialize(), JSON.parse(json));"
        ));
        self.p.close("},");
        self.p.blank();
    }

    fn emit_json_write_message(&mut self, m: &MessageNode, type_name: &str) {
        self.p.line("/**");
        self.p.line(" * @private");
        self.p.line(" */");
        let msg_name = if m.fields.is_empty() { "_msg" } else { "msg" };
        self.p.open(&format!(
            "_writeMessage: function ({msg_name}{}){} {{",
            self.ann(&format!(": Partial<{type_name}>")),
            self.ann(": Record<string, unknown>")
        ));
        self.p.line(&format!(
            "const json{} = {{}};",
            self.ann(": Record<string, unknown>")
        ));
        for field in &m.fields {
            self.emit_json_field_write(m, field);
        }
        self.p.line("return json;");
        self.p.close("},");
        self.p.blank();
    }

    fn json_key(&self, field: &Field) -> String {
        if self.config.json.use_proto_field_name {
            field.proto_name.clone()
        } else {
            field.json_name.clone()
        }
    }

    /// JSON value expression for one element.
    fn json_value_expr(&self, field_type: Type, type_ref: Option<&str>, value: &str) -> String {
        if is_64bit(field_type) {
            return format!("String({value})");
        }
        if is_float(field_type) {
            return format!("Number.isFinite({value}) ? {value} : String({value})");
        }
        match field_type {
            Type::Bytes => format!("encodeBase64Bytes({value})"),
            Type::Message => format!("{}._writeMessage({value})", json_ref(type_ref.unwrap())),
            _ => value.to_string(),
        }
    }

    fn emit_json_field_write(&mut self, m: &MessageNode, field: &Field) {
        let value = format!("msg.{}", field.name);
        let key = self.json_key(field);
        let emit_defaults = self.config.json.emit_fields_with_default_values && !field.optional;

        if field.map {
            let entry = self.map_entry(m, field);
            let value_field = &entry.fields[1];
            let transform = self.json_value_expr(
                value_field.r#type,
                value_field.type_ref.as_deref(),
                "value",
            );
            let fold_over = |source: &str| {
                format!(
                    "Object.fromEntries(Object.entries({source}).map(([key, value]) => [key, {transform}]))"
                )
            };
            if emit_defaults {
                let fold = self.cast(&fold_over(&format!("({value} ?? {{}})")), &field.ts_type_json);
                self.p.line(&format!("json[\"{key}\"] = {fold};"));
            } else {
                self.p
                    .open(&format!("if ({value} && Object.keys({value}).length > 0) {{"));
                let fold = self.cast(&fold_over(&value), &field.ts_type_json);
                self.p.line(&format!("json[\"{key}\"] = {fold};"));
                self.p.close("}");
            }
            return;
        }

        if field.repeated {
            let transform = match field.r#type {
                _ if is_64bit(field.r#type) => format!("{value}.map(String)"),
                _ if is_float(field.r#type) => {
                    format!("{value}.map((v) => (Number.isFinite(v) ? v : String(v)))")
                }
                Type::Bytes => format!("{value}.map(encodeBase64Bytes)"),
                Type::Message => format!(
                    "{value}.map({}._writeMessage)",
                    json_ref(field.type_ref.as_deref().unwrap())
                ),
                _ => value.clone(),
            };
            if emit_defaults {
                let fallback = if transform == value {
                    format!("{value} ?? []")
                } else {
                    format!("{value} ? {transform} : []")
                };
                self.p.line(&format!("json[\"{key}\"] = {fallback};"));
            } else {
                self.p.open(&format!("if ({value}?.length) {{"));
                self.p.line(&format!("json[\"{key}\"] = {transform};"));
                self.p.close("}");
            }
            return;
        }

        if field.r#type == Type::Message {
            let message_json = json_ref(field.type_ref.as_deref().unwrap());
            if emit_defaults {
                let fallback = format!(
                    "{value} ? {message_json}._writeMessage({value}) : {{}}"
                );
                self.p.line(&format!("json[\"{key}\"] = {fallback};"));
            } else {
                self.p.open(&format!("if ({value}) {{"));
                self.p.line(&format!(
                    "const _{}_ = {message_json}._writeMessage({value});",
                    field.name
                ));
                self.p
                    .open(&format!("if (Object.keys(_{}_).length > 0) {{", field.name));
                self.p
                    .line(&format!("json[\"{key}\"] = _{}_;", field.name));
                self.p.close("}");
                self.p.close("}");
            }
            return;
        }

        let expr = self.json_value_expr(field.r#type, field.type_ref.as_deref(), &value);
        if emit_defaults {
            let fallback = if expr == value {
                format!("{value} ?? {}", field.default_value)
            } else {
                format!("{value} != undefined ? {expr} : {}", field.default_value)
            };
            self.p.line(&format!("json[\"{key}\"] = {fallback};"));
            return;
        }
        let guard = if field.optional {
            format!("{value} != undefined")
        } else if field.r#type == Type::Bytes {
            format!("{value}?.length")
        } else if field.r#type == Type::Enum {
            let enum_ref = field.type_ref.as_deref().unwrap();
            format!("{value} && {enum_ref}._toInt({value})")
        } else {
            value.clone()
        };
        self.p.open(&format!("if ({guard}) {{"));
        self.p.line(&format!("json[\"{key}\"] = {expr};"));
        self.p.close("}");
    }

    fn emit_json_read_message(&mut self, m: &MessageNode, type_name: &str) {
        self.p.line("/**");
        self.p.line(" * @private");
        self.p.line(" */");
        let msg_name = if m.fields.is_empty() { "_msg" } else { "msg" };
        self.p.open(&format!(
            "_readMessage: function ({msg_name}{}, json{}){} {{",
            self.ann(&format!(": {type_name}")),
            self.ann(": any"),
            self.ann(&format!(": {type_name}"))
        ));
        for field in &m.fields {
            self.emit_json_field_read(m, field);
        }
        self.p.line(&format!("return {msg_name};"));
        self.p.close("},");
        self.p.blank();
    }

    /// Lookup chain: jsonName, then the attribute name, then the proto
    /// name, deduplicated in that order.
    fn json_lookup(&self, field: &Field) -> String {
        let mut keys = Vec::new();
        for key in [&field.json_name, &field.name, &field.proto_name] {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys.iter()
            .map(|k| format!("json[\"{k}\"]"))
            .collect::<Vec<_>>()
            .join(" ?? ")
    }

    fn emit_json_field_read(&mut self, m: &MessageNode, field: &Field) {
        let local = format!("_{}_", field.name);
        let target = format!("msg.{}", field.name);
        self.p
            .line(&format!("const {local} = {};", self.json_lookup(field)));

        if field.map {
            let entry = self.map_entry(m, field);
            let value_field = &entry.fields[1];
            self.p.open(&format!("if ({local}) {{"));
            if value_field.r#type == Type::Message {
                let value_json = json_ref(value_field.type_ref.as_deref().unwrap());
                self.p.open(&format!(
                    "{target} = Object.fromEntries(Object.entries({local}).map(([key, value]) => {{"
                ));
                self.p.line(&format!("const m = {value_json}.initialize();"));
                self.p
                    .line(&format!("{value_json}._readMessage(m, value);"));
                self.p.line("return [key, m];");
                self.p.close("}));");
            } else {
                let parse = self.json_map_value_parse(value_field);
                self.p.line(&format!(
                    "{target} = Object.fromEntries(Object.entries({local}).map(([key, value]) => [key, {parse}]));"
                ));
            }
            self.p.close("}");
            return;
        }

        if field.repeated {
            self.p.open(&format!("if ({local}) {{"));
            let transform = match field.r#type {
                _ if is_64bit(field.r#type) => format!("{local}.map(BigInt)"),
                _ if is_float(field.r#type) => format!("{local}.map(Number)"),
                Type::Bytes => format!("{local}.map(decodeBase64Bytes)"),
                Type::Message => {
                    let message_json = json_ref(field.type_ref.as_deref().unwrap());
                    self.p
                        .open(&format!("{target} = {local}.map((item{}) => {{", self.ann(": any")));
                    self.p.line(&format!("const m = {message_json}.initialize();"));
                    self.p.line(&format!("{message_json}._readMessage(m, item);"));
                    self.p.line("return m;");
                    self.p.close("});");
                    self.p.close("}");
                    return;
                }
                _ => local.clone(),
            };
            self.p.line(&format!("{target} = {transform};"));
            self.p.close("}");
            return;
        }

        if field.r#type == Type::Message {
            let message_json = json_ref(field.type_ref.as_deref().unwrap());
            self.p.open(&format!("if ({local}) {{"));
            if field.optional {
                self.p.line(&format!("{target} = {message_json}.initialize();"));
            }
            self.p
                .line(&format!("{message_json}._readMessage({target}, {local});"));
            self.p.close("}");
            return;
        }

        let guard = if field.optional {
            format!("{local} != undefined")
        } else {
            local.clone()
        };
        let parse = match field.r#type {
            _ if is_64bit(field.r#type) => format!("BigInt({local})"),
            _ if is_float(field.r#type) => format!("Number({local})"),
            Type::Bytes => format!("decodeBase64Bytes({local})"),
            _ => local.clone(),
        };
        self.p.open(&format!("if ({guard}) {{"));
        self.p.line(&format!("{target} = {parse};"));
        self.p.close("}");
    }

    fn json_map_value_parse(&self, value_field: &Field) -> String {
        if is_64bit(value_field.r#type) {
            format!("BigInt({})", self.cast("value", "string"))
        } else if is_float(value_field.r#type) {
            "Number(value)".to_string()
        } else if value_field.r#type == Type::Bytes {
            format!("decodeBase64Bytes({})", self.cast("value", "string"))
        } else {
            "value".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::ir::{walk_file, IdentifierTable};
    use crate::descriptor::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, Label, MessageOptions,
    };

    fn sample_file() -> FileDescriptorProto {
        FileDescriptorProto {
            name: "sample.proto".to_string(),
            syntax: "proto3".to_string(),
            message_type: vec![DescriptorProto {
                name: "Sample".to_string(),
                field: vec![
                    FieldDescriptorProto {
                        name: "count".to_string(),
                        number: 1,
                        label: Label::Optional as i32,
                        r#type: Type::Int32 as i32,
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: "big_count".to_string(),
                        number: 2,
                        label: Label::Optional as i32,
                        r#type: Type::Int64 as i32,
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: "payload".to_string(),
                        number: 3,
                        label: Label::Optional as i32,
                        r#type: Type::Bytes as i32,
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: "xs".to_string(),
                        number: 4,
                        label: Label::Repeated as i32,
                        r#type: Type::Int32 as i32,
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: "color".to_string(),
                        number: 5,
                        label: Label::Optional as i32,
                        r#type: Type::Enum as i32,
                        type_name: ".Color".to_string(),
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: "maybe".to_string(),
                        number: 6,
                        label: Label::Optional as i32,
                        r#type: Type::String as i32,
                        proto3_optional: true,
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: "m".to_string(),
                        number: 7,
                        label: Label::Repeated as i32,
                        r#type: Type::Message as i32,
                        type_name: ".Sample.MEntry".to_string(),
                        ..Default::default()
                    },
                ],
                nested_type: vec![DescriptorProto {
                    name: "MEntry".to_string(),
                    field: vec![
                        FieldDescriptorProto {
                            name: "key".to_string(),
                            number: 1,
                            label: Label::Optional as i32,
                            r#type: Type::String as i32,
                            ..Default::default()
                        },
                        FieldDescriptorProto {
                            name: "value".to_string(),
                            number: 2,
                            label: Label::Optional as i32,
                            r#type: Type::Int32 as i32,
                            ..Default::default()
                        },
                    ],
                    options: Some(MessageOptions { map_entry: true }),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            enum_type: vec![EnumDescriptorProto {
                name: "Color".to_string(),
                value: vec![
                    EnumValueDescriptorProto {
                        name: "COLOR_UNSPECIFIED".to_string(),
                        number: 0,
                    },
                    EnumValueDescriptorProto {
                        name: "RED".to_string(),
                        number: 1,
                    },
                ],
            }],
            ..Default::default()
        }
    }

    fn emit(config: &Config, language: Language) -> String {
        let file = sample_file();
        let table = IdentifierTable::build(std::slice::from_ref(&file));
        let ir = walk_file(&file, &table).unwrap();
        emit_file(&ir, config, language, &[], &[])
    }

    #[test]
    fn typescript_output_shape() {
        let out = emit(&Config::default(), Language::TypeScript);

        // banner and runtime imports, base64 helpers because of `payload`
        assert!(out.starts_with("// Generated by protoc-gen-tspb from sample.proto"));
        assert!(out.contains(
            "import { BinaryReader, BinaryWriter, decodeBase64Bytes, encodeBase64Bytes } from \"tspb\";"
        ));

        // type declarations
        assert!(out.contains("export interface Sample {"));
        assert!(out.contains("count: number;"));
        assert!(out.contains("bigCount: bigint;"));
        assert!(out.contains("payload: Uint8Array;"));
        assert!(out.contains("xs: number[];"));
        assert!(out.contains("color: Color;"));
        assert!(out.contains("maybe?: string | null;"));
        assert!(out.contains("m: Record<string, number>;"));
        assert!(out.contains("export type Color = \"COLOR_UNSPECIFIED\" | \"RED\";"));

        // binary codec
        assert!(out.contains("export const Sample = {"));
        assert!(out.contains("Sample._writeMessage(msg, writer);"));
        assert!(out.contains("writer.writeInt32(1, msg.count);"));
        assert!(out.contains("writer.writeInt64(2, msg.bigCount.toString() as any);"));
        assert!(out.contains("if (msg.payload?.length) {"));
        assert!(out.contains("writer.writePackedInt32(4, msg.xs);"));
        assert!(out.contains("if (msg.color && Color._toInt(msg.color)) {"));
        assert!(out.contains("if (msg.maybe != undefined) {"));
        assert!(out.contains("msg.xs.push(...reader.readPackedInt32());"));
        assert!(out.contains("msg.xs.push(reader.readInt32());"));
        assert!(out.contains("msg.bigCount = BigInt(reader.readInt64());"));
        assert!(out.contains("msg.color = Color._fromInt(reader.readEnum());"));
        assert!(out.contains("msg.m[entry.key.toString()] = entry.value;"));
        assert!(out.contains("reader.skipField();"));

        // map entries have no public codec surface
        let entry_codec = out
            .split("MEntry: {")
            .nth(1)
            .expect("nested entry codec present");
        let entry_codec = &entry_codec[..entry_codec.find("},\n").unwrap_or(entry_codec.len())];
        assert!(!entry_codec.contains("encode:"));
        assert!(!entry_codec.contains("initialize:"));

        // JSON codec
        assert!(out.contains("export const SampleJSON = {"));
        assert!(out.contains("export const ColorJSON = Color;"));
        assert!(out.contains("json[\"bigCount\"] = String(msg.bigCount);"));
        assert!(out.contains("json[\"payload\"] = encodeBase64Bytes(msg.payload);"));
        assert!(out.contains("msg.bigCount = BigInt(_bigCount_);"));
        assert!(out.contains("msg.payload = decodeBase64Bytes(_payload_);"));
        // key fallback chain
        assert!(out.contains("const _bigCount_ = json[\"bigCount\"] ?? json[\"big_count\"];"));
    }

    #[test]
    fn javascript_mode_strips_annotations() {
        let out = emit(&Config::default(), Language::JavaScript);
        assert!(out.contains("encode: function (msg) {"));
        assert!(!out.contains(": Partial<"));
        assert!(!out.contains("as any"));
        assert!(!out.contains("export interface"));
        assert!(!out.contains("import type"));
        assert!(out.contains("writer.writeInt64(2, msg.bigCount.toString());"));
    }

    #[test]
    fn declaration_only_mode() {
        let mut config = Config::default();
        config.typescript.emit_declaration_only = true;
        let out = emit(&config, Language::TypeScript);
        assert!(out.contains("export interface Sample {"));
        assert!(!out.contains("BinaryWriter"));
        assert!(!out.contains("_writeMessage"));
        assert!(!out.contains("SampleJSON"));
    }

    #[test]
    fn proto_field_name_keys() {
        let mut config = Config::default();
        config.json.use_proto_field_name = true;
        let out = emit(&config, Language::TypeScript);
        assert!(out.contains("json[\"big_count\"] = String(msg.bigCount);"));
    }

    #[test]
    fn emit_fields_with_default_values() {
        let mut config = Config::default();
        config.json.emit_fields_with_default_values = true;
        let out = emit(&config, Language::TypeScript);
        assert!(out.contains("json[\"count\"] = msg.count ?? 0;"));
        assert!(out.contains("json[\"xs\"] = msg.xs ?? [];"));
        // optional fields keep their presence guard
        assert!(out.contains("if (msg.maybe != undefined) {"));
    }

    #[test]
    fn emission_is_deterministic() {
        let a = emit(&Config::default(), Language::TypeScript);
        let b = emit(&Config::default(), Language::TypeScript);
        assert_eq!(a, b);
    }
}
