//! Descriptor and compiler-plugin protocol messages.
//!
//! Hand-written in the exact shape the emitter generates for TypeScript:
//! one `decode` entry point per message that drives a `read_message` loop
//! over [`BinaryReader`], dispatching on field number with a skip default.
//! Request-side messages only decode; response-side messages only encode.
//! Descriptor fields the generator never consults (options beyond
//! `map_entry`, extensions, services) fall through to `skip_field`.

use bytes::Bytes;

use crate::decoding::BinaryReader;
use crate::encoding::BinaryWriter;
use crate::Error;

/// Feature bit announced in `CodeGeneratorResponse.supported_features`.
pub const FEATURE_PROTO3_OPTIONAL: u64 = 1;

/// `FieldDescriptorProto.label`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Optional = 1,
    Required = 2,
    Repeated = 3,
}

impl Label {
    pub fn from_i32(value: i32) -> Option<Label> {
        match value {
            1 => Some(Label::Optional),
            2 => Some(Label::Required),
            3 => Some(Label::Repeated),
            _ => None,
        }
    }
}

/// `FieldDescriptorProto.type`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

impl Type {
    pub fn from_i32(value: i32) -> Option<Type> {
        match value {
            1 => Some(Type::Double),
            2 => Some(Type::Float),
            3 => Some(Type::Int64),
            4 => Some(Type::Uint64),
            5 => Some(Type::Int32),
            6 => Some(Type::Fixed64),
            7 => Some(Type::Fixed32),
            8 => Some(Type::Bool),
            9 => Some(Type::String),
            10 => Some(Type::Group),
            11 => Some(Type::Message),
            12 => Some(Type::Bytes),
            13 => Some(Type::Uint32),
            14 => Some(Type::Enum),
            15 => Some(Type::Sfixed32),
            16 => Some(Type::Sfixed64),
            17 => Some(Type::Sint32),
            18 => Some(Type::Sint64),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileDescriptorProto {
    pub name: String,
    pub package: String,
    pub dependency: Vec<String>,
    pub message_type: Vec<DescriptorProto>,
    pub enum_type: Vec<EnumDescriptorProto>,
    pub source_code_info: Option<SourceCodeInfo>,
    pub syntax: String,
}

impl FileDescriptorProto {
    pub fn decode(bytes: impl Into<Bytes>) -> Result<FileDescriptorProto, Error> {
        decode_with(bytes.into(), FileDescriptorProto::read_message)
    }

    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => msg.name = reader.read_string(),
                2 => msg.package = reader.read_string(),
                3 => msg.dependency.push(reader.read_string()),
                4 => {
                    let mut m = DescriptorProto::default();
                    reader.read_message(&mut m, DescriptorProto::read_message);
                    msg.message_type.push(m);
                }
                5 => {
                    let mut e = EnumDescriptorProto::default();
                    reader.read_message(&mut e, EnumDescriptorProto::read_message);
                    msg.enum_type.push(e);
                }
                9 => {
                    let mut info = SourceCodeInfo::default();
                    reader.read_message(&mut info, SourceCodeInfo::read_message);
                    msg.source_code_info = Some(info);
                }
                12 => msg.syntax = reader.read_string(),
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DescriptorProto {
    pub name: String,
    pub field: Vec<FieldDescriptorProto>,
    pub nested_type: Vec<DescriptorProto>,
    pub enum_type: Vec<EnumDescriptorProto>,
    pub options: Option<MessageOptions>,
}

impl DescriptorProto {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => msg.name = reader.read_string(),
                2 => {
                    let mut f = FieldDescriptorProto::default();
                    reader.read_message(&mut f, FieldDescriptorProto::read_message);
                    msg.field.push(f);
                }
                3 => {
                    let mut m = DescriptorProto::default();
                    reader.read_message(&mut m, DescriptorProto::read_message);
                    msg.nested_type.push(m);
                }
                4 => {
                    let mut e = EnumDescriptorProto::default();
                    reader.read_message(&mut e, EnumDescriptorProto::read_message);
                    msg.enum_type.push(e);
                }
                7 => {
                    let mut o = MessageOptions::default();
                    reader.read_message(&mut o, MessageOptions::read_message);
                    msg.options = Some(o);
                }
                _ => reader.skip_field(),
            }
        }
    }

    /// True for the synthetic entry message protoc nests under a `map<K,V>`
    /// field's parent.
    pub fn is_map_entry(&self) -> bool {
        self.options.as_ref().is_some_and(|o| o.map_entry)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageOptions {
    pub map_entry: bool,
}

impl MessageOptions {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                7 => msg.map_entry = reader.read_bool(),
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldDescriptorProto {
    pub name: String,
    pub number: i32,
    pub label: i32,
    pub r#type: i32,
    /// Fully qualified, with a leading dot, for message and enum fields.
    pub type_name: String,
    pub oneof_index: Option<i32>,
    pub json_name: String,
    pub proto3_optional: bool,
}

impl FieldDescriptorProto {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => msg.name = reader.read_string(),
                3 => msg.number = reader.read_int32(),
                4 => msg.label = reader.read_enum(),
                5 => msg.r#type = reader.read_enum(),
                6 => msg.type_name = reader.read_string(),
                9 => msg.oneof_index = Some(reader.read_int32()),
                10 => msg.json_name = reader.read_string(),
                17 => msg.proto3_optional = reader.read_bool(),
                _ => reader.skip_field(),
            }
        }
    }

    pub fn label(&self) -> Option<Label> {
        Label::from_i32(self.label)
    }

    pub fn r#type(&self) -> Option<Type> {
        Type::from_i32(self.r#type)
    }

    pub fn is_repeated(&self) -> bool {
        self.label() == Some(Label::Repeated)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnumDescriptorProto {
    pub name: String,
    pub value: Vec<EnumValueDescriptorProto>,
}

impl EnumDescriptorProto {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => msg.name = reader.read_string(),
                2 => {
                    let mut v = EnumValueDescriptorProto::default();
                    reader.read_message(&mut v, EnumValueDescriptorProto::read_message);
                    msg.value.push(v);
                }
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnumValueDescriptorProto {
    pub name: String,
    pub number: i32,
}

impl EnumValueDescriptorProto {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => msg.name = reader.read_string(),
                2 => msg.number = reader.read_int32(),
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceCodeInfo {
    pub location: Vec<Location>,
}

impl SourceCodeInfo {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => {
                    let mut l = Location::default();
                    reader.read_message(&mut l, Location::read_message);
                    msg.location.push(l);
                }
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Location {
    pub path: Vec<i32>,
    pub leading_comments: Option<String>,
}

impl Location {
    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => {
                    if reader.is_delimited() {
                        msg.path.extend(reader.read_packed_int32());
                    } else {
                        msg.path.push(reader.read_int32());
                    }
                }
                3 => msg.leading_comments = Some(reader.read_string()),
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeGeneratorRequest {
    pub file_to_generate: Vec<String>,
    pub parameter: String,
    pub proto_file: Vec<FileDescriptorProto>,
}

impl CodeGeneratorRequest {
    pub fn decode(bytes: impl Into<Bytes>) -> Result<CodeGeneratorRequest, Error> {
        decode_with(bytes.into(), CodeGeneratorRequest::read_message)
    }

    pub fn read_message(msg: &mut Self, reader: &mut BinaryReader) {
        while reader.next_field() {
            match reader.get_field_number() {
                1 => msg.file_to_generate.push(reader.read_string()),
                2 => msg.parameter = reader.read_string(),
                15 => {
                    let mut f = FileDescriptorProto::default();
                    reader.read_message(&mut f, FileDescriptorProto::read_message);
                    msg.proto_file.push(f);
                }
                _ => reader.skip_field(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeGeneratorResponse {
    pub error: String,
    pub supported_features: u64,
    pub file: Vec<ResponseFile>,
}

impl CodeGeneratorResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        CodeGeneratorResponse::write_message(self, &mut writer);
        writer.get_result_buffer()
    }

    pub fn write_message(msg: &Self, writer: &mut BinaryWriter) {
        if !msg.error.is_empty() {
            writer.write_string(1, &msg.error);
        }
        if msg.supported_features != 0 {
            writer.write_uint64(2, msg.supported_features);
        }
        writer.write_repeated_message(15, &msg.file, ResponseFile::write_message);
    }
}

/// `CodeGeneratorResponse.File`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseFile {
    pub name: String,
    pub content: String,
}

impl ResponseFile {
    pub fn write_message(msg: &Self, writer: &mut BinaryWriter) {
        if !msg.name.is_empty() {
            writer.write_string(1, &msg.name);
        }
        if !msg.content.is_empty() {
            writer.write_string(15, &msg.content);
        }
    }
}

fn decode_with<T: Default>(
    bytes: Bytes,
    read_fn: impl FnOnce(&mut T, &mut BinaryReader),
) -> Result<T, Error> {
    let mut reader = BinaryReader::new(bytes);
    let mut msg = T::default();
    read_fn(&mut msg, &mut reader);
    let ok = !reader.get_error();
    reader.free();
    if ok {
        Ok(msg)
    } else {
        Err(Error::InvalidData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Encode a small descriptor by hand; the decoders under test are the
    // same ones the plugin uses on real compiler output.
    fn sample_file_bytes() -> Vec<u8> {
        let mut file = BinaryWriter::new();
        file.write_string(1, "widget.proto");
        file.write_string(2, "shop");
        file.write_string(12, "proto3");

        file.write_message(4, &(), |_, message| {
            message.write_string(1, "Widget");
            message.write_message(2, &(), |_, field| {
                field.write_string(1, "id");
                field.write_int32(3, 1);
                field.write_enum(4, Label::Optional as i32);
                field.write_enum(5, Type::Int64 as i32);
                field.write_string(10, "id");
            });
            message.write_message(2, &(), |_, field| {
                field.write_string(1, "tags");
                field.write_int32(3, 2);
                field.write_enum(4, Label::Repeated as i32);
                field.write_enum(5, Type::String as i32);
                field.write_string(10, "tags");
            });
        });

        file.write_message(5, &(), |_, e| {
            e.write_string(1, "Color");
            e.write_message(2, &(), |_, v| {
                v.write_string(1, "COLOR_UNSPECIFIED");
            });
            e.write_message(2, &(), |_, v| {
                v.write_string(1, "RED");
                v.write_int32(2, 1);
            });
        });

        file.get_result_buffer()
    }

    #[test]
    fn file_descriptor_decodes() {
        let file = FileDescriptorProto::decode(sample_file_bytes()).unwrap();
        assert_eq!(file.name, "widget.proto");
        assert_eq!(file.package, "shop");
        assert_eq!(file.syntax, "proto3");

        let message = &file.message_type[0];
        assert_eq!(message.name, "Widget");
        assert_eq!(message.field.len(), 2);
        assert_eq!(message.field[0].name, "id");
        assert_eq!(message.field[0].r#type(), Some(Type::Int64));
        assert!(message.field[1].is_repeated());

        let color = &file.enum_type[0];
        assert_eq!(color.name, "Color");
        assert_eq!(color.value[0].number, 0);
        assert_eq!(color.value[1], EnumValueDescriptorProto {
            name: "RED".to_string(),
            number: 1,
        });
    }

    #[test]
    fn unknown_descriptor_fields_are_skipped() {
        let mut file = BinaryWriter::new();
        file.write_string(1, "a.proto");
        file.write_message(8, &(), |_, options| {
            // FileOptions, which this decoder does not model
            options.write_string(1, "com.example");
        });
        file.write_string(2, "pkg");
        let decoded = FileDescriptorProto::decode(file.get_result_buffer()).unwrap();
        assert_eq!(decoded.name, "a.proto");
        assert_eq!(decoded.package, "pkg");
    }

    #[test]
    fn truncated_descriptor_is_an_error() {
        let mut bytes = sample_file_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(FileDescriptorProto::decode(bytes).is_err());
    }

    #[test]
    fn request_decode_and_response_encode() {
        let mut request = BinaryWriter::new();
        request.write_string(1, "widget.proto");
        request.write_string(2, "language=typescript");
        request.write_bytes(15, &sample_file_bytes());

        let decoded = CodeGeneratorRequest::decode(request.get_result_buffer()).unwrap();
        assert_eq!(decoded.file_to_generate, vec!["widget.proto"]);
        assert_eq!(decoded.parameter, "language=typescript");
        assert_eq!(decoded.proto_file[0].name, "widget.proto");

        let response = CodeGeneratorResponse {
            error: String::new(),
            supported_features: FEATURE_PROTO3_OPTIONAL,
            file: vec![ResponseFile {
                name: "widget.pb.ts".to_string(),
                content: "export {}\n".to_string(),
            }],
        };
        let bytes = response.encode();
        // supported_features: field 2 varint 1
        assert_eq!(&bytes[..2], &[0x10, 0x01]);

        let mut reader = BinaryReader::new(bytes);
        let mut seen_file = false;
        while reader.next_field() {
            match reader.get_field_number() {
                2 => assert_eq!(reader.read_uint64(), 1),
                15 => {
                    let mut name = String::new();
                    reader.read_message(&mut name, |name, r| {
                        while r.next_field() {
                            match r.get_field_number() {
                                1 => *name = r.read_string(),
                                _ => r.skip_field(),
                            }
                        }
                    });
                    assert_eq!(name, "widget.pb.ts");
                    seen_file = true;
                }
                _ => reader.skip_field(),
            }
        }
        assert!(seen_file);
        assert!(!reader.get_error());
    }

    #[test]
    fn location_path_accepts_packed_and_unpacked() {
        let mut packed = BinaryWriter::new();
        packed.write_packed_int32(1, &[4, 0, 2, 1]);
        packed.write_string(3, " leading\n");
        let mut location = Location::default();
        let mut reader = BinaryReader::new(packed.get_result_buffer());
        Location::read_message(&mut location, &mut reader);
        assert!(!reader.get_error());
        assert_eq!(location.path, vec![4, 0, 2, 1]);
        assert_eq!(location.leading_comments.as_deref(), Some(" leading\n"));

        let mut unpacked = BinaryWriter::new();
        unpacked.write_repeated_int32(1, &[4, 0]);
        let mut location = Location::default();
        let mut reader = BinaryReader::new(unpacked.get_result_buffer());
        Location::read_message(&mut location, &mut reader);
        assert_eq!(location.path, vec![4, 0]);
    }
}
