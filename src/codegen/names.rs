// Name derivation and output-path helpers.

use heck::ToLowerCamelCase;

use super::config::Language;

/// Generated-code attribute name for a proto field: lower camel, matching
/// the compiler's `json_name` derivation.
pub fn lower_camel(name: &str) -> String {
    name.to_lower_camel_case()
}

/// Strip a leading dot from a fully qualified proto type name.
pub fn normalize_type_name(type_name: &str) -> &str {
    type_name.strip_prefix('.').unwrap_or(type_name)
}

/// `foo/bar.proto` -> `foo/bar.pb.ts` (or `.pb.js`), mirrored under `dest`
/// when one is configured.
pub fn output_file_name(proto_name: &str, language: Language, dest: &str) -> String {
    let stem = proto_name.strip_suffix(".proto").unwrap_or(proto_name);
    let extension = match language {
        Language::TypeScript => "pb.ts",
        Language::JavaScript => "pb.js",
    };
    if dest.is_empty() {
        format!("{stem}.{extension}")
    } else {
        format!("{}/{stem}.{extension}", dest.trim_end_matches('/'))
    }
}

/// Module specifier for importing the generated file of `to` from the
/// generated file of `from` (both `.proto` paths). Extensionless, the way
/// bundler-resolved TypeScript imports are written.
pub fn relative_import(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = from.split('/').collect();
    let from_dir = &from_dir[..from_dir.len() - 1];
    let to_parts: Vec<&str> = to.split('/').collect();
    let (to_dir, to_file) = to_parts.split_at(to_parts.len() - 1);

    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from_dir.len() - common;
    let mut spec = if ups == 0 {
        "./".to_string()
    } else {
        "../".repeat(ups)
    };
    for dir in &to_dir[common..] {
        spec.push_str(dir);
        spec.push('/');
    }
    spec.push_str(to_file[0].strip_suffix(".proto").unwrap_or(to_file[0]));
    spec.push_str(".pb");
    spec
}
