// tspb codegen module
//
// Drives one CodeGeneratorRequest to a CodeGeneratorResponse: layer config,
// build the request-wide identifier table, then walk and emit each input
// file in request order. A file that fails to walk produces no output; its
// error is attached to the response instead.

pub mod comments;
pub mod config;
pub mod ir;
pub mod names;
pub mod plugin;
pub mod typescript;

use anyhow::{Context, Result};
use regex::Regex;

use crate::descriptor::{
    CodeGeneratorRequest, CodeGeneratorResponse, FileDescriptorProto, ResponseFile,
    FEATURE_PROTO3_OPTIONAL,
};

use config::{Config, Language};
use ir::{walk_file, IdentifierTable};
use names::output_file_name;
use plugin::{PluginContext, PluginRegistry};

/// The standard `google.protobuf.*` types ship with every runtime; their
/// files are excluded unless `GENERATE_KNOWN_TYPES` is set.
const WELL_KNOWN_PREFIX: &str = "google/protobuf/";

pub fn generate(request: &CodeGeneratorRequest, plugins: &PluginRegistry) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: FEATURE_PROTO3_OPTIONAL,
        ..Default::default()
    };

    let setup = (|| -> Result<(Config, Vec<Regex>)> {
        let mut config = Config::discover()?;
        config
            .apply_parameter(&request.parameter)
            .context("parsing plugin parameter")?;
        let exclude = config
            .exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("invalid exclude pattern {pattern:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((config, exclude))
    })();
    let (config, exclude) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            response.error = format!("{e:#}");
            return response;
        }
    };

    let language = config.language();
    let table = IdentifierTable::build(&request.proto_file);
    let generate_known_types = std::env::var_os("GENERATE_KNOWN_TYPES").is_some();

    let mut errors = Vec::new();
    for file_name in &request.file_to_generate {
        if !generate_known_types && file_name.starts_with(WELL_KNOWN_PREFIX) {
            continue;
        }
        if exclude.iter().any(|re| re.is_match(file_name)) {
            continue;
        }
        let Some(file) = request.proto_file.iter().find(|f| &f.name == file_name) else {
            errors.push(format!("{file_name}: descriptor missing from request"));
            continue;
        };
        match generate_file(file, &table, &config, language, plugins) {
            Ok(content) => response.file.push(ResponseFile {
                name: output_file_name(file_name, language, &config.dest),
                content,
            }),
            Err(e) => errors.push(format!("{file_name}: {e:#}")),
        }
    }

    if !errors.is_empty() {
        response.error = errors.join("\n");
    }
    response
}

fn generate_file(
    file: &FileDescriptorProto,
    table: &IdentifierTable,
    config: &Config,
    language: Language,
    plugins: &PluginRegistry,
) -> Result<String> {
    let ir = walk_file(file, table)?;
    let ctx = PluginContext { ir: &ir, config };
    let (imports, services) = plugins.run(&ctx);
    // The emitted string is handed to the caller's formatter as-is.
    Ok(typescript::emit_file(&ir, config, language, &imports, &services))
}
