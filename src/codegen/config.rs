// Generator configuration.
//
// Two layers: an optional project-root `tspb.config.json`, then the
// compiler-passed `k=v,k=v` parameter string on top. Keys in the parameter
// string use dotted paths matching the config file structure
// (`json.useProtoFieldName=true`).

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "tspb.config.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonConfig {
    /// Emit every field, including default-valued ones, instead of the
    /// canonical proto3 omission.
    pub emit_fields_with_default_values: bool,
    /// Use original proto field names as JSON keys instead of `json_name`.
    pub use_proto_field_name: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeScriptConfig {
    /// Emit only the type declarations block, no codecs.
    pub emit_declaration_only: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory `.proto` files are searched under and import paths resolve
    /// against. Consumed by the CLI driver; carried here so the parameter
    /// string round-trips the full option surface.
    pub root: String,
    /// Regex patterns for input files to skip.
    pub exclude: Vec<String>,
    /// Output directory root; proto path structure is mirrored beneath it.
    pub dest: String,
    pub language: Option<Language>,
    pub json: JsonConfig,
    pub typescript: TypeScriptConfig,
}

impl Config {
    /// Read `tspb.config.json` from the working directory, if present.
    pub fn discover() -> Result<Config> {
        Config::load(Path::new(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Overlay `k=v,k=v` pairs from the compiler's `parameter` field.
    pub fn apply_parameter(&mut self, parameter: &str) -> Result<()> {
        for pair in parameter.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("malformed parameter {pair:?}, expected key=value");
            };
            match key {
                "root" => self.root = value.to_string(),
                "exclude" => self.exclude.push(value.to_string()),
                "dest" => self.dest = value.to_string(),
                "language" => {
                    self.language = Some(match value {
                        "javascript" => Language::JavaScript,
                        "typescript" => Language::TypeScript,
                        _ => bail!("unknown language {value:?}"),
                    })
                }
                "json.emitFieldsWithDefaultValues" => {
                    self.json.emit_fields_with_default_values = parse_bool(key, value)?
                }
                "json.useProtoFieldName" => {
                    self.json.use_proto_field_name = parse_bool(key, value)?
                }
                "typescript.emitDeclarationOnly" => {
                    self.typescript.emit_declaration_only = parse_bool(key, value)?
                }
                _ => bail!("unknown option {key:?}"),
            }
        }
        Ok(())
    }

    /// Configured language, falling back to TypeScript when a tsconfig is
    /// present in the working directory and JavaScript otherwise.
    pub fn language(&self) -> Language {
        self.language.unwrap_or_else(|| {
            if Path::new("tsconfig.json").exists() {
                Language::TypeScript
            } else {
                Language::JavaScript
            }
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => bail!("option {key} expects true or false, got {value:?}"),
    }
}
