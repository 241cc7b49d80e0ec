//! `protoc-gen-tspb`: protobuf compiler plugin.
//!
//! Reads a binary `CodeGeneratorRequest` from stdin, writes a binary
//! `CodeGeneratorResponse` to stdout. Descriptor errors surface inside the
//! response; only failures before a response exists (unreadable stdin, a
//! request that does not decode) exit non-zero.

use std::io::{self, Read, Write};

use tspb::codegen;
use tspb::codegen::plugin::PluginRegistry;
use tspb::descriptor::CodeGeneratorRequest;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input)?;
    eprintln!("Read CodeGeneratorRequest ({} bytes)", input.len());

    let request = CodeGeneratorRequest::decode(input)?;

    // Plugins are compiled in by forks that extend the generator; the stock
    // binary ships with an empty registry.
    let plugins = PluginRegistry::new();
    let response = codegen::generate(&request, &plugins);

    io::stdout().write_all(&response.encode())?;
    Ok(())
}
