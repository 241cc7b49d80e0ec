// Plugin extension point.
//
// A plugin is a pure function of the file IR and the active config; it may
// contribute verbatim text to the imports block and the services block of
// the emitted file. Plugins are registered explicitly on the registry the
// driver passes in; there is no discovery mechanism, and the IR is handed
// out by shared reference so plugins cannot mutate it.

use super::config::Config;
use super::ir::FileIr;

pub struct PluginContext<'a> {
    pub ir: &'a FileIr,
    pub config: &'a Config,
}

#[derive(Default)]
pub struct PluginOutput {
    pub imports: Option<String>,
    pub services: Option<String>,
}

type PluginFn = Box<dyn Fn(&PluginContext<'_>) -> PluginOutput>;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginFn>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        PluginRegistry::default()
    }

    pub fn register(&mut self, plugin: impl Fn(&PluginContext<'_>) -> PluginOutput + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin over `ctx`, collecting the contributed blocks in
    /// registration order.
    pub fn run(&self, ctx: &PluginContext<'_>) -> (Vec<String>, Vec<String>) {
        let mut imports = Vec::new();
        let mut services = Vec::new();
        for plugin in &self.plugins {
            let output = plugin(ctx);
            if let Some(text) = output.imports {
                imports.push(text);
            }
            if let Some(text) = output.services {
                services.push(text);
            }
        }
        (imports, services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugins_run_in_registration_order() {
        let mut registry = PluginRegistry::new();
        registry.register(|_ctx| PluginOutput {
            imports: Some("import A".to_string()),
            services: None,
        });
        registry.register(|ctx| PluginOutput {
            imports: Some("import B".to_string()),
            services: Some(format!("// service for {}", ctx.ir.file_name)),
        });

        let ir = FileIr {
            file_name: "svc.proto".to_string(),
            ..Default::default()
        };
        let config = Config::default();
        let (imports, services) = registry.run(&PluginContext { ir: &ir, config: &config });
        assert_eq!(imports, vec!["import A", "import B"]);
        assert_eq!(services, vec!["// service for svc.proto"]);
    }
}
