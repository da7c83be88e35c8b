//! Individual build steps and the extension-keyed compiler table.

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::ninja::Edge;
use crate::path::Path;
use crate::product::ProductScope;

bitflags! {
    /// Link-time needs discovered while compiling a product's sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Requirements: u8 {
        /// Objective-C runtime begin/end objects.
        const OBJC = 1 << 0;
        /// The C++ standard library.
        const STDCXX = 1 << 1;
        /// Swift runtime startup object.
        const SWIFT = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Copy,
    CompileC,
    CompileCxx,
    Assemble,
    /// One file of a module. The sources are the whole module's, in order, with
    /// `-primary-file` just before this action's input.
    CompileSwift {
        module_name: String,
        module_sources: Vec<String>,
    },
}

impl ActionKind {
    pub fn rule(&self) -> &'static str {
        match self {
            ActionKind::Copy => "Cp",
            ActionKind::CompileC => "CompileC",
            ActionKind::CompileCxx => "CompileCxx",
            ActionKind::Assemble => "Assemble",
            ActionKind::CompileSwift { .. } => "CompileSwift",
        }
    }
}

/// One input, one output, one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildAction {
    kind: ActionKind,
    input: Path,
    output: Path,
    flags: Option<String>,
    requirements: Requirements,
    dependencies: Vec<String>,
}

impl BuildAction {
    pub fn copy(source: Path, destination: Path) -> Self {
        Self {
            kind: ActionKind::Copy,
            input: source,
            output: destination,
            flags: None,
            requirements: Requirements::empty(),
            dependencies: vec![],
        }
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn flags(&self) -> Option<&str> {
        self.flags.as_deref()
    }

    pub fn requirements(&self) -> Requirements {
        self.requirements
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Dependencies only grow; they are emitted in the order added.
    pub fn add_dependency(&mut self, name: impl Into<String>) {
        self.dependencies.push(name.into());
    }

    pub fn edge(&self, config: &Configuration) -> Edge {
        let edge = Edge::new(config.relative(&self.output), self.kind.rule())
            .input(config.relative(&self.input))
            .order_only(self.dependencies.iter().cloned());

        match (&self.kind, &self.flags) {
            (ActionKind::Copy, _) => edge,
            (
                ActionKind::CompileSwift {
                    module_name,
                    module_sources,
                },
                flags,
            ) => edge
                .bind("module_sources", module_sources.join(" "))
                .bind("module_name", module_name.as_str())
                .bind("flags", flags.clone().unwrap_or_default()),
            (_, flags) => edge.bind("flags", flags.clone().unwrap_or_default()),
        }
    }
}

/// What a compiler constructor gets to see.
pub struct CompileInput<'a> {
    pub source: &'a Path,
    pub product: &'a ProductScope<'a>,
    /// Every source of the owning phase, in declared order.
    pub module: &'a [Path],
}

pub type CompileFn = fn(&CompileInput<'_>) -> BuildAction;

/// Maps a source extension to the action that compiles it.
#[derive(Clone)]
pub struct CompileRegistry {
    compilers: HashMap<String, CompileFn>,
}

impl Default for CompileRegistry {
    fn default() -> Self {
        let mut registry = Self {
            compilers: HashMap::new(),
        };
        registry
            .register("c", compile_c)
            .register("m", compile_c)
            .register("cpp", compile_cxx)
            .register("cc", compile_cxx)
            .register("CC", compile_cxx)
            .register("mm", compile_cxx)
            .register("s", assemble)
            .register("S", assemble)
            .register("swift", compile_swift);
        registry
    }
}

impl CompileRegistry {
    pub fn register(&mut self, extension: impl Into<String>, compiler: CompileFn) -> &mut Self {
        self.compilers.insert(extension.into(), compiler);
        self
    }

    pub fn compile(&self, input: &CompileInput<'_>) -> Result<BuildAction> {
        let compiler = input
            .source
            .extension()
            .and_then(|ext| self.compilers.get(ext))
            .ok_or_else(|| Error::UnsupportedSource(input.source.clone()))?;
        Ok(compiler(input))
    }
}

fn object_path(input: &CompileInput<'_>) -> Path {
    let product = input.product;
    let relative = input.source.relative(&product.config.working_directory);
    let relative = relative
        .components()
        .map(|c| if c == ".." { "__" } else { c })
        .collect::<Vec<_>>()
        .join("/");
    product.build_dir.join(relative).append_suffix(".o")
}

fn compile_action(
    input: &CompileInput<'_>,
    kind: ActionKind,
    flags: String,
    requirements: Requirements,
) -> BuildAction {
    BuildAction {
        kind,
        input: input.source.clone(),
        output: object_path(input),
        flags: Some(flags),
        requirements,
        dependencies: vec![],
    }
}

fn push_flags(flags: &mut String, extra: Option<&str>) {
    if let Some(extra) = extra.filter(|e| !e.trim().is_empty()) {
        flags.push(' ');
        flags.push_str(extra.trim());
    }
}

fn push_include(flags: &mut String, config: &Configuration, dir: &Path) {
    flags.push_str(" -I");
    flags.push_str(&config.relative(dir));
}

fn prefix_header(flags: &mut String, product: &ProductScope<'_>) {
    if let Some(prefix) = product.prefix_header {
        flags.push_str(" -include ");
        flags.push_str(prefix);
    }
}

fn needs_objc(source: &Path, flags: &str, extension: &str) -> bool {
    source.extension() == Some(extension) || flags.contains("-x objective-c")
}

pub fn compile_c(input: &CompileInput<'_>) -> BuildAction {
    let product = input.product;
    let config = product.config;
    let mut flags = String::new();
    push_include(&mut flags, config, &product.build_dir);
    push_include(&mut flags, config, &config.build_directory);
    for dir in product.header_dirs() {
        push_include(&mut flags, config, dir);
    }
    push_flags(&mut flags, product.cflags);
    prefix_header(&mut flags, product);

    let mut requirements = Requirements::empty();
    if needs_objc(input.source, &flags, "m") {
        requirements |= Requirements::OBJC;
    }
    compile_action(input, ActionKind::CompileC, flags, requirements)
}

pub fn compile_cxx(input: &CompileInput<'_>) -> BuildAction {
    let product = input.product;
    let config = product.config;
    let mut flags = String::new();
    push_include(&mut flags, config, &product.build_dir);
    push_include(&mut flags, config, &config.build_directory);
    push_flags(&mut flags, product.cflags);
    push_flags(&mut flags, product.cxxflags);
    prefix_header(&mut flags, product);

    let mut requirements = Requirements::STDCXX;
    if needs_objc(input.source, &flags, "mm") {
        requirements |= Requirements::OBJC;
    }
    compile_action(input, ActionKind::CompileCxx, flags, requirements)
}

pub fn assemble(input: &CompileInput<'_>) -> BuildAction {
    let mut flags = String::new();
    push_flags(&mut flags, input.product.asflags);
    compile_action(input, ActionKind::Assemble, flags, Requirements::empty())
}

pub fn compile_swift(input: &CompileInput<'_>) -> BuildAction {
    let product = input.product;
    let config = product.config;
    let mut flags = String::new();
    push_include(&mut flags, config, &product.build_dir);
    push_include(&mut flags, config, &product.root_headers);
    push_include(&mut flags, config, &config.build_directory);
    push_flags(&mut flags, product.swiftcflags);

    let module_sources = module_sources(input.module, input.source, config);
    compile_action(
        input,
        ActionKind::CompileSwift {
            module_name: product.name.to_string(),
            module_sources,
        },
        flags,
        Requirements::SWIFT,
    )
}

/// The module's sources in order, with `-primary-file` directly before `primary`.
pub fn module_sources(module: &[Path], primary: &Path, config: &Configuration) -> Vec<String> {
    let mut sources = Vec::with_capacity(module.len() + 1);
    for source in module {
        if source == primary {
            sources.push("-primary-file".to_string());
        }
        sources.push(config.relative(source));
    }
    sources
}
