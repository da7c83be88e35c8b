//! The `ninjagen.toml` project manifest.
//!
//! ```toml
//! [[product]]
//! name = "Foundation"
//! kind = "dynamic-library"
//! cflags = { linux = "-DDEPLOYMENT_TARGET_LINUX", default = "-DDEPLOYMENT_TARGET_MACOSX" }
//!
//! [[product.phase]]
//! kind = "copy-headers"
//! id = "headers"
//! public = ["CoreFoundation/CFBase.h"]
//!
//! [[product.phase]]
//! kind = "compile-sources"
//! depends-on = ["headers"]
//! sources = ["CoreFoundation/CFBase.c"]
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use ninjagen::action::{self, CompileFn};
use ninjagen::path::Path;
use ninjagen::phase::Source;
use ninjagen::runtime::Runtime;
use ninjagen::{ArchType, OsType, Phase, PhaseHandle, Product, Script, TargetConditional, Workspace};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "product")]
    pub products: Vec<ProductSpec>,
    #[serde(default, rename = "workspace")]
    pub workspaces: Vec<WorkspaceSpec>,
    /// Extra source extensions and the compiler each one uses.
    #[serde(default)]
    pub extensions: BTreeMap<String, Compiler>,
    /// Appended verbatim to the generated script.
    #[serde(default)]
    pub extra: Option<String>,
}

/// A plain string, or a table keyed by OS name, architecture or `default`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Conditional {
    Value(String),
    Table(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compiler {
    C,
    Cxx,
    Assembler,
    Swift,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductKindSpec {
    DynamicLibrary,
    StaticLibrary,
    StaticAndDynamicLibrary,
    Framework,
    Executable,
    Application,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProductSpec {
    pub name: String,
    pub kind: ProductKindSpec,
    pub cflags: Option<Conditional>,
    pub cxxflags: Option<Conditional>,
    pub asflags: Option<Conditional>,
    pub swiftcflags: Option<Conditional>,
    pub ldflags: Option<Conditional>,
    pub prefix_header: Option<Conditional>,
    #[serde(default)]
    pub folders: FoldersSpec,
    /// Extra order-only inputs of the final link.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, rename = "phase")]
    pub phases: Vec<PhaseSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FoldersSpec {
    pub root: Option<String>,
    pub public_headers: Option<String>,
    pub public_module: Option<String>,
    pub private_headers: Option<String>,
    pub project_headers: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhaseSpec {
    /// Name other phases of the same product use in `depends-on`.
    pub id: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub kind: PhaseKindSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PhaseKindSpec {
    CopyHeaders {
        #[serde(default)]
        public: Vec<Conditional>,
        #[serde(default)]
        private: Vec<Conditional>,
        #[serde(default)]
        project: Vec<Conditional>,
        module: Option<Conditional>,
    },
    CopyResources {
        directory: String,
        resources: Vec<Conditional>,
    },
    CompileSources {
        sources: Vec<Conditional>,
    },
    CompileSwiftSources {
        sources: Vec<Conditional>,
    },
    SwiftExecutable {
        executable: String,
        sources: Vec<Conditional>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSpec {
    pub name: String,
    pub projects: Vec<String>,
}

fn os_named(name: &str) -> Option<OsType> {
    match name {
        "linux" => Some(OsType::Linux),
        "freebsd" => Some(OsType::FreeBsd),
        "macosx" | "darwin" => Some(OsType::MacOsX),
        "windows" | "win32" => Some(OsType::Win32),
        _ => None,
    }
}

impl Conditional {
    fn build<T>(&self) -> anyhow::Result<TargetConditional<T>>
    where
        String: Into<T>,
    {
        let table = match self {
            Conditional::Value(value) => return Ok(TargetConditional::value(value.clone())),
            Conditional::Table(table) => table,
        };

        let mut conditional = TargetConditional::new();
        for (key, value) in table {
            conditional = match (key.as_str(), os_named(key), ArchType::parse(key)) {
                ("default", _, _) => conditional.with_default(value.clone()),
                (_, Some(os), _) => conditional.with_os(os, value.clone()),
                (_, None, ArchType::Unknown) => bail!("Unknown condition `{key}`"),
                (_, None, arch) => conditional.with_arch(arch, value.clone()),
            };
        }
        Ok(conditional)
    }
}

fn sources(items: &[Conditional]) -> anyhow::Result<Vec<Source>> {
    items.iter().map(|item| item.build()).collect()
}

impl Compiler {
    fn function(self) -> CompileFn {
        match self {
            Compiler::C => action::compile_c,
            Compiler::Cxx => action::compile_cxx,
            Compiler::Assembler => action::assemble,
            Compiler::Swift => action::compile_swift,
        }
    }
}

impl PhaseKindSpec {
    fn build(&self) -> anyhow::Result<Phase> {
        Ok(match self {
            PhaseKindSpec::CopyHeaders {
                public,
                private,
                project,
                module,
            } => {
                let phase = Phase::copy_headers()
                    .public_headers(sources(public)?)
                    .private_headers(sources(private)?)
                    .project_headers(sources(project)?);
                match module {
                    Some(module) => phase.module_map(module.build::<Path>()?),
                    None => phase,
                }
            }
            PhaseKindSpec::CopyResources {
                directory,
                resources,
            } => Phase::copy_resources(directory.clone(), sources(resources)?),
            PhaseKindSpec::CompileSources { sources: items } => {
                Phase::compile_sources(sources(items)?)
            }
            PhaseKindSpec::CompileSwiftSources { sources: items } => {
                Phase::compile_swift_sources(sources(items)?)
            }
            PhaseKindSpec::SwiftExecutable {
                executable,
                sources: items,
            } => Phase::swift_executable(executable.clone(), sources(items)?),
        })
    }
}

impl ProductSpec {
    pub fn build(&self) -> anyhow::Result<Product> {
        let mut product = match self.kind {
            ProductKindSpec::DynamicLibrary => Product::dynamic_library(&self.name),
            ProductKindSpec::StaticLibrary => Product::static_library(&self.name),
            ProductKindSpec::StaticAndDynamicLibrary => {
                Product::static_and_dynamic_library(&self.name)
            }
            ProductKindSpec::Framework => Product::framework(&self.name),
            ProductKindSpec::Executable => Product::executable(&self.name),
            ProductKindSpec::Application => Product::application(&self.name),
        };

        for (flags, spec) in [
            (&mut product.cflags, &self.cflags),
            (&mut product.cxxflags, &self.cxxflags),
            (&mut product.asflags, &self.asflags),
            (&mut product.swiftcflags, &self.swiftcflags),
            (&mut product.ldflags, &self.ldflags),
            (&mut product.prefix_header, &self.prefix_header),
        ] {
            if let Some(spec) = spec {
                *flags = spec.build()?;
            }
        }

        let folders = &mut product.folders;
        for (folder, spec) in [
            (&mut folders.root, &self.folders.root),
            (&mut folders.public_headers, &self.folders.public_headers),
            (&mut folders.public_module, &self.folders.public_module),
            (&mut folders.private_headers, &self.folders.private_headers),
            (&mut folders.project_headers, &self.folders.project_headers),
        ] {
            if let Some(spec) = spec {
                *folder = spec.clone();
            }
        }

        for dependency in &self.dependencies {
            product.add_dependency(dependency.clone());
        }

        let mut handles: BTreeMap<&str, PhaseHandle> = BTreeMap::new();
        for spec in &self.phases {
            let mut phase = spec.kind.build()?;
            for id in &spec.depends_on {
                let handle = handles.get(id.as_str()).with_context(|| {
                    format!(
                        "A phase of product `{}` depends on `{id}`, which is not an earlier phase",
                        self.name
                    )
                })?;
                phase.depends_on(handle);
            }
            let handle = product.add_phase(phase);
            debug!(product = %self.name, phase = handle.name(), "declared phase");
            if let Some(id) = &spec.id {
                handles.insert(id.as_str(), handle);
            }
        }

        Ok(product)
    }
}

impl Manifest {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Invalid manifest")
    }

    pub fn load(runtime: &dyn Runtime, path: &Path) -> anyhow::Result<Self> {
        let data = runtime.read_file(path)?;
        let content = String::from_utf8(data).with_context(|| format!("{path} is not UTF-8"))?;
        Self::parse(&content).with_context(|| format!("In {path}"))
    }

    pub fn script(&self) -> anyhow::Result<Script> {
        if !self.products.is_empty() && !self.workspaces.is_empty() {
            bail!("A manifest lists either products or workspaces, not both");
        }

        let mut script = Script::new();
        for (extension, compiler) in &self.extensions {
            script
                .registry_mut()
                .register(extension.clone(), compiler.function());
        }
        for product in &self.products {
            script.add_product(product.build()?);
        }
        for workspace in &self.workspaces {
            script.add_workspace(Workspace::new(
                workspace.name.clone(),
                workspace.projects.iter().cloned(),
            ));
        }
        if let Some(extra) = &self.extra {
            script.add_text(extra);
        }
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use ninjagen::{Configuration, ScriptTarget, Target};

    use super::*;

    const FOUNDATION: &str = r#"
extra = "build install: phony | libFoundation.so"

[extensions]
inc = "c"

[[product]]
name = "Foundation"
kind = "dynamic-library"
cflags = { linux = "-DLINUX", default = "-DOTHER" }
ldflags = "-lpthread"
prefix-header = "Prefix.h"

[product.folders]
root = "usr/lib/swift"

[[product.phase]]
kind = "copy-headers"
id = "headers"
public = ["CF/CFBase.h", { macosx = "CF/CFMac.h" }]
module = "CF/linux.modulemap"

[[product.phase]]
kind = "compile-sources"
depends-on = ["headers"]
sources = ["CF/CFBase.c", "CF/tables.inc"]

[[product.phase]]
kind = "compile-swift-sources"
sources = ["Foundation/NSObject.swift", "Foundation/NSString.swift"]

[[product.phase]]
kind = "swift-executable"
executable = "plutil"
sources = ["Tools/plutil/main.swift"]
"#;

    fn render(manifest: &str) -> String {
        let config = Configuration::new(Target::new("x86_64-unknown-linux-gnu"), "/src");
        Manifest::parse(manifest)
            .unwrap()
            .script()
            .unwrap()
            .render(&config)
            .unwrap()
    }

    #[test]
    fn test_products() {
        let text = render(FOUNDATION);

        assert!(text.contains("build Build/Foundation/usr/include/CFBase.h: Cp CF/CFBase.h\n"));
        assert!(!text.contains("CFMac.h"));
        assert!(text.contains(
            "build Build/Foundation/usr/include/module.modulemap: Cp CF/linux.modulemap\n"
        ));
        assert!(text.contains(
            "build Build/Foundation/CF/CFBase.c.o: CompileC CF/CFBase.c | Foundation.CopyHeaders\n"
        ));
        assert!(text.contains(
            "build Build/Foundation/CF/tables.inc.o: CompileC CF/tables.inc | Foundation.CopyHeaders\n"
        ));
        assert!(text.contains("-IBuild/Foundation/usr/lib/swift"));
        assert!(text.contains("-DLINUX -include Prefix.h"));
        assert!(!text.contains("-DOTHER"));
        assert!(text.contains("MergeSwiftModule Build/Foundation/Foundation/NSObject.swift.o"));
        assert!(text.contains("build plutil: phony | Build/plutil/plutil\n"));
        assert!(text.contains(" -lpthread\n"));
        assert!(text.trim_end().ends_with("build install: phony | libFoundation.so"));
    }

    #[test]
    fn test_workspaces() {
        let manifest = Manifest::parse(
            r#"
[[workspace]]
name = "all"
projects = ["swift-corelibs-foundation", "swift-corelibs-xctest"]
"#,
        )
        .unwrap();
        let script = manifest.script().unwrap();
        assert!(matches!(script.target(), ScriptTarget::Workspaces(w) if w.len() == 1));
    }

    #[test]
    fn test_unknown_dependency() {
        let manifest = Manifest::parse(
            r#"
[[product]]
name = "Foo"
kind = "static-library"

[[product.phase]]
kind = "compile-sources"
depends-on = ["later"]
sources = ["a.c"]

[[product.phase]]
kind = "copy-headers"
id = "later"
"#,
        )
        .unwrap();
        let err = manifest.script().err().unwrap();
        assert!(format!("{err}").contains("depends on `later`"));
    }

    #[test]
    fn test_unknown_condition() {
        let manifest = Manifest::parse(
            r#"
[[product]]
name = "Foo"
kind = "executable"
cflags = { plan9 = "-DPLAN9" }
"#,
        )
        .unwrap();
        let err = manifest.script().err().unwrap();
        assert_eq!(format!("{err}"), "Unknown condition `plan9`");
    }

    #[test]
    fn test_products_and_workspaces_conflict() {
        let manifest = Manifest::parse(
            r#"
[[product]]
name = "Foo"
kind = "executable"

[[workspace]]
name = "all"
projects = ["a"]
"#,
        )
        .unwrap();
        assert!(manifest.script().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ninjagen.toml");
        std::fs::write(&path, b"extra = \"\xff\"\n").unwrap();

        let path = Path::from(path.to_string_lossy());
        let err = Manifest::load(&crate::runtime::Host, &path).unwrap_err();
        assert_eq!(err.to_string(), format!("{path} is not UTF-8"));
    }
}
