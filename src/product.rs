//! Build outputs: libraries, frameworks, executables and applications.

use tracing::debug;

use crate::action::{CompileRegistry, Requirements};
use crate::conditional::TargetConditional;
use crate::config::Configuration;
use crate::error::Result;
use crate::ninja::{Edge, Writer};
use crate::path::Path;
use crate::phase::{Phase, PhaseHandle, PhasePlan};
use crate::target::{ObjectFormat, OsType};

const OBJC_BEGIN: &str = "${TARGET_BOOTSTRAP_DIR}/usr/lib/objc-begin.o";
const OBJC_END: &str = "${TARGET_BOOTSTRAP_DIR}/usr/lib/objc-end.o";
const SWIFT_STARTUP: &str = "${SDKROOT}/lib/swift/${OS}/${ARCH}/swiftrt.o";

/// How a library's objects become an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Linked with `Link` into a shared object.
    Shared,
    /// Archived with `Archive` into a static library.
    Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Dynamic,
    Static,
    /// Both artifacts from one set of objects, shared first.
    StaticAndDynamic,
}

impl Linkage {
    pub fn strategies(&self) -> &'static [LinkStrategy] {
        match self {
            Linkage::Dynamic => &[LinkStrategy::Shared],
            Linkage::Static => &[LinkStrategy::Archive],
            Linkage::StaticAndDynamic => &[LinkStrategy::Shared, LinkStrategy::Archive],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    Library(Linkage),
    Framework,
    Executable,
    Application,
}

/// Install folders below `<build>/<product>`, as written in the product description.
/// They may contain script variables such as `${PREFIX}`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFolders {
    pub root: String,
    pub public_headers: String,
    pub public_module: String,
    pub private_headers: String,
    pub project_headers: String,
}

impl Default for HeaderFolders {
    fn default() -> Self {
        Self {
            root: "usr/include".into(),
            public_headers: "usr/include".into(),
            public_module: "usr/include".into(),
            private_headers: "usr/local/include".into(),
            project_headers: "usr/local/include".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    name: String,
    kind: ProductKind,
    phases: Vec<Phase>,
    dependencies: Vec<String>,

    pub cflags: TargetConditional<String>,
    pub cxxflags: TargetConditional<String>,
    pub asflags: TargetConditional<String>,
    pub swiftcflags: TargetConditional<String>,
    pub ldflags: TargetConditional<String>,
    pub prefix_header: TargetConditional<String>,
    pub folders: HeaderFolders,
}

impl Product {
    pub fn new(name: impl Into<String>, kind: ProductKind) -> Self {
        Self {
            name: name.into(),
            kind,
            phases: vec![],
            dependencies: vec![],
            cflags: TargetConditional::new(),
            cxxflags: TargetConditional::new(),
            asflags: TargetConditional::new(),
            swiftcflags: TargetConditional::new(),
            ldflags: TargetConditional::new(),
            prefix_header: TargetConditional::new(),
            folders: HeaderFolders::default(),
        }
    }

    pub fn dynamic_library(name: impl Into<String>) -> Self {
        Self::new(name, ProductKind::Library(Linkage::Dynamic))
    }

    pub fn static_library(name: impl Into<String>) -> Self {
        Self::new(name, ProductKind::Library(Linkage::Static))
    }

    pub fn static_and_dynamic_library(name: impl Into<String>) -> Self {
        Self::new(name, ProductKind::Library(Linkage::StaticAndDynamic))
    }

    pub fn framework(name: impl Into<String>) -> Self {
        Self::new(name, ProductKind::Framework)
    }

    pub fn executable(name: impl Into<String>) -> Self {
        Self::new(name, ProductKind::Executable)
    }

    pub fn application(name: impl Into<String>) -> Self {
        Self::new(name, ProductKind::Application)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Attaches `phase` after the last attached one and names it `<product>.<Kind>`.
    pub fn add_phase(&mut self, mut phase: Phase) -> PhaseHandle {
        let label = phase.kind().label();
        let base = format!("{}.{label}", self.name);
        let repeats = self
            .phases
            .iter()
            .filter(|p| p.kind().label() == label)
            .count();
        let name = match repeats {
            0 => base,
            n => format!("{base}.{}", n + 1),
        };

        let previous = self.phases.last().map(|p| p.name().to_string());
        let handle = phase.attach(name, previous);
        self.phases.push(phase);
        handle
    }

    /// An extra order-only input of the final link.
    pub fn add_dependency(&mut self, name: impl Into<String>) {
        self.dependencies.push(name.into());
    }

    /// The artifact file names this product produces for `config`'s target.
    pub fn product_names(&self, config: &Configuration) -> Vec<String> {
        let target = &config.target;
        match self.kind {
            ProductKind::Library(linkage) => linkage
                .strategies()
                .iter()
                .map(|strategy| match strategy {
                    LinkStrategy::Shared => target.dynamic_library_name(&self.name),
                    LinkStrategy::Archive => target.static_library_name(&self.name),
                })
                .collect(),
            ProductKind::Framework => vec![format!("{}.framework", self.name)],
            ProductKind::Executable => {
                vec![format!("{}{}", self.name, target.executable_suffix())]
            }
            ProductKind::Application => vec![format!("{}.app", self.name)],
        }
    }

    pub fn scope<'a>(&'a self, config: &'a Configuration) -> ProductScope<'a> {
        let target = &config.target;
        let build_dir = config.build_directory.join(&self.name);
        let folder = |f: &str| build_dir.join(f.trim_start_matches('/'));
        let product_name = self
            .product_names(config)
            .into_iter()
            .next()
            .unwrap_or_else(|| self.name.clone());

        let (public_headers, public_module, private_headers) = match self.kind {
            ProductKind::Framework => {
                let bundle = build_dir.join(&product_name);
                (
                    bundle.join("Headers"),
                    bundle.join("Modules"),
                    bundle.join("PrivateHeaders"),
                )
            }
            _ => (
                folder(&self.folders.public_headers),
                folder(&self.folders.public_module),
                folder(&self.folders.private_headers),
            ),
        };

        let resolve = |value: &'a TargetConditional<String>| value.resolve(target).map(String::as_str);

        ProductScope {
            name: &self.name,
            config,
            product_name,
            root_headers: folder(&self.folders.root),
            project_headers: folder(&self.folders.project_headers),
            public_headers,
            public_module,
            private_headers,
            build_dir,
            cflags: resolve(&self.cflags),
            cxxflags: resolve(&self.cxxflags),
            asflags: resolve(&self.asflags),
            swiftcflags: resolve(&self.swiftcflags),
            ldflags: resolve(&self.ldflags),
            prefix_header: resolve(&self.prefix_header),
        }
    }

    /// Emits every phase in attachment order, then the product's link, archive and staging
    /// edges.
    pub fn render(
        &self,
        config: &Configuration,
        registry: &CompileRegistry,
        out: &mut Writer,
    ) -> Result<()> {
        let scope = self.scope(config);

        let plans = self
            .phases
            .iter()
            .map(|phase| phase.plan(&scope, registry))
            .collect::<Result<Vec<PhasePlan>>>()?;

        let requirements = plans
            .iter()
            .fold(Requirements::empty(), |acc, plan| acc | plan.requirements);

        let objects = plans
            .iter()
            .flat_map(|plan| plan.objects.iter())
            .map(|object| config.relative(object))
            .collect::<Vec<_>>();

        let mut dependencies = self.dependencies.clone();
        dependencies.extend(
            plans
                .iter()
                .filter_map(|plan| plan.merged_module.as_ref())
                .map(|module| config.relative(module)),
        );

        debug!(
            product = %self.name,
            phases = self.phases.len(),
            objects = objects.len(),
            ?requirements,
            "rendering product"
        );

        out.newline();
        for (phase, plan) in self.phases.iter().zip(&plans) {
            phase.render(plan, &scope, out);
        }

        let link = Link {
            scope: &scope,
            objects: &objects,
            dependencies: &dependencies,
            requirements,
        };

        let target = &config.target;
        match self.kind {
            ProductKind::Library(linkage) => {
                let names = self.product_names(config);
                for (strategy, product_name) in linkage.strategies().iter().zip(&names) {
                    let artifact = scope.build_dir.join(product_name);
                    let edge = match strategy {
                        LinkStrategy::Shared => link.shared(&artifact, product_name),
                        LinkStrategy::Archive => link.archive(&artifact),
                    };
                    out.build(&edge);
                    out.newline();
                    alias(out, product_name, &config.relative(&artifact));
                }
            }
            ProductKind::Framework => {
                let bundle = scope.build_dir.join(&scope.product_name);
                let artifact = bundle.join(&self.name);
                let soname = target.dynamic_library_name(&self.name);
                out.build(&link.with_flags(&artifact, soname_flags(&soname)));
                out.newline();
                alias(out, &scope.product_name, &config.relative(&artifact));
                out.build(
                    &Edge::new(format!("${{TARGET_BOOTSTRAP_DIR}}/usr/lib/{soname}"), "Cp")
                        .input(config.relative(&artifact)),
                );
                out.newline();
            }
            ProductKind::Executable => {
                let artifact = scope.build_dir.join(&scope.product_name);
                out.build(&link.with_flags(&artifact, String::new()));
                out.newline();
                alias(out, &scope.product_name, &config.relative(&artifact));
            }
            ProductKind::Application => {
                let bundle = scope.build_dir.join(&scope.product_name);
                let artifact = bundle.join(&self.name);
                out.build(&link.with_flags(&artifact, String::new()));
                out.newline();
                alias(out, &scope.product_name, &config.relative(&artifact));
                out.build(
                    &Edge::new(
                        format!(
                            "${{TARGET_BOOTSTRAP_DIR}}/Applications/{}/{}",
                            scope.product_name, self.name
                        ),
                        "Cp",
                    )
                    .input(config.relative(&artifact)),
                );
                out.newline();
            }
        }

        Ok(())
    }
}

fn soname_flags(soname: &str) -> String {
    format!("-shared -Wl,-soname,{soname} -Wl,--no-undefined")
}

fn alias(out: &mut Writer, product_name: &str, artifact: &str) {
    out.build(&Edge::phony(product_name).order_only([artifact]));
    out.newline();
    out.default_target(product_name);
    out.newline();
}

/// Shared inputs of a product's final link steps.
struct Link<'a> {
    scope: &'a ProductScope<'a>,
    objects: &'a [String],
    dependencies: &'a [String],
    requirements: Requirements,
}

impl Link<'_> {
    fn shared(&self, artifact: &Path, product_name: &str) -> Edge {
        let flags = match self.scope.config.target.os() {
            OsType::Linux | OsType::FreeBsd => soname_flags(product_name),
            _ => "-shared".to_string(),
        };
        self.with_flags(artifact, flags)
    }

    /// The archiver takes objects only: no linker flags, startup or glue objects.
    fn archive(&self, artifact: &Path) -> Edge {
        Edge::new(self.scope.config.relative(artifact), "Archive")
            .inputs(self.objects.iter().cloned())
            .order_only(self.dependencies.iter().cloned())
            .bind("flags", "")
    }

    fn with_flags(&self, artifact: &Path, mut flags: String) -> Edge {
        let config = self.scope.config;
        if let Some(ldflags) = self.scope.ldflags {
            flags.push(' ');
            flags.push_str(ldflags);
        }
        if self.requirements.contains(Requirements::STDCXX) {
            flags.push_str(" -lstdc++");
        }

        let mut inputs = vec![];
        if self.requirements.contains(Requirements::SWIFT)
            && config.target.object_format() == ObjectFormat::Elf
        {
            inputs.push(SWIFT_STARTUP.to_string());
        }
        inputs.extend(self.objects.iter().cloned());

        let edge = Edge::new(config.relative(artifact), "Link")
            .inputs(inputs)
            .order_only(self.dependencies.iter().cloned())
            .bind("flags", flags);

        if self.requirements.contains(Requirements::OBJC) {
            edge.bind("start", OBJC_BEGIN).bind("end", OBJC_END)
        } else {
            edge
        }
    }
}

/// A product as seen by its phases and actions while one target is being emitted.
#[derive(Debug, Clone)]
pub struct ProductScope<'a> {
    pub name: &'a str,
    pub config: &'a Configuration,
    /// First artifact name, also the product's phony target.
    pub product_name: String,
    pub build_dir: Path,
    pub root_headers: Path,
    pub public_headers: Path,
    pub public_module: Path,
    pub private_headers: Path,
    pub project_headers: Path,
    pub cflags: Option<&'a str>,
    pub cxxflags: Option<&'a str>,
    pub asflags: Option<&'a str>,
    pub swiftcflags: Option<&'a str>,
    pub ldflags: Option<&'a str>,
    pub prefix_header: Option<&'a str>,
}

impl ProductScope<'_> {
    pub fn header_dirs(&self) -> [&Path; 4] {
        [
            &self.root_headers,
            &self.public_headers,
            &self.private_headers,
            &self.project_headers,
        ]
    }

    pub fn swift_module(&self) -> Path {
        self.build_dir.join(format!("{}.swiftmodule", self.name))
    }
}
