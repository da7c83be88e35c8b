//! Top-level assembly of a `build.ninja` document.

use tracing::info;

use crate::action::CompileRegistry;
use crate::config::{BuildMode, Configuration};
use crate::error::{Error, Result};
use crate::ninja::{Edge, Rule, Writer};
use crate::product::Product;
use crate::runtime::Runtime;
use crate::workspace::Workspace;

/// What a script builds: its own products, or other projects.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptTarget {
    Products(Vec<Product>),
    Workspaces(Vec<Workspace>),
}

pub struct Script {
    target: ScriptTarget,
    extra: String,
    registry: CompileRegistry,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            target: ScriptTarget::Products(vec![]),
            extra: String::new(),
            registry: CompileRegistry::default(),
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> &ScriptTarget {
        &self.target
    }

    /// Switches the script to product mode, dropping any workspaces.
    pub fn add_product(&mut self, product: Product) {
        match &mut self.target {
            ScriptTarget::Products(products) => products.push(product),
            ScriptTarget::Workspaces(_) => self.target = ScriptTarget::Products(vec![product]),
        }
    }

    /// Switches the script to workspace mode, dropping any products.
    pub fn add_workspace(&mut self, workspace: Workspace) {
        match &mut self.target {
            ScriptTarget::Workspaces(workspaces) => workspaces.push(workspace),
            ScriptTarget::Products(_) => self.target = ScriptTarget::Workspaces(vec![workspace]),
        }
    }

    /// Text appended verbatim after everything else.
    pub fn add_text(&mut self, text: &str) {
        self.extra.push_str(text);
        self.extra.push_str("\n\n");
    }

    pub fn registry_mut(&mut self) -> &mut CompileRegistry {
        &mut self.registry
    }

    pub fn render(&self, config: &Configuration) -> Result<String> {
        let mut out = Writer::new();
        out.comment("Generated by ninjagen. Do not edit; run `ninja reconfigure` instead.");
        out.newline();

        match &self.target {
            ScriptTarget::Products(products) => {
                variables(config, &mut out)?;
                for rule in rules(config) {
                    out.rule(&rule);
                }
                for product in products {
                    product.render(config, &self.registry, &mut out)?;
                }
                reconfigure(config, &mut out);
            }
            ScriptTarget::Workspaces(workspaces) => {
                out.rule(
                    &Rule::new("BuildProject", "cd $project && ninja")
                        .description("BuildProject: $project"),
                );
                for workspace in workspaces {
                    workspace.render(&mut out);
                }
            }
        }

        out.verbatim(&self.extra);
        out.newline();
        Ok(out.finish())
    }

    /// Configures any workspaces, then writes the script to the configured path.
    pub fn generate(&self, config: &Configuration, runtime: &dyn Runtime) -> Result<()> {
        if let ScriptTarget::Workspaces(workspaces) = &self.target {
            for workspace in workspaces {
                workspace.configure(config, runtime)?;
            }
        }

        let script = self.render(config)?;
        runtime.write_file(&config.build_script_path, script.as_bytes())?;
        info!(path = %config.build_script_path, "wrote build script");
        Ok(())
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn variables(config: &Configuration, out: &mut Writer) -> Result<()> {
    let target = &config.target;
    let os = target
        .swift_sdk_name()
        .ok_or_else(|| Error::UnsupportedPlatform {
            what: "swift sdk name",
            target: target.triple().to_string(),
        })?;
    let swift_triple = target.swift_triple();
    let debug = config.build_mode == BuildMode::Debug;
    let sysroot = config.system_root.is_some();
    let bootstrap = config.bootstrap_directory.is_some();
    let toolchain = config
        .toolchain
        .as_ref()
        .map(|t| format!("-B{}", config.relative(&t.join("bin"))))
        .unwrap_or_default();
    let bootstrap_includes = if bootstrap {
        "-I${BOOTSTRAP_DIR}/usr/include -I${BOOTSTRAP_DIR}/usr/local/include \
         -I${TARGET_BOOTSTRAP_DIR}/usr/include -I${TARGET_BOOTSTRAP_DIR}/usr/local/include"
    } else {
        ""
    };

    for (name, value) in &config.variables {
        out.variable(name, value);
    }
    out.variable("VERBOSE_FLAGS", if config.verbose { "-v" } else { "" });
    out.newline();

    out.variable("TARGET", target.triple());
    out.variable("DSTROOT", config.install_directory.absolute());
    if let Some(swift_triple) = &swift_triple {
        out.variable("SWIFT_TARGET", swift_triple);
        out.variable("SWIFT_ARCH", target.swift_arch());
    }
    out.variable("MODULE_CACHE_PATH", config.relative(&config.module_cache_directory));
    out.variable("BUILD_DIR", config.relative(&config.build_directory));
    out.variable("INTERMEDIATE_DIR", config.relative(&config.intermediate_directory));
    out.variable("CLANG", &config.clang);
    out.variable("CLANGXX", &config.clangxx);
    out.variable("SWIFT", &config.swift);
    out.variable("SWIFTC", &config.swiftc);
    out.variable("SDKROOT", &config.swift_sdk);
    out.variable("AR", &config.ar);
    out.variable("OS", os);
    out.variable("ARCH", target.swift_arch());
    out.variable("DYLIB_PREFIX", target.dynamic_library_prefix());
    out.variable("DYLIB_SUFFIX", target.dynamic_library_suffix());
    out.variable("PREFIX", &config.prefix);
    if let Some(sysroot) = &config.system_root {
        out.variable("SYSROOT", sysroot.absolute());
    }
    out.variable("SRCROOT", config.relative(&config.source_root));
    out.variable("BINUTILS_VERSION", "4.8");
    out.variable("TARGET_LDSYSROOT", "");
    if let Some(dir) = &config.bootstrap_directory {
        let dir = config.relative(dir);
        out.variable("BOOTSTRAP_DIR", format!("{dir}/common"));
        out.variable("TARGET_BOOTSTRAP_DIR", format!("{dir}/${{TARGET}}"));
    }
    out.newline();

    out.variable(
        "TARGET_CFLAGS",
        join(&[
            "-fcolor-diagnostics -fdollars-in-identifiers -fblocks -fobjc-runtime=macosx-10.11 \
             -fintegrated-as -fPIC --target=${TARGET}",
            match config.build_mode {
                BuildMode::Debug => "-g -O0",
                BuildMode::Release => "-O2",
            },
            if sysroot { "--sysroot=${SYSROOT}" } else { "" },
            bootstrap_includes,
            config.extra_c_flags.as_str(),
            toolchain.as_str(),
        ]),
    );

    let sdk_swift = format!("${{SDKROOT}}/lib/swift/{os}");
    out.variable(
        "TARGET_SWIFTCFLAGS",
        join(&[
            format!("-I{sdk_swift} -Xcc -fblocks").as_str(),
            if swift_triple.is_some() { "-target ${SWIFT_TARGET}" } else { "" },
            if sysroot { "-sdk ${SYSROOT}" } else { "" },
            bootstrap_includes,
            if debug { "-g -Onone" } else { "" },
            config.extra_swift_flags.as_str(),
        ]),
    );
    out.variable(
        "TARGET_SWIFTEXE_FLAGS",
        join(&[
            format!("-I{sdk_swift} -L{sdk_swift}").as_str(),
            if debug { "-g -Onone -enable-testing" } else { "" },
            config.extra_swift_flags.as_str(),
        ]),
    );
    out.variable(
        "TARGET_CXXFLAGS",
        "-std=gnu++11 -I${SYSROOT}/usr/include/c++/${BINUTILS_VERSION} \
         -I${SYSROOT}/usr/include/${TARGET}/c++/${BINUTILS_VERSION}",
    );
    out.variable("EXTRA_LD_FLAGS", &config.extra_ld_flags);
    out.variable(
        "TARGET_LDFLAGS",
        join(&[
            format!("--target=${{TARGET}} ${{EXTRA_LD_FLAGS}} -L{sdk_swift}").as_str(),
            if sysroot { "--sysroot=${SYSROOT}" } else { "" },
            if bootstrap { "-L${TARGET_BOOTSTRAP_DIR}/usr/lib" } else { "" },
            toolchain.as_str(),
        ]),
    );
    out.variable("AR_FLAGS", "rcs");
    out.newline();
    Ok(())
}

fn rules(config: &Configuration) -> Vec<Rule> {
    const MKDIR: &str = "mkdir -p `dirname $out`;";
    let link_verbose = if config.verbose { " -Xlinker --verbose" } else { "" };
    vec![
        Rule::new("Cp", format!("{MKDIR} /bin/cp -r $in $out")).description("Cp $in"),
        Rule::new(
            "CompileC",
            format!("{MKDIR} ${{CLANG}} ${{TARGET_CFLAGS}} $flags ${{VERBOSE_FLAGS}} -c $in -o $out"),
        )
        .description("CompileC: $in"),
        Rule::new(
            "CompileCxx",
            format!(
                "{MKDIR} ${{CLANGXX}} ${{TARGET_CFLAGS}} ${{TARGET_CXXFLAGS}} $flags ${{VERBOSE_FLAGS}} -c $in -o $out"
            ),
        )
        .description("CompileCxx: $in"),
        Rule::new(
            "CompileSwift",
            format!(
                "{MKDIR} mkdir -p ${{MODULE_CACHE_PATH}}; ${{SWIFT}} -frontend -c $module_sources \
                 ${{TARGET_SWIFTCFLAGS}} $flags -module-name $module_name -module-link-name $module_name \
                 -o $out -emit-module-path $out.~partial.swiftmodule -emit-module-doc-path $out.~partial.swiftdoc \
                 -emit-dependencies-path $out.d -emit-reference-dependencies-path $out.swiftdeps \
                 -module-cache-path ${{MODULE_CACHE_PATH}}"
            ),
        )
        .description("CompileSwift: $in")
        .depfile("$out.d"),
        Rule::new(
            "MergeSwiftModule",
            format!(
                "{MKDIR} ${{SWIFT}} -frontend -emit-module $partials ${{TARGET_SWIFTCFLAGS}} $flags \
                 -module-cache-path ${{MODULE_CACHE_PATH}} -module-link-name $module_name -o $out"
            ),
        )
        .description("Merge $out"),
        Rule::new(
            "Assemble",
            format!(
                "{MKDIR} ${{CLANG}} -x assembler-with-cpp -c $in -o $out ${{TARGET_CFLAGS}} $flags ${{VERBOSE_FLAGS}}"
            ),
        )
        .description("Assemble: $in"),
        Rule::new(
            "Link",
            format!(
                "{MKDIR} ${{CLANG}} ${{TARGET_LDFLAGS}} $flags ${{VERBOSE_FLAGS}} $start $in $end -o $out{link_verbose}"
            ),
        )
        .description("Link: $out"),
        Rule::new("Archive", format!("{MKDIR} ${{AR}} ${{AR_FLAGS}} $flags $out $in"))
            .description("Archive: $out"),
        Rule::new(
            "SwiftExecutable",
            format!(
                "{MKDIR} ${{SWIFTC}} ${{TARGET_SWIFTEXE_FLAGS}} ${{EXTRA_LD_FLAGS}} $flags $in -o $out"
            ),
        )
        .description("SwiftExecutable: $out"),
    ]
}

fn reconfigure(config: &Configuration, out: &mut Writer) {
    out.newline();
    out.rule(
        &Rule::new(
            "RunReconfigure",
            format!(
                "{} --reconfigure {}",
                config.generator,
                config.relative(&config.config_path)
            ),
        )
        .description("Reconfiguring build script.")
        .generator(),
    );
    out.build(&Edge::new("${BUILD_DIR}/.reconfigure", "RunReconfigure"));
    out.newline();
    out.build(&Edge::phony("reconfigure").order_only(["${BUILD_DIR}/.reconfigure"]));
    out.newline();
}
