//! Target triples and the platform conventions derived from them.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::runtime::Runtime;

macro_rules! arch_types {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Architecture named by the first component of a triple.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ArchType {
            Unknown,
            $($variant,)*
        }

        impl ArchType {
            /// Exact lookup of a triple's architecture component.
            fn lookup(name: &str) -> Self {
                match name {
                    $($name => ArchType::$variant,)*
                    _ => ArchType::Unknown,
                }
            }
        }
    };
}

arch_types! {
    Arm => "arm",
    Armeb => "armeb",
    Aarch64 => "aarch64",
    Aarch64Be => "aarch64_be",
    Bpfel => "bpfel",
    Bpfeb => "bpfeb",
    Hexagon => "hexagon",
    Mips => "mips",
    Mipsel => "mipsel",
    Mips64 => "mips64",
    Mips64el => "mips64el",
    Msp430 => "msp430",
    Ppc => "ppc",
    Ppc64 => "ppc64",
    Ppc64le => "ppc64le",
    R600 => "r600",
    Amdgcn => "amdgcn",
    Sparc => "sparc",
    Sparcv9 => "sparcv9",
    Sparcel => "sparcel",
    Systemz => "systemz",
    Tce => "tce",
    Thumb => "thumb",
    Thumbeb => "thumbeb",
    X86 => "x86",
    X86_64 => "x86_64",
    Xcore => "xcore",
    Nvptx => "nvptx",
    Nvptx64 => "nvptx64",
    Le32 => "le32",
    Le64 => "le64",
    Amdil => "amdil",
    Amdil64 => "amdil64",
    Hsail => "hsail",
    Hsail64 => "hsail64",
    Spir => "spir",
    Spir64 => "spir64",
    Kalimba => "kalimba",
    Shave => "shave",
}

impl ArchType {
    /// Parses an architecture name. Big-endian `armeb` is matched first, then anything
    /// containing `arm` is little-endian ARM. Host spellings (`i686`, `amd64`, `arm64`) are
    /// folded onto their canonical names.
    pub fn parse(name: &str) -> Self {
        match name {
            "armeb" => ArchType::Armeb,
            "arm64" => ArchType::Aarch64,
            "i386" | "i486" | "i586" | "i686" => ArchType::X86,
            "amd64" => ArchType::X86_64,
            _ if name.contains("arm") => ArchType::Arm,
            _ => ArchType::lookup(name),
        }
    }

    /// The canonical spelling used in generated triples. Not the inverse of [`ArchType::parse`]:
    /// ARM and Thumb both print as `armv7` and x86 prints as `i386`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchType::Unknown => "unknown",
            ArchType::Arm | ArchType::Thumb => "armv7",
            ArchType::Armeb => "armeb",
            ArchType::Aarch64 => "aarch64",
            ArchType::Aarch64Be => "aarch64_be",
            ArchType::Bpfel => "bpfel",
            ArchType::Bpfeb => "bpfeb",
            ArchType::Hexagon => "hexagon",
            ArchType::Mips => "mips",
            ArchType::Mipsel => "mipsel",
            ArchType::Mips64 => "mips64",
            ArchType::Mips64el => "mips64el",
            ArchType::Msp430 => "msp430",
            ArchType::Ppc => "ppc",
            ArchType::Ppc64 => "ppc64",
            ArchType::Ppc64le => "ppc64le",
            ArchType::R600 => "r600",
            ArchType::Amdgcn => "amdgcn",
            ArchType::Sparc => "sparc",
            ArchType::Sparcv9 => "sparcv9",
            ArchType::Sparcel => "sparcel",
            ArchType::Systemz => "systemz",
            ArchType::Tce => "tce",
            ArchType::Thumbeb => "thumbeb",
            ArchType::X86 => "i386",
            ArchType::X86_64 => "x86_64",
            ArchType::Xcore => "xcore",
            ArchType::Nvptx => "nvptx",
            ArchType::Nvptx64 => "nvptx64",
            ArchType::Le32 => "le32",
            ArchType::Le64 => "le64",
            ArchType::Amdil => "amdil",
            ArchType::Amdil64 => "amdil64",
            ArchType::Hsail => "hsail",
            ArchType::Hsail64 => "hsail64",
            ArchType::Spir => "spir",
            ArchType::Spir64 => "spir64",
            ArchType::Kalimba => "kalimba",
            ArchType::Shave => "shave",
        }
    }
}

impl fmt::Display for ArchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsType {
    Unknown,
    Linux,
    FreeBsd,
    MacOsX,
    Win32,
}

impl OsType {
    fn classify(triple: &str) -> Self {
        if triple.contains("linux") {
            OsType::Linux
        } else if triple.contains("freebsd") {
            OsType::FreeBsd
        } else if triple.contains("windows") || triple.contains("win32") {
            OsType::Win32
        } else if triple.contains("darwin") {
            OsType::MacOsX
        } else {
            OsType::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Unknown,
    Apple,
    Pc,
    Scei,
    Bgp,
    Bgq,
    Freescale,
    Ibm,
    ImaginationTechnologies,
    MipsTechnologies,
    Nvidia,
    Csr,
}

impl Vendor {
    fn parse(name: &str) -> Self {
        match name {
            "apple" => Vendor::Apple,
            "pc" => Vendor::Pc,
            "scei" => Vendor::Scei,
            "bgp" => Vendor::Bgp,
            "bgq" => Vendor::Bgq,
            "fsl" => Vendor::Freescale,
            "ibm" => Vendor::Ibm,
            "img" => Vendor::ImaginationTechnologies,
            "mti" => Vendor::MipsTechnologies,
            "nvidia" => Vendor::Nvidia,
            "csr" => Vendor::Csr,
            _ => Vendor::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Unknown,
    Gnu,
    GnuEabi,
    GnuEabiHf,
    GnuX32,
    Code16,
    Eabi,
    EabiHf,
    Android,
    Msvc,
    Itanium,
    Cygnus,
}

impl Environment {
    fn parse(name: &str) -> Self {
        // longest prefixes first
        const TABLE: &[(&str, Environment)] = &[
            ("gnueabihf", Environment::GnuEabiHf),
            ("gnueabi", Environment::GnuEabi),
            ("gnux32", Environment::GnuX32),
            ("gnu", Environment::Gnu),
            ("code16", Environment::Code16),
            ("eabihf", Environment::EabiHf),
            ("eabi", Environment::Eabi),
            ("android", Environment::Android),
            ("msvc", Environment::Msvc),
            ("itanium", Environment::Itanium),
            ("cygnus", Environment::Cygnus),
        ];
        TABLE
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, env)| *env)
            .unwrap_or(Environment::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    Unknown,
    Coff,
    Elf,
    MachO,
}

/// A parsed `<arch>-<vendor>-<os>[-<env>]` triple.
///
/// Immutable once built. It is stored in a configuration file as the bare triple string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Target {
    triple: String,
    os: OsType,
    arch: ArchType,
    vendor: Vendor,
    environment: Environment,
    object_format: ObjectFormat,
    executable_suffix: &'static str,
    dynamic_library_prefix: &'static str,
    dynamic_library_suffix: &'static str,
    static_library_prefix: &'static str,
    static_library_suffix: &'static str,
}

impl Target {
    pub fn new(triple: impl Into<String>) -> Self {
        let triple = triple.into();
        let os = OsType::classify(&triple);

        let (dynamic_library_prefix, dynamic_library_suffix, executable_suffix) = match os {
            OsType::Linux | OsType::FreeBsd => ("lib", ".so", ""),
            OsType::Win32 => ("", ".dll", ".exe"),
            OsType::MacOsX => ("lib", ".dylib", ""),
            OsType::Unknown => {
                warn!(%triple, "unknown platform");
                ("lib", ".dylib", "")
            }
        };

        let components = triple.split('-').collect::<Vec<_>>();
        let arch = ArchType::parse(components[0]);
        let vendor = components
            .get(1)
            .map(|v| Vendor::parse(v))
            .unwrap_or(Vendor::Unknown);
        // `x86_64-linux-gnu` drops the vendor, putting the environment third.
        let environment = match components.as_slice() {
            [_, _, _, env, ..] => Environment::parse(env),
            [_, os, env] if OsType::classify(os) != OsType::Unknown => Environment::parse(env),
            _ => Environment::Unknown,
        };

        let object_format = if triple.ends_with("-elf") {
            ObjectFormat::Elf
        } else if triple.ends_with("-coff") {
            ObjectFormat::Coff
        } else if triple.ends_with("-macho") {
            ObjectFormat::MachO
        } else {
            match os {
                OsType::Linux | OsType::FreeBsd => ObjectFormat::Elf,
                OsType::Win32 => ObjectFormat::Coff,
                OsType::MacOsX => ObjectFormat::MachO,
                OsType::Unknown => ObjectFormat::Unknown,
            }
        };

        Self {
            triple,
            os,
            arch,
            vendor,
            environment,
            object_format,
            executable_suffix,
            dynamic_library_prefix,
            dynamic_library_suffix,
            static_library_prefix: "lib",
            static_library_suffix: ".a",
        }
    }

    /// Composes a plausible triple for the machine the generator runs on.
    pub fn default_triple(runtime: &dyn Runtime) -> anyhow::Result<Option<String>> {
        let host = runtime.host_machine()?;
        let arch = ArchType::parse(&host.cpu);
        let mut triple = arch.as_str().to_string();
        match host.system.to_ascii_lowercase().as_str() {
            "linux" if arch == ArchType::Arm => triple.push_str("-linux-gnueabihf"),
            "linux" => triple.push_str("-linux-gnu"),
            "darwin" | "macos" => triple.push_str("-apple-darwin"),
            "freebsd" => triple.push_str("-freebsd11.0"),
            system => {
                warn!(system, "unknown host os");
                return Ok(None);
            }
        }
        Ok(Some(triple))
    }

    pub fn triple(&self) -> &str {
        &self.triple
    }

    pub fn os(&self) -> OsType {
        self.os
    }

    pub fn arch(&self) -> ArchType {
        self.arch
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn object_format(&self) -> ObjectFormat {
        self.object_format
    }

    pub fn executable_suffix(&self) -> &'static str {
        self.executable_suffix
    }

    pub fn dynamic_library_prefix(&self) -> &'static str {
        self.dynamic_library_prefix
    }

    pub fn dynamic_library_suffix(&self) -> &'static str {
        self.dynamic_library_suffix
    }

    pub fn static_library_prefix(&self) -> &'static str {
        self.static_library_prefix
    }

    pub fn static_library_suffix(&self) -> &'static str {
        self.static_library_suffix
    }

    pub fn dynamic_library_name(&self, name: &str) -> String {
        format!(
            "{}{name}{}",
            self.dynamic_library_prefix, self.dynamic_library_suffix
        )
    }

    pub fn static_library_name(&self, name: &str) -> String {
        format!(
            "{}{name}{}",
            self.static_library_prefix, self.static_library_suffix
        )
    }

    /// The triple handed to the swift frontend, `None` where it infers its own (macOS) or
    /// where the platform is unsupported.
    pub fn swift_triple(&self) -> Option<String> {
        let arch = self.arch.as_str();
        match self.os {
            OsType::MacOsX => None,
            OsType::Linux if self.arch == ArchType::Arm => {
                Some(format!("{arch}-unknown-linux-gnueabihf"))
            }
            OsType::Linux => Some(format!("{arch}-unknown-linux")),
            OsType::FreeBsd => Some(format!("{arch}-unknown-freebsd")),
            _ => {
                warn!(triple = %self.triple, "unknown sdk for swift");
                None
            }
        }
    }

    pub fn swift_sdk_name(&self) -> Option<&'static str> {
        match self.os {
            OsType::MacOsX => Some("macosx"),
            OsType::Linux => Some("linux"),
            OsType::FreeBsd => Some("freebsd"),
            _ => {
                warn!(triple = %self.triple, "unknown sdk for swift");
                None
            }
        }
    }

    pub fn swift_arch(&self) -> &'static str {
        self.arch.as_str()
    }
}

impl From<String> for Target {
    fn from(triple: String) -> Self {
        Target::new(triple)
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Target::new)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.triple
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.triple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::Recorder;

    #[test]
    fn test_linux_triple() {
        let target = Target::new("x86_64-unknown-linux-gnu");
        assert_eq!(target.os(), OsType::Linux);
        assert_eq!(target.arch(), ArchType::X86_64);
        assert_eq!(target.environment(), Environment::Gnu);
        assert_eq!(target.object_format(), ObjectFormat::Elf);
        assert_eq!(target.dynamic_library_name("Foundation"), "libFoundation.so");
        assert_eq!(target.static_library_name("Foundation"), "libFoundation.a");
        assert_eq!(target.executable_suffix(), "");
        assert_eq!(target.swift_triple().as_deref(), Some("x86_64-unknown-linux"));
        assert_eq!(target.swift_sdk_name(), Some("linux"));
    }

    #[test]
    fn test_loads_from_owned_text() {
        #[derive(Deserialize)]
        struct Saved {
            target: Target,
        }

        fn load<T: serde::de::DeserializeOwned>(text: String) -> T {
            toml::from_str(&text).unwrap()
        }

        let saved: Saved = load(String::from("target = \"aarch64-unknown-linux-gnu\"\n"));
        assert_eq!(saved.target, Target::new("aarch64-unknown-linux-gnu"));
        assert_eq!(saved.target.dynamic_library_name("Foo"), "libFoo.so");
    }

    #[test]
    fn test_dynamic_suffix_follows_os_only() {
        for arch in ["x86_64", "aarch64", "armv7", "ppc64le", "bogus"] {
            let suffix = |os: &str| Target::new(format!("{arch}-{os}")).dynamic_library_suffix();
            assert_eq!(suffix("unknown-linux-gnu"), ".so");
            assert_eq!(suffix("unknown-freebsd11.0"), ".so");
            assert_eq!(suffix("pc-windows-msvc"), ".dll");
            assert_eq!(suffix("pc-win32"), ".dll");
            assert_eq!(suffix("apple-darwin"), ".dylib");
            assert_eq!(suffix("unknown-none"), ".dylib");
        }
    }

    #[test]
    fn test_windows_naming() {
        let target = Target::new("x86_64-pc-windows-cygnus");
        assert_eq!(target.os(), OsType::Win32);
        assert_eq!(target.vendor(), Vendor::Pc);
        assert_eq!(target.environment(), Environment::Cygnus);
        assert_eq!(target.object_format(), ObjectFormat::Coff);
        assert_eq!(target.dynamic_library_name("Foo"), "Foo.dll");
        assert_eq!(target.executable_suffix(), ".exe");
        assert_eq!(target.swift_triple(), None);
        assert_eq!(target.swift_sdk_name(), None);
    }

    #[test]
    fn test_arch_parsing() {
        assert_eq!(ArchType::parse("armeb"), ArchType::Armeb);
        assert_eq!(ArchType::parse("armv7l"), ArchType::Arm);
        assert_eq!(ArchType::parse("aarch64"), ArchType::Aarch64);
        assert_eq!(ArchType::parse("thumbeb"), ArchType::Thumbeb);
        assert_eq!(ArchType::parse("x86"), ArchType::X86);
        assert_eq!(ArchType::parse("sparcv9"), ArchType::Sparcv9);
        assert_eq!(ArchType::parse("wat"), ArchType::Unknown);
        assert_eq!(ArchType::Thumb.as_str(), "armv7");
        assert_eq!(ArchType::X86.as_str(), "i386");
    }

    #[test]
    fn test_vendorless_triple() {
        let target = Target::new("x86_64-linux-gnu");
        assert_eq!(target.vendor(), Vendor::Unknown);
        assert_eq!(target.environment(), Environment::Gnu);
        assert_eq!(Target::new("x86_64-apple-darwin").environment(), Environment::Unknown);
    }

    #[test]
    fn test_arm_swift_triple() {
        let target = Target::new("armv7-unknown-linux-gnueabihf");
        assert_eq!(target.arch(), ArchType::Arm);
        assert_eq!(target.environment(), Environment::GnuEabiHf);
        assert_eq!(
            target.swift_triple().as_deref(),
            Some("armv7-unknown-linux-gnueabihf")
        );
        assert_eq!(Target::new("x86_64-apple-darwin").swift_triple(), None);
    }

    #[test]
    fn test_default_triple() {
        let host = |system: &str, cpu: &str| {
            let runtime = Recorder::with_host(system, cpu);
            Target::default_triple(&runtime).unwrap()
        };
        assert_eq!(host("linux", "x86_64").as_deref(), Some("x86_64-linux-gnu"));
        assert_eq!(host("Linux", "armv7l").as_deref(), Some("armv7-linux-gnueabihf"));
        assert_eq!(host("Darwin", "x86_64").as_deref(), Some("x86_64-apple-darwin"));
        assert_eq!(host("macos", "aarch64").as_deref(), Some("aarch64-apple-darwin"));
        assert_eq!(host("FreeBSD", "amd64").as_deref(), Some("x86_64-freebsd11.0"));
        assert_eq!(host("haiku", "x86_64"), None);
    }
}
