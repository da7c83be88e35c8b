use hashbrown::HashMap;

use crate::path::Path;
use crate::target::{ArchType, OsType, Target};

/// A value chosen by the active target when the script is emitted.
///
/// Resolution looks at the OS first, then the architecture, then the default. Nothing but the
/// target passed to [`TargetConditional::resolve`] is consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConditional<T> {
    os: HashMap<OsType, T>,
    arch: HashMap<ArchType, T>,
    default: Option<T>,
}

impl<T> Default for TargetConditional<T> {
    fn default() -> Self {
        Self {
            os: HashMap::new(),
            arch: HashMap::new(),
            default: None,
        }
    }
}

impl<T> TargetConditional<T> {
    /// Resolves to nothing until an alternative is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// The same value for every target.
    pub fn value(value: impl Into<T>) -> Self {
        Self::new().with_default(value)
    }

    pub fn with_os(mut self, os: OsType, value: impl Into<T>) -> Self {
        self.os.insert(os, value.into());
        self
    }

    pub fn with_arch(mut self, arch: ArchType, value: impl Into<T>) -> Self {
        self.arch.insert(arch, value.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<T>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn resolve(&self, target: &Target) -> Option<&T> {
        self.os
            .get(&target.os())
            .or_else(|| self.arch.get(&target.arch()))
            .or(self.default.as_ref())
    }
}

impl From<&str> for TargetConditional<String> {
    fn from(value: &str) -> Self {
        Self::value(value)
    }
}

impl From<String> for TargetConditional<String> {
    fn from(value: String) -> Self {
        Self::value(value)
    }
}

impl From<&str> for TargetConditional<Path> {
    fn from(value: &str) -> Self {
        Self::value(value)
    }
}

impl From<Path> for TargetConditional<Path> {
    fn from(value: Path) -> Self {
        Self::value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> TargetConditional<String> {
        TargetConditional::new()
            .with_os(OsType::Linux, "-DLINUX")
            .with_arch(ArchType::X86_64, "-DX86_64")
            .with_default("-DOTHER")
    }

    #[test]
    fn test_os_beats_arch() {
        let linux = Target::new("x86_64-unknown-linux-gnu");
        assert_eq!(flags().resolve(&linux).map(String::as_str), Some("-DLINUX"));
    }

    #[test]
    fn test_arch_then_default() {
        let darwin = Target::new("x86_64-apple-darwin");
        assert_eq!(flags().resolve(&darwin).map(String::as_str), Some("-DX86_64"));

        let arm_darwin = Target::new("aarch64-apple-darwin");
        assert_eq!(flags().resolve(&arm_darwin).map(String::as_str), Some("-DOTHER"));
    }

    #[test]
    fn test_absent_default() {
        let only_linux = TargetConditional::<String>::new().with_os(OsType::Linux, "-lm");
        assert_eq!(only_linux.resolve(&Target::new("x86_64-pc-windows-msvc")), None);
        assert_eq!(TargetConditional::<String>::new().resolve(&Target::new("x86_64-unknown-linux-gnu")), None);
    }

    #[test]
    fn test_cygnus_layers_linux_flags_by_arch() {
        // Windows has no OS entry here, so the x86_64 flags apply to a Cygnus triple.
        let cygnus = Target::new("x86_64-pc-windows-cygnus");
        let value = TargetConditional::<String>::new()
            .with_os(OsType::MacOsX, "-DDARWIN")
            .with_arch(ArchType::X86_64, "-DDEPLOYMENT_TARGET_LINUX");
        assert_eq!(
            value.resolve(&cygnus).map(String::as_str),
            Some("-DDEPLOYMENT_TARGET_LINUX")
        );
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let target = Target::new("x86_64-unknown-linux-gnu");
        let a = TargetConditional::<String>::new()
            .with_arch(ArchType::X86_64, "arch")
            .with_os(OsType::Linux, "os");
        let b = TargetConditional::<String>::new()
            .with_os(OsType::Linux, "os")
            .with_arch(ArchType::X86_64, "arch");
        assert_eq!(a.resolve(&target), b.resolve(&target));
    }
}
