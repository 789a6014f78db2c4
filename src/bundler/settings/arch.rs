//! CPU architecture types and utilities.

use std::fmt;

/// CPU architecture named by a runtime identifier.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_pack::bundler::Arch;
///
/// assert_eq!(Arch::from_rid("arm64"), Some(Arch::AArch64));
/// assert_eq!(Arch::X86_64.rid_name(), "x64");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// x86_64 / AMD64 (64-bit)
    X86_64,
    /// x86 / i686 (32-bit)
    X86,
    /// AArch64 / ARM64 (64-bit)
    AArch64,
}

impl Arch {
    /// Parses the architecture part of a runtime identifier (`x64`, `x86`, `arm64`).
    pub fn from_rid(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x64" => Some(Self::X86_64),
            "x86" => Some(Self::X86),
            "arm64" => Some(Self::AArch64),
            _ => None,
        }
    }

    /// Name used in runtime identifiers and file names.
    pub fn rid_name(self) -> &'static str {
        match self {
            Self::X86_64 => "x64",
            Self::X86 => "x86",
            Self::AArch64 => "arm64",
        }
    }

    /// Architecture of the running process.
    pub fn current() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Some(Self::X86_64),
            "x86" => Some(Self::X86),
            "aarch64" => Some(Self::AArch64),
            _ => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rid_name())
    }
}
