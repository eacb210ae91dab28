//! CPU part of GNU host triples.

use std::fmt;

/// Build machine CPU, named the way GNU triples spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  I686,
  X86_64,
  Aarch64,
}

impl Arch {
  /// The CPU this binary was compiled for.
  pub fn current() -> Option<Self> {
    Self::from_cpu_name(std::env::consts::ARCH)
  }

  /// Parses a CPU name as Rust, GNU config.guess or BSD spell it.
  pub fn from_cpu_name(name: &str) -> Option<Self> {
    match name {
      "x86" | "i386" | "i486" | "i586" | "i686" => Some(Self::I686),
      "x86_64" | "amd64" => Some(Self::X86_64),
      "aarch64" | "arm64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// Leading CPU field of `triple`, e.g. `i686` in `i686-w64-mingw32`.
  pub fn from_triple(triple: &str) -> Option<Self> {
    triple.split('-').next().and_then(Self::from_cpu_name)
  }

  pub fn gnu_cpu(&self) -> &'static str {
    match self {
      Self::I686 => "i686",
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.gnu_cpu())
  }
}
