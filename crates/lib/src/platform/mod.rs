//! Host platform detection and default locations.

pub mod arch;
pub mod os;
pub mod paths;

use arch::Arch;
use os::Os;
use std::fmt;

/// Host platform combining architecture and OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the GNU triple passed as `--build`/`--host` to configure scripts
  /// (e.g., "x86_64-linux-gnu")
  pub fn gnu_triple(&self) -> String {
    format!("{}-{}", self.arch, self.os.gnu_system())
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.gnu_triple())
  }
}

/// Returns the GNU triple of the machine running the build
///
/// Returns `None` if the current platform is not supported
pub fn host_triple() -> Option<String> {
  Platform::current().map(|p| p.gnu_triple())
}
