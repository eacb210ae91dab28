//! Configure flags and tool environment derived from a component.
//!
//! Nothing here mutates the component or the process environment; every
//! value is computed fresh from the component, the profile and the layout.

use std::path::Path;

use crate::component::{Component, ComponentKind, Profile};
use crate::layout::DirectoryLayout;
use crate::tool::ToolEnv;

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

/// Values shared by every component of a run that feed into flags.
#[derive(Debug, Clone, Copy)]
pub struct FlagContext<'a> {
  pub host: &'a str,
  pub pkg_version: Option<&'a str>,
}

/// Renders a path with forward slashes, as configure scripts expect.
pub fn slash(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}

/// The component's own flags for `profile` followed by the injected ones.
pub fn configure_flags(
  component: &Component,
  profile: Profile,
  layout: &DirectoryLayout,
  ctx: FlagContext<'_>,
) -> Vec<String> {
  let mut flags = component.config.resolve(profile);
  flags.extend(standard_flags(component, layout, ctx));
  flags
}

/// Triple, prefix, doc-directory and per-kind flags.
pub fn standard_flags(component: &Component, layout: &DirectoryLayout, ctx: FlagContext<'_>) -> Vec<String> {
  let target = component.target.as_str();
  let root = slash(layout.install_root(component.staged));
  let doc = format!("{root}/share/doc/gcc-{target}");

  let mut flags = vec![
    format!("--build={}", ctx.host),
    format!("--host={}", ctx.host),
    format!("--target={target}"),
    format!("--prefix={root}"),
    format!("--bindir={root}/bin"),
    format!("--sbindir={root}/bin"),
    format!("--libdir={root}/lib"),
    format!("--includedir={root}/include"),
    format!("--oldincludedir={root}/include"),
    format!("--infodir={doc}/info"),
    format!("--mandir={doc}/man"),
    format!("--htmldir={doc}/html"),
    format!("--pdfdir={doc}/pdf"),
  ];

  let pkg_version = ctx.pkg_version.map(|v| format!("--with-pkgversion={v}"));
  match component.kind {
    ComponentKind::Binutils => {
      flags.extend(pkg_version);
      flags.push(format!("--with-sysroot={root}/{target}"));
    }
    ComponentKind::Compiler => {
      flags.extend(pkg_version);
      flags.push(format!("--libexecdir={root}/lib"));
      flags.push(format!("--with-python-dir=share/gcc-{target}"));
      flags.push(format!("--with-sysroot={root}/{target}"));
    }
    ComponentKind::Debugger => {
      let install = slash(&layout.install_dir);
      flags.extend(pkg_version);
      flags.push(format!("--program-prefix={target}-"));
      flags.push(format!(
        "--with-system-gdbinit={install}/{}/{target}/lib/gdbinit",
        ctx.host
      ));
    }
    ComponentKind::Library => {}
  }

  flags
}

/// Environment contributed by the component itself: `CXXFLAGS` from
/// `build_options`, then `env` (which wins on conflict).
pub fn component_env(component: &Component, profile: Profile) -> ToolEnv {
  let mut env = ToolEnv::new();
  let options = component.build_options.resolve(profile);
  if !options.is_empty() {
    env.insert("CXXFLAGS".to_string(), options.join(" "));
  }
  env.extend(component.env.resolve(profile));
  env
}

/// Full environment for tool calls: `PATH` with the install roots' `bin`
/// directories prepended to `inherited_path`, plus [`component_env`].
pub fn tool_env(
  component: &Component,
  profile: Profile,
  layout: &DirectoryLayout,
  inherited_path: Option<&str>,
) -> ToolEnv {
  let mut dirs = vec![slash(&layout.install_root(component.staged).join("bin"))];
  if component.staged {
    dirs.push(slash(&layout.install_dir.join("bin")));
  }
  if let Some(inherited) = inherited_path.filter(|p| !p.is_empty()) {
    dirs.push(inherited.to_string());
  }

  let mut env = ToolEnv::new();
  env.insert("PATH".to_string(), dirs.join(PATH_SEPARATOR));
  env.extend(component_env(component, profile));
  env
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::Profiled;
  use std::collections::BTreeMap;
  use std::path::PathBuf;

  const CTX: FlagContext<'static> = FlagContext {
    host: "x86_64-linux-gnu",
    pkg_version: Some("GNU Toolchain 14.2.0"),
  };

  fn layout() -> DirectoryLayout {
    DirectoryLayout {
      source_dir: PathBuf::from("/ws/src/gcc"),
      build_dir: PathBuf::from("/ws/build/arm-none-eabi/gcc"),
      install_dir: PathBuf::from("/ws/install/final"),
      staging_install_dir: PathBuf::from("/ws/install/temp"),
    }
  }

  #[test]
  fn own_flags_come_first() {
    let mut binutils = Component::new("binutils", ComponentKind::Binutils, "arm-none-eabi");
    binutils.config = Profiled::Uniform(vec!["--disable-nls".to_string()]);

    let flags = configure_flags(&binutils, Profile::Release, &layout(), CTX);

    assert_eq!(flags[0], "--disable-nls");
    assert!(flags.contains(&"--target=arm-none-eabi".to_string()));
    assert!(flags.contains(&"--prefix=/ws/install/final".to_string()));
    assert!(flags.contains(&"--with-pkgversion=GNU Toolchain 14.2.0".to_string()));
    assert_eq!(flags.last().unwrap(), "--with-sysroot=/ws/install/final/arm-none-eabi");
  }

  #[test]
  fn staged_components_use_staging_root() {
    let mut gcc = Component::new("gcc_newlib_nano", ComponentKind::Compiler, "arm-none-eabi");
    gcc.staged = true;

    let flags = standard_flags(&gcc, &layout(), CTX);

    assert!(flags.contains(&"--prefix=/ws/install/temp".to_string()));
    assert!(flags.contains(&"--libexecdir=/ws/install/temp/lib".to_string()));
    assert!(flags.contains(&"--with-sysroot=/ws/install/temp/arm-none-eabi".to_string()));
    assert!(flags.contains(&"--pdfdir=/ws/install/temp/share/doc/gcc-arm-none-eabi/pdf".to_string()));
    assert!(flags.contains(&"--with-python-dir=share/gcc-arm-none-eabi".to_string()));
  }

  #[test]
  fn debugger_flags() {
    let gdb = Component::new("gdb", ComponentKind::Debugger, "arm-none-eabi");
    let flags = standard_flags(&gdb, &layout(), CTX);

    assert!(flags.contains(&"--program-prefix=arm-none-eabi-".to_string()));
    assert!(flags.contains(
      &"--with-system-gdbinit=/ws/install/final/x86_64-linux-gnu/arm-none-eabi/lib/gdbinit".to_string()
    ));
  }

  #[test]
  fn library_gets_only_common_flags() {
    let newlib = Component::new("newlib", ComponentKind::Library, "arm-none-eabi");
    let flags = standard_flags(&newlib, &layout(), FlagContext { pkg_version: None, ..CTX });

    assert_eq!(flags.len(), 13);
    assert!(!flags.iter().any(|f| f.starts_with("--with-")));
  }

  #[test]
  fn env_layers_build_options_then_overrides() {
    let mut gcc = Component::new("gcc", ComponentKind::Compiler, "arm-none-eabi");
    gcc.build_options = Profiled::PerProfile(BTreeMap::from([
      ("debug".to_string(), vec!["-g".to_string(), "-O0".to_string()]),
      ("_".to_string(), vec!["-g".to_string(), "-O2".to_string()]),
    ]));
    gcc.env = Profiled::Uniform(BTreeMap::from([(
      "INHIBIT_LIBC_CFLAGS".to_string(),
      "-DUSE_TM_CLONE_REGISTRY=0".to_string(),
    )]));

    let env = component_env(&gcc, Profile::Debug);
    assert_eq!(env["CXXFLAGS"], "-g -O0");
    assert_eq!(env["INHIBIT_LIBC_CFLAGS"], "-DUSE_TM_CLONE_REGISTRY=0");
    assert_eq!(component_env(&gcc, Profile::Release)["CXXFLAGS"], "-g -O2");

    gcc.env = Profiled::Uniform(BTreeMap::from([("CXXFLAGS".to_string(), "-std=gnu++11".to_string())]));
    assert_eq!(component_env(&gcc, Profile::Debug)["CXXFLAGS"], "-std=gnu++11");
  }

  #[cfg(not(windows))]
  #[test]
  fn path_prepends_install_bins() {
    let mut nano = Component::new("gcc_newlib_nano", ComponentKind::Compiler, "arm-none-eabi");
    let env = tool_env(&nano, Profile::Release, &layout(), Some("/usr/bin"));
    assert_eq!(env["PATH"], "/ws/install/final/bin:/usr/bin");

    nano.staged = true;
    let env = tool_env(&nano, Profile::Release, &layout(), None);
    assert_eq!(env["PATH"], "/ws/install/temp/bin:/ws/install/final/bin");
  }
}
