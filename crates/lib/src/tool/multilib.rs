//! Parsing of a compiler's `-print-multi-lib` output.
//!
//! Each line looks like `thumb/v7-m;@mthumb@march=armv7-m`: a directory
//! fragment relative to the library root, then the flags selecting it after
//! `;`. The default multilib is printed as `.`.

/// Directory fragments in output order, annotations stripped, duplicates and
/// blank lines dropped.
pub fn parse_multilib_output(output: &str) -> Vec<String> {
  let mut dirs: Vec<String> = Vec::new();
  for line in output.lines() {
    let dir = line.split(';').next().unwrap_or_default().trim();
    if dir.is_empty() || dirs.iter().any(|d| d == dir) {
      continue;
    }
    dirs.push(dir.to_string());
  }
  dirs
}

/// Library directory of a multilib fragment under `<target>/lib`.
pub fn multilib_lib_dir(target: &str, fragment: &str) -> String {
  if fragment == "." {
    format!("{target}/lib")
  } else {
    format!("{target}/lib/{fragment}")
  }
}
