//! Expansion of mapping templates into concrete file mappings.
//!
//! Each placeholder name is bound to a [`Substitution`]: a single literal, a
//! list of values, or a lazy provider that is awaited the first time a
//! template actually references the name. A template with list-valued
//! placeholders expands to the cartesian product of their values; duplicate
//! results are dropped, keeping first-appearance order.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use super::template::{self, Segment};
use super::{FileMapping, MappingError, MappingTemplate};

/// Error type returned by lazy providers.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by lazy providers.
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>, ProviderError>> + 'a>>;

/// Values bound to a single placeholder name.
pub enum Substitution<'a> {
  Literal(String),
  Values(Vec<String>),
  /// Computed on first reference; never invoked when no template uses it.
  Lazy(Box<dyn FnOnce() -> ProviderFuture<'a> + 'a>),
}

impl<'a> Substitution<'a> {
  pub fn lazy<F, Fut>(provider: F) -> Self
  where
    F: FnOnce() -> Fut + 'a,
    Fut: Future<Output = Result<Vec<String>, ProviderError>> + 'a,
  {
    Substitution::Lazy(Box::new(move || -> ProviderFuture<'a> { Box::pin(provider()) }))
  }

  async fn resolve(self, name: &str) -> Result<Vec<String>, MappingError> {
    match self {
      Substitution::Literal(value) => Ok(vec![value]),
      Substitution::Values(values) => Ok(values),
      Substitution::Lazy(provider) => {
        debug!(placeholder = name, "resolving lazy placeholder");
        provider().await.map_err(|source| MappingError::Provider {
          name: name.to_string(),
          source,
        })
      }
    }
  }
}

impl std::fmt::Debug for Substitution<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Substitution::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
      Substitution::Values(values) => f.debug_tuple("Values").field(values).finish(),
      Substitution::Lazy(_) => f.write_str("Lazy(..)"),
    }
  }
}

/// Named placeholder bindings used by [`expand`].
#[derive(Debug, Default)]
pub struct Substitutions<'a> {
  entries: BTreeMap<String, Substitution<'a>>,
}

impl<'a> Substitutions<'a> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn literal(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.entries.insert(name.into(), Substitution::Literal(value.into()));
    self
  }

  pub fn values(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
    self.entries.insert(name.into(), Substitution::Values(values));
    self
  }

  pub fn lazy<F, Fut>(mut self, name: impl Into<String>, provider: F) -> Self
  where
    F: FnOnce() -> Fut + 'a,
    Fut: Future<Output = Result<Vec<String>, ProviderError>> + 'a,
  {
    self.entries.insert(name.into(), Substitution::lazy(provider));
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, substitution: Substitution<'a>) {
    self.entries.insert(name.into(), substitution);
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(name)
  }
}

struct ParsedTemplate<'t> {
  from: Vec<Segment>,
  to: Vec<Segment>,
  names: Vec<String>,
  source: &'t MappingTemplate,
}

fn parse_side(text: &str) -> Result<Vec<Segment>, MappingError> {
  template::parse(text).map_err(|source| MappingError::Template {
    template: text.to_string(),
    source,
  })
}

fn parse_template(source: &MappingTemplate) -> Result<ParsedTemplate<'_>, MappingError> {
  let from = parse_side(&source.from)?;
  let to = parse_side(&source.to)?;

  let mut names: Vec<String> = Vec::new();
  for name in template::placeholders(&from).into_iter().chain(template::placeholders(&to)) {
    if !names.iter().any(|n| n == name) {
      names.push(name.to_string());
    }
  }

  Ok(ParsedTemplate { from, to, names, source })
}

/// Expand templates into concrete mappings.
///
/// Every placeholder used by any template must be bound, otherwise
/// [`MappingError::UnknownPlaceholder`] is returned before any provider runs.
/// Lazy providers are awaited at most once.
pub async fn expand(
  templates: &[MappingTemplate],
  substitutions: Substitutions<'_>,
) -> Result<Vec<FileMapping>, MappingError> {
  let parsed = templates.iter().map(parse_template).collect::<Result<Vec<_>, _>>()?;

  let mut referenced: Vec<&str> = Vec::new();
  for template in &parsed {
    for name in &template.names {
      if !substitutions.contains(name) {
        return Err(MappingError::UnknownPlaceholder {
          name: name.clone(),
          template: format!("{} -> {}", template.source.from, template.source.to),
        });
      }
      if !referenced.contains(&name.as_str()) {
        referenced.push(name);
      }
    }
  }

  let mut pending = substitutions.entries;
  let mut resolved: BTreeMap<&str, Vec<String>> = BTreeMap::new();
  for name in referenced {
    if let Some(substitution) = pending.remove(name) {
      resolved.insert(name, substitution.resolve(name).await?);
    }
  }

  let mut seen = HashSet::new();
  let mut mappings = Vec::new();
  for template in &parsed {
    for combination in combinations(&template.names, &resolved) {
      let render = |segments: &[Segment]| {
        template::render(segments, &combination).map_err(|source| MappingError::Template {
          template: format!("{} -> {}", template.source.from, template.source.to),
          source,
        })
      };
      let mapping = FileMapping::new(render(template.from.as_slice())?, render(template.to.as_slice())?);
      if seen.insert(mapping.clone()) {
        mappings.push(mapping);
      }
    }
  }

  Ok(mappings)
}

/// Every assignment of values to `names`, first name varying slowest.
fn combinations<'v>(names: &'v [String], resolved: &'v BTreeMap<&str, Vec<String>>) -> Vec<BTreeMap<&'v str, &'v str>> {
  let mut out = vec![BTreeMap::new()];
  for name in names {
    let values = resolved.get(name.as_str()).map(Vec::as_slice).unwrap_or_default();
    let mut next = Vec::with_capacity(out.len() * values.len());
    for partial in &out {
      for value in values {
        let mut assignment = partial.clone();
        assignment.insert(name.as_str(), value.as_str());
        next.push(assignment);
      }
    }
    out = next;
  }
  out
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;

  fn templates(pairs: &[(&str, &str)]) -> Vec<MappingTemplate> {
    pairs.iter().map(|(from, to)| MappingTemplate::new(*from, *to)).collect()
  }

  #[tokio::test]
  async fn templates_without_placeholders_pass_through() {
    let mappings = expand(&templates(&[("*", "")]), Substitutions::new()).await.unwrap();
    assert_eq!(mappings, vec![FileMapping::new("*", "")]);
  }

  #[tokio::test]
  async fn list_values_expand_per_value() {
    let subs = Substitutions::new().values("multilib", vec![".".to_string(), "thumb".to_string()]);
    let mappings = expand(&templates(&[("{multilib}/libc.a", "{multilib}/libc_nano.a")]), subs)
      .await
      .unwrap();

    assert_eq!(
      mappings,
      vec![
        FileMapping::new("./libc.a", "./libc_nano.a"),
        FileMapping::new("thumb/libc.a", "thumb/libc_nano.a"),
      ]
    );
  }

  #[tokio::test]
  async fn literal_and_list_values_combine() {
    let subs = Substitutions::new()
      .literal("target", "arm-none-eabi")
      .values("multilib_dir", vec!["arm-none-eabi/lib".to_string(), "arm-none-eabi/lib/thumb".to_string()]);
    let mappings = expand(&templates(&[("{multilib_dir}/libg.a", "{multilib_dir}/libg_nano.a")]), subs)
      .await
      .unwrap();

    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[1].from, "arm-none-eabi/lib/thumb/libg.a");
  }

  #[tokio::test]
  async fn duplicate_results_are_dropped() {
    let subs = Substitutions::new().values("dir", vec!["a".to_string(), "a".to_string()]);
    let mappings = expand(&templates(&[("{dir}/x", "{dir}/y"), ("a/x", "a/y")]), subs)
      .await
      .unwrap();
    assert_eq!(mappings, vec![FileMapping::new("a/x", "a/y")]);
  }

  #[tokio::test]
  async fn lazy_provider_runs_once_when_referenced() {
    let calls = Cell::new(0);
    let counter = &calls;
    let subs = Substitutions::new().lazy("multilib_dir", move || async move {
      counter.set(counter.get() + 1);
      Ok::<_, ProviderError>(vec!["lib".to_string()])
    });

    let mappings = expand(
      &templates(&[("{multilib_dir}/libc.a", "{multilib_dir}/"), ("{multilib_dir}/libm.a", "")]),
      subs,
    )
    .await
    .unwrap();

    assert_eq!(mappings.len(), 2);
    assert_eq!(calls.get(), 1);
  }

  #[tokio::test]
  async fn lazy_values_expand_per_value() {
    let subs = Substitutions::new().lazy("multilib", || async {
      Ok::<_, ProviderError>(vec![".".to_string(), "thumb".to_string()])
    });
    let mappings = expand(&templates(&[("{multilib}/libc.a", "{multilib}/libc_nano.a")]), subs)
      .await
      .unwrap();

    assert_eq!(
      mappings,
      vec![
        FileMapping::new("./libc.a", "./libc_nano.a"),
        FileMapping::new("thumb/libc.a", "thumb/libc_nano.a"),
      ]
    );
  }

  #[tokio::test]
  async fn lazy_provider_is_skipped_when_unreferenced() {
    let calls = Cell::new(0);
    let counter = &calls;
    let subs = Substitutions::new().lazy("multilib_dir", move || async move {
      counter.set(counter.get() + 1);
      Ok::<_, ProviderError>(vec![])
    });

    let mappings = expand(&templates(&[("bin/*", "bin/")]), subs).await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(calls.get(), 0);
  }

  #[tokio::test]
  async fn unknown_placeholder_is_rejected() {
    let err = expand(&templates(&[("{nope}/libc.a", "")]), Substitutions::new())
      .await
      .unwrap_err();
    assert!(matches!(err, MappingError::UnknownPlaceholder { ref name, .. } if name == "nope"));
  }

  #[tokio::test]
  async fn provider_failure_names_placeholder() {
    let subs = Substitutions::new().lazy("multilib_dir", || async { Err::<Vec<String>, ProviderError>("compiler missing".into()) });
    let err = expand(&templates(&[("{multilib_dir}/libc.a", "")]), subs)
      .await
      .unwrap_err();
    assert!(matches!(err, MappingError::Provider { ref name, .. } if name == "multilib_dir"));
  }

  #[tokio::test]
  async fn malformed_template_is_reported() {
    let err = expand(&templates(&[("{oops", "")]), Substitutions::new())
      .await
      .unwrap_err();
    assert!(matches!(err, MappingError::Template { .. }));
  }
}
