//! Placeholder parsing and rendering for mapping templates.
//!
//! # Placeholder Format
//!
//! - `{name}` - replaced by a value bound to `name`; names are made of ASCII
//!   letters, digits, `_` and `-`
//!
//! # Escaping
//!
//! Use `{{` and `}}` for literal braces. A lone `}` is an error.
//!
//! # Example
//!
//! ```
//! use toolsmith_lib::mapping::template::{parse, Segment};
//!
//! let segments = parse("{multilib_dir}/libc.a").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder("multilib_dir".to_string()),
//!     Segment::Literal("/libc.a".to_string()),
//! ]);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder name to be substituted
  Placeholder(String),
}

/// Errors that can occur during template parsing or rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("empty placeholder at position {0}")]
  Empty(usize),

  #[error("invalid placeholder name: {0}")]
  InvalidName(String),

  #[error("unmatched '}}' at position {0}")]
  UnmatchedClose(usize),

  #[error("no value bound to placeholder: {0}")]
  Unbound(String),
}

fn is_name_char(ch: char) -> bool {
  ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

/// Parse a template string into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is unclosed, empty, or has an invalid
/// name, or if a `}` appears outside a placeholder without being doubled.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      '{' => {
        if let Some((_, '{')) = chars.peek() {
          chars.next();
          literal.push('{');
          continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            closed = true;
            break;
          }
          name.push(c);
        }

        if !closed {
          return Err(TemplateError::Unclosed(pos));
        }
        if name.is_empty() {
          return Err(TemplateError::Empty(pos));
        }
        if !name.chars().all(is_name_char) {
          return Err(TemplateError::InvalidName(name));
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(name));
      }
      '}' => {
        if let Some((_, '}')) = chars.peek() {
          chars.next();
          literal.push('}');
        } else {
          return Err(TemplateError::UnmatchedClose(pos));
        }
      }
      _ => literal.push(ch),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(segments: &[Segment]) -> Vec<&str> {
  let mut names: Vec<&str> = Vec::new();
  for segment in segments {
    if let Segment::Placeholder(name) = segment
      && !names.contains(&name.as_str())
    {
      names.push(name);
    }
  }
  names
}

/// Render segments with the given placeholder values.
pub fn render(segments: &[Segment], values: &BTreeMap<&str, &str>) -> Result<String, TemplateError> {
  let mut out = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(text) => out.push_str(text),
      Segment::Placeholder(name) => {
        let value = values
          .get(name.as_str())
          .ok_or_else(|| TemplateError::Unbound(name.clone()))?;
        out.push_str(value);
      }
    }
  }
  Ok(out)
}

/// Parse and render in one go.
pub fn substitute(input: &str, values: &BTreeMap<&str, &str>) -> Result<String, TemplateError> {
  render(&parse(input)?, values)
}
