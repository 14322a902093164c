// stepchain/src/core/template.rs

//! Prompt templates with `{name}` placeholders.
//!
//! `{{` and `}}` render as literal braces. Whitespace just inside a placeholder is ignored, so
//! `{ code }` binds the same variable as `{code}`. Rendering happens in two phases: `parse` turns the
//! template into segments, then `render` substitutes from a resolved variable map and reports
//! the first placeholder that has no binding.

use std::collections::BTreeMap;

/// Variables available to a template, keyed by placeholder name.
pub type TemplateVars = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
  Literal(&'a str),
  Brace(char),
  Placeholder(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
  /// Placeholder with no bound variable.
  MissingVariable { variable: String },
  /// Unbalanced braces or an empty placeholder.
  Malformed { position: usize, reason: String },
}

pub(crate) fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
  let bytes = template.as_bytes();
  let mut segments = Vec::new();
  let mut literal_start = 0;
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
        if literal_start < i {
          segments.push(Segment::Literal(&template[literal_start..i]));
        }
        segments.push(Segment::Brace(bytes[i] as char));
        i += 2;
        literal_start = i;
      }
      b'{' => {
        let close = template[i + 1..].find(['{', '}']).map(|off| i + 1 + off);
        let end = match close {
          Some(end) if bytes[end] == b'}' => end,
          _ => {
            return Err(TemplateError::Malformed {
              position: i,
              reason: "unclosed '{'".to_string(),
            })
          }
        };
        let name = template[i + 1..end].trim();
        if name.is_empty() {
          return Err(TemplateError::Malformed {
            position: i,
            reason: "empty placeholder".to_string(),
          });
        }
        if literal_start < i {
          segments.push(Segment::Literal(&template[literal_start..i]));
        }
        segments.push(Segment::Placeholder(name));
        i = end + 1;
        literal_start = i;
      }
      b'}' => {
        return Err(TemplateError::Malformed {
          position: i,
          reason: "single '}' encountered".to_string(),
        })
      }
      _ => i += 1,
    }
  }
  if literal_start < bytes.len() {
    segments.push(Segment::Literal(&template[literal_start..]));
  }
  Ok(segments)
}

/// Placeholder names in order of first appearance.
pub(crate) fn placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
  let mut names: Vec<String> = Vec::new();
  for segment in parse(template)? {
    if let Segment::Placeholder(name) = segment {
      if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
      }
    }
  }
  Ok(names)
}

pub fn render(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
  let segments = parse(template)?;
  let mut out = String::with_capacity(template.len());
  for segment in segments {
    match segment {
      Segment::Literal(text) => out.push_str(text),
      Segment::Brace(c) => out.push(c),
      Segment::Placeholder(name) => match vars.get(name) {
        Some(value) => out.push_str(value),
        None => {
          return Err(TemplateError::MissingVariable {
            variable: name.to_string(),
          })
        }
      },
    }
  }
  Ok(out)
}
