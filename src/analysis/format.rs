use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::config::OutputFormat;

/// Serializes `value` with the configured indent. With `ensure_ascii` every
/// non-ASCII character is written as a `\uXXXX` escape.
pub fn format_json(value: &Value, output: &OutputFormat) -> serde_json::Result<String> {
  let indent = " ".repeat(output.json_indent);
  let mut buf = Vec::new();

  let mut ser =
    serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
  value.serialize(&mut ser)?;

  let text = String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)?;

  if output.ensure_ascii {
    Ok(escape_non_ascii(&text))
  } else {
    Ok(text)
  }
}

/// Non-ASCII characters only ever appear inside string literals in
/// serialized JSON, so escaping them in place keeps the document valid.
pub fn escape_non_ascii(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut units = [0u16; 2];

  for c in text.chars() {
    if c.is_ascii() {
      out.push(c);
      continue;
    }

    for unit in c.encode_utf16(&mut units) {
      let _ = write!(out, "\\u{:04x}", unit);
    }
  }

  out
}

pub async fn write_report(text: &str, path: &Path) -> Result<()> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create directory: {}", parent.display()))?;
  }

  tokio::fs::write(path, text.as_bytes())
    .await
    .with_context(|| format!("failed to write report: {}", path.display()))?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn output(indent: usize, ensure_ascii: bool) -> OutputFormat {
    OutputFormat {
      json_indent: indent,
      ensure_ascii,
      ..OutputFormat::default()
    }
  }

  #[test]
  fn indents_with_configured_width() {
    let value = json!({"a": [1, 2]});

    assert_eq!(
      format_json(&value, &output(2, false)).unwrap(),
      "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
    );
    assert_eq!(
      format_json(&value, &output(0, false)).unwrap(),
      "{\n\"a\": [\n1,\n2\n]\n}"
    );
  }

  #[test]
  fn keeps_unicode_unless_ascii_is_requested() {
    let value = json!({"skin": "油性"});

    assert_eq!(
      format_json(&value, &output(4, false)).unwrap(),
      "{\n    \"skin\": \"油性\"\n}"
    );
    assert_eq!(
      format_json(&value, &output(4, true)).unwrap(),
      "{\n    \"skin\": \"\\u6cb9\\u6027\"\n}"
    );
  }

  #[test]
  fn astral_characters_use_surrogate_pairs() {
    assert_eq!(escape_non_ascii("a😀"), "a\\ud83d\\ude00");

    let escaped = format_json(&json!(["😀é"]), &output(4, true)).unwrap();
    let back: Value = serde_json::from_str(&escaped).unwrap();
    assert_eq!(back, json!(["😀é"]));
  }

  #[tokio::test]
  async fn writes_report_creating_parent_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("out").join("report.json");

    write_report("{\"ok\": true}", &path).await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"ok\": true}");
  }
}
