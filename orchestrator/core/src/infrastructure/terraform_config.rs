// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terraform Configuration Parser
//!
//! Extracts the declared input variables of a product's root module from a
//! tar+gzip archive. Only the shallowest directory that contains Terraform
//! files is read; nested modules and `.terraform/` are ignored.
//!
//! `.tf` files are scanned for top-level `variable "<name>" { … }` blocks
//! with a small lexer that understands strings (including template
//! interpolations), heredocs and the three comment styles. `.tf.json` files
//! are read through `serde_json`. Files named `override.tf` or
//! `*_override.tf` are applied last and merge into already declared
//! variables, as Terraform does.

use crate::domain::parameters::{ConfigurationParser, ParserError, TerraformVariable};
use flate2::read::GzDecoder;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*").expect("identifier regex is valid"))
}

/// [`ConfigurationParser`] for HCL and JSON Terraform configurations.
#[derive(Debug, Default, Clone)]
pub struct HclConfigurationParser;

impl HclConfigurationParser {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigurationParser for HclConfigurationParser {
    fn parse(&self, archive: &[u8]) -> Result<Vec<TerraformVariable>, ParserError> {
        let files = root_module_files(archive)?;
        let mut declared = Declarations::default();

        let (overrides, primary): (Vec<_>, Vec<_>) = files.into_iter().partition(|(path, _)| is_override_file(path));
        for (path, source) in primary {
            for variable in parse_file(&path, &source)? {
                declared.declare(&path, variable)?;
            }
        }
        for (path, source) in overrides {
            for variable in parse_file(&path, &source)? {
                declared.merge(variable);
            }
        }

        Ok(declared.into_variables())
    }
}

// ============================================================================
// Archive walk
// ============================================================================

fn is_terraform_file(path: &str) -> bool {
    path.ends_with(".tf") || path.ends_with(".tf.json")
}

fn is_override_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = name.trim_end_matches(".json").trim_end_matches(".tf");
    stem == "override" || stem.ends_with("_override")
}

fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.') && segment != "." && segment != "..")
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// `(path, contents)` of every Terraform file in the root module, sorted by path.
fn root_module_files(archive: &[u8]) -> Result<Vec<(String, String)>, ParserError> {
    let mut reader = tar::Archive::new(GzDecoder::new(archive));
    let entries = reader.entries().map_err(|e| ParserError::Archive(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| ParserError::Archive(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| ParserError::Archive(e.to_string()))?
            .to_string_lossy()
            .trim_start_matches("./")
            .to_string();
        if !is_terraform_file(&path) || is_hidden(&path) {
            continue;
        }
        let mut source = String::new();
        entry
            .read_to_string(&mut source)
            .map_err(|e| ParserError::Configuration(format!("{} is not valid UTF-8: {}", path, e)))?;
        files.push((path, source));
    }

    let Some(root) = files
        .iter()
        .map(|(path, _)| parent_dir(path))
        .min_by_key(|dir| (dir.matches('/').count() + usize::from(!dir.is_empty()), dir.len()))
        .map(str::to_string)
    else {
        return Ok(Vec::new());
    };

    let mut root_files: Vec<_> = files.into_iter().filter(|(path, _)| parent_dir(path) == root).collect();
    root_files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(root_files)
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
struct DeclaredVariable {
    name: String,
    variable_type: Option<String>,
    description: Option<String>,
    default: Option<String>,
    sensitive: Option<bool>,
}

#[derive(Default)]
struct Declarations {
    ordered: Vec<DeclaredVariable>,
    index: HashMap<String, usize>,
}

impl Declarations {
    fn declare(&mut self, path: &str, variable: DeclaredVariable) -> Result<(), ParserError> {
        if self.index.contains_key(&variable.name) {
            return Err(ParserError::Configuration(format!(
                "variable \"{}\" is declared more than once (again in {})",
                variable.name, path
            )));
        }
        self.index.insert(variable.name.clone(), self.ordered.len());
        self.ordered.push(variable);
        Ok(())
    }

    fn merge(&mut self, variable: DeclaredVariable) {
        match self.index.get(&variable.name) {
            Some(&i) => {
                let existing = &mut self.ordered[i];
                if variable.variable_type.is_some() {
                    existing.variable_type = variable.variable_type;
                }
                if variable.description.is_some() {
                    existing.description = variable.description;
                }
                if variable.default.is_some() {
                    existing.default = variable.default;
                }
                if variable.sensitive.is_some() {
                    existing.sensitive = variable.sensitive;
                }
            }
            None => {
                self.index.insert(variable.name.clone(), self.ordered.len());
                self.ordered.push(variable);
            }
        }
    }

    fn into_variables(self) -> Vec<TerraformVariable> {
        self.ordered
            .into_iter()
            .map(|v| TerraformVariable {
                key: v.name,
                default_value: v.default.unwrap_or_default(),
                variable_type: v.variable_type.unwrap_or_default(),
                description: v.description.unwrap_or_default(),
                is_no_echo: v.sensitive.unwrap_or(false),
            })
            .collect()
    }
}

fn parse_file(path: &str, source: &str) -> Result<Vec<DeclaredVariable>, ParserError> {
    if path.ends_with(".tf.json") {
        parse_json_file(path, source)
    } else {
        parse_hcl_file(source).map_err(|reason| ParserError::Configuration(format!("{}: {}", path, reason)))
    }
}

// ============================================================================
// JSON syntax
// ============================================================================

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_json_file(path: &str, source: &str) -> Result<Vec<DeclaredVariable>, ParserError> {
    let document: Value = serde_json::from_str(source)
        .map_err(|e| ParserError::Configuration(format!("{}: {}", path, e)))?;

    let blocks = match document.get("variable") {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.clone(),
        Some(object @ Value::Object(_)) => vec![object.clone()],
        Some(_) => {
            return Err(ParserError::Configuration(format!("{}: \"variable\" must be an object", path)));
        }
    };

    let mut variables = Vec::new();
    for block in blocks {
        let Value::Object(block) = block else {
            return Err(ParserError::Configuration(format!("{}: \"variable\" must be an object", path)));
        };
        for (name, attributes) in block {
            let attributes = attributes.as_object().cloned().unwrap_or_default();
            variables.push(DeclaredVariable {
                name,
                variable_type: attributes.get("type").map(json_text),
                description: attributes.get("description").map(json_text),
                default: attributes.get("default").map(json_text),
                sensitive: attributes.get("sensitive").and_then(Value::as_bool),
            });
        }
    }
    Ok(variables)
}

// ============================================================================
// Native syntax
// ============================================================================

enum Item<'a> {
    Attribute { name: &'a str, expression: &'a str },
    Block { block_type: &'a str, labels: Vec<String>, body: &'a str },
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn at_comment(&self) -> bool {
        matches!(
            (self.peek(), self.peek_at(1)),
            (Some(b'#'), _) | (Some(b'/'), Some(b'/')) | (Some(b'/'), Some(b'*'))
        )
    }

    fn skip_comment(&mut self) -> Result<(), String> {
        if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
            match self.src[self.pos + 2..].find("*/") {
                Some(end) => self.pos += 2 + end + 2,
                None => return Err("unterminated block comment".to_string()),
            }
        } else {
            while let Some(c) = self.peek() {
                if c == b'\n' {
                    break;
                }
                self.pos += 1;
            }
        }
        Ok(())
    }

    /// Skip whitespace and comments; newlines too unless `inline`.
    fn skip_trivia(&mut self, inline: bool) -> Result<(), String> {
        loop {
            match self.peek() {
                Some(b'\n') if inline => return Ok(()),
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                // Line comments stop before their newline.
                Some(_) if self.at_comment() => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let found = identifier_regex().find(&self.src[self.pos..])?;
        let ident = &self.src[self.pos..self.pos + found.end()];
        self.pos += found.end();
        Some(ident)
    }

    /// At `"`: advance past the closing quote, honouring escapes and templates.
    fn skip_string(&mut self) -> Result<(), String> {
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'$' | b'%' if self.peek_at(1) == Some(b'{') => {
                    self.pos += 1;
                    self.skip_balanced()?;
                }
                b'\n' => return Err("unterminated string".to_string()),
                _ => self.pos += 1,
            }
        }
        Err("unterminated string".to_string())
    }

    fn at_heredoc(&self) -> bool {
        self.peek() == Some(b'<')
            && self.peek_at(1) == Some(b'<')
            && matches!(self.peek_at(2), Some(c) if c == b'-' || c.is_ascii_alphabetic())
    }

    /// At `<<`: advance past the closing marker line.
    fn skip_heredoc(&mut self) -> Result<(), String> {
        self.pos += 2;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let marker = self.identifier().ok_or("heredoc without a marker")?;
        let line_end = self.src[self.pos..].find('\n').ok_or("unterminated heredoc")?;
        self.pos += line_end + 1;

        loop {
            let rest = &self.src[self.pos..];
            let (line, advance) = match rest.find('\n') {
                Some(n) => (&rest[..n], n + 1),
                None if rest.is_empty() => return Err(format!("unterminated heredoc {}", marker)),
                None => (rest, rest.len()),
            };
            if line.trim() == marker {
                self.pos += line.trim_end().len();
                return Ok(());
            }
            self.pos += advance;
        }
    }

    /// At an opening bracket: advance past its matching close.
    fn skip_balanced(&mut self) -> Result<(), String> {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                b'"' => {
                    self.skip_string()?;
                    continue;
                }
                _ if self.at_heredoc() => {
                    self.skip_heredoc()?;
                    continue;
                }
                _ if self.at_comment() => {
                    self.skip_comment()?;
                    continue;
                }
                b'{' | b'[' | b'(' => depth += 1,
                b'}' | b']' | b')' => {
                    depth = depth.checked_sub(1).ok_or("unbalanced brackets")?;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err("unbalanced brackets".to_string())
    }

    /// Raw text of an attribute expression, up to the end of its line.
    fn expression(&mut self) -> Result<&'a str, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                b'\n' | b'}' => break,
                b'"' => self.skip_string()?,
                b'{' | b'[' | b'(' => self.skip_balanced()?,
                _ if self.at_heredoc() => self.skip_heredoc()?,
                _ if self.at_comment() => break,
                _ => self.pos += 1,
            }
        }
        Ok(self.src[start..self.pos].trim())
    }

    fn body(&mut self) -> Result<Vec<Item<'a>>, String> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia(false)?;
            match self.peek() {
                None | Some(b'}') => return Ok(items),
                _ => {}
            }

            let name = self
                .identifier()
                .ok_or_else(|| format!("unexpected character at byte {}", self.pos))?;
            self.skip_trivia(true)?;

            if self.peek() == Some(b'=') && self.peek_at(1) != Some(b'=') {
                self.pos += 1;
                self.skip_trivia(true)?;
                let expression = self.expression()?;
                items.push(Item::Attribute { name, expression });
                continue;
            }

            let mut labels = Vec::new();
            loop {
                self.skip_trivia(true)?;
                match self.peek() {
                    Some(b'"') => {
                        let start = self.pos;
                        self.skip_string()?;
                        labels.push(unquote(&self.src[start..self.pos]));
                    }
                    Some(b'{') => break,
                    _ => match self.identifier() {
                        Some(label) => labels.push(label.to_string()),
                        None => return Err(format!("expected block body for {}", name)),
                    },
                }
            }

            let open = self.pos;
            self.skip_balanced()?;
            let body = &self.src[open + 1..self.pos - 1];
            items.push(Item::Block { block_type: name, labels, body });
        }
    }
}

/// Decode a quoted string literal or heredoc; anything else is returned as-is.
fn unquote(expression: &str) -> String {
    let expression = expression.trim();
    if expression.len() >= 2 && expression.starts_with('"') && expression.ends_with('"') {
        let inner = &expression[1..expression.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        return out;
    }

    if let Some(rest) = expression.strip_prefix("<<") {
        let indented = rest.starts_with('-');
        let mut lines: Vec<&str> = rest.lines().skip(1).collect();
        lines.pop();
        if indented {
            let indent = lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.len() - l.trim_start().len())
                .min()
                .unwrap_or(0);
            return lines.iter().map(|l| l.get(indent..).unwrap_or("")).collect::<Vec<_>>().join("\n");
        }
        return lines.join("\n");
    }

    expression.to_string()
}

fn parse_hcl_file(source: &str) -> Result<Vec<DeclaredVariable>, String> {
    let mut lexer = Lexer::new(source);
    let items = lexer.body()?;
    if lexer.peek().is_some() {
        return Err(format!("unexpected '}}' at byte {}", lexer.pos));
    }

    let mut variables = Vec::new();
    for item in items {
        let Item::Block { block_type: "variable", labels, body } = item else {
            continue;
        };
        let [name] = labels.as_slice() else {
            return Err("variable blocks take exactly one label".to_string());
        };

        let mut variable = DeclaredVariable {
            name: name.clone(),
            ..Default::default()
        };
        for attribute in Lexer::new(body).body()? {
            let Item::Attribute { name, expression } = attribute else {
                continue;
            };
            match name {
                "type" => variable.variable_type = Some(expression.to_string()),
                "description" => variable.description = Some(unquote(expression)),
                "default" => variable.default = Some(unquote(expression)),
                "sensitive" => variable.sensitive = Some(expression == "true"),
                _ => {}
            }
        }
        variables.push(variable);
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_archive;

    const VARIABLES_TF: &str = r#"
# Size of the instance
variable "instance_type" {
  type        = string
  description = "EC2 instance type"
  default     = "t3.micro" // cheap
}

variable "tags" {
  type = map(string)
  default = {
    team = "platform"
    "cost-center" = "42"
  }
  validation {
    condition     = length(var.tags) > 0
    error_message = "Provide at least one tag."
  }
}

/* block comment with variable "ghost" {} inside */
variable "db_password" {
  type      = string
  sensitive = true
}

variable "banner" {
  description = <<-EOT
    Hello ${var.instance_type}
    # not a comment
  EOT
  default = "${upper("x")}"
}

resource "aws_instance" "web" {
  instance_type = var.instance_type
}
"#;

    #[test]
    fn test_parses_native_variables() {
        let variables = parse_hcl_file(VARIABLES_TF).unwrap();
        let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["instance_type", "tags", "db_password", "banner"]);

        assert_eq!(variables[0].variable_type.as_deref(), Some("string"));
        assert_eq!(variables[0].description.as_deref(), Some("EC2 instance type"));
        assert_eq!(variables[0].default.as_deref(), Some("t3.micro"));

        assert_eq!(variables[1].variable_type.as_deref(), Some("map(string)"));
        assert!(variables[1].default.as_deref().unwrap().contains("platform"));

        assert_eq!(variables[2].sensitive, Some(true));
        assert_eq!(variables[2].default, None);

        assert_eq!(
            variables[3].description.as_deref(),
            Some("Hello ${var.instance_type}\n# not a comment")
        );
        assert_eq!(variables[3].default.as_deref(), Some("${upper(\"x\")}"));
    }

    #[test]
    fn test_single_line_block() {
        let variables = parse_hcl_file("variable \"region\" { default = \"us-east-1\" }\n").unwrap();
        assert_eq!(variables[0].default.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_unbalanced_source_is_rejected() {
        assert!(parse_hcl_file("variable \"x\" {\n  default = 1\n").is_err());
    }

    #[test]
    fn test_archive_root_module_only() {
        let json = br#"{"variable": {"replicas": {"type": "number", "default": 3}}}"#;
        let archive = build_archive(&[
            ("b_variables.tf", VARIABLES_TF.as_bytes()),
            ("a_extra.tf.json", json.as_slice()),
            ("modules/network/variables.tf", b"variable \"cidr\" {}\n".as_slice()),
            (".terraform/modules/x.tf", b"variable \"hidden\" {}\n".as_slice()),
            ("README.md", b"# readme".as_slice()),
        ]);

        let variables = HclConfigurationParser::new().parse(&archive).unwrap();
        let keys: Vec<&str> = variables.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, ["replicas", "instance_type", "tags", "db_password", "banner"]);
        assert_eq!(variables[0].default_value, "3");
        assert_eq!(variables[0].variable_type, "number");
        assert!(variables[3].is_no_echo);
    }

    #[test]
    fn test_nested_root_directory() {
        let archive = build_archive(&[
            ("product/main.tf", b"variable \"name\" {}\n".as_slice()),
            ("product/modules/x/main.tf", b"variable \"inner\" {}\n".as_slice()),
        ]);
        let variables = HclConfigurationParser::new().parse(&archive).unwrap();
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].key, "name");
    }

    #[test]
    fn test_duplicate_declaration_is_an_error() {
        let archive = build_archive(&[
            ("a.tf", b"variable \"name\" {}\n".as_slice()),
            ("b.tf", b"variable \"name\" {}\n".as_slice()),
        ]);
        let err = HclConfigurationParser::new().parse(&archive).unwrap_err();
        assert!(matches!(err, ParserError::Configuration(_)));
    }

    #[test]
    fn test_override_files_merge() {
        let archive = build_archive(&[
            ("main.tf", b"variable \"size\" {\n  default = \"small\"\n  description = \"Size\"\n}\n".as_slice()),
            ("size_override.tf", b"variable \"size\" {\n  default = \"large\"\n}\n".as_slice()),
        ]);
        let variables = HclConfigurationParser::new().parse(&archive).unwrap();
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].default_value, "large");
        assert_eq!(variables[0].description, "Size");
    }

    #[test]
    fn test_archive_without_terraform_files() {
        let archive = build_archive(&[("README.md", b"nothing".as_slice())]);
        assert!(HclConfigurationParser::new().parse(&archive).unwrap().is_empty());
    }
}
