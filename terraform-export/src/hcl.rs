//! Minimal HCL writer: quoted strings, identifiers and `resource` blocks.

/// Quote a string literal, escaping HCL template sequences
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if opens_template(c, chars.peek()) => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `${` and `%{` start a template sequence inside an HCL string
fn opens_template(c: char, next: Option<&char>) -> bool {
    matches!(c, '$' | '%') && next == Some(&'{')
}

/// Double the `$` or `%` of every template sequence in already quoted text
pub fn escape_templates(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if opens_template(c, chars.peek()) {
            out.push(c);
        }
        out.push(c);
    }
    out
}

/// `jsonencode(...)` of a JSON value, its strings kept literal
pub fn jsonencode(value: &serde_json::Value) -> String {
    format!("jsonencode({})", escape_templates(&value.to_string()))
}

/// Turn a Permit key into a valid Terraform block label
pub fn identifier(key: &str) -> String {
    let mut ident: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !ident.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        ident.insert(0, '_');
    }
    ident
}

/// `[a, b, c]` from already rendered expressions
pub fn list<I>(items: I) -> String
where
    I: IntoIterator<Item = String>,
{
    format!("[{}]", items.into_iter().collect::<Vec<_>>().join(", "))
}

/// `<kind>.<name>` reference to another resource block
pub fn reference(kind: &str, key: &str) -> String {
    format!("{}.{}", kind, identifier(key))
}

#[derive(Debug, Clone)]
enum Entry {
    Attribute(String, String),
    Object(String, Vec<(String, Block)>),
}

/// A block body of attributes and nested object attributes
#[derive(Debug, Clone, Default)]
pub struct Block {
    entries: Vec<Entry>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute with a raw expression value
    pub fn attr(mut self, key: &str, expression: impl Into<String>) -> Self {
        self.entries
            .push(Entry::Attribute(key.to_string(), expression.into()));
        self
    }

    pub fn string(self, key: &str, value: &str) -> Self {
        self.attr(key, quote(value))
    }

    pub fn optional_string(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.string(key, value),
            _ => self,
        }
    }

    /// List attribute, skipped when empty
    pub fn optional_list(self, key: &str, items: Vec<String>) -> Self {
        if items.is_empty() {
            self
        } else {
            self.attr(key, list(items))
        }
    }

    /// Map attribute whose values are objects: `key = { "a" = { ... } }`
    pub fn object(mut self, key: &str, members: Vec<(String, Block)>) -> Self {
        self.entries.push(Entry::Object(key.to_string(), members));
        self
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Attribute(key, _) => Some(key.len()),
                Entry::Object(..) => None,
            })
            .max()
            .unwrap_or(0);

        for entry in &self.entries {
            match entry {
                Entry::Attribute(key, value) => {
                    out.push_str(&format!("{}{:<width$} = {}\n", indent, key, value, width = width));
                }
                Entry::Object(key, members) => {
                    out.push_str(&format!("{}{} = {{\n", indent, key));
                    for (name, body) in members {
                        out.push_str(&format!("{}  {} = {{\n", indent, quote(name)));
                        body.write(out, depth + 2);
                        out.push_str(&format!("{}  }}\n", indent));
                    }
                    out.push_str(&format!("{}}}\n", indent));
                }
            }
        }
    }
}

/// Render `resource "<kind>" "<name>" { ... }`
pub fn resource(kind: &str, name: &str, body: &Block) -> String {
    let mut out = format!("resource {} {} {{\n", quote(kind), quote(&identifier(name)));
    body.write(&mut out, 1);
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(quote("${var} and %{if}"), "\"$${var} and %%{if}\"");
        assert_eq!(quote("$5 or 100%"), "\"$5 or 100%\"");
    }

    #[test]
    fn test_jsonencode_escapes_templates() {
        let value = serde_json::json!({"a": "${x}", "b": "%{if}", "c": "$5"});

        assert_eq!(
            jsonencode(&value),
            r#"jsonencode({"a":"$${x}","b":"%%{if}","c":"$5"})"#
        );
    }

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("order"), "order");
        assert_eq!(identifier("order#owner"), "order_owner");
        assert_eq!(identifier("2fa"), "_2fa");
    }

    #[test]
    fn test_resource_block_alignment() {
        let body = Block::new()
            .string("key", "order")
            .string("name", "Order")
            .optional_string("description", None)
            .object(
                "actions",
                vec![("get".to_string(), Block::new().string("name", "get"))],
            );

        let rendered = resource("permitio_resource", "order", &body);
        let expected = r#"resource "permitio_resource" "order" {
  key  = "order"
  name = "Order"
  actions = {
    "get" = {
      name = "get"
    }
  }
}
"#;
        assert_eq!(rendered, expected);
    }
}
