use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Attrs;

/// One attribute of a registered mark, optionally mirrored to a DOM attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAttrSpec {
    pub name: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_attr: Option<String>,
}

impl MarkAttrSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Value::Null,
            dom_attr: None,
        }
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn dom_attr(mut self, dom_attr: impl Into<String>) -> Self {
        self.dom_attr = Some(dom_attr.into());
        self
    }
}

/// Wrapping inline element used when rendering a mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRule {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl RenderRule {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: None,
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

/// Recognises a rendered element as this mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRule {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_attr: Option<String>,
}

impl ParseRule {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            required_attr: None,
        }
    }

    pub fn required_attr(mut self, attr: impl Into<String>) -> Self {
        self.required_attr = Some(attr.into());
        self
    }

    pub fn matches(&self, tag: &str, dom_attrs: &BTreeMap<String, String>) -> bool {
        tag.eq_ignore_ascii_case(&self.tag)
            && self
                .required_attr
                .as_ref()
                .is_none_or(|attr| dom_attrs.contains_key(attr))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkSpec {
    pub name: String,
    #[serde(default)]
    pub attrs: Vec<MarkAttrSpec>,
    pub render: RenderRule,
    pub parse: Vec<ParseRule>,
    /// Whether the mark extends to a caret sitting right after it.
    pub inclusive: bool,
}

impl MarkSpec {
    pub fn new(name: impl Into<String>, render: RenderRule) -> Self {
        let parse = vec![ParseRule::new(render.tag.clone())];
        Self {
            name: name.into(),
            attrs: Vec::new(),
            render,
            parse,
            inclusive: true,
        }
    }

    pub fn attr(mut self, attr: MarkAttrSpec) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn parse_rules(mut self, parse: Vec<ParseRule>) -> Self {
        self.parse = parse;
        self
    }

    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    pub fn default_attrs(&self) -> Attrs {
        self.attrs
            .iter()
            .map(|attr| (attr.name.clone(), attr.default.clone()))
            .collect()
    }

    /// DOM attributes for the wrapping element. Attributes without a DOM
    /// mapping and null values are skipped; the class comes last.
    pub fn render_attrs(&self, attrs: &Attrs) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for spec in &self.attrs {
            let Some(dom_attr) = &spec.dom_attr else {
                continue;
            };
            let value = attrs.get(&spec.name).unwrap_or(&spec.default);
            match value {
                Value::Null => {}
                Value::String(s) => out.push((dom_attr.clone(), s.clone())),
                other => out.push((dom_attr.clone(), other.to_string())),
            }
        }
        if let Some(class) = &self.render.class {
            out.push(("class".to_string(), class.clone()));
        }
        out
    }

    /// Mark attributes read back from a rendered element, or `None` when no
    /// parse rule matches.
    pub fn parse_dom(&self, tag: &str, dom_attrs: &BTreeMap<String, String>) -> Option<Attrs> {
        if !self.parse.iter().any(|rule| rule.matches(tag, dom_attrs)) {
            return None;
        }
        let mut attrs = self.default_attrs();
        for spec in &self.attrs {
            let Some(dom_attr) = &spec.dom_attr else {
                continue;
            };
            if let Some(value) = dom_attrs.get(dom_attr) {
                attrs.insert(spec.name.clone(), Value::String(value.clone()));
            }
        }
        Some(attrs)
    }
}
