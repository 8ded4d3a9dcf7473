use crate::core::{Document, Node, TextNode};
use crate::plugin::PluginRegistry;

/// Serializes the document to HTML. Registered marks wrap their text in the
/// element described by their render rule; marks without a spec render as
/// plain text.
pub fn to_html(doc: &Document, registry: &PluginRegistry) -> String {
    let mut out = String::new();
    for node in &doc.children {
        write_node(node, registry, &mut out);
    }
    out
}

fn block_tag(kind: &str) -> &'static str {
    match kind {
        "paragraph" => "p",
        _ => "div",
    }
}

fn write_node(node: &Node, registry: &PluginRegistry, out: &mut String) {
    match node {
        Node::Element(el) => {
            let tag = block_tag(&el.kind);
            out.push('<');
            out.push_str(tag);
            if tag == "div" {
                push_attr(out, "data-kind", &el.kind);
            }
            out.push('>');
            for child in &el.children {
                write_node(child, registry, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Void(v) if v.kind == "divider" => out.push_str("<hr>"),
        Node::Void(v) => {
            out.push_str("<span");
            push_attr(out, "data-void", &v.kind);
            out.push_str("></span>");
        }
        Node::Text(t) => write_text(t, registry, out),
    }
}

fn write_text(text: &TextNode, registry: &PluginRegistry, out: &mut String) {
    if text.text.is_empty() {
        return;
    }

    let mut closers: Vec<&str> = Vec::new();
    for entry in text.marks.entries() {
        let Some(spec) = registry.mark_spec(&entry.name) else {
            continue;
        };
        out.push('<');
        out.push_str(&spec.render.tag);
        for (name, value) in spec.render_attrs(&entry.attrs) {
            push_attr(out, &name, &value);
        }
        out.push('>');
        closers.push(&spec.render.tag);
    }

    out.push_str(&escape(&text.text));

    for tag in closers.into_iter().rev() {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
