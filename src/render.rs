//! Rendering of directory indexes and catalogs.
//!
//! The router only depends on the [`Renderer`] trait. [`BuiltinRenderer`] ships
//! compiled-in layouts for both documents; a templates directory may replace
//! either layout with its own `index.html` or `catalog.xml`, using the same
//! `{{name}}` placeholders.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

use crate::listing::{DirEntry, FileEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Index,
    Catalog,
}

impl Template {
    pub fn file_name(self) -> &'static str {
        match self {
            Template::Index => "index.html",
            Template::Catalog => "catalog.xml",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Template::Index => "text/html",
            Template::Catalog => "text/xml",
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template override is not a file: {0}")]
    Template(String),

    #[error("Failed to read template: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported output format {format} for {template}")]
    Format {
        template: &'static str,
        format: String,
    },
}

/// Values handed to the renderer for one listing
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Request environment snapshot
    pub environ: BTreeMap<String, String>,
    /// Server base URL without trailing slash
    pub root: String,
    /// URL of the listed directory
    pub location: String,
    pub title: String,
    pub directories: Vec<DirEntry>,
    pub files: Vec<FileEntry>,
    /// Request path of the listed directory, relative to `root`
    pub path: String,
    /// Filesystem path of the listed directory
    pub directory: PathBuf,
    pub catalog: String,
    pub version: &'static str,
}

pub trait Renderer: Send + Sync {
    fn render(
        &self,
        template: Template,
        context: &RenderContext,
        content_type: &str,
    ) -> Result<Bytes, RenderError>;
}

const INDEX_LAYOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<link rel="alternate" type="text/xml" href="{{catalog_href}}">
</head>
<body>
<h1>{{title}}</h1>
<table>
<thead>
<tr><th>Name</th><th>Last modified</th><th>Size</th><th></th></tr>
</thead>
<tbody>
{{parent}}{{entries}}</tbody>
</table>
<hr>
<address>dirserve/{{version}} at {{root}}</address>
</body>
</html>
"#;

const CATALOG_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0" xmlns:xlink="http://www.w3.org/1999/xlink" name="{{title}}" version="1.0.1">
  <service name="dirserve" serviceType="OpenDAP" base="{{root}}/"/>
  <dataset name="{{title}}">
{{entries}}  </dataset>
</catalog>
"#;

/// Default renderer with optional layout overrides
#[derive(Debug, Clone, Default)]
pub struct BuiltinRenderer {
    templates: Option<PathBuf>,
}

impl BuiltinRenderer {
    pub fn new(templates: Option<PathBuf>) -> Self {
        Self { templates }
    }

    /// Layout override from the templates directory, or the compiled-in one.
    /// Overrides are re-read on every render so edits show up immediately.
    fn layout(&self, template: Template) -> Result<String, RenderError> {
        if let Some(dir) = &self.templates {
            let path = dir.join(template.file_name());
            if path.is_file() {
                return Ok(std::fs::read_to_string(path)?);
            }
            if path.exists() {
                return Err(RenderError::Template(template.file_name().to_string()));
            }
        }
        Ok(match template {
            Template::Index => INDEX_LAYOUT,
            Template::Catalog => CATALOG_LAYOUT,
        }
        .to_string())
    }
}

impl Renderer for BuiltinRenderer {
    fn render(
        &self,
        template: Template,
        context: &RenderContext,
        content_type: &str,
    ) -> Result<Bytes, RenderError> {
        if content_type != template.content_type() {
            return Err(RenderError::Format {
                template: template.file_name(),
                format: content_type.to_string(),
            });
        }

        let layout = self.layout(template)?;
        let mut vars = BTreeMap::new();
        vars.insert("title", escape_html(&context.title));
        vars.insert("root", escape_html(&context.root));
        vars.insert("location", escape_html(&context.location));
        vars.insert("version", escape_html(context.version));
        vars.insert("catalog", escape_html(&context.catalog));
        vars.insert("catalog_href", escape_href(&context.catalog));

        match template {
            Template::Index => {
                let parent = if context.path.trim_matches('/').is_empty() {
                    String::new()
                } else {
                    "<tr><td><a href=\"../\">Parent directory</a></td><td></td><td>-</td><td></td></tr>\n"
                        .to_string()
                };
                vars.insert("parent", parent);
                vars.insert("entries", index_rows(context));
            }
            Template::Catalog => {
                vars.insert("entries", catalog_entries(context));
            }
        }

        Ok(Bytes::from(substitute(&layout, &vars)))
    }
}

fn index_rows(context: &RenderContext) -> String {
    let mut html = String::with_capacity(4096);

    for dir in &context.directories {
        let href = escape_href(&dir.name);
        let name = escape_html(&dir.name);
        html.push_str(&format!(
            "<tr><td><a href=\"{href}/\">{name}/</a></td><td></td><td>-</td><td><a href=\"{href}/{catalog}\">catalog</a></td></tr>\n",
            catalog = escape_href(&context.catalog),
        ));
    }

    for file in &context.files {
        let href = escape_href(&file.name);
        let modified: DateTime<Local> = file.modified.into();
        let handled = if file.supported {
            format!("<a class=\"supported\" href=\"{href}.html\">data</a>")
        } else {
            String::new()
        };
        html.push_str(&format!(
            "<tr><td><a href=\"{href}\">{name}</a></td><td>{modified}</td><td>{size}</td><td>{handled}</td></tr>\n",
            name = escape_html(&file.name),
            modified = modified.format("%d-%b-%Y %H:%M"),
            size = escape_html(&file.size),
        ));
    }

    html
}

fn catalog_entries(context: &RenderContext) -> String {
    let base = context.path.trim_matches('/');
    let mut xml = String::with_capacity(4096);

    for dir in &context.directories {
        let href = escape_href(&dir.name);
        xml.push_str(&format!(
            "    <catalogRef xlink:href=\"{href}/{catalog}\" xlink:title=\"{name}\" name=\"{name}\"/>\n",
            catalog = escape_href(&context.catalog),
            name = escape_html(&dir.name),
        ));
    }

    for file in &context.files {
        let url_path = if base.is_empty() {
            file.name.clone()
        } else {
            format!("{}/{}", base, file.name)
        };
        let modified: DateTime<Utc> = file.modified.into();
        let service = if file.supported {
            "      <serviceName>dirserve</serviceName>\n"
        } else {
            ""
        };
        xml.push_str(&format!(
            "    <dataset name=\"{name}\" ID=\"/{id}\" urlPath=\"{id}\">\n{service}      <dataSize units=\"bytes\">{bytes}</dataSize>\n      <date type=\"modified\">{modified}</date>\n    </dataset>\n",
            name = escape_html(&file.name),
            id = escape_html(&escape_path(&url_path)),
            bytes = file.bytes,
            modified = modified.format("%Y-%m-%dT%H:%M:%SZ"),
        ));
    }

    xml
}

/// Replace `{{name}}` placeholders in one pass. Unknown names are left as is and
/// substituted values are never re-scanned.
fn substitute(layout: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Minimal HTML escaping (sufficient for filenames)
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'%')
    .add(b'/');

/// Encode a single name for use in an href. This is URL encoding, not HTML escaping.
fn escape_href(input: &str) -> String {
    utf8_percent_encode(input, SEGMENT).to_string()
}

/// Encode each segment of a `/`-separated path.
fn escape_path(input: &str) -> String {
    input.split('/').map(escape_href).collect::<Vec<_>>().join("/")
}
