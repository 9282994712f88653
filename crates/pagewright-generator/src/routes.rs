//! Route and asset records for the generated UI module.
//!
//! Page routes are derived from content paths: the glob's directory prefix
//! is dropped, the extension stripped, and `index` collapses into its
//! directory. Images become a record of their public paths.

use std::collections::{BTreeSet, HashSet};

use pagewright_core::{Config, ContentBundle};

use crate::enumerate::glob_base;

/// Fixed header of the generated UI module.
pub const UI_PREAMBLE: &str = r#"module PagesNew exposing (PageRoute, allRoutes, images, pages, routeToString, urlParser)

import Url.Parser exposing ((</>), s)"#;

const RESERVED: &[&str] = &[
    "as", "case", "else", "exposing", "if", "import", "in", "let", "module", "of", "port", "then",
    "type", "where",
];

/// A page route and the record field naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub segments: Vec<String>,
    pub name: String,
}

impl Route {
    /// Public URL path, always starting with `/`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// An image asset and the record field naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: String,
    pub name: String,
}

/// Routes and assets of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRoutes {
    routes: Vec<Route>,
    assets: Vec<Asset>,
}

impl StaticRoutes {
    /// Derive routes and assets from a bundle.
    pub fn from_bundle(bundle: &ContentBundle, config: &Config) -> Self {
        let mut segments = BTreeSet::new();

        let raw_base = glob_base(&config.content.raw_glob);
        for file in &bundle.raw_files {
            segments.insert(route_segments(&file.path, &raw_base));
        }

        let markdown_base = glob_base(&config.content.markdown_glob);
        for doc in &bundle.markdown_documents {
            segments.insert(route_segments(&doc.path, &markdown_base));
        }

        let mut names = Names::default();
        let routes = segments
            .into_iter()
            .map(|segments| {
                let name = names.claim(&identifier(&segments));
                Route { segments, name }
            })
            .collect();

        let mut images: Vec<_> = bundle.image_paths.iter().collect();
        images.sort();
        let image_base = glob_base(&config.content.image_glob);
        let mut names = Names::default();
        let assets = images
            .into_iter()
            .map(|path| {
                let relative = path
                    .strip_prefix(&format!("{image_base}/"))
                    .unwrap_or(path);
                let parts: Vec<String> = relative.split('/').map(str::to_string).collect();
                Asset {
                    path: format!("/{path}"),
                    name: names.claim(&identifier(&parts)),
                }
            })
            .collect();

        Self { routes, assets }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// URL paths of every route, for prerendering.
    pub fn route_paths(&self) -> Vec<String> {
        self.routes.iter().map(Route::path).collect()
    }

    /// The full UI module: preamble followed by the generated records.
    pub fn ui_source(&self) -> String {
        format!(
            r#"{UI_PREAMBLE}


type PageRoute = PageRoute (List String)

{all}

{record}

{parser}

{assets}

routeToString : PageRoute -> String
routeToString (PageRoute route) =
    "/"
        ++ (route |> String.join "/")
"#,
            all = self.all_routes(),
            record = self.route_record(),
            parser = self.url_parser(),
            assets = self.assets_record(),
        )
    }

    fn all_routes(&self) -> String {
        let items: Vec<_> = self.routes.iter().map(route_value).collect();
        format!("allRoutes : List PageRoute\nallRoutes =\n{}", elm_list(&items))
    }

    fn route_record(&self) -> String {
        let fields: Vec<_> = self
            .routes
            .iter()
            .map(|r| (r.name.as_str(), route_value(r)))
            .collect();
        format!("pages =\n{}", elm_record(&fields))
    }

    fn url_parser(&self) -> String {
        let parsers: Vec<_> = self
            .routes
            .iter()
            .map(|r| {
                let matcher = if r.segments.is_empty() {
                    "Url.Parser.top".to_string()
                } else {
                    r.segments
                        .iter()
                        .map(|s| format!("s {}", elm_string(s)))
                        .collect::<Vec<_>>()
                        .join(" </> ")
                };
                format!("Url.Parser.map {} ({matcher})", route_value(r))
            })
            .collect();
        format!(
            "urlParser : Url.Parser.Parser (PageRoute -> a) a\nurlParser =\n    Url.Parser.oneOf\n{}",
            indent(&elm_list(&parsers), 4)
        )
    }

    fn assets_record(&self) -> String {
        let fields: Vec<_> = self
            .assets
            .iter()
            .map(|a| (a.name.as_str(), elm_string(&a.path)))
            .collect();
        format!("images =\n{}", elm_record(&fields))
    }
}

fn route_segments(path: &str, base: &str) -> Vec<String> {
    let relative = if base.is_empty() {
        path
    } else {
        path.strip_prefix(&format!("{base}/")).unwrap_or(path)
    };

    let mut segments: Vec<String> = relative.split('/').map(str::to_string).collect();
    if let Some(last) = segments.last_mut()
        && let Some((stem, _ext)) = last.rsplit_once('.')
        && !stem.is_empty()
    {
        *last = stem.to_string();
    }
    if segments.last().is_some_and(|s| s == "index") {
        segments.pop();
    }
    segments
}

/// Lower camel case identifier built from path parts.
fn identifier(parts: &[String]) -> String {
    let words: Vec<String> = parts
        .iter()
        .flat_map(|p| p.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    let mut ident = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            ident.push_str(word);
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                ident.push(first.to_ascii_uppercase());
                ident.extend(chars);
            }
        }
    }

    if ident.is_empty() {
        return "index".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, 'n');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Hands out unique identifiers, suffixing collisions with a counter.
#[derive(Default)]
struct Names {
    taken: HashSet<String>,
}

impl Names {
    fn claim(&mut self, wanted: &str) -> String {
        let mut candidate = wanted.to_string();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{wanted}{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

fn route_value(route: &Route) -> String {
    if route.segments.is_empty() {
        return "(PageRoute [])".to_string();
    }
    let segments: Vec<_> = route.segments.iter().map(|s| elm_string(s)).collect();
    format!("(PageRoute [ {} ])", segments.join(", "))
}

fn elm_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn elm_list(items: &[String]) -> String {
    if items.is_empty() {
        return "    []".to_string();
    }
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        out.push_str(if i == 0 { "    [ " } else { "    , " });
        out.push_str(item);
        out.push('\n');
    }
    out.push_str("    ]");
    out
}

fn elm_record(fields: &[(&str, String)]) -> String {
    if fields.is_empty() {
        return "    {}".to_string();
    }
    let mut out = String::new();
    for (i, (name, value)) in fields.iter().enumerate() {
        out.push_str(if i == 0 { "    { " } else { "    , " });
        out.push_str(&format!("{name} = {value}\n"));
    }
    out.push_str("    }");
    out
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
