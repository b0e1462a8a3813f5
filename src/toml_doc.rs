//! TOML document store built on `toml_edit`.
//!
//! Sections are standard `[a.b]` tables and their comments live in the header's
//! decor prefix; property comments live in the key's leaf decor prefix. Map
//! properties are written as inline tables and sequences as arrays.
//!
//! TOML has no null. Writing [`Value::Null`] removes the key and leaves a
//! commented-out placeholder in its place:
//!
//! ```toml
//! [server.tls]
//! # Path to the certificate.
//! # cert =
//! enabled = false
//! ```
//!
//! The placeholder keeps the property's comments. It is lifted out of the decor
//! when the text is parsed and put back when the document is rendered, so it is
//! never mistaken for the comments of whatever node follows it. Null elements
//! inside sequences and maps are dropped. Datetimes are read as strings.

use std::collections::HashSet;

use indexmap::IndexMap;
use toml_edit::{Array, Decor, DocumentMut, InlineTable, Item, Table, TableLike};

use crate::document::{Document, DocumentError, Provenance};
use crate::types::{RenderOptions, Value};

#[derive(Debug, Clone, Default)]
pub struct TomlDocument {
    doc: DocumentMut,
    /// Dotted paths written since parsing that did not exist before.
    synthesized: HashSet<String>,
    /// Commented-out null properties, keyed by section path.
    placeholders: IndexMap<Vec<String>, Vec<Placeholder>>,
}

#[derive(Debug, Clone, PartialEq)]
struct Placeholder {
    key: String,
    comments: Vec<String>,
    /// Value key in the same table this is rendered above; `None` renders it at
    /// the end of the table body.
    before: Option<String>,
}

impl Placeholder {
    fn render(&self) -> String {
        format!("{}# {} =\n", format_comments(&self.comments), self.key)
    }
}

/// A table that prints a header, in rendering order.
#[derive(Debug, Clone, PartialEq)]
enum Header {
    Table(Vec<String>),
    Element(Vec<String>, usize),
}

impl TomlDocument {
    fn lookup(&self, path: &[&str]) -> Option<&Item> {
        let (last, parents) = path.split_last()?;
        let parent = table_at(self.doc.as_table(), parents)?;
        parent.get(last).filter(|item| !item.is_none())
    }

    /// Walk to the container at `path`, creating or replacing non-containers.
    fn table_mut(&mut self, path: &[&str]) -> Result<&mut dyn TableLike, DocumentError> {
        let mut current: &mut dyn TableLike = self.doc.as_table_mut();
        for (i, segment) in path.iter().enumerate() {
            let is_container = current
                .get(segment)
                .is_some_and(|item| item.is_table_like());
            if !is_container {
                let mut table = Table::new();
                table.set_implicit(true);
                current.insert(segment, Item::Table(table));
                self.synthesized.insert(path[..=i].join("."));
            }
            current = match current.get_mut(segment).and_then(Item::as_table_like_mut) {
                Some(table) => table,
                None => return Err(DocumentError::InvalidPath(path[..=i].join("."))),
            };
        }
        Ok(current)
    }

    fn mark(&mut self, path: &[&str], existed: bool) {
        if !existed {
            self.synthesized.insert(path.join("."));
        }
    }

    fn placeholder(&self, section: &[&str], key: &str) -> Option<&Placeholder> {
        self.placeholders
            .iter()
            .find(|(path, _)| path.iter().map(String::as_str).eq(section.iter().copied()))
            .and_then(|(_, entries)| entries.iter().find(|p| p.key == key))
    }

    fn keep_placeholder(
        &mut self,
        section: Vec<String>,
        key: &str,
        comments: &[String],
        next: Option<String>,
    ) {
        let entries = self.placeholders.entry(section).or_default();
        match entries.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.comments = comments.to_vec(),
            None => entries.push(Placeholder {
                key: key.to_string(),
                comments: comments.to_vec(),
                before: next,
            }),
        }
    }

    /// A value was written at `key`: its own placeholder goes, and trailing
    /// placeholders now sit above the appended key.
    fn settle_placeholders(&mut self, section: &[String], key: &str, appended: bool) {
        if let Some(entries) = self.placeholders.get_mut(section) {
            entries.retain(|p| p.key != key);
            if appended {
                for entry in entries.iter_mut().filter(|p| p.before.is_none()) {
                    entry.before = Some(key.to_string());
                }
            }
        }
    }

    /// Write every placeholder into the decor of the rendered copy.
    fn place_placeholders(&self, doc: &mut DocumentMut) {
        let order = header_order(doc.as_table());
        for (section, entries) in &self.placeholders {
            let mut anchored: IndexMap<&str, String> = IndexMap::new();
            let mut tail = String::new();
            for entry in entries {
                let anchor = entry.before.as_deref().filter(|before| {
                    section_table(doc.as_table(), section)
                        .is_some_and(|table| matches!(table.get(before), Some(Item::Value(_))))
                });
                match anchor {
                    Some(before) => anchored.entry(before).or_default().push_str(&entry.render()),
                    None => tail.push_str(&entry.render()),
                }
            }
            if let Some(table) = section_table_mut(doc.as_table_mut(), section) {
                for (before, text) in &anchored {
                    if let Some(mut key) = table.key_mut(before) {
                        let decor = key.leaf_decor_mut();
                        let existing = raw_prefix(decor).to_string();
                        decor.set_prefix(format!("{text}{existing}"));
                    }
                }
            }
            if tail.is_empty() {
                continue;
            }
            let Some(index) = order.iter().position(|h| *h == Header::Table(section.clone())) else {
                continue;
            };
            match order.get(index + 1) {
                Some(next) => {
                    if let Some(table) = header_table_mut(doc.as_table_mut(), next) {
                        let existing = raw_prefix(table.decor()).to_string();
                        table.decor_mut().set_prefix(format!("{tail}{existing}"));
                    }
                }
                None => {
                    let existing = doc.trailing().as_str().unwrap_or_default().to_string();
                    doc.set_trailing(format!("{tail}{existing}"));
                }
            }
        }
    }
}

/// Lift placeholders out of parsed decor. Text above a value key belongs to
/// that key's table; text above a header or at the end of the file belongs to
/// the table whose body it closes.
fn extract_placeholders(doc: &mut DocumentMut) -> IndexMap<Vec<String>, Vec<Placeholder>> {
    let mut found: IndexMap<Vec<String>, Vec<Placeholder>> = IndexMap::new();
    let order = header_order(doc.as_table());

    for header in &order {
        let Header::Table(path) = header else { continue };
        let Some(table) = section_table_mut(doc.as_table_mut(), path) else {
            continue;
        };
        let keys: Vec<String> = table
            .iter()
            .filter(|(_, item)| item.is_value())
            .map(|(key, _)| key.to_string())
            .collect();
        for name in keys {
            let Some(mut key) = table.key_mut(&name) else { continue };
            let decor = key.leaf_decor_mut();
            if let Some((blocks, rest)) = split_placeholders(raw_prefix(decor)) {
                decor.set_prefix(rest);
                found
                    .entry(path.clone())
                    .or_default()
                    .extend(blocks.into_iter().map(|(key, comments)| Placeholder {
                        key,
                        comments,
                        before: Some(name.clone()),
                    }));
            }
        }
    }

    let mut owners: Vec<(Option<&Header>, &Vec<String>)> = Vec::new();
    for (index, header) in order.iter().enumerate().skip(1) {
        if let Header::Table(owner) = &order[index - 1] {
            owners.push((Some(header), owner));
        }
    }
    if let Some(Header::Table(owner)) = order.last() {
        owners.push((None, owner));
    }
    for (header, owner) in owners {
        let split = match header {
            Some(header) => header_table_mut(doc.as_table_mut(), header).and_then(|table| {
                let split = split_placeholders(raw_prefix(table.decor()))?;
                table.decor_mut().set_prefix(split.1.clone());
                Some(split)
            }),
            None => split_placeholders(doc.trailing().as_str().unwrap_or_default()).inspect(
                |(_, rest)| doc.set_trailing(rest.clone()),
            ),
        };
        if let Some((blocks, _)) = split {
            found
                .entry(owner.clone())
                .or_default()
                .extend(blocks.into_iter().map(|(key, comments)| Placeholder {
                    key,
                    comments,
                    before: None,
                }));
        }
    }
    found
}

impl Document for TomlDocument {
    fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut doc = text
            .parse::<DocumentMut>()
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        let placeholders = extract_placeholders(&mut doc);
        Ok(Self {
            doc,
            synthesized: HashSet::new(),
            placeholders,
        })
    }

    fn get(&self, path: &[&str]) -> Option<Value> {
        self.lookup(path).and_then(item_to_value)
    }

    fn comments(&self, path: &[&str]) -> Option<Vec<String>> {
        let (last, parents) = path.split_last()?;
        let parent = table_at(self.doc.as_table(), parents);
        let attached = parent.and_then(|parent| match parent.get(last)? {
            Item::None => None,
            Item::Table(table) => Some(comment_lines(table.decor())),
            _ => Some(
                parent
                    .key(last)
                    .map(|key| comment_lines(key.leaf_decor()))
                    .unwrap_or_default(),
            ),
        });
        attached.or_else(|| self.placeholder(parents, last).map(|p| p.comments.clone()))
    }

    fn ensure_section(&mut self, path: &[&str], comments: &[String]) -> Result<(), DocumentError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(DocumentError::InvalidPath(String::new()));
        };
        let existed = self.lookup(path).is_some();
        let parent = self.table_mut(parents)?;

        if !matches!(parent.get(last), Some(Item::Table(_))) {
            let table = match parent.remove(last) {
                Some(Item::Value(toml_edit::Value::InlineTable(inline))) => inline.into_table(),
                _ => Table::new(),
            };
            parent.insert(last, Item::Table(table));
        }
        if let Some(Item::Table(table)) = parent.get_mut(last) {
            table.set_implicit(false);
            table.set_dotted(false);
            let prefix =
                verbatim(table.decor(), comments).unwrap_or_else(|| format_comments(comments));
            table.decor_mut().set_prefix(prefix);
        }

        self.mark(path, existed);
        Ok(())
    }

    fn set(
        &mut self,
        path: &[&str],
        value: &Value,
        comments: &[String],
    ) -> Result<(), DocumentError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(DocumentError::InvalidPath(String::new()));
        };
        let section: Vec<String> = parents.iter().map(|s| s.to_string()).collect();
        let existed = self.lookup(path).is_some();
        let parent = self.table_mut(parents)?;

        let Some(toml_value) = to_toml(value) else {
            let next = if existed {
                parent
                    .iter()
                    .skip_while(|(key, _)| key != last)
                    .skip(1)
                    .find(|(_, item)| item.is_value())
                    .map(|(key, _)| key.to_string())
            } else {
                None
            };
            parent.remove(last);
            self.keep_placeholder(section, last, comments, next);
            return Ok(());
        };

        let kept = parent
            .key(last)
            .and_then(|key| verbatim(key.leaf_decor(), comments));
        parent.insert(last, Item::Value(toml_value));
        if let Some(mut key) = parent.key_mut(last) {
            key.leaf_decor_mut()
                .set_prefix(kept.unwrap_or_else(|| format_comments(comments)));
        }
        self.mark(path, existed);
        self.settle_placeholders(&section, last, !existed);
        Ok(())
    }

    fn provenance(&self, path: &[&str]) -> Option<Provenance> {
        self.lookup(path)?;
        if self.synthesized.contains(&path.join(".")) {
            Some(Provenance::Synthesized)
        } else {
            Some(Provenance::Parsed)
        }
    }

    fn render(&self, options: &RenderOptions) -> String {
        let mut doc = self.doc.clone();
        normalize(doc.as_table_mut(), options);
        if options.comments {
            self.place_placeholders(&mut doc);
        }
        doc.to_string().trim_start_matches('\n').to_string()
    }
}

fn table_at<'a>(root: &'a Table, path: &[&str]) -> Option<&'a dyn TableLike> {
    let mut current: &dyn TableLike = root;
    for segment in path {
        current = current.get(segment)?.as_table_like()?;
    }
    Some(current)
}

fn section_table<'a>(root: &'a Table, path: &[String]) -> Option<&'a Table> {
    let mut current = root;
    for segment in path {
        current = current.get(segment)?.as_table()?;
    }
    Some(current)
}

fn section_table_mut<'a>(root: &'a mut Table, path: &[String]) -> Option<&'a mut Table> {
    let mut current = root;
    for segment in path {
        current = current.get_mut(segment)?.as_table_mut()?;
    }
    Some(current)
}

fn header_table_mut<'a>(root: &'a mut Table, header: &Header) -> Option<&'a mut Table> {
    match header {
        Header::Table(path) => section_table_mut(root, path),
        Header::Element(path, index) => {
            let (last, parents) = path.split_last()?;
            section_table_mut(root, parents)?
                .get_mut(last)?
                .as_array_of_tables_mut()?
                .get_mut(*index)
        }
    }
}

/// Root first, then every table that prints a header, in the order
/// `toml_edit` writes them: by position, with unpositioned tables following
/// the last positioned one before them.
fn header_order(root: &Table) -> Vec<Header> {
    let mut tables = Vec::new();
    let mut last = 0;
    collect_headers(root, Header::Table(Vec::new()), &mut last, &mut tables);
    tables.sort_by_key(|(position, _, _)| *position);
    tables
        .into_iter()
        .filter(|(_, _, prints)| *prints)
        .map(|(_, header, _)| header)
        .collect()
}

fn collect_headers(
    table: &Table,
    header: Header,
    last: &mut usize,
    out: &mut Vec<(usize, Header, bool)>,
) {
    let path = match &header {
        Header::Table(path) | Header::Element(path, _) => path.clone(),
    };
    if !table.is_dotted() {
        if let Some(position) = table.position() {
            *last = position;
        }
        let prints = match header {
            Header::Element(..) => true,
            Header::Table(_) => {
                path.is_empty() || !(table.is_implicit() && table.get_values().is_empty())
            }
        };
        out.push((*last, header, prints));
    }
    for (key, item) in table.iter() {
        let mut child = path.clone();
        child.push(key.to_string());
        match item {
            Item::Table(nested) => collect_headers(nested, Header::Table(child), last, out),
            Item::ArrayOfTables(array) => {
                for (index, element) in array.iter().enumerate() {
                    collect_headers(element, Header::Element(child.clone(), index), last, out);
                }
            }
            _ => {}
        }
    }
}

fn item_to_value(item: &Item) -> Option<Value> {
    match item {
        Item::None => None,
        Item::Value(value) => Some(from_toml(value)),
        Item::Table(table) => Some(table_to_value(table)),
        Item::ArrayOfTables(array) => Some(Value::List(array.iter().map(table_to_value).collect())),
    }
}

fn table_to_value(table: &Table) -> Value {
    Value::Map(
        table
            .iter()
            .filter_map(|(key, item)| item_to_value(item).map(|v| (key.to_string(), v)))
            .collect(),
    )
}

fn from_toml(value: &toml_edit::Value) -> Value {
    match value {
        toml_edit::Value::String(s) => Value::String(s.value().clone()),
        toml_edit::Value::Integer(i) => Value::Integer(*i.value()),
        toml_edit::Value::Float(f) => Value::Float(*f.value()),
        toml_edit::Value::Boolean(b) => Value::Boolean(*b.value()),
        toml_edit::Value::Datetime(d) => Value::String(d.value().to_string()),
        toml_edit::Value::Array(array) => Value::List(array.iter().map(from_toml).collect()),
        toml_edit::Value::InlineTable(table) => Value::Map(
            table
                .iter()
                .map(|(key, v)| (key.to_string(), from_toml(v)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

/// `None` for null, which has no TOML form.
fn to_toml(value: &Value) -> Option<toml_edit::Value> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.as_str().into()),
        Value::Boolean(b) => Some((*b).into()),
        Value::Integer(i) => Some((*i).into()),
        Value::Float(x) => Some((*x).into()),
        Value::List(items) => {
            let mut array = Array::new();
            for item in items.iter().filter_map(to_toml) {
                array.push(item);
            }
            Some(toml_edit::Value::Array(array))
        }
        Value::Map(map) => {
            let mut table = InlineTable::new();
            for (key, item) in map {
                if let Some(item) = to_toml(item) {
                    table.insert(key.as_str(), item);
                }
            }
            Some(toml_edit::Value::InlineTable(table))
        }
    }
}

fn comment_lines(decor: &Decor) -> Vec<String> {
    decor
        .prefix()
        .and_then(|raw| raw.as_str())
        .map(parse_comments)
        .unwrap_or_default()
}

fn raw_prefix(decor: &Decor) -> &str {
    decor.prefix().and_then(|raw| raw.as_str()).unwrap_or_default()
}

fn comment_text(marked: &str) -> String {
    marked.strip_prefix(' ').unwrap_or(marked).trim_end().to_string()
}

fn parse_comments(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('#'))
        .map(comment_text)
        .collect()
}

/// The comment lines of `raw` exactly as written, one per line.
fn comment_block(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .map(|line| format!("{line}\n"))
        .collect()
}

/// The existing comment text, if it already says `comments`.
fn verbatim(decor: &Decor, comments: &[String]) -> Option<String> {
    let raw = raw_prefix(decor);
    (parse_comments(raw) == comments).then(|| comment_block(raw))
}

fn format_comments(comments: &[String]) -> String {
    comments
        .iter()
        .flat_map(|comment| comment.split('\n'))
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| {
            if line.is_empty() {
                "#\n".to_string()
            } else {
                format!("# {line}\n")
            }
        })
        .collect()
}

/// `cert` for a `# cert =` line.
fn placeholder_key(marked: &str) -> Option<&str> {
    let key = marked.trim().strip_suffix('=')?.trim_end();
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    bare.then_some(key)
}

type Blocks = Vec<(String, Vec<String>)>;

/// Split decor text into placeholder blocks and the remaining comment text.
/// A block is a `# key =` line with the comment lines directly above it.
/// Returns `None` when there is no placeholder.
fn split_placeholders(raw: &str) -> Option<(Blocks, String)> {
    let mut blocks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut rest = String::new();
    for line in raw.lines().map(str::trim) {
        let Some(marked) = line.strip_prefix('#') else {
            for kept in pending.drain(..) {
                rest.push_str(kept);
                rest.push('\n');
            }
            continue;
        };
        match placeholder_key(marked) {
            Some(key) => {
                let comments: Vec<String> = pending
                    .drain(..)
                    .filter_map(|line| line.strip_prefix('#'))
                    .map(comment_text)
                    .collect();
                blocks.push((key.to_string(), comments));
            }
            None => pending.push(line),
        }
    }
    if blocks.is_empty() {
        return None;
    }
    for kept in pending {
        rest.push_str(kept);
        rest.push('\n');
    }
    Some((blocks, rest))
}

/// Rewrite header and key decor into canonical form before rendering.
fn normalize(table: &mut Table, options: &RenderOptions) {
    for (mut key, item) in table.iter_mut() {
        match item {
            Item::Table(child) => {
                if !child.is_implicit() && !child.is_dotted() {
                    let comments = if options.comments {
                        comment_block(raw_prefix(child.decor()))
                    } else {
                        String::new()
                    };
                    let spacing = if options.section_spacing { "\n" } else { "" };
                    child.decor_mut().set_prefix(format!("{spacing}{comments}"));
                }
                normalize(child, options);
            }
            Item::Value(_) if !options.comments => {
                key.leaf_decor_mut().set_prefix("");
            }
            _ => {}
        }
    }
}
