use indexmap::IndexMap;

/// A single BibTeX entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibRecord {
    /// Entry type tag, lowercased (`article`, `book`, ...)
    pub entry_type: String,
    /// Citation key, case preserved
    pub key: String,
    /// Field values keyed by lowercased field name, in source order
    pub fields: IndexMap<String, String>,
    /// Exact source text, including trailing whitespace
    source: Option<String>,
}

impl BibRecord {
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into().to_lowercase(),
            key: key.into(),
            fields: IndexMap::new(),
            source: None,
        }
    }

    /// Add a field, replacing any earlier value under the same name
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into().to_lowercase(), value.into());
        self
    }

    pub(crate) fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Raw value of a field (delimiters stripped, braces kept)
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name.to_lowercase().as_str())
            .map(String::as_str)
    }

    /// Normalized text of a field, `None` when the field is absent
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name).map(normalize_text)
    }

    /// Normalized title; empty when missing
    pub fn title(&self) -> String {
        self.text("title").unwrap_or_default()
    }

    /// Source text this record was parsed from, if any
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Serialize the record. Parsed records are written back verbatim.
    pub fn to_bibtex(&self) -> String {
        if let Some(source) = &self.source {
            return source.clone();
        }

        let mut out = format!("@{}{{{},\n", self.entry_type, self.key);
        for (name, value) in &self.fields {
            out.push_str(&format!("  {} = {{{}}},\n", name, value));
        }
        out.push_str("}\n\n");
        out
    }
}

/// One top-level piece of a `.bib` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Entry(BibRecord),
    /// Comments, `@preamble`, `@string` and free text, kept as-is
    Verbatim(String),
}

/// Ordered contents of a `.bib` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bibliography {
    blocks: Vec<Block>,
}

impl Bibliography {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn from_records(records: impl IntoIterator<Item = BibRecord>) -> Self {
        Self {
            blocks: records.into_iter().map(Block::Entry).collect(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn records(&self) -> impl Iterator<Item = &BibRecord> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Entry(record) => Some(record),
            Block::Verbatim(_) => None,
        })
    }

    /// Number of entries (verbatim blocks are not counted)
    pub fn len(&self) -> usize {
        self.records().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep entries for which `keep` returns true. Verbatim blocks always stay.
    pub fn retain_records<F>(&mut self, mut keep: F)
    where
        F: FnMut(&BibRecord) -> bool,
    {
        self.blocks.retain(|block| match block {
            Block::Entry(record) => keep(record),
            Block::Verbatim(_) => true,
        });
    }

    pub fn to_bibtex(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::Entry(record) => out.push_str(&record.to_bibtex()),
                Block::Verbatim(text) => out.push_str(text),
            }
        }
        out
    }
}

/// Strip protective braces and collapse whitespace
pub fn normalize_text(value: &str) -> String {
    value
        .split(|c: char| c == '{' || c == '}')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
