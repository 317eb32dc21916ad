//! Template documents as an explicit node tree.
//!
//! Placeholder substitution is a pure function from a tree and a value map to
//! a new tree; the template read from disk is never modified. Tokens are
//! matched on the whole paragraph text, so a token that a word processor has
//! split across several formatting runs is still found. The first run that
//! carries text receives the fully substituted paragraph text and the text of
//! every later run is cleared, leaving the runs' formatting and non-text
//! content in place.

use docx_rs::{
    DocumentChild, Docx, Paragraph, ParagraphChild, Run, RunChild, Table, TableCellContent,
    TableChild, TableRowChild, Text,
};

use super::placeholders::{PlaceholderValues, BODY_TOKEN};

#[derive(Debug, Clone)]
pub enum TemplateNode {
    Paragraph(Paragraph),
    Table(Table),
    /// Anything else in the document body, carried through unchanged.
    Other(DocumentChild),
}

#[derive(Debug, Clone, Default)]
pub struct TemplateTree {
    pub nodes: Vec<TemplateNode>,
}

impl TemplateTree {
    pub fn from_children(children: &[DocumentChild]) -> Self {
        let nodes = children
            .iter()
            .map(|child| match child {
                DocumentChild::Paragraph(p) => TemplateNode::Paragraph(Paragraph::clone(p)),
                DocumentChild::Table(t) => TemplateNode::Table(Table::clone(t)),
                other => TemplateNode::Other(other.clone()),
            })
            .collect();
        Self { nodes }
    }

    pub fn substitute(&self, values: &PlaceholderValues) -> TemplateTree {
        let nodes = self
            .nodes
            .iter()
            .map(|node| match node {
                TemplateNode::Paragraph(p) => {
                    TemplateNode::Paragraph(substitute_paragraph(p, values))
                }
                TemplateNode::Table(t) => TemplateNode::Table(substitute_table(t, values)),
                TemplateNode::Other(child) => TemplateNode::Other(child.clone()),
            })
            .collect();
        TemplateTree { nodes }
    }

    /// Put `body` where the first body-token paragraph is, dropping every
    /// paragraph that holds the token. Without a token the body is appended.
    pub fn with_body(self, body: Vec<Paragraph>) -> TemplateTree {
        let mut body = Some(body);
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for node in self.nodes {
            match node {
                TemplateNode::Paragraph(p) if paragraph_text(&p).contains(BODY_TOKEN) => {
                    if let Some(blocks) = body.take() {
                        nodes.extend(blocks.into_iter().map(TemplateNode::Paragraph));
                    }
                }
                other => nodes.push(other),
            }
        }
        if let Some(blocks) = body {
            nodes.extend(blocks.into_iter().map(TemplateNode::Paragraph));
        }
        TemplateTree { nodes }
    }

    pub fn append(mut self, paragraphs: Vec<Paragraph>) -> TemplateTree {
        self.nodes
            .extend(paragraphs.into_iter().map(TemplateNode::Paragraph));
        self
    }

    /// Replace the body of `docx` with this tree, keeping its styles,
    /// numbering and section settings.
    pub fn into_docx(self, mut docx: Docx) -> Docx {
        docx.document.children.clear();
        for node in self.nodes {
            docx = match node {
                TemplateNode::Paragraph(p) => docx.add_paragraph(p),
                TemplateNode::Table(t) => docx.add_table(t),
                TemplateNode::Other(child) => {
                    docx.document.children.push(child);
                    docx
                }
            };
        }
        docx
    }

    /// Text of every top-level paragraph, in order.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                TemplateNode::Paragraph(p) => Some(paragraph_text(p)),
                _ => None,
            })
            .collect()
    }
}

fn run_text(run: &Run) -> String {
    run.children
        .iter()
        .filter_map(|child| match child {
            RunChild::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect()
}

fn has_text(run: &Run) -> bool {
    run.children
        .iter()
        .any(|child| matches!(child, RunChild::Text(_)))
}

pub fn paragraph_text(paragraph: &Paragraph) -> String {
    paragraph
        .children
        .iter()
        .filter_map(|child| match child {
            ParagraphChild::Run(run) => Some(run_text(run)),
            _ => None,
        })
        .collect()
}

pub fn substitute_paragraph(paragraph: &Paragraph, values: &PlaceholderValues) -> Paragraph {
    let text = paragraph_text(paragraph);
    if !values.matches(&text) {
        return paragraph.clone();
    }

    let mut replaced = Some(values.apply(&text));
    let mut out = paragraph.clone();
    for child in out.children.iter_mut() {
        let ParagraphChild::Run(run) = child else {
            continue;
        };
        if !has_text(run) {
            continue;
        }
        let children = std::mem::take(&mut run.children);
        run.children = children
            .into_iter()
            .filter_map(|piece| match piece {
                RunChild::Text(_) => replaced.take().map(|t| RunChild::Text(Text::new(t))),
                other => Some(other),
            })
            .collect();
    }
    out
}

fn substitute_cell_paragraph(paragraph: &mut Paragraph, values: &PlaceholderValues) {
    *paragraph = substitute_paragraph(paragraph, values);
}

// Row and cell enums have a single variant in current docx-rs releases.
#[allow(irrefutable_let_patterns)]
fn substitute_table(table: &Table, values: &PlaceholderValues) -> Table {
    let mut out = table.clone();
    for row in out.rows.iter_mut() {
        if let TableChild::TableRow(row) = row {
            for cell in row.cells.iter_mut() {
                if let TableRowChild::TableCell(cell) = cell {
                    for content in cell.children.iter_mut() {
                        if let TableCellContent::Paragraph(p) = content {
                            substitute_cell_paragraph(p, values);
                        }
                    }
                }
            }
        }
    }
    out
}
