//! Document tools for the authoring team
//!
//! All tools operate on files inside a run-scoped [`Workspace`]. Line numbers
//! in `edit_document` are 1-based and refer to the original file; inserts are
//! applied in ascending order and each applied insert shifts the effective
//! position of later ones down by one. `read_document` slices 0-based with an
//! exclusive end, both clamped to the file length. An out-of-range insert
//! aborts the whole edit and leaves the file untouched.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;
use tower::{BoxError, Service, ServiceExt};

use crate::retrieval::RetrieverSvc;
use crate::tool::{tool_typed, ToolDef};
use crate::workspace::Workspace;

/// Answer given when no prior-response index is configured.
pub const NO_PRIOR_RESPONSES: &str = "No prior responses available.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteDocumentArgs {
    /// Text content to be written into the document.
    pub content: String,
    /// File name to save the document to.
    pub file_name: String,
}

pub fn write_document(workspace: Workspace) -> ToolDef {
    tool_typed(
        "write_document",
        "Create and save a text document.",
        move |args: WriteDocumentArgs| {
            let workspace = workspace.clone();
            async move {
                let path = workspace.resolve(&args.file_name)?;
                std::fs::write(&path, &args.content)?;
                Ok::<_, BoxError>(format!("Document saved to {}", args.file_name))
            }
        },
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadDocumentArgs {
    /// File name of the document to read.
    pub file_name: String,
    /// Zero-based line to start reading from.
    #[serde(default)]
    pub start: Option<usize>,
    /// Exclusive zero-based line to stop reading at.
    #[serde(default)]
    pub end: Option<usize>,
}

pub fn read_document(workspace: Workspace) -> ToolDef {
    tool_typed(
        "read_document",
        "Read the specified document, optionally a line range.",
        move |args: ReadDocumentArgs| {
            let workspace = workspace.clone();
            async move {
                let path = workspace.resolve(&args.file_name)?;
                let text = std::fs::read_to_string(&path)?;
                let lines: Vec<&str> = text.lines().collect();
                let start = args.start.unwrap_or(0).min(lines.len());
                let end = args.end.unwrap_or(lines.len()).min(lines.len()).max(start);
                Ok::<_, BoxError>(lines[start..end].join("\n"))
            }
        },
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditDocumentArgs {
    /// File name of the document to edit.
    pub file_name: String,
    /// Map of 1-based line number to the text inserted before that line.
    /// Applied in ascending order.
    pub inserts: BTreeMap<usize, String>,
}

pub fn edit_document(workspace: Workspace) -> ToolDef {
    tool_typed(
        "edit_document",
        "Edit a document by inserting text at specific line numbers.",
        move |args: EditDocumentArgs| {
            let workspace = workspace.clone();
            async move {
                let path = workspace.resolve(&args.file_name)?;
                let text = std::fs::read_to_string(&path)?;
                let mut lines: Vec<String> = text.lines().map(String::from).collect();

                // Validate and apply in memory; the file is only rewritten
                // once every insert has landed. Line numbers address the
                // original file, so each applied insert pushes the effective
                // position of later ones down by one.
                let mut applied = 0usize;
                for (line_number, insert) in args.inserts {
                    if line_number == 0 || line_number - 1 + applied > lines.len() {
                        return Err::<String, BoxError>(
                            format!("Line number {line_number} is out of range.").into(),
                        );
                    }
                    lines.insert(line_number - 1 + applied, insert);
                    applied += 1;
                }

                let mut out = lines.join("\n");
                out.push('\n');
                std::fs::write(&path, out)?;
                Ok(format!("Document edited and saved to {}", args.file_name))
            }
        },
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateOutlineArgs {
    /// Main points or sections, in order.
    pub points: Vec<String>,
    /// File name to save the outline to.
    pub file_name: String,
}

pub fn create_outline(workspace: Workspace) -> ToolDef {
    tool_typed(
        "create_outline",
        "Create and save an outline from an ordered list of main points.",
        move |args: CreateOutlineArgs| {
            let workspace = workspace.clone();
            async move {
                let path = workspace.resolve(&args.file_name)?;
                let mut out = String::new();
                for (i, point) in args.points.iter().enumerate() {
                    out.push_str(&format!("{}. {point}\n", i + 1));
                }
                std::fs::write(&path, out)?;
                Ok::<_, BoxError>(format!("Outline saved to {}", args.file_name))
            }
        },
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReferencePreviousArgs {
    /// Topic to look up among previously published responses.
    pub query: String,
}

/// Look up previously published responses for tone and precedent. Degrades to
/// a fixed sentinel when no index was configured.
pub fn reference_previous_responses(retriever: Option<RetrieverSvc>) -> ToolDef {
    tool_typed(
        "reference_previous_responses",
        "Search previously published responses for precedent and tone.",
        move |args: ReferencePreviousArgs| {
            let retriever = retriever.clone();
            async move {
                let Some(mut retriever) = retriever else {
                    return Ok::<_, BoxError>(NO_PRIOR_RESPONSES.to_string());
                };
                let passages = retriever.ready().await?.call(args.query).await?;
                if passages.is_empty() {
                    return Ok(NO_PRIOR_RESPONSES.to_string());
                }
                let joined = passages
                    .iter()
                    .map(|p| p.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(joined)
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolInvocation;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    async fn invoke(tool: ToolDef, args: serde_json::Value) -> Result<serde_json::Value, BoxError> {
        let mut svc = tool.service;
        let name = tool.name.clone();
        let out = svc
            .ready()
            .await?
            .call(ToolInvocation {
                id: "call_t".to_string(),
                name,
                arguments: args,
            })
            .await?;
        Ok(out.result)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());

        let result = invoke(
            write_document(ws.clone()),
            json!({"content": "alpha\nbeta\ngamma", "file_name": "notes.txt"}),
        )
        .await
        .unwrap();
        assert_eq!(result, "Document saved to notes.txt");

        let all = invoke(read_document(ws.clone()), json!({"file_name": "notes.txt"}))
            .await
            .unwrap();
        assert_eq!(all, "alpha\nbeta\ngamma");

        // A requested start offset is honored.
        let tail = invoke(
            read_document(ws),
            json!({"file_name": "notes.txt", "start": 1}),
        )
        .await
        .unwrap();
        assert_eq!(tail, "beta\ngamma");
    }

    #[tokio::test]
    async fn test_edit_inserts_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());
        std::fs::write(dir.path().join("doc.txt"), "one\ntwo\n").unwrap();

        // Line 3 is the end of the original two-line file.
        let result = invoke(
            edit_document(ws),
            json!({"file_name": "doc.txt", "inserts": {"1": "zero", "3": "three"}}),
        )
        .await
        .unwrap();
        assert_eq!(result, "Document edited and saved to doc.txt");

        let text = std::fs::read_to_string(dir.path().join("doc.txt")).unwrap();
        assert_eq!(text, "zero\none\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn test_edit_positions_address_the_original_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());
        std::fs::write(dir.path().join("doc.txt"), "original\n").unwrap();

        // Inserting at lines 1 and 2 of a one-line file brackets the
        // original line; the line-1 insert must not drag line 2 forward.
        invoke(
            edit_document(ws),
            json!({"file_name": "doc.txt", "inserts": {"2": "X", "1": "Y"}}),
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(dir.path().join("doc.txt")).unwrap();
        assert_eq!(text, "Y\noriginal\nX\n");
    }

    #[tokio::test]
    async fn test_edit_out_of_range_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());
        std::fs::write(dir.path().join("doc.txt"), "one\ntwo\n").unwrap();

        let err = invoke(
            edit_document(ws),
            json!({"file_name": "doc.txt", "inserts": {"1": "zero", "10": "far"}}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Line number 10 is out of range.");

        let text = std::fs::read_to_string(dir.path().join("doc.txt")).unwrap();
        assert_eq!(text, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_create_outline_numbers_points() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());

        invoke(
            create_outline(ws),
            json!({"points": ["Background", "Findings", "Conclusion"], "file_name": "outline.txt"}),
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(dir.path().join("outline.txt")).unwrap();
        assert_eq!(text, "1. Background\n2. Findings\n3. Conclusion\n");
    }

    #[tokio::test]
    async fn test_reference_previous_without_index_degrades() {
        let result = invoke(
            reference_previous_responses(None),
            json!({"query": "billing dispute"}),
        )
        .await
        .unwrap();
        assert_eq!(result, NO_PRIOR_RESPONSES);
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::at(dir.path());
        let err = invoke(
            write_document(ws),
            json!({"content": "x", "file_name": "../escape.txt"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("escapes the workspace"));
    }
}
