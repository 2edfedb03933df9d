//! Mermaid rendering of the workflow graphs.

use std::fmt::Write;

use super::state::Stage;

const START: &str = "__start__";
const END: &str = "__end__";
const FINALIZE: &str = "finalize";

/// The top-level graph: one node per stage, then `finalize`.
pub fn top_level() -> String {
    let mut nodes = vec![START];
    nodes.extend(Stage::ALL.iter().map(|s| s.node_name()));
    nodes.push(FINALIZE);
    nodes.push(END);

    let mut out = header(&nodes);
    for pair in nodes.windows(2) {
        let _ = writeln!(out, "    {} --> {}", pair[0], pair[1]);
    }
    out.trim_end().to_string()
}

/// The sub-graph every stage node runs.
pub fn stage() -> String {
    let mut out = header(&[START, "generate", "auto_review", "human_review", END]);
    let edges = [
        (START, "generate", None),
        ("generate", "auto_review", None),
        ("auto_review", "human_review", Some("approved")),
        ("auto_review", "generate", Some("rejected")),
        ("human_review", END, Some("approved")),
        ("human_review", "generate", Some("rejected")),
    ];
    for (from, to, label) in edges {
        let _ = match label {
            Some(label) => writeln!(out, "    {from} -. {label} .-> {to}"),
            None => writeln!(out, "    {from} --> {to}"),
        };
    }
    out.trim_end().to_string()
}

/// Both graphs as fenced markdown blocks.
pub fn render_markdown() -> String {
    let stages = Stage::ALL.map(|s| format!("`{}`", s.node_name())).join(", ");
    format!(
        "Main graph (each stage node runs the sub graph below):\n```mermaid\n{}\n```\n\
         Sub graph (used within {stages}):\n```mermaid\n{}\n```",
        top_level(),
        stage()
    )
}

fn header(nodes: &[&str]) -> String {
    let mut out = String::from("flowchart TD\n");
    for node in nodes {
        let _ = match *node {
            START => writeln!(out, "    {node}([start])"),
            END => writeln!(out, "    {node}([end])"),
            _ => writeln!(out, "    {node}[{node}]"),
        };
    }
    out
}
