//! Console report of a finished run.

use std::fmt::Write;

use serde_json::Value;

use proposal_forge_core::StateMap;

/// Longest preview printed for the research sections.
pub const PREVIEW_CHARS: usize = 500;

const HEAVY_RULE_WIDTH: usize = 80;

/// Query used when the caller supplies none.
pub const DEFAULT_QUERY: &str = "Generate a research proposal for a high school science competition
    such as Synopsis. The proposal should be for a one-semester research project that:
    - Is accessible to high school students
    - Is of interest to society, humanity, community, and research community
    - Is an area of current active research
    - Has a good chance of winning based on competition criteria";

enum Display {
    Preview,
    Full,
}

struct Section {
    key: &'static str,
    heading: &'static str,
    display: Display,
    /// Rule under the heading.
    rule: char,
}

const SECTIONS: [Section; 7] = [
    Section {
        key: "winning_projects",
        heading: "1️⃣  WINNING PROJECTS RESEARCH:",
        display: Display::Preview,
        rule: '-',
    },
    Section {
        key: "evaluation_criteria",
        heading: "2️⃣  EVALUATION CRITERIA RESEARCH:",
        display: Display::Preview,
        rule: '-',
    },
    Section {
        key: "practical_criteria",
        heading: "3️⃣  PRACTICAL CRITERIA ANALYSIS:",
        display: Display::Preview,
        rule: '-',
    },
    Section {
        key: "intersected_topics",
        heading: "4️⃣  INTERSECTED TOPICS:",
        display: Display::Preview,
        rule: '-',
    },
    Section {
        key: "topic_proposal",
        heading: "5️⃣  SELECTED TOPIC PROPOSAL:",
        display: Display::Full,
        rule: '-',
    },
    Section {
        key: "research_proposal",
        heading: "6️⃣  FINAL RESEARCH PROPOSAL:",
        display: Display::Full,
        rule: '=',
    },
    Section {
        key: "evaluation_feedback",
        heading: "7️⃣  EVALUATION FEEDBACK:",
        display: Display::Full,
        rule: '-',
    },
];

fn rule(c: char) -> String {
    std::iter::repeat(c).take(HEAVY_RULE_WIDTH).collect()
}

/// First `max` characters of `text`, with `...` appended when cut.
pub fn truncate_preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Banner printed before the run starts.
pub fn render_banner(query: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(
        out,
        "🔬 Research Proposal Agentic System for High School Science Competitions"
    );
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "\nThis system will:");
    let _ = writeln!(out, "1. Research winning projects and evaluation criteria");
    let _ = writeln!(out, "2. Analyze and correlate criteria with winning projects");
    let _ = writeln!(out, "3. Intersect winning topics with current research");
    let _ = writeln!(out, "4. Propose a topic with evaluation criteria");
    let _ = writeln!(out, "5. Write and iteratively refine a research proposal");
    let _ = writeln!(out, "\n{}\n", rule('='));
    let _ = writeln!(out, "📝 User Query:\n{}\n", query);
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "🚀 Starting agentic workflow...");
    out
}

/// Report of the key outputs in session state. Absent keys are skipped.
pub fn render_report(state: &StateMap) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule('='));
    let _ = writeln!(out, "✅ Workflow Complete!");
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "\n📊 Key Outputs:\n");

    for section in &SECTIONS {
        let Some(value) = state.get(section.key) else {
            continue;
        };
        let text = value_text(value);
        let body = match section.display {
            Display::Preview => truncate_preview(&text, PREVIEW_CHARS),
            Display::Full => text,
        };
        let _ = writeln!(out, "{}", section.heading);
        let _ = writeln!(out, "{}", rule(section.rule));
        let _ = writeln!(out, "{}", body);
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "✨ Process Complete!");
    let _ = write!(out, "{}", rule('='));
    out
}
