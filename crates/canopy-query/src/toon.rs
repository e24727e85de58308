//! TOON Emitter (component G): encodes an artifact's `AstSummary` plus its
//! dependencies' summaries into the fixed, indentation-sensitive text
//! grammar of spec §6.
//!
//! Grounded on `palace/core/toon.py`'s `ASTSummary.to_toon`/`TOONEncoder`,
//! generalized from that prototype's single-summary format to the full
//! `bundle := "# " mainPath … ("## " depPath …)*` grammar the spec fixes.
//! Emission never panics and never raises — a summary with a `:` or
//! newline embedded in an identifier gets that character replaced with
//! `?` rather than producing invalid TOON (spec §4.G invariant).

use canopy_core::AstSummary;

/// Two spaces per indentation level, matching the teacher prototype and
/// the grammar's `"  "` literal.
const INDENT: &str = "  ";

/// Emit the full bundle: `# mainPath` header, the main artifact's summary,
/// then one `## depPath` section per dependency, separated from the main
/// section by a blank `---` line per spec §6.
///
/// `truncated` marks a bundle that was cut short by a soft deadline or a
/// cancellation signal (spec §5 Timeouts) — rendered as a trailing
/// `# truncated: true` comment rather than silently dropping sections.
pub fn emit(main_path: &str, main_summary: &AstSummary, deps: &[(String, AstSummary)], truncated: bool) -> String {
    let mut out = String::new();
    out.push_str("# ");
    out.push_str(&sanitize(main_path));
    out.push('\n');
    out.push_str(&summary_block(main_path, main_summary));

    if !deps.is_empty() {
        out.push_str("\n\n---\n\n");
        for (i, (path, summary)) in deps.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            out.push_str("## ");
            out.push_str(&sanitize(path));
            out.push('\n');
            out.push_str(&summary_block(path, summary));
        }
    }

    if truncated {
        out.push_str("\n\n# truncated: true\n");
    }

    out
}

/// A single `# Error: …` bundle — the only output shape that's valid even
/// on total failure (spec §7 "bundles are always emittable text").
pub fn error_bundle(message: &str) -> String {
    format!("# Error: {}\n", sanitize(message))
}

fn summary_block(path: &str, summary: &AstSummary) -> String {
    let mut lines = Vec::new();
    lines.push(format!("{}:", sanitize(path)));

    let lang_tag = summary.language.map(|l| l.tag()).unwrap_or("unknown");
    lines.push(format!("{INDENT}language: {lang_tag}"));

    if let Some(err) = &summary.error_marker {
        lines.push(format!("{INDENT}error: {}", sanitize(err)));
    }

    if !summary.imports.is_empty() {
        lines.push(format!("{INDENT}imports:"));
        for imp in &summary.imports {
            lines.push(format!("{INDENT}{INDENT}- {}", sanitize(imp)));
        }
    }

    if !summary.exports.is_empty() {
        lines.push(format!("{INDENT}exports:"));
        for exp in &summary.exports {
            lines.push(format!("{INDENT}{INDENT}- {}", sanitize(exp)));
        }
    }

    if !summary.functions.is_empty() {
        lines.push(format!("{INDENT}functions:"));
        for f in &summary.functions {
            let params = f.params.iter().map(|p| sanitize(p)).collect::<Vec<_>>().join(", ");
            let ret = if f.return_type.is_empty() { "?" } else { &f.return_type };
            lines.push(format!(
                "{INDENT}{INDENT}- {}({params}) -> {}",
                sanitize(&f.name),
                sanitize(ret)
            ));
            if !f.callees.is_empty() {
                let calls = f.callees.iter().map(|c| sanitize(c)).collect::<Vec<_>>().join(", ");
                lines.push(format!("{INDENT}{INDENT}{INDENT}calls: {calls}"));
            }
        }
    }

    if !summary.classes.is_empty() {
        lines.push(format!("{INDENT}classes:"));
        for c in &summary.classes {
            lines.push(format!("{INDENT}{INDENT}- {}:", sanitize(&c.name)));
            for method in &c.methods {
                lines.push(format!("{INDENT}{INDENT}{INDENT}- {}", sanitize(method)));
            }
        }
    }

    let mut block = lines.join("\n");
    block.push('\n');
    block
}

/// Replace forbidden characters (`:`, newline) with `?` per grammar note:
/// "Strings are unquoted; `:` and newlines in identifiers are forbidden (if
/// encountered, replace with `?`)". Applied to every field that flows
/// through from untrusted source text (paths, identifiers, messages).
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c == ':' || c == '\n' || c == '\r' { '?' } else { c })
        .collect()
}

/// Rough token estimate: ~4 characters per token, matching the teacher
/// prototype's `estimate_tokens` (spec never mandates a tokenizer; this is
/// an observability figure, not used for correctness).
pub fn estimate_tokens(toon: &str) -> usize {
    toon.len() / 4
}
