//! Narrow text substitution over a modelfile template. The template is an
//! opaque blob apart from three `PARAMETER <key> <value>` lines; anything
//! else passes through untouched.

use std::sync::OnceLock;

use regex::Regex;

fn ctx_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PARAMETER num_ctx \d+").unwrap())
}

fn batch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PARAMETER num_batch \d+").unwrap())
}

fn predict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PARAMETER num_predict \d+").unwrap())
}

fn upsert(content: &str, re: &Regex, line: &str) -> String {
    if re.is_match(content) {
        re.replace_all(content, line).into_owned()
    } else {
        let mut out = content.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(line);
        out.push('\n');
        out
    }
}

/// Render the modelfile for one grid point. Parameters already present in the
/// template are replaced in place; absent ones are inserted. `num_predict`
/// lands directly after the `num_batch` line so generation stays minimal and
/// only prompt evaluation is measured.
pub fn render(template: &str, num_ctx: u32, num_batch: u32, num_predict: u32) -> String {
    let content = upsert(template, ctx_re(), &format!("PARAMETER num_ctx {num_ctx}"));
    let content = upsert(
        &content,
        batch_re(),
        &format!("PARAMETER num_batch {num_batch}"),
    );
    if predict_re().is_match(&content) {
        predict_re()
            .replace_all(&content, format!("PARAMETER num_predict {num_predict}"))
            .into_owned()
    } else {
        batch_re()
            .replace_all(
                &content,
                format!("$0\nPARAMETER num_predict {num_predict}"),
            )
            .into_owned()
    }
}
