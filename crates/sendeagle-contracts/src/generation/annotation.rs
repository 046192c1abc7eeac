use super::GenerationInfo;

/// Renders the annotation shared by the EXIF UserComment and the Eagle item.
///
/// Empty text fields are left out; seed and steps are always present.
pub fn format_annotation(info: &GenerationInfo, memo: &str) -> String {
    let mut lines = Vec::new();
    push_text(&mut lines, "Positive", &info.positive);
    push_text(&mut lines, "Negative", &info.negative);
    push_text(&mut lines, "Model", &info.model_name);
    lines.push(format!("Seed: {}", info.seed));
    lines.push(format!("Steps: {}", info.steps));
    push_text(&mut lines, "Memo", memo);
    lines.join("\n")
}

fn push_text(lines: &mut Vec<String>, label: &str, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return;
    }
    lines.push(format!("{label}: {trimmed}"));
}
