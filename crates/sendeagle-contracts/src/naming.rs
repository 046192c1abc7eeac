//! Output naming: date subfolders, timestamps and filename templates.

use chrono::{DateTime, FixedOffset, Utc};

use crate::generation::GenerationInfo;

/// Date folders and timestamps are computed in UTC+9.
pub const OUTPUT_UTC_OFFSET_SECS: i32 = 9 * 3600;

pub const TEMPLATE_PLACEHOLDERS: &[&str] = &["width", "height", "model", "steps", "seed"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("bad template: unknown placeholder '{{{0}}}' (expected one of width, height, model, steps, seed)")]
    UnknownPlaceholder(String),
    #[error("bad template: unmatched '{brace}' at byte {offset}")]
    UnmatchedBrace { brace: char, offset: usize },
}

pub fn output_offset() -> FixedOffset {
    FixedOffset::east_opt(OUTPUT_UTC_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

pub fn now_in_output_zone() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&output_offset())
}

/// `YYYY-MM-DD` folder name for a run started at `now`.
pub fn date_subfolder(now: &DateTime<FixedOffset>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Millisecond-resolution filename prefix.
pub fn timestamp_token(now: &DateTime<FixedOffset>) -> String {
    now.format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Substitutes `{width}`, `{height}`, `{model}`, `{steps}` and `{seed}`.
/// `{{` and `}}` produce literal braces.
pub fn render_template(template: &str, info: &GenerationInfo) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut chars = template.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '{' => {
                if chars.next_if(|(_, next)| *next == '{').is_some() {
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnmatchedBrace { brace: '{', offset });
                }
                out.push_str(&placeholder_value(&name, info)?);
            }
            '}' => {
                if chars.next_if(|(_, next)| *next == '}').is_none() {
                    return Err(TemplateError::UnmatchedBrace { brace: '}', offset });
                }
                out.push('}');
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn placeholder_value(name: &str, info: &GenerationInfo) -> Result<String, TemplateError> {
    let value = match name {
        "width" => info.width.to_string(),
        "height" => info.height.to_string(),
        "model" => info.model_name.clone(),
        "steps" => info.steps.to_string(),
        "seed" => info.seed.to_string(),
        _ => return Err(TemplateError::UnknownPlaceholder(name.to_string())),
    };
    Ok(value)
}

/// `<timestamp>-<rendered>[(index)].<ext>`. `index` is `None` for
/// single-image batches. Path separators in the rendered name (checkpoint
/// names often carry a subfolder) are replaced so the file stays in the
/// date folder.
pub fn image_filename(
    template: &str,
    extension: &str,
    info: &GenerationInfo,
    index: Option<usize>,
    now: &DateTime<FixedOffset>,
) -> Result<String, TemplateError> {
    let base = sanitize_component(&render_template(template, info)?);
    let stamp = timestamp_token(now);
    Ok(match index {
        Some(index) => format!("{stamp}-{base}({index}).{extension}"),
        None => format!("{stamp}-{base}.{extension}"),
    })
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::{
        date_subfolder, image_filename, output_offset, render_template, TemplateError,
    };
    use crate::generation::GenerationInfo;

    fn info() -> GenerationInfo {
        GenerationInfo {
            model_name: "modelA.safetensors".to_string(),
            seed: 42,
            steps: 20,
            width: 512,
            height: 768,
            ..GenerationInfo::default()
        }
    }

    #[test]
    fn render_template_substitutes_all_placeholders() -> Result<(), TemplateError> {
        assert_eq!(
            render_template("{model}-{width}x{height}-{steps}-{seed}", &info())?,
            "modelA.safetensors-512x768-20-42"
        );
        assert_eq!(render_template("{{seed}}-{seed}", &info())?, "{seed}-42");
        Ok(())
    }

    #[test]
    fn render_template_matches_placeholder_names_exactly() {
        assert_eq!(
            render_template("{ seed }", &info()),
            Err(TemplateError::UnknownPlaceholder(" seed ".to_string()))
        );
    }

    #[test]
    fn render_template_rejects_unknown_placeholder() {
        let err = render_template("{model}-{sampler}", &info()).unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("sampler".to_string()));
        assert!(err.to_string().starts_with("bad template: unknown placeholder '{sampler}'"));
    }

    #[test]
    fn render_template_rejects_unbalanced_braces() {
        assert_eq!(
            render_template("abc{seed", &info()),
            Err(TemplateError::UnmatchedBrace { brace: '{', offset: 3 })
        );
        assert_eq!(
            render_template("seed}", &info()),
            Err(TemplateError::UnmatchedBrace { brace: '}', offset: 4 })
        );
    }

    #[test]
    fn filename_suffix_only_for_multi_image_batches() -> Result<(), TemplateError> {
        let now = output_offset()
            .with_ymd_and_hms(2026, 10, 16, 9, 30, 5)
            .single()
            .expect("valid time")
            + Duration::milliseconds(123);
        assert_eq!(
            image_filename("{model}-{seed}", "png", &info(), None, &now)?,
            "20261016_093005_123-modelA.safetensors-42.png"
        );
        let batch = (0..3)
            .map(|idx| image_filename("{seed}", "webp", &info(), Some(idx), &now))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(
            batch,
            vec![
                "20261016_093005_123-42(0).webp",
                "20261016_093005_123-42(1).webp",
                "20261016_093005_123-42(2).webp",
            ]
        );
        Ok(())
    }

    #[test]
    fn filenames_one_millisecond_apart_differ() -> Result<(), TemplateError> {
        let now = output_offset()
            .with_ymd_and_hms(2026, 10, 16, 23, 59, 59)
            .single()
            .expect("valid time")
            + Duration::milliseconds(999);
        let first = image_filename("{model}", "png", &info(), None, &now)?;
        let again = image_filename("{model}", "png", &info(), None, &now)?;
        let later = image_filename("{model}", "png", &info(), None, &(now + Duration::milliseconds(1)))?;
        assert_eq!(first, again);
        assert_ne!(first, later);
        Ok(())
    }

    #[test]
    fn model_subfolders_do_not_escape_the_date_folder() -> Result<(), TemplateError> {
        let now = output_offset()
            .with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
            .single()
            .expect("valid time");
        let info = GenerationInfo {
            model_name: "SDXL/base\\v1.safetensors".to_string(),
            ..GenerationInfo::default()
        };
        let name = image_filename("{model}", "jpeg", &info, None, &now)?;
        assert_eq!(name, "20260102_030405_000-SDXL_base_v1.safetensors.jpeg");
        Ok(())
    }

    #[test]
    fn date_subfolder_uses_fixed_offset() {
        let utc_evening = chrono::Utc
            .with_ymd_and_hms(2026, 10, 16, 20, 0, 0)
            .single()
            .expect("valid time");
        let local = utc_evening.with_timezone(&output_offset());
        assert_eq!(date_subfolder(&local), "2026-10-17");
    }
}
