use std::fmt;
use std::str::FromStr;

use crate::generation::GenerationInfo;

/// Which generation fields become Eagle tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagPolicy {
    #[default]
    None,
    Prompt,
    Checkpoint,
    PromptAndCheckpoint,
}

impl TagPolicy {
    /// Label used by the host's option widget.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Prompt => "Prompt",
            Self::Checkpoint => "Checkpoint",
            Self::PromptAndCheckpoint => "Prompt + Checkpoint",
        }
    }

    /// Unknown labels select no tags.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim() {
            "Prompt" => Self::Prompt,
            "Checkpoint" => Self::Checkpoint,
            "Prompt + Checkpoint" => Self::PromptAndCheckpoint,
            _ => Self::None,
        }
    }
}

impl fmt::Display for TagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TagPolicy {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(raw))
    }
}

pub fn select_tags(policy: TagPolicy, info: &GenerationInfo) -> Vec<String> {
    match policy {
        TagPolicy::None => Vec::new(),
        TagPolicy::Prompt => prompt_tags(&info.positive),
        TagPolicy::Checkpoint => checkpoint_tag(info).into_iter().collect(),
        TagPolicy::PromptAndCheckpoint => {
            let mut tags = prompt_tags(&info.positive);
            tags.extend(checkpoint_tag(info));
            tags
        }
    }
}

/// Comma-separated prompt segments, trimmed, in prompt order.
pub fn prompt_tags(prompt: &str) -> Vec<String> {
    prompt
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn checkpoint_tag(info: &GenerationInfo) -> Option<String> {
    let name = info.model_name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
