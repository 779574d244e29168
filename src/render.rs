//! Template rendering.
//!
//! Placeholders have the form `${name}` and are filled from a single row of a
//! thought. The renderer uses the first row of the mindmelded thought; the
//! evaluator substitutes operation parameters from the same view.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{RenderError, RenderResult};
use crate::skills::{ActionType, Skill};
use crate::thought::{Row, Thought};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").unwrap());

/// A placeholder with no binding in the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbound(pub String);

/// Substitute every `${name}` in `template` from `row`.
///
/// Text without placeholders is returned verbatim. With no row, any
/// placeholder is unbound.
pub fn instantiate(template: &str, row: Option<&Row>) -> Result<String, Unbound> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = row
            .and_then(|r| r.get(name.as_str()))
            .ok_or_else(|| Unbound(name.as_str().to_string()))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// A rendered output for the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub expression: String,
}

/// Render every template of `skill` against the first row of `thought`,
/// in declaration order.
pub fn render(skill: &Skill, thought: &Thought) -> RenderResult<Vec<Action>> {
    let row = thought.first_row();
    skill
        .actions()
        .iter()
        .map(|template| {
            let expression = instantiate(&template.expression, row).map_err(|Unbound(placeholder)| {
                tracing::error!(
                    skill = %skill.id(),
                    placeholder = %placeholder,
                    template = %template.expression,
                    "unbound placeholder in output template"
                );
                RenderError::UnboundPlaceholder {
                    skill: skill.id().to_string(),
                    placeholder,
                    template: template.expression.clone(),
                }
            })?;
            Ok(Action {
                kind: template.kind,
                expression,
            })
        })
        .collect()
}
