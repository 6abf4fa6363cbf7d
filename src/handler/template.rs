//! Template-driven field assignment
//!
//! A [`TemplateTransform`] assigns fields from `{{ variable }}` templates.
//! Variables are rooted at `input`, `output` or `attributes`, with nested
//! access like `{{ input.address.city }}`. A template that is exactly one
//! variable keeps the variable's typed value; anything else renders to a
//! string.

use super::hooks::{Transform, TransformContext};
use crate::error::{Error, Result};
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}").unwrap()
});

const ROOTS: [&str; 3] = ["input", "output", "attributes"];

/// One `field = template` assignment
#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    field: String,
    template: String,
    /// Set when the template is a single variable and nothing else
    single_variable: Option<String>,
}

/// A [`Transform`] assigning fields from templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateTransform {
    name: String,
    assignments: Vec<Assignment>,
}

impl TemplateTransform {
    /// Compile a set of `field -> template` assignments
    ///
    /// Fails if a template references a variable outside the
    /// `input` / `output` / `attributes` roots.
    pub fn compile<K, V>(assignments: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut compiled = Vec::new();
        for (field, template) in assignments {
            let field = field.into();
            let template = template.into();
            for var in extract_variables(&template) {
                let root = var.split('.').next().unwrap_or_default();
                if !ROOTS.contains(&root) {
                    return Err(Error::invalid_value(
                        field,
                        format!("unknown template root '{root}' in '{var}'"),
                    ));
                }
            }
            let single_variable = TEMPLATE_REGEX
                .captures(template.trim())
                .filter(|cap| cap[0].len() == template.trim().len())
                .map(|cap| cap[1].to_string());
            compiled.push(Assignment {
                field,
                template,
                single_variable,
            });
        }
        Ok(Self {
            name: "template".to_string(),
            assignments: compiled,
        })
    }

    /// Set the name used in logs
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of assignments
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Check if there are no assignments
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl Transform for TemplateTransform {
    fn apply(&self, ctx: &mut TransformContext) -> anyhow::Result<()> {
        // Evaluate everything against the context as it was before this
        // transform ran, then assign
        let mut values = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            let value = match &assignment.single_variable {
                Some(var) => lookup(ctx, var)
                    .ok_or_else(|| anyhow::anyhow!("undefined template variable: {var}"))?,
                None => Value::String(render(&assignment.template, ctx)?),
            };
            values.push((assignment.field.clone(), value));
        }

        let target = ctx.target_mut();
        for (field, value) in values {
            target.insert(field, value);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Resolve a variable path against a transform context
fn lookup(ctx: &TransformContext, path: &str) -> Option<Value> {
    let (root, rest) = match path.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (path, None),
    };
    match root {
        "input" => match rest {
            Some(rest) => ctx.input.get_path(rest).cloned(),
            None => Some(Value::Record(ctx.input.clone())),
        },
        "output" => {
            let output = ctx.output.as_ref()?;
            match rest {
                Some(rest) => output.get_path(rest).cloned(),
                None => Some(Value::Record(output.clone())),
            }
        }
        "attributes" => ctx.attributes.get(rest?).map(|v| Value::String(v.clone())),
        _ => None,
    }
}

/// Render a template string against a transform context
pub fn render(template: &str, ctx: &TransformContext) -> anyhow::Result<String> {
    let mut result = template.to_string();
    let mut missing = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let var_path = &cap[1];
        match lookup(ctx, var_path) {
            Some(value) => result = result.replace(&cap[0], &value.to_string()),
            None => missing.push(var_path.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(result)
    } else {
        anyhow::bail!("undefined template variable: {}", missing.join(", "))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}
