use crate::errors::{PdsError, Result};

/// Render a `{field}` template, looking every placeholder up through `lookup`.
///
/// `{{` and `}}` escape literal braces. An unknown placeholder is an error,
/// never an empty string.
pub fn render<'a, F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut rendered = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find(['{', '}']) {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            rendered.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            return Err(unknown(template, "}"));
        }
        let end = tail.find('}').ok_or_else(|| unknown(template, tail))?;
        let field = &tail[1..end];
        rendered.push_str(lookup(field).ok_or_else(|| unknown(template, field))?);
        rest = &tail[end + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn unknown(template: &str, field: &str) -> PdsError {
    PdsError::TemplateField {
        template: template.into(),
        field: field.into(),
    }
}
