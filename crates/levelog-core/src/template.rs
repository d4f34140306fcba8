//! Message templates with positional arguments
//!
//! `{}` is replaced by the next argument, `{{` and `}}` are literal braces.
//! A template whose placeholder count does not match the argument count, or
//! that contains a stray brace, is returned unchanged.

use crate::domain::FieldValue;

/// Substitute `args` into `template`.
pub fn format_template(template: &str, args: &[FieldValue]) -> String {
    try_format(template, args).unwrap_or_else(|| template.to_string())
}

fn try_format(template: &str, args: &[FieldValue]) -> Option<String> {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut args = args.iter();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => match chars.next() {
                Some('{') => out.push('{'),
                Some('}') => out.push_str(&args.next()?.to_string()),
                _ => return None,
            },
            '}' => match chars.next() {
                Some('}') => out.push('}'),
                _ => return None,
            },
            other => out.push(other),
        }
    }

    // Leftover arguments are a mismatch too
    if args.next().is_some() {
        return None;
    }
    Some(out)
}
