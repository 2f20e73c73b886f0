//! SQL identifier and type validation
//!
//! Table, column, constraint and database names are interpolated into DDL,
//! so every name is checked here before it reaches a statement. Values are
//! never interpolated; they always go through parameter binding.

/// MySQL limit for table, column, constraint and schema names
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check that `name` is a plain unquoted identifier: `[A-Za-z_][A-Za-z0-9_]*`,
/// at most [`MAX_IDENTIFIER_LEN`] characters.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }

    name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check a declared column type such as `TEXT`, `INT`, `VARCHAR(255)` or
/// `DECIMAL(10, 2)`.
///
/// Only a base keyword made of letters, optionally followed by one
/// parenthesised list of integers, is accepted.
pub fn is_valid_sql_type(sql_type: &str) -> bool {
    let sql_type = sql_type.trim();
    let (base, args) = match sql_type.find('(') {
        Some(open) => (&sql_type[..open], Some(&sql_type[open..])),
        None => (sql_type, None),
    };

    let base = base.trim_end();
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
        return false;
    }

    match args {
        None => true,
        Some(args) => {
            let Some(inner) = args.strip_prefix('(').and_then(|a| a.strip_suffix(')')) else {
                return false;
            };
            inner
                .split(',')
                .all(|part| !part.trim().is_empty() && part.trim().chars().all(|c| c.is_ascii_digit()))
        }
    }
}

/// Check a column DEFAULT expression
///
/// Accepts numeric literals, single-quoted string literals without embedded
/// quotes, `NULL` and `CURRENT_TIMESTAMP`.
pub fn is_valid_default(value: &str) -> bool {
    let value = value.trim();
    if value.eq_ignore_ascii_case("NULL") || value.eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
        return true;
    }

    if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        return !inner.contains('\'') && !inner.contains('\\');
    }

    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
}
