//! Parsing of raw field tags in the `key:"value" other:"value"` convention.

/// Options parsed from a single tag value such as `name|alias,omitempty,default=0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FieldTag {
    /// Header keys in declaration order. Empty when the field name should be used.
    pub(crate) keys: Vec<String>,
    pub(crate) skip: bool,
    pub(crate) omit_empty: bool,
    pub(crate) default_value: Option<String>,
}

/// How many indexed columns an `<tag>[]` entry asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexCount {
    Fixed(usize),
    /// Sized from the data (`""` or `"*"`).
    Observed,
}

/// Looks up `name` in a raw tag string. Returns the unquoted value.
pub(crate) fn lookup(tag: &str, name: &str) -> Option<String> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }

        let key_end = rest
            .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
            .unwrap_or(rest.len());
        if key_end == 0 || !rest[key_end..].starts_with(":\"") {
            return None;
        }
        let key = &rest[..key_end];
        rest = &rest[key_end + 2..];

        let mut value = String::new();
        let mut escaped = false;
        let mut end = None;
        for (position, c) in rest.char_indices() {
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                end = Some(position);
                break;
            } else {
                value.push(c);
            }
        }
        let end = end?;

        if key == name {
            return Some(value);
        }
        rest = &rest[end + 1..];
    }
}

/// Splits a tag value into keys and options. `separator` divides multiple keys inside one
/// comma-separated token.
pub(crate) fn parse(value: &str, separator: &str) -> FieldTag {
    let mut tag = FieldTag::default();
    for token in value.split(',').map(str::trim) {
        if token == "omitempty" {
            tag.omit_empty = true;
        } else if let Some(default) = token.strip_prefix("default=") {
            tag.default_value = Some(default.to_string());
        } else if separator.is_empty() || separator == "," {
            tag.keys.push(token.to_string());
        } else {
            tag.keys
                .extend(token.split(separator).map(|key| key.trim().to_string()));
        }
    }

    if tag.keys.len() == 1 && tag.keys[0] == "-" {
        tag.skip = true;
        tag.keys.clear();
        return tag;
    }
    tag.keys.retain(|key| !key.is_empty());
    tag
}

impl IndexCount {
    pub(crate) fn parse(value: &str) -> IndexCount {
        match value.trim() {
            "" | "*" => IndexCount::Observed,
            count => match count.parse() {
                Ok(count) => IndexCount::Fixed(count),
                Err(_) => {
                    log::warn!("ignoring invalid index count {count:?}, sizing from data");
                    IndexCount::Observed
                }
            },
        }
    }
}
