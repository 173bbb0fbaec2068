//! The field tag mini-language: `name[,string][,omitempty]`, or `-`.

/// A parsed field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// JSON key.
    pub name: &'a str,
    /// The field takes no part in decoding or encoding.
    pub ignore: bool,
    /// Numbers and booleans travel inside a JSON string.
    pub string: bool,
    /// Zero values are left out when encoding.
    pub omit_empty: bool,
}

/// Parses `raw`; an empty name falls back to `ident` (minus any `r#` prefix).
pub fn parse_tag<'a>(raw: &'a str, ident: &'a str) -> Tag<'a> {
    let raw = raw.trim();
    if raw == "-" {
        return Tag {
            name: "",
            ignore: true,
            string: false,
            omit_empty: false,
        };
    }

    let mut parts = raw.split(',');
    let name = parts.next().map(str::trim).unwrap_or_default();
    let mut tag = Tag {
        name: if name.is_empty() {
            ident.strip_prefix("r#").unwrap_or(ident)
        } else {
            name
        },
        ignore: false,
        string: false,
        omit_empty: false,
    };
    for opt in parts {
        match opt.trim() {
            "string" => tag.string = true,
            "omitempty" => tag.omit_empty = true,
            _ => {}
        }
    }
    tag
}
