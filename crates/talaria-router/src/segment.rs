//! Pattern segment grammar.
//!
//! A path pattern is split on `/` and each segment is classified as either a
//! literal or a capturing segment. The capture grammar:
//!
//! - `admin` — literal
//! - `:id` — named capture for one segment
//! - `?:id` — optional named capture (the segment may be absent)
//! - `:id:int` — named capture constrained to `([0-9]+)`
//! - `:name:string` — named capture constrained to `([\w]+)`
//! - `:id([0-9]+)` — named capture with an inline regex
//! - `cms_:id_:page.html` — literals and captures mixed in one segment
//! - `*` — catch-all for the remaining path, bound as `splat`
//! - `*.*` — catch-all splitting the final segment into `path` and `ext`

/// One capture slot declared by a pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// A named capture (`:id` binds under `id`).
    Name(String),
    /// Marker from `?:name`: the capture may be absent and binds `""`.
    Optional,
    /// Marker from `*.*`: the final segment splits on its last dot.
    Dot,
    /// Catch-all for the remaining path, bound under `splat`.
    Splat,
}

impl Capture {
    /// The parameter key this capture binds under, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            Self::Splat => Some("splat"),
            Self::Optional | Self::Dot => None,
        }
    }
}

/// Classification of a single pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    /// Whether the segment captures anything.
    pub wild: bool,
    /// Captures declared by the segment, in order.
    pub captures: Vec<Capture>,
    /// Regex source accumulated for constrained/mixed segments; empty for
    /// plain `:name`, `*` and `*.*` segments.
    pub regex_src: String,
}

impl SegmentSpec {
    fn literal() -> Self {
        Self {
            wild: false,
            captures: Vec::new(),
            regex_src: String::new(),
        }
    }
}

/// Classifies one pattern segment.
#[must_use]
pub fn split_segment(seg: &str) -> SegmentSpec {
    if seg.starts_with('*') {
        if seg == "*.*" {
            return SegmentSpec {
                wild: true,
                captures: vec![
                    Capture::Dot,
                    Capture::Name("path".to_string()),
                    Capture::Name("ext".to_string()),
                ],
                regex_src: String::new(),
            };
        }
        return SegmentSpec {
            wild: true,
            captures: vec![Capture::Splat],
            regex_src: String::new(),
        };
    }
    if !seg.contains(':') {
        return SegmentSpec::literal();
    }

    let chars: Vec<char> = seg.chars().collect();
    let mut out = String::new();
    let mut captures: Vec<Capture> = Vec::new();
    let mut param = String::new();
    let mut expr = String::new();
    let mut in_param = false;
    let mut in_expr = false;
    let mut skip = 0usize;
    let mut group_count = 0usize;

    for i in 0..chars.len() {
        let v = chars[i];
        if skip > 0 {
            skip -= 1;
            continue;
        }
        if in_param {
            // typed shorthands `:int` / `:string` terminate the capture
            if v == ':' {
                let rest: String = chars[i + 1..].iter().collect();
                if rest.starts_with("int") {
                    out.push_str("([0-9]+)");
                    captures.push(Capture::Name(std::mem::take(&mut param)));
                    in_param = false;
                    in_expr = false;
                    skip = 3;
                    group_count += 1;
                    continue;
                }
                if rest.starts_with("string") {
                    out.push_str(r"([\w]+)");
                    captures.push(Capture::Name(std::mem::take(&mut param)));
                    in_param = false;
                    in_expr = false;
                    skip = 6;
                    group_count += 1;
                    continue;
                }
            }
            // capture names are limited to [a-zA-Z0-9]
            if v.is_ascii_alphanumeric() {
                param.push(v);
                continue;
            }
            if v != '(' {
                out.push_str("(.+)");
                captures.push(Capture::Name(std::mem::take(&mut param)));
                group_count += 1;
                in_param = false;
                in_expr = false;
            }
        }
        if in_expr && v != ')' {
            expr.push(v);
            continue;
        }
        if v == ':' {
            param.clear();
            in_param = true;
        } else if v == '(' {
            in_expr = true;
            in_param = false;
            captures.push(Capture::Name(param.clone()));
            group_count += 1;
            expr.clear();
            expr.push('(');
        } else if v == ')' {
            in_expr = false;
            expr.push(')');
            out.push_str(&expr);
            param.clear();
        } else if v == '?' {
            captures.push(Capture::Optional);
        } else {
            out.push(v);
        }
    }

    if !param.is_empty() {
        if group_count > 0 {
            out.push_str("(.+)");
        }
        captures.push(Capture::Name(param));
    }

    SegmentSpec {
        wild: true,
        captures,
        regex_src: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(spec: &SegmentSpec) -> Vec<&str> {
        spec.captures.iter().filter_map(Capture::key).collect()
    }

    #[test]
    fn test_literal_segment() {
        let spec = split_segment("admin");
        assert!(!spec.wild);
        assert!(spec.captures.is_empty());
        assert!(spec.regex_src.is_empty());
    }

    #[test]
    fn test_named_segment() {
        let spec = split_segment(":id");
        assert!(spec.wild);
        assert_eq!(names(&spec), vec!["id"]);
        assert!(spec.regex_src.is_empty());
    }

    #[test]
    fn test_optional_named_segment() {
        let spec = split_segment("?:id");
        assert!(spec.wild);
        assert_eq!(spec.captures[0], Capture::Optional);
        assert_eq!(spec.captures[1], Capture::Name("id".to_string()));
    }

    #[test]
    fn test_int_shorthand() {
        let spec = split_segment(":id:int");
        assert!(spec.wild);
        assert_eq!(names(&spec), vec!["id"]);
        assert_eq!(spec.regex_src, "([0-9]+)");
    }

    #[test]
    fn test_string_shorthand() {
        let spec = split_segment(":name:string");
        assert!(spec.wild);
        assert_eq!(names(&spec), vec!["name"]);
        assert_eq!(spec.regex_src, r"([\w]+)");
    }

    #[test]
    fn test_inline_regex() {
        let spec = split_segment(":id([0-9]+)");
        assert!(spec.wild);
        assert_eq!(names(&spec), vec!["id"]);
        assert_eq!(spec.regex_src, "([0-9]+)");
    }

    #[test]
    fn test_inline_regex_with_trailing_capture() {
        let spec = split_segment(":id([0-9]+)_:name");
        assert_eq!(names(&spec), vec!["id", "name"]);
        assert_eq!(spec.regex_src, "([0-9]+)_(.+)");
    }

    #[test]
    fn test_mixed_literal_segment() {
        let spec = split_segment("cms_:id_:page.html");
        assert_eq!(names(&spec), vec!["id", "page"]);
        assert_eq!(spec.regex_src, "cms_(.+)_(.+).html");
    }

    #[test]
    fn test_splat_segment() {
        let spec = split_segment("*");
        assert!(spec.wild);
        assert_eq!(spec.captures, vec![Capture::Splat]);
    }

    #[test]
    fn test_path_ext_segment() {
        let spec = split_segment("*.*");
        assert!(spec.wild);
        assert_eq!(spec.captures.len(), 3);
        assert_eq!(spec.captures[0], Capture::Dot);
        assert_eq!(names(&spec), vec!["path", "ext"]);
    }
}
