//! Reverse URL lookup.
//!
//! `url_for("UserController.List", ...)` walks every verb tree for a
//! controller route that can reach the action, substitutes the provided
//! values into the pattern's captures, and appends leftovers as a query
//! string. Misuse never panics: malformed endpoints and unresolvable
//! patterns log a warning and return an empty string.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use talaria_router::{split_segment, Capture};

use crate::controller::ControllerDescriptor;
use crate::registry::{RouteTable, RouteTarget};

pub(crate) fn url_for(table: &RouteTable, endpoint: &str, pairs: &[(&str, &str)]) -> String {
    let Some((controller, action)) = endpoint.rsplit_once('.') else {
        warn!(endpoint, "reverse lookup endpoint must be `Controller.Action`");
        return String::new();
    };
    if controller.is_empty() || action.is_empty() {
        warn!(endpoint, "reverse lookup endpoint must be `Controller.Action`");
        return String::new();
    }
    let provided: IndexMap<&str, &str> = pairs.iter().copied().collect();

    for tree in table.trees().values() {
        let mut resolved: Option<(String, IndexMap<&str, &str>)> = None;
        tree.walk(&mut |leaf| {
            if resolved.is_some() {
                return;
            }
            if let RouteTarget::Controller {
                descriptor,
                methods,
            } = leaf.payload().as_ref()
            {
                if descriptor.name() == controller
                    && action_reachable(descriptor, methods, action)
                {
                    let mut working = provided.clone();
                    if let Some(url) = fill_pattern(leaf.pattern(), &mut working) {
                        resolved = Some((url, working));
                    }
                }
            }
        });
        if let Some((mut url, leftover)) = resolved {
            if !leftover.is_empty() {
                let pairs: Vec<(&str, &str)> = leftover.into_iter().collect();
                if let Ok(qs) = serde_urlencoded::to_string(&pairs) {
                    if !qs.is_empty() {
                        url.push('?');
                        url.push_str(&qs);
                    }
                }
            }
            return url;
        }
    }

    warn!(endpoint, "no route found for reverse lookup");
    String::new()
}

fn action_reachable(
    descriptor: &ControllerDescriptor,
    methods: &HashMap<String, String>,
    action: &str,
) -> bool {
    methods.values().any(|a| a == action) || (methods.is_empty() && descriptor.declares(action))
}

/// Substitutes values into a pattern. Consumes values out of `provided`;
/// returns `None` when a non-optional capture has no value.
fn fill_pattern(pattern: &str, provided: &mut IndexMap<&str, &str>) -> Option<String> {
    let mut out = String::new();
    for seg in pattern.split('/').filter(|s| !s.is_empty()) {
        let spec = split_segment(seg);
        if !spec.wild {
            out.push('/');
            out.push_str(seg);
            continue;
        }
        if seg == "*" {
            let value = provided.shift_remove("splat")?;
            out.push('/');
            out.push_str(value);
            continue;
        }
        if seg == "*.*" {
            let path = provided.shift_remove("path")?;
            let ext = provided.shift_remove("ext")?;
            out.push('/');
            out.push_str(path);
            if !ext.is_empty() {
                out.push('.');
                out.push_str(ext);
            }
            continue;
        }

        let optional = spec.captures.contains(&Capture::Optional);
        let mut filled = seg.to_string();
        let mut missing = false;
        for capture in &spec.captures {
            if let Capture::Name(name) = capture {
                match provided.shift_remove(name.as_str()) {
                    Some(value) => filled = replace_capture(&filled, name, value),
                    None => {
                        missing = true;
                        break;
                    }
                }
            }
        }
        if missing {
            if optional {
                // ?:name segments are simply omitted when no value is given
                continue;
            }
            return None;
        }
        out.push('/');
        out.push_str(&filled);
    }
    if out.is_empty() {
        out.push('/');
    }
    Some(out)
}

/// Replaces one capture token in a segment with its value, longest marker
/// first so `:id:int` is not mistaken for `:id` followed by `:int`.
fn replace_capture(seg: &str, name: &str, value: &str) -> String {
    for marker in [
        format!("?:{name}:int"),
        format!("?:{name}:string"),
        format!(":{name}:int"),
        format!(":{name}:string"),
    ] {
        if seg.contains(&marker) {
            return seg.replacen(&marker, value, 1);
        }
    }

    // inline regex: `:name(...)` with possibly nested parens
    let open_marker = format!(":{name}(");
    if let Some(start) = seg.find(&open_marker) {
        let open = start + open_marker.len() - 1;
        let mut depth = 0usize;
        for (i, ch) in seg[open..].char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = open + i;
                        return format!("{}{}{}", &seg[..start], value, &seg[end + 1..]);
                    }
                }
                _ => {}
            }
        }
    }

    for marker in [format!("?:{name}"), format!(":{name}")] {
        if let Some(result) = replace_bounded(seg, &marker, value) {
            return result;
        }
    }
    seg.to_string()
}

/// Replaces `token` with `value` only where the token is not followed by
/// more name characters, so `:id` never clobbers `:idx`.
fn replace_bounded(seg: &str, token: &str, value: &str) -> Option<String> {
    let mut from = 0;
    while let Some(pos) = seg[from..].find(token) {
        let start = from + pos;
        let end = start + token.len();
        let bounded = seg[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        if bounded {
            return Some(format!("{}{}{}", &seg[..start], value, &seg[end..]));
        }
        from = end;
    }
    None
}
