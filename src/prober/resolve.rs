/// Resolves a path trick against `base`, treating `base` as a directory
/// (a trailing slash is appended when missing).
///
/// Leading slashes are stripped from the trick so it resolves relative to
/// the base path. Only literal `.`/`..` segments are removed; percent-encoded
/// dots are sent as written, which is the point of the trick.
pub fn resolve_path_trick(base: &str, trick: &str) -> String {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    let reference = trick.trim_start_matches('/');

    let (origin, base_path) = split_origin(&base);

    let (reference, fragment) = match reference.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (reference, None),
    };
    let (ref_path, query) = match reference.split_once('?') {
        Some((head, q)) => (head, Some(q)),
        None => (reference, None),
    };

    let path = if ref_path.is_empty() {
        base_path.to_string()
    } else {
        let dir_end = base_path.rfind('/').map(|i| i + 1).unwrap_or(0);
        let merged = format!("{}{}", &base_path[..dir_end], ref_path);
        remove_dot_segments(&merged)
    };

    let mut out = String::with_capacity(origin.len() + path.len() + trick.len());
    out.push_str(origin);
    out.push_str(&path);
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    if let Some(f) = fragment {
        out.push('#');
        out.push_str(f);
    }
    out
}

// `https://host/a/` -> (`https://host`, `/a/`)
fn split_origin(url: &str) -> (&str, &str) {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => url.split_at(after_scheme + i),
        None => (url, "/"),
    }
}

fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    let mut segments = path.split('/').skip(1).peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match segment {
            "." => trailing_slash = last,
            ".." => {
                out.pop();
                trailing_slash = last;
            }
            _ => {
                out.push(segment);
                trailing_slash = false;
            }
        }
    }

    let mut resolved = String::from("/");
    resolved.push_str(&out.join("/"));
    if trailing_slash && !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved
}
