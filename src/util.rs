//! Lexical path helpers for package-internal paths.
//!
//! Paths inside an EPUB archive are plain slash-separated strings, not
//! filesystem paths, so these operate purely on the text: no filesystem
//! access and no platform separators.

/// Normalize a slash-separated path, collapsing `.` and `..` segments.
///
/// Leading `..` segments of a relative path are kept (there is nothing to
/// climb out of), and an empty result becomes `.`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&"..") => segments.push(".."),
                Some(_) => {
                    segments.pop();
                }
                None => {
                    if !rooted {
                        segments.push("..");
                    }
                }
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join two path fragments and normalize the result.
pub fn join_path(base: &str, rest: &str) -> String {
    if base.is_empty() {
        return clean_path(rest);
    }
    if rest.is_empty() {
        return clean_path(base);
    }
    clean_path(&format!("{base}/{rest}"))
}

/// The directory portion of a path, `.` when there is none.
pub fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => clean_path(&path[..index]),
        None => ".".to_string(),
    }
}
