//! Newline-delimited list codec and move-to-front insertion.

/// Parses a list file: one entry per line, most-recent first.
///
/// Empty lines are dropped, which covers both the leading empty line left by
/// an empty file and a trailing newline added by an editor. `\r\n` endings are
/// accepted.
pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serialises a list as newline-separated entries without a trailing newline.
pub fn join_lines(items: &[String]) -> String {
    items.join("\n")
}

/// Moves `item` to the front of `list`, removing any earlier occurrence.
///
/// With a `cap`, the least-recent entries beyond it are dropped from the tail.
pub fn move_to_front(list: &mut Vec<String>, item: &str, cap: Option<usize>) {
    list.retain(|existing| existing != item);
    list.insert(0, item.to_string());
    if let Some(cap) = cap {
        list.truncate(cap);
    }
}
