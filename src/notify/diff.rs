//! Line diff between two snapshot versions for change notifications.
//!
//! Lines shared at the start and end are trimmed first, the remaining middle
//! part is aligned with a longest-common-subsequence table. Very large middles
//! skip the table and are reported as a whole replacement.

use super::render::escape_html;

/// Largest LCS table (old lines × new lines) computed before falling back.
const MAX_TABLE_CELLS: usize = 4_000_000;

/// One line of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    Same(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

impl DiffLine<'_> {
    fn is_change(&self) -> bool {
        !matches!(self, DiffLine::Same(_))
    }
}

/// Diff between an old and a new text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDiff<'a> {
    pub lines: Vec<DiffLine<'a>>,
}

impl<'a> LineDiff<'a> {
    /// Compute the line diff of `old` against `new`.
    pub fn new(old: &'a str, new: &'a str) -> Self {
        let old_lines: Vec<&str> = old.split('\n').collect();
        let new_lines: Vec<&str> = new.split('\n').collect();

        let prefix = old_lines
            .iter()
            .zip(&new_lines)
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old_lines[prefix..]
            .iter()
            .rev()
            .zip(new_lines[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_mid = &old_lines[prefix..old_lines.len() - suffix];
        let new_mid = &new_lines[prefix..new_lines.len() - suffix];

        let mut lines = Vec::with_capacity(old_lines.len().max(new_lines.len()));
        lines.extend(old_lines[..prefix].iter().copied().map(DiffLine::Same));
        lines.extend(align(old_mid, new_mid));
        lines.extend(
            old_lines[old_lines.len() - suffix..]
                .iter()
                .copied()
                .map(DiffLine::Same),
        );

        Self { lines }
    }

    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(DiffLine::is_change)
    }

    pub fn added_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .count()
    }

    /// Render as an HTML table, keeping `context` unchanged lines around
    /// each change and collapsing the rest.
    pub fn to_html(&self, context: usize) -> String {
        let mut visible = vec![false; self.lines.len()];
        for (i, line) in self.lines.iter().enumerate() {
            if line.is_change() {
                let start = i.saturating_sub(context);
                let end = (i + context + 1).min(self.lines.len());
                visible[start..end].iter_mut().for_each(|v| *v = true);
            }
        }

        let mut html = String::from("<table class=\"diff\">\n");
        let mut skipping = false;
        for (line, show) in self.lines.iter().zip(&visible) {
            if !show {
                if !skipping {
                    html.push_str("<tr class=\"skip\"><td></td><td>&hellip;</td></tr>\n");
                    skipping = true;
                }
                continue;
            }
            skipping = false;

            let (class, marker, text) = match line {
                DiffLine::Same(text) => ("same", "&nbsp;", text),
                DiffLine::Removed(text) => ("del", "-", text),
                DiffLine::Added(text) => ("ins", "+", text),
            };
            html.push_str(&format!(
                "<tr class=\"{class}\"><td>{marker}</td><td>{}</td></tr>\n",
                escape_html(text)
            ));
        }
        html.push_str("</table>");
        html
    }
}

/// Align two slices that share no common prefix or suffix.
fn align<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<DiffLine<'a>> {
    let (n, m) = (old.len(), new.len());
    if n == 0 || m == 0 || n.saturating_mul(m) > MAX_TABLE_CELLS {
        return old
            .iter()
            .copied()
            .map(DiffLine::Removed)
            .chain(new.iter().copied().map(DiffLine::Added))
            .collect();
    }

    // table[i][j] = LCS length of old[i..] and new[j..]
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            lines.push(DiffLine::Same(old[i]));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            lines.push(DiffLine::Removed(old[i]));
            i += 1;
        } else {
            lines.push(DiffLine::Added(new[j]));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().copied().map(DiffLine::Removed));
    lines.extend(new[j..].iter().copied().map(DiffLine::Added));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_changes() {
        let diff = LineDiff::new("a\nb\nc", "a\nb\nc");
        assert!(!diff.has_changes());
        assert_eq!(diff.lines.len(), 3);
    }

    #[test]
    fn test_single_line_replaced() {
        let diff = LineDiff::new("v1", "v2");
        assert_eq!(
            diff.lines,
            vec![DiffLine::Removed("v1"), DiffLine::Added("v2")]
        );
    }

    #[test]
    fn test_insertion_in_middle() {
        let diff = LineDiff::new("a\nc", "a\nb\nc");
        assert_eq!(
            diff.lines,
            vec![DiffLine::Same("a"), DiffLine::Added("b"), DiffLine::Same("c")]
        );
        assert_eq!(diff.added_count(), 1);
        assert_eq!(diff.removed_count(), 0);
    }

    #[test]
    fn test_mixed_changes_keep_common_lines() {
        let diff = LineDiff::new("a\nx\nb\ny\nc", "a\nb\nz\nc");
        let same: Vec<_> = diff
            .lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Same(t) => Some(*t),
                _ => None,
            })
            .collect();
        assert_eq!(same, vec!["a", "b", "c"]);
        assert_eq!(diff.removed_count(), 2);
        assert_eq!(diff.added_count(), 1);
    }

    #[test]
    fn test_empty_to_content() {
        let diff = LineDiff::new("", "new");
        assert_eq!(
            diff.lines,
            vec![DiffLine::Removed(""), DiffLine::Added("new")]
        );
    }

    #[test]
    fn test_html_is_escaped_and_collapsed() {
        let old = "1\n2\n3\n4\n5\n6\n<b>old</b>";
        let new = "1\n2\n3\n4\n5\n6\n<b>new</b>";
        let html = LineDiff::new(old, new).to_html(1);

        assert!(html.contains("&lt;b&gt;old&lt;/b&gt;"));
        assert!(html.contains("<tr class=\"ins\"><td>+</td><td>&lt;b&gt;new&lt;/b&gt;</td></tr>"));
        assert!(html.contains("&hellip;"));
        assert!(!html.contains("<td>1</td>"));
        assert!(html.contains("<td>6</td>"));
    }
}
