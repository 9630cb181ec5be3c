use std::collections::BTreeSet;

/// Zero-based line selection with click / shift-click semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSelection {
    lines: BTreeSet<usize>,
    anchor: Option<usize>,
}

impl LineSelection {
    /// Plain click: flips one line and makes it the anchor.
    pub fn toggle(&mut self, index: usize) {
        if !self.lines.remove(&index) {
            self.lines.insert(index);
        }
        self.anchor = Some(index);
    }

    /// Shift-click: adds every line between the anchor and `index`.
    /// Without an anchor this is a plain toggle.
    pub fn extend_to(&mut self, index: usize) {
        let Some(anchor) = self.anchor else {
            self.toggle(index);
            return;
        };
        let (from, to) = (anchor.min(index), anchor.max(index));
        self.lines.extend(from..=to);
        self.anchor = Some(index);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.anchor = None;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn sorted_indices(&self) -> Vec<usize> {
        self.lines.iter().copied().collect()
    }

    /// Text of the selected lines in ascending order; indices past the end
    /// are skipped.
    pub fn selected_lines<'a>(&self, lines: &[&'a str]) -> Vec<&'a str> {
        self.lines
            .iter()
            .filter_map(|index| lines.get(*index).copied())
            .collect()
    }

    /// Stable key for caching per-selection results, e.g. `"1,4,5"`.
    pub fn cache_key(&self) -> String {
        self.lines
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
