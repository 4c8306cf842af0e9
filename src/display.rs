use std::fmt::Write;

use unicode_width::UnicodeWidthStr;

use crate::{Label, Spanned, TextRange, View};

/// Included label for display.
struct IncludedLabel {
    range: TextRange,
    debug_value: String,
}

/// Renders a view's text with a `╰──╯` marker under each included label.
///
/// ```text
/// Beer: Around 25 bottles a week.
///       ╰────╯Cue(Local)
///              ╰╯Number(25)
/// ```
///
/// Labels come from the finalized index when there is one, otherwise from
/// the labeler's pending labels. Displaying never finalizes a labeler.
pub struct ViewDisplay<'a> {
    view: &'a View,
    include_labels: Vec<IncludedLabel>,
}

impl<'a> std::fmt::Display for ViewDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.view.text();
        // keep one display row for the text
        let opening_line: String = text
            .chars()
            .map(|c| if c == '\n' || c == '\t' || c == '\r' { ' ' } else { c })
            .collect();
        f.write_str(&opening_line)?;

        for label in self.include_labels.iter() {
            f.write_char('\n')?;

            let start_char_idx = display_column(text, label.range.start);
            let end_char_idx = display_column(text, label.range.end);
            for _ in 0..start_char_idx {
                f.write_char(' ')?;
            }

            f.write_char('╰')?;

            let char_len = end_char_idx - start_char_idx;
            for _ in (start_char_idx + 1)..end_char_idx.saturating_sub(1) {
                f.write_char('─')?;
            }

            if char_len > 1 {
                f.write_char('╯')?;
            }

            f.write_str(&label.debug_value)?;
        }

        Ok(())
    }
}

/// Display width of the text before byte `offset`.
fn display_column(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    UnicodeWidthStr::width(&text[..offset])
}

impl<'a> ViewDisplay<'a> {
    pub fn new(view: &'a View) -> Self {
        ViewDisplay {
            view,
            include_labels: Vec::new(),
        }
    }

    pub fn include<T: Label>(&mut self) {
        let labels: Vec<&T> = match self.view.labeler_ref::<T>() {
            Some(labeler) => match labeler.index() {
                Some(index) => index.ascending().collect(),
                None => {
                    let mut pending: Vec<&T> = labeler.pending().iter().collect();
                    pending.sort_by_key(|label| (label.start(), label.end()));
                    pending
                }
            },
            None => Vec::new(),
        };

        for label in labels {
            self.include_labels.push(IncludedLabel {
                range: label.text_range(),
                debug_value: format!("{:?}", label),
            });
        }
    }

    /// Takes self
    pub fn with<T: Label>(mut self) -> Self {
        self.include::<T>();
        self
    }
}
