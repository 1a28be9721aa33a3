use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Column-aligned listing for the checkpoint, plan, and record views.
///
/// Rows may be ragged: a trailing annotation cell (the boundary marker in
/// the checkpoint listing, a failure reason in a record) is only added when
/// there is something to say and never pads the lines that lack it. No line
/// carries trailing whitespace. Footnotes (plan warnings, the session
/// outcome) print after the rows, separated by a blank line.
pub struct Listing {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
    footnotes: Vec<String>,
}

impl Listing {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
            footnotes: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn footnote(&mut self, note: impl Into<String>) {
        self.footnotes.push(note.into());
    }

    pub fn print(self) {
        print!("{}", self.render());
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let mut out = String::new();
        let headers: Vec<String> = self.headers.iter().map(|h| h.to_string()).collect();
        out.push_str(&pad_line(&headers, &widths));
        out.push('\n');
        let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&pad_line(&rules, &widths));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&pad_line(row, &widths));
            out.push('\n');
        }

        if !self.footnotes.is_empty() {
            out.push('\n');
            for note in &self.footnotes {
                out.push_str(note);
                out.push('\n');
            }
        }
        out
    }
}

fn pad_line(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let w = widths.get(i).copied().unwrap_or(0);
            format!("{:w$}", cell, w = w)
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
