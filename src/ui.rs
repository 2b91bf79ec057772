//! Terminal table for the per-job build summary.
//!
//! Widths are measured with `console` so colored cells line up; the table is
//! squeezed to the terminal width by shrinking the widest column first.

use colored::*;
use console::{Alignment, measure_text_width, pad_str, truncate_str};

const MIN_COL: usize = 8;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| measure_text_width(h)).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(measure_text_width(cell));
            }
        }

        let overhead = 3 + 3 * widths.len();
        let budget = max_width.saturating_sub(overhead);
        while widths.iter().sum::<usize>() > budget {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if widest <= MIN_COL {
                break;
            }
            widths[idx] -= 1;
        }
        widths
    }

    pub fn render(&self, max_width: usize) -> Vec<String> {
        let widths = self.widths(max_width);
        let sep = |left: &str, mid: &str, right: &str| {
            let bars: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}", left, bars.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let mut s = String::from("  │");
            for (cell, &w) in cells.iter().zip(&widths) {
                let cut = truncate_str(cell, w, "...");
                let padded = pad_str(&cut, w, Alignment::Left, None);
                if bold {
                    s.push_str(&format!(" {} │", padded.bold()));
                } else {
                    s.push_str(&format!(" {} │", padded));
                }
            }
            s
        };

        let mut out = vec![sep("┌", "┬", "┐"), line(&self.headers, true), sep("├", "┼", "┤")];
        for row in &self.rows {
            out.push(line(row, false));
        }
        out.push(sep("└", "┴", "┘"));
        out
    }

    pub fn print(&self) {
        if self.headers.is_empty() || self.is_empty() {
            return;
        }
        let (_, term_width) = console::Term::stdout().size();
        for line in self.render(term_width as usize) {
            println!("{}", line);
        }
    }
}
