//! Result Presenter
//!
//! Sizes and lays out the read-only popup that shows a statement's rows.
//!
//! # Sizing
//! - No rows: a fixed 400x150 "No results found" popup.
//! - One row with one cell: width follows the value, `max(400, len * 8 + 60)`.
//! - Otherwise every column gets `chars * 8 + 20` pixels (40 to 200), the
//!   popup is `sum + 100` wide and `40 * rows + 120` tall.
//!
//! Width is clamped to `[400, screen - 100]` and height to `[300, screen - 100]`.
//! On screens too small for that range the upper bound is the screen itself.
//! The popup is centered and never placed off-screen.

use serde::Serialize;

use crate::gateway::ResultSet;

pub const CHAR_WIDTH: u32 = 8;
pub const COLUMN_PADDING: u32 = 20;
pub const MIN_COLUMN_WIDTH: u32 = 40;
pub const MAX_COLUMN_WIDTH: u32 = 200;
pub const CHROME_WIDTH: u32 = 100;
pub const ROW_HEIGHT: u32 = 40;
pub const CHROME_HEIGHT: u32 = 120;
pub const MIN_WIDTH: u32 = 400;
pub const MIN_HEIGHT: u32 = 300;
pub const SCREEN_MARGIN: u32 = 100;
pub const SINGLE_VALUE_PADDING: u32 = 60;
pub const EMPTY_SIZE: (u32, u32) = (400, 150);

/// Message of the popup shown for an empty result
pub const NO_RESULTS: &str = "No results found";

/// Screen the popup is placed on, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

impl Screen {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Size and position of a popup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl Geometry {
    /// Center a `width` x `height` popup on `screen`
    #[must_use]
    pub fn centered(width: u32, height: u32, screen: Screen) -> Self {
        Self {
            width,
            height,
            x: center(width, screen.width),
            y: center(height, screen.height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PopupBody {
    Empty { message: &'static str },
    Grid { headers: Vec<String>, rows: Vec<Vec<String>>, column_widths: Vec<u32> },
}

/// A laid-out result popup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPopup {
    pub title: String,
    pub geometry: Geometry,
    pub body: PopupBody,
}

/// Lay out `result` for display
///
/// `labels` name the columns; when empty the first row is used instead.
#[must_use]
pub fn present(
    result: Option<&ResultSet>,
    title: &str,
    labels: &[&str],
    screen: Screen,
) -> ResultPopup {
    let Some(result) = result.filter(|r| !r.is_empty()) else {
        let (width, height) = EMPTY_SIZE;
        return ResultPopup {
            title: title.to_string(),
            geometry: Geometry::centered(
                width.min(screen.width),
                height.min(screen.height),
                screen,
            ),
            body: PopupBody::Empty { message: NO_RESULTS },
        };
    };

    let headers: Vec<String> = if labels.is_empty() {
        result.rows[0].clone()
    } else {
        labels.iter().map(ToString::to_string).collect()
    };

    let column_count =
        result.rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());

    let column_widths: Vec<u32> = (0..column_count)
        .map(|idx| {
            let header = headers.get(idx).map_or(0, |h| text_width(h));
            let widest = result
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| text_width(cell))
                .fold(header, u32::max);
            column_width(widest)
        })
        .collect();

    let width = if result.is_single_value() {
        let content = text_width(&result.rows[0][0])
            .saturating_mul(CHAR_WIDTH)
            .saturating_add(SINGLE_VALUE_PADDING)
            .max(MIN_WIDTH);
        clamp_extent(content, MIN_WIDTH, screen.width)
    } else {
        let content = column_widths.iter().sum::<u32>().saturating_add(CHROME_WIDTH);
        clamp_extent(content, MIN_WIDTH, screen.width)
    };

    let rows = u32::try_from(result.row_count()).unwrap_or(u32::MAX);
    let height = clamp_extent(
        rows.saturating_mul(ROW_HEIGHT).saturating_add(CHROME_HEIGHT),
        MIN_HEIGHT,
        screen.height,
    );

    ResultPopup {
        title: title.to_string(),
        geometry: Geometry::centered(width, height, screen),
        body: PopupBody::Grid { headers, rows: result.rows.clone(), column_widths },
    }
}

/// Pixel width of one column holding at most `chars` characters
#[must_use]
pub fn column_width(chars: u32) -> u32 {
    chars
        .saturating_mul(CHAR_WIDTH)
        .saturating_add(COLUMN_PADDING)
        .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
}

/// Clamp a popup extent between `minimum` and the screen minus its margin
///
/// The upper bound never drops below `min(minimum, screen)`, so the result
/// always fits on the screen.
#[must_use]
pub fn clamp_extent(value: u32, minimum: u32, screen: u32) -> u32 {
    let upper = screen.saturating_sub(SCREEN_MARGIN).max(minimum.min(screen));
    value.max(minimum).min(upper)
}

fn center(extent: u32, screen: u32) -> u32 {
    (screen / 2).saturating_sub(extent / 2).min(screen.saturating_sub(extent))
}

fn text_width(text: &str) -> u32 {
    u32::try_from(text.chars().count()).unwrap_or(u32::MAX)
}

impl ResultPopup {
    /// Render the popup as a plain-text grid
    ///
    /// Each column is `pixels / 8` characters wide; longer cells are cut
    /// and end in `…`.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n", self.title);

        match &self.body {
            PopupBody::Empty { message } => {
                out.push_str(message);
                out.push('\n');
            }
            PopupBody::Grid { headers, rows, column_widths } => {
                let chars: Vec<usize> =
                    column_widths.iter().map(|px| (px / CHAR_WIDTH) as usize).collect();

                out.push_str(&render_line(headers, &chars));
                out.push_str(
                    &chars.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"),
                );
                out.push('\n');
                for row in rows {
                    out.push_str(&render_line(row, &chars));
                }
            }
        }

        out
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let line = widths
        .iter()
        .enumerate()
        .map(|(idx, &width)| {
            let cell = cells.get(idx).map_or("", String::as_str);
            format!("{:<width$}", elide(cell, width))
        })
        .collect::<Vec<_>>()
        .join(" | ");

    format!("{}\n", line.trim_end())
}

fn elide(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(cells: &[&[&str]]) -> ResultSet {
        let rows: Vec<Vec<String>> =
            cells.iter().map(|row| row.iter().map(ToString::to_string).collect()).collect();
        let columns = (0..rows.first().map_or(0, Vec::len)).map(|i| format!("c{i}")).collect();
        ResultSet::new(columns, rows)
    }

    fn assert_within_bounds(popup: &ResultPopup, screen: Screen) {
        let g = popup.geometry;
        assert!(g.width <= screen.width, "{g:?} wider than {screen:?}");
        assert!(g.height <= screen.height, "{g:?} taller than {screen:?}");
        assert!(g.x + g.width <= screen.width, "{g:?} off-screen horizontally");
        assert!(g.y + g.height <= screen.height, "{g:?} off-screen vertically");
    }

    #[test]
    fn test_empty_result_is_fixed_popup() {
        let screen = Screen::default();
        for result in [None, Some(&ResultSet::default())] {
            let popup = present(result, "View Students", &[], screen);
            assert_eq!(popup.body, PopupBody::Empty { message: "No results found" });
            assert_eq!((popup.geometry.width, popup.geometry.height), (400, 150));
            assert_eq!((popup.geometry.x, popup.geometry.y), (760, 465));
        }
    }

    #[test]
    fn test_grid_sizing() {
        let result = rows(&[&["12345678", "Ann", "ann@example.com"], &["2", "Bob", "b@x.org"]]);
        let labels = ["Student ID", "Name", "Email"];
        let popup = present(Some(&result), "View Students", &labels, Screen::default());

        let PopupBody::Grid { column_widths, headers, .. } = &popup.body else {
            panic!("expected a grid");
        };
        // "Student ID" 10 chars, "Name" 4, "ann@example.com" 15
        assert_eq!(column_widths, &vec![100, 52, 140]);
        assert_eq!(headers, &vec!["Student ID", "Name", "Email"]);
        assert_eq!(popup.geometry.width, 400);
        assert_eq!(popup.geometry.height, 300);
    }

    #[test]
    fn test_column_width_limits() {
        assert_eq!(column_width(0), MIN_COLUMN_WIDTH);
        assert_eq!(column_width(1), 40);
        assert_eq!(column_width(10), 100);
        assert_eq!(column_width(500), MAX_COLUMN_WIDTH);
    }

    #[test]
    fn test_many_rows_are_capped_by_screen() {
        let cells: Vec<Vec<String>> =
            (0..200).map(|i| vec![i.to_string(), "x".repeat(60), "y".to_string()]).collect();
        let result = ResultSet::new(vec!["a".into(), "b".into(), "c".into()], cells);
        let screen = Screen::new(1280, 720);

        let popup = present(Some(&result), "t", &["A", "B", "C"], screen);
        assert_eq!(popup.geometry.height, 620);
        assert_within_bounds(&popup, screen);
    }

    #[test]
    fn test_single_value_width_follows_content() {
        let screen = Screen::default();

        let short = present(Some(&rows(&[&["3"]])), "Count", &[], screen);
        assert_eq!(short.geometry.width, 400);
        assert_eq!(short.geometry.height, 300);

        let medium = present(Some(&rows(&[&["x".repeat(80).as_str()]])), "Long", &[], screen);
        assert_eq!(medium.geometry.width, 80 * 8 + 60);

        let huge = present(Some(&rows(&[&["x".repeat(5000).as_str()]])), "Huge", &[], screen);
        assert_eq!(huge.geometry.width, 1820);
        assert_within_bounds(&huge, screen);
    }

    #[test]
    fn test_popup_fits_any_screen() {
        let result = rows(&[&["a", "b"], &["c", "d"]]);
        let single = rows(&[&["a value that is quite long indeed"]]);

        let screens = [(1920, 1080), (800, 600), (450, 350), (320, 240), (50, 50), (0, 0)];
        for (width, height) in screens {
            let screen = Screen::new(width, height);
            assert_within_bounds(&present(Some(&result), "t", &[], screen), screen);
            assert_within_bounds(&present(Some(&single), "t", &[], screen), screen);
            assert_within_bounds(&present(None, "t", &[], screen), screen);
        }
    }

    #[test]
    fn test_clamp_extent() {
        assert_eq!(clamp_extent(10, 400, 1920), 400);
        assert_eq!(clamp_extent(5000, 400, 1920), 1820);
        assert_eq!(clamp_extent(900, 400, 1920), 900);
        // Screen smaller than minimum + margin
        assert_eq!(clamp_extent(10, 400, 450), 400);
        assert_eq!(clamp_extent(10, 400, 300), 300);
    }

    #[test]
    fn test_labels_fall_back_to_first_row() {
        let result = rows(&[&["sno", "sname"], &["1", "Ann"]]);
        let popup = present(Some(&result), "t", &[], Screen::default());

        let PopupBody::Grid { headers, rows, .. } = popup.body else {
            panic!("expected a grid");
        };
        assert_eq!(headers, vec!["sno", "sname"]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_ragged_rows_get_a_width_per_column() {
        let result = rows(&[&["a"], &["b", "cccc", "d"]]);
        let popup = present(Some(&result), "t", &["One"], Screen::default());

        let PopupBody::Grid { column_widths, .. } = popup.body else {
            panic!("expected a grid");
        };
        assert_eq!(column_widths.len(), 3);
    }

    #[test]
    fn test_render_text() {
        let result =
            rows(&[&["1", "Ann"], &["2", "A very long name that will not fit in the column"]]);
        let popup = present(Some(&result), "View Students", &["ID", "Name"], Screen::default());

        insta::assert_snapshot!(popup.render_text(), @r"
        View Students
        ID    | Name
        ------+--------------------------
        1     | Ann
        2     | A very long name that wi…
        ");
    }

    #[test]
    fn test_render_empty_text() {
        let popup = present(None, "Search Results (ID)", &[], Screen::default());
        assert_eq!(popup.render_text(), "Search Results (ID)\nNo results found\n");
    }
}
