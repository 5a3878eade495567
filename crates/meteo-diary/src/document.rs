//! Day-offset addressing over parsed source pages.
//!
//! The month grid is a run of sibling cells, one per calendar day starting
//! at the Monday of the current week; placeholder cells carry the `empty`
//! class. A diary page is a table whose body rows are the days of the month
//! in order. Both are addressed by 1-based sibling position, which is what
//! the page layout guarantees, never by scanning cell contents.

use scraper::{ElementRef, Html, Selector};

const GRID_CELL_SELECTOR: &str = ".weather-cells .cell";
const GRID_TEXT_ATTR: &str = "data-text";
const GRID_MAX_SELECTOR: &str = ".temp .temp_max .unit_temperature_c";
const GRID_MIN_SELECTOR: &str = ".temp .temp_min .unit_temperature_c";
const EMPTY_CELL_CLASS: &str = "empty";

const DIARY_ROW_SELECTOR: &str = "tbody tr";
const DIARY_CELL_SELECTOR: &str = "td";

pub const DIARY_DAY_COLUMN: usize = 0;
pub const DIARY_DAY_TEMP_COLUMN: usize = 1;
pub const DIARY_CLOUDINESS_COLUMN: usize = 3;
pub const DIARY_PRECIPITATION_COLUMN: usize = 4;
pub const DIARY_EVENING_TEMP_COLUMN: usize = 6;

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(crate) fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    scope.select(&selector).next()
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// File name of the first image under `element`, e.g. `sun.png` for
/// `<img src="/static/diary/img/sun.png">`.
pub(crate) fn icon_code(element: ElementRef<'_>) -> Option<String> {
    let image = select_first(element, "img")?;
    icon_file_name(image.value().attr("src")?).map(str::to_string)
}

pub(crate) fn icon_file_name(src: &str) -> Option<&str> {
    let code = src.rsplit('/').next().unwrap_or(src).trim();
    (!code.is_empty()).then_some(code)
}

/// 1-based position of `element` among its element siblings.
fn sibling_position(element: ElementRef<'_>) -> usize {
    element
        .prev_siblings()
        .filter(|node| node.value().is_element())
        .count()
        + 1
}

/// Month grid cells keyed by their day offset from the grid's first day.
pub struct DayGrid<'a> {
    cells: Vec<(usize, ElementRef<'a>)>,
}

impl<'a> DayGrid<'a> {
    pub fn from_document(document: &'a Html) -> Self {
        let cells = selector(GRID_CELL_SELECTOR)
            .map(|selector| {
                document
                    .select(&selector)
                    .map(|cell| (sibling_position(cell), cell))
                    .collect()
            })
            .unwrap_or_default();
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell for the day `offset` days after the grid's first day. Placeholder
    /// cells and offsets outside the grid yield `None`.
    pub fn cell(&self, offset: i64) -> Option<GridCell<'a>> {
        let position = usize::try_from(offset).ok()?.checked_add(1)?;
        self.cells
            .iter()
            .find(|(candidate, _)| *candidate == position)
            .map(|(_, cell)| *cell)
            .filter(|cell| !cell.value().classes().any(|class| class == EMPTY_CELL_CLASS))
            .map(GridCell)
    }
}

#[derive(Clone, Copy)]
pub struct GridCell<'a>(ElementRef<'a>);

impl<'a> GridCell<'a> {
    /// Combined `"cloudiness, precipitation"` description.
    pub fn description(&self) -> Option<&'a str> {
        self.0.value().attr(GRID_TEXT_ATTR)
    }

    pub fn max_reading(&self) -> Option<String> {
        select_first(self.0, GRID_MAX_SELECTOR).map(text_of)
    }

    pub fn min_reading(&self) -> Option<String> {
        select_first(self.0, GRID_MIN_SELECTOR).map(text_of)
    }
}

/// Body rows of a diary table, addressed by their 1-based row index.
pub struct DiaryTable<'a> {
    rows: Vec<DiaryRow<'a>>,
}

impl<'a> DiaryTable<'a> {
    pub fn from_document(document: &'a Html) -> Self {
        let (Some(row_selector), Some(cell_selector)) =
            (selector(DIARY_ROW_SELECTOR), selector(DIARY_CELL_SELECTOR))
        else {
            return Self { rows: Vec::new() };
        };

        let rows = document
            .select(&row_selector)
            .map(|row| DiaryRow {
                index: sibling_position(row),
                cells: row.select(&cell_selector).collect(),
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose index falls in `since_day..=until_day`.
    pub fn rows_between(&self, since_day: u32, until_day: u32) -> impl Iterator<Item = &DiaryRow<'a>> {
        let since = since_day as usize;
        let until = until_day as usize;
        self.rows
            .iter()
            .filter(move |row| since <= row.index && row.index <= until)
    }
}

pub struct DiaryRow<'a> {
    index: usize,
    cells: Vec<ElementRef<'a>>,
}

impl<'a> DiaryRow<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn column(&self, column: usize) -> Option<ElementRef<'a>> {
        self.cells.get(column).copied()
    }

    pub fn column_text(&self, column: usize) -> Option<String> {
        self.column(column).map(text_of)
    }

    /// Day of month printed in the first column.
    pub fn day_number(&self) -> Option<u32> {
        self.column_text(DIARY_DAY_COLUMN)?.parse().ok()
    }

    pub fn icon(&self, column: usize) -> Option<String> {
        self.column(column).and_then(icon_code)
    }
}
