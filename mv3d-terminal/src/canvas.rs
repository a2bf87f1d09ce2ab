/// Character grid the whole frame is composed into before it reaches the terminal
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use std::io::Write;

/// Screen-space rectangle in terminal cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        column >= self.x
            && row >= self.y
            && (column - self.x) < self.width
            && (row - self.y) < self.height
    }

    pub fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Cell {
    pub const fn new(ch: char, fg: Color, bg: Color) -> Self {
        Self { ch, fg, bg }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(' ', Color::Reset, Color::Reset)
    }
}

pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::default(); width as usize * height as usize];
    }

    pub fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell::new(' ', Color::Reset, bg));
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub fn put(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    /// Write `text` starting at `(x, y)`, clipped to `clip`. Returns the
    /// column after the last written character.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, fg: Color, bg: Color, clip: Rect) -> u16 {
        let mut column = x;
        if !clip.contains(x.max(clip.x), y) {
            return column;
        }
        for ch in text.chars() {
            if column >= clip.right() {
                break;
            }
            if column >= clip.x {
                self.put(column, y, Cell::new(ch, fg, bg));
            }
            column += 1;
        }
        column
    }

    pub fn fill(&mut self, rect: Rect, cell: Cell) {
        for y in rect.y..rect.bottom().min(self.height) {
            for x in rect.x..rect.right().min(self.width) {
                self.put(x, y, cell);
            }
        }
    }

    /// Text of one row, for tests and debugging.
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.get(x, y).map(|c| c.ch))
            .collect()
    }

    pub fn present<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut fg = None;
        let mut bg = None;
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, y))?;
            for x in 0..self.width {
                let Some(cell) = self.get(x, y) else {
                    continue;
                };
                // Only emit color changes
                if fg != Some(cell.fg) {
                    writer.queue(SetForegroundColor(cell.fg))?;
                    fg = Some(cell.fg);
                }
                if bg != Some(cell.bg) {
                    writer.queue(SetBackgroundColor(cell.bg))?;
                    bg = Some(cell.bg);
                }
                writer.queue(Print(cell.ch))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
}
