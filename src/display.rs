use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

pub const CHIP8_DISPLAY_WIDTH: usize = 64;
pub const CHIP8_DISPLAY_HEIGHT: usize = 32;

/// the 64x32 monochrome framebuffer; only ever changed by XOR
#[derive(Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    cells: [bool; CHIP8_DISPLAY_WIDTH * CHIP8_DISPLAY_HEIGHT],
}

impl DisplayBuffer {
    pub fn new() -> Self {
        DisplayBuffer {
            cells: [false; CHIP8_DISPLAY_WIDTH * CHIP8_DISPLAY_HEIGHT],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    /// is the pixel at (x, y) lit? coordinates wrap
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.cells[Self::offset(x, y)]
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// XOR an 8-pixel-wide sprite onto the display with its top-left corner
    /// at (x, y); both axes wrap round
    ///
    /// returns true if any lit pixel got turned off
    pub fn xor_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let mut collision = false;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..8 {
                if bits & (0x80 >> col) == 0 {
                    continue;
                }
                let cell = &mut self.cells[Self::offset(x + col, y + row)];
                collision |= *cell;
                *cell ^= true;
            }
        }
        collision
    }

    fn offset(x: usize, y: usize) -> usize {
        (y % CHIP8_DISPLAY_HEIGHT) * CHIP8_DISPLAY_WIDTH + (x % CHIP8_DISPLAY_WIDTH)
    }
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DisplayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.cells.chunks(CHIP8_DISPLAY_WIDTH) {
            let line: String = row.iter().map(|c| if *c { '#' } else { '.' }).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Display is used by the host to draw things on the screen. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work.
pub trait Display {
    /// paint the framebuffer
    fn draw(&mut self, buffer: &DisplayBuffer) -> Result<(), io::Error>;
}

// store useful metadata about the terminal
struct Resolution(usize, usize);

impl Resolution {
    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// expand lit or unlit cells into x, y float coords, suitable for TUI
    fn bitplane_from_cells<'a>(
        &self,
        cells: &'a [bool],
        lit: bool,
    ) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let w = self.0;
        cells
            .iter()
            .enumerate()
            .filter(move |(_, c)| **c == lit)
            .map(move |(n, _)| {
                (
                    (n % w) as f64,        // x
                    -1.0 * (n / w) as f64, // y
                )
            })
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
}

impl MonoTermDisplay {
    pub fn new() -> Result<MonoTermDisplay, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution: Resolution(CHIP8_DISPLAY_WIDTH, CHIP8_DISPLAY_HEIGHT),
        })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.show_cursor() {
            log::warn!("couldn't restore the cursor: {}", e);
        }
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, buffer: &DisplayBuffer) -> Result<(), io::Error> {
        // for now this assumes a 1:1 ratio between terminal, chip8 and the
        // internal TUI canvas
        self.terminal.draw(|f| {
            let size = Rect::new(
                0,
                0,
                2 + self.resolution.0 as u16,
                2 + self.resolution.1 as u16,
            );

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(self.resolution.x_bounds())
                .y_bounds(self.resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &self
                            .resolution
                            .bitplane_from_cells(buffer.cells(), false)
                            .collect::<Vec<_>>(),
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &self
                            .resolution
                            .bitplane_from_cells(buffer.cells(), true)
                            .collect::<Vec<_>>(),
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines; counts frames it was asked for
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
    pub last: Option<DisplayBuffer>,
}

impl DummyDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, buffer: &DisplayBuffer) -> Result<(), io::Error> {
        self.frames += 1;
        self.last = Some(buffer.clone());
        Ok(())
    }
}
