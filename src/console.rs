//! Line-oriented console output with optional styling.

use std::io::{self, IsTerminal, Write};

/// Styling hint for console text. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    BoldRed,
    BoldGreen,
}

impl Style {
    /// Wraps `text` in the escape codes for this style.
    pub fn paint(self, text: &str) -> String {
        match self {
            Style::Plain => text.to_string(),
            Style::BoldRed => format!("\x1b[1;31m{}\x1b[0m", text),
            Style::BoldGreen => format!("\x1b[1;32m{}\x1b[0m", text),
        }
    }
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

/// One line of console output, made of styled segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub segments: Vec<Segment>,
}

impl Line {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, Style::Plain)
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            segments: vec![Segment {
                text: text.into(),
                style,
            }],
        }
    }

    /// Appends a segment and returns the line.
    pub fn then(mut self, text: impl Into<String>, style: Style) -> Self {
        self.segments.push(Segment {
            text: text.into(),
            style,
        });
        self
    }

    /// Renders the line without any escape codes.
    pub fn to_plain_string(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn render(&self, color: bool) -> String {
        if !color {
            return self.to_plain_string();
        }
        self.segments.iter().map(|s| s.style.paint(&s.text)).collect()
    }
}

enum Sink {
    Stderr,
    Buffer(Vec<u8>),
}

/// Console that writes diagnostics line by line.
pub struct Console {
    sink: Sink,
    color: bool,
}

impl Console {
    /// Console on stderr, colored when stderr is a terminal.
    pub fn stderr() -> Self {
        Self {
            sink: Sink::Stderr,
            color: io::stderr().is_terminal(),
        }
    }

    /// In-memory console without color, for tests and captured output.
    pub fn buffer() -> Self {
        Self {
            sink: Sink::Buffer(Vec::new()),
            color: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn print(&mut self, text: &str, style: Style) {
        self.print_line(&Line::styled(text, style));
    }

    pub fn print_line(&mut self, line: &Line) {
        let rendered = line.render(self.color);
        let result = match &mut self.sink {
            Sink::Stderr => writeln!(io::stderr().lock(), "{}", rendered),
            Sink::Buffer(buffer) => writeln!(buffer, "{}", rendered),
        };
        if let Err(e) = result {
            log::debug!("Failed to write console line: {}", e);
        }
    }

    pub fn print_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a Line>) {
        for line in lines {
            self.print_line(line);
        }
    }

    /// Everything written so far. Empty for stream-backed consoles.
    pub fn contents(&self) -> String {
        match &self.sink {
            Sink::Buffer(buffer) => String::from_utf8_lossy(buffer).into_owned(),
            Sink::Stderr => String::new(),
        }
    }
}
