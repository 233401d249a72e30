use std::fmt::Display;

use colored::*;
use tracing::info;
use unicode_width::UnicodeWidthStr;

use super::colors;
use super::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;

/// Width the keys of [`aligned_line`] are padded to.
const KEY_WIDTH: usize = 14;

pub trait WithDefaultColor {
    fn with_default(self, default_color: Color) -> ColoredString;
}

impl WithDefaultColor for &str {
    fn with_default(self, default_color: Color) -> ColoredString {
        self.color(default_color)
    }
}

impl WithDefaultColor for String {
    fn with_default(self, default_color: Color) -> ColoredString {
        self.color(default_color)
    }
}

impl WithDefaultColor for ColoredString {
    fn with_default(self, _default_color: Color) -> ColoredString {
        self
    }
}

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn banner() {
    let text_content: String = format!("⟦ NETSIFT v{} ⟧ ", env!("CARGO_PKG_VERSION"));
    let text_width: usize = UnicodeWidthStr::width(text_content.as_str());
    let text: ColoredString = text_content.bright_green().bold();
    let sep: ColoredString = "═"
        .repeat(TOTAL_WIDTH.saturating_sub(text_width) / 2)
        .bright_black();

    print(&format!("{sep}{text}{sep}"));
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {msg} ⟧");
    let msg_len: usize = console::measure_text_width(&formatted);

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line = format!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right).bright_black()
    );

    print(&line);
}

pub fn aligned_line<V>(key: &str, value: V)
where
    V: Display + WithDefaultColor,
{
    let dots: String = ".".repeat((KEY_WIDTH + 1).saturating_sub(key.len()));
    let colon: String = format!(
        "{}{}",
        dots.color(colors::SEPARATOR),
        ":".color(colors::SEPARATOR)
    );
    let value: ColoredString = value.with_default(colors::TEXT_DEFAULT);
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    print(&format!(
        "{prefix} {}{colon} {value}",
        key.color(colors::PRIMARY)
    ));
}

/// Ranked `cidr  count` listing.
pub fn ranking(rows: &[(String, usize)]) {
    for (i, (cidr, count)) in rows.iter().enumerate() {
        let idx: String = format!("[{}]", (i + 1).to_string().color(colors::ACCENT));
        print(&format!(
            "{} {:<18} {}",
            idx.color(colors::SEPARATOR),
            cidr.color(colors::PRIMARY),
            count
        ));
    }
}

pub fn end_of_program() {
    print(&format!(
        "{}",
        "═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR)
    ));
}
