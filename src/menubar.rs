use std::io::{self, Write};

use crossterm::{queue, style};

/// Split a menu item into `(is_key, text)` segments. Key names are the
/// bracketed parts, brackets included; an unclosed `[` runs to the end.
fn segments(item: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut rest = item;
    while let Some(open) = rest.find('[') {
        if open > 0 {
            out.push((false, &rest[..open]));
        }
        rest = &rest[open..];
        match rest.find(']') {
            Some(close) => {
                out.push((true, &rest[..=close]));
                rest = &rest[close + 1..];
            }
            None => {
                out.push((false, rest));
                return out;
            }
        }
    }
    if !rest.is_empty() {
        out.push((false, rest));
    }
    out
}

/// Print a menu item, bold key names and dim action text.
pub fn print_menu_item<W: Write>(out: &mut W, item: &str) -> io::Result<()> {
    for (is_key, text) in segments(item) {
        let attr = if is_key {
            style::Attribute::Bold
        } else {
            style::Attribute::Dim
        };
        queue!(
            out,
            style::SetAttribute(attr),
            style::Print(text),
            style::SetAttribute(style::Attribute::Reset),
        )?;
    }
    Ok(())
}

/// Print menu items separated by two spaces, with a one-space margin.
pub fn print_menu<W: Write, S: AsRef<str>>(out: &mut W, items: &[S]) -> io::Result<()> {
    queue!(out, style::Print(" "))?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            queue!(out, style::Print("  "))?;
        }
        print_menu_item(out, item.as_ref())?;
    }
    Ok(())
}
