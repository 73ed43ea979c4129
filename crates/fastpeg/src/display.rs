use std::fmt::{Display, Write};

use crate::expr::{CharRange, Expr, Literal};

impl Expr {
    /// PEG-like text of the expression.
    ///
    /// `atomic` asks for output that can be embedded as an operand, groups of more than one
    /// expression get parenthesized.
    pub fn render_grammar(&self, atomic: bool) -> String {
        let mut buf = String::new();
        // writing into a String can't fail
        _ = self.render_into(&mut buf, atomic);
        buf
    }

    pub fn render_into(&self, buf: &mut dyn Write, atomic: bool) -> std::fmt::Result {
        match self {
            Expr::Literal(lit) => lit.render_into(buf),
            Expr::CharRange(range) => range.render_into(buf),
            Expr::AnyChar => write!(buf, "."),
            Expr::Seq(exprs) => render_group(buf, exprs, " ", atomic),
            Expr::Choice(exprs) => render_group(buf, exprs, " / ", atomic),
            Expr::Repeat(e) => {
                e.render_into(buf, true)?;
                write!(buf, "*")
            }
            Expr::OneOrMore(e) => {
                e.render_into(buf, true)?;
                write!(buf, "+")
            }
            Expr::Optional(e) => {
                e.render_into(buf, true)?;
                write!(buf, "?")
            }
            Expr::LookAhead(e) => {
                write!(buf, "&")?;
                e.render_into(buf, true)
            }
            Expr::Not(e) => {
                write!(buf, "!")?;
                e.render_into(buf, true)
            }
            Expr::Discard(e) => {
                write!(buf, "-")?;
                e.render_into(buf, true)
            }
            Expr::Label(name, e) => {
                write!(buf, "{name}:")?;
                e.render_into(buf, true)
            }
            Expr::Action(e, action) => {
                if atomic {
                    write!(buf, "( ")?;
                }
                e.render_into(buf, true)?;
                write!(buf, " {{ {} }}", action.source())?;
                if atomic {
                    write!(buf, " )")?;
                }
                Ok(())
            }
            Expr::Slice(e) => {
                write!(buf, "$")?;
                e.render_into(buf, true)
            }
            Expr::Concat(e) => {
                write!(buf, "$$")?;
                e.render_into(buf, true)
            }
            Expr::Rule(rule) => write!(buf, "{}", rule.name()),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render_into(f, false)
    }
}

fn render_group(
    buf: &mut dyn Write,
    exprs: &[Expr],
    separator: &str,
    atomic: bool,
) -> std::fmt::Result {
    let parens = atomic && exprs.len() > 1;
    if parens {
        write!(buf, "( ")?;
    }
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            buf.write_str(separator)?;
        }
        e.render_into(buf, true)?;
    }
    if parens {
        write!(buf, " )")?;
    }
    Ok(())
}

impl Literal {
    pub fn render_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        display_byte_literal(buf, "\"", self.bytes())?;
        if self.ignore_case() {
            write!(buf, "i")?;
        }
        Ok(())
    }
}

impl CharRange {
    pub fn render_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        write!(buf, "[")?;
        // a leading dash can't be mistaken for a range
        if self.singles.contains(&'-') {
            write!(buf, "-")?;
        }
        for &ch in self.singles.iter().filter(|&&ch| ch != '-') {
            write_class_char(buf, ch)?;
        }
        for &(lo, hi) in &self.ranges {
            write_class_code(buf, lo)?;
            write!(buf, "-")?;
            write_class_code(buf, hi)?;
        }
        write!(buf, "]")
    }
}

fn write_class_code(buf: &mut dyn Write, code: u32) -> std::fmt::Result {
    match char::from_u32(code) {
        Some(ch) => write_class_char(buf, ch),
        None => write!(buf, "\\U{code:08x}"),
    }
}

fn write_class_char(buf: &mut dyn Write, ch: char) -> std::fmt::Result {
    match ch {
        '\t' => write!(buf, "\\t"),
        '\n' => write!(buf, "\\n"),
        '\r' => write!(buf, "\\r"),
        '\\' | ']' | '[' => write!(buf, "\\{ch}"),
        ' '..='~' => write!(buf, "{ch}"),
        _ => {
            let code = ch as u32;
            if code <= 0xFF {
                write!(buf, "\\x{code:02x}")
            } else if code <= 0xFFFF {
                write!(buf, "\\u{code:04x}")
            } else {
                write!(buf, "\\U{code:08x}")
            }
        }
    }
}

/// Writes `bytes` as a quoted literal, valid utf8 is kept readable and invalid bytes become
/// `\xNN` escapes.
pub fn display_byte_literal(
    buf: &mut dyn Write,
    delimiter: &str,
    bytes: &[u8],
) -> std::fmt::Result {
    buf.write_str(delimiter)?;
    for chunk in bstr::ByteSlice::utf8_chunks(bytes) {
        for ch in chunk.valid().chars() {
            match ch {
                '\\' => buf.write_str("\\\\")?,
                '\n' => buf.write_str("\\n")?,
                '\t' => buf.write_str("\\t")?,
                '\r' => buf.write_str("\\r")?,
                _ if delimiter.starts_with(ch) => write!(buf, "\\{ch}")?,
                _ if ch.is_control() => write!(buf, "{}", ch.escape_unicode())?,
                _ => buf.write_char(ch)?,
            }
        }
        for byte in chunk.invalid() {
            write!(buf, "\\x{:02X}", byte)?;
        }
    }
    buf.write_str(delimiter)
}
