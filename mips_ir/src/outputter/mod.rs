#[cfg(test)]
mod test;

use crate::{DataDirective, Root, TextItem};
use std::fmt::{Result, Write};

/// Serializes a [`Root`] to SPIM-flavored assembly text.
///
/// Instructions are indented with two spaces; labels and directives start at
/// column zero.
pub struct MipsOutputter<'w, W: Write> {
    writer: &'w mut W,
}

impl<'w, W: Write> MipsOutputter<'w, W> {
    pub fn new(writer: &'w mut W) -> Self {
        Self { writer }
    }

    pub fn write_root(&mut self, root: &Root) -> Result {
        writeln!(self.writer, ".data")?;
        for data in root.data() {
            writeln!(self.writer, "{}:", data.label())?;
            self.write_directive(data.data())?;
        }
        writeln!(self.writer, "\n.text")?;
        for item in root.text() {
            match item {
                TextItem::Global(label) => writeln!(self.writer, ".globl {label}")?,
                TextItem::Label(label) => writeln!(self.writer, "{label}:")?,
                TextItem::Inst(inst) => writeln!(self.writer, "  {inst}")?,
                TextItem::Blank => writeln!(self.writer)?,
            }
        }
        Ok(())
    }

    fn write_directive(&mut self, directive: &DataDirective) -> Result {
        match directive {
            DataDirective::Space(bytes) => writeln!(self.writer, "  .space {bytes}"),
            DataDirective::Word(word) => writeln!(self.writer, "  .word {word}"),
            DataDirective::Words(words) => {
                self.writer.write_str("  .word ")?;
                for (i, word) in words.iter().enumerate() {
                    if i > 0 {
                        self.writer.write_str(", ")?;
                    }
                    write!(self.writer, "{word}")?;
                }
                self.writer.write_char('\n')
            }
        }
    }
}
