use crate::{GlobalData, Instruction, Label};

/// One line of the `.text` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextItem {
    /// `.globl label`
    Global(Label),
    /// `label:`
    Label(Label),
    Inst(Instruction),
    /// An empty line separating functions.
    Blank,
}

/// A whole MIPS program: the `.data` items followed by a flat `.text` stream.
///
/// The code generator appends to a `Root` in emission order; the
/// [`outputter`](crate::outputter) serializes it.
#[derive(Debug, Clone, Default)]
pub struct Root {
    data: Vec<GlobalData>,
    text: Vec<TextItem>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data(&mut self, data: GlobalData) {
        self.data.push(data);
    }

    pub fn push_global(&mut self, label: Label) {
        self.text.push(TextItem::Global(label));
    }

    pub fn push_label(&mut self, label: Label) {
        self.text.push(TextItem::Label(label));
    }

    pub fn push(&mut self, inst: Instruction) {
        self.text.push(TextItem::Inst(inst));
    }

    /// Pushes `inst` followed by the `nop` filling its delay slot.
    ///
    /// Panics if `inst` has no delay slot.
    pub fn push_with_delay_slot(&mut self, inst: Instruction) {
        assert!(inst.needs_delay_slot(), "{inst} has no delay slot");
        self.text.push(TextItem::Inst(inst));
        self.text.push(TextItem::Inst(Instruction::Nop));
    }

    pub fn push_blank(&mut self) {
        self.text.push(TextItem::Blank);
    }

    pub fn data(&self) -> &[GlobalData] {
        &self.data
    }

    pub fn text(&self) -> &[TextItem] {
        &self.text
    }
}

impl std::fmt::Display for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::outputter::MipsOutputter::new(f).write_root(self)
    }
}
