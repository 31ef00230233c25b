use crate::{Label, Reg};
use std::fmt;

/// The subset of MIPS-32 instructions (and SPIM pseudo-instructions) the code
/// generator emits.
///
/// Memory operands are written `offset(base)`; `Div` leaves quotient in `LO`
/// and remainder in `HI`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `li dst, imm`
    Li(Reg, i32),
    /// `la dst, label`
    La(Reg, Label),
    /// `lw dst, offset(base)`
    Lw(Reg, i32, Reg),
    /// `sw src, offset(base)`
    Sw(Reg, i32, Reg),
    /// `move dst, src`
    Move(Reg, Reg),
    Addu(Reg, Reg, Reg),
    Subu(Reg, Reg, Reg),
    Addi(Reg, Reg, i32),
    Addiu(Reg, Reg, i32),
    Mul(Reg, Reg, Reg),
    Div(Reg, Reg),
    Mflo(Reg),
    Mfhi(Reg),
    Slt(Reg, Reg, Reg),
    Sltu(Reg, Reg, Reg),
    Sltiu(Reg, Reg, i32),
    Xor(Reg, Reg, Reg),
    Xori(Reg, Reg, i32),
    And(Reg, Reg, Reg),
    Or(Reg, Reg, Reg),
    Sll(Reg, Reg, u32),
    Beq(Reg, Reg, Label),
    Bne(Reg, Reg, Label),
    J(Label),
    Jal(Label),
    Jr(Reg),
    Syscall,
    Nop,
}

impl Instruction {
    /// Returns `true` for control transfers that have an architectural delay
    /// slot and must be followed by a `nop`.
    pub fn needs_delay_slot(&self) -> bool {
        matches!(
            self,
            Self::Beq(..) | Self::Bne(..) | Self::J(_) | Self::Jal(_) | Self::Jr(_)
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Li(d, imm) => write!(f, "li {d}, {imm}"),
            La(d, label) => write!(f, "la {d}, {label}"),
            Lw(d, off, base) => write!(f, "lw {d}, {off}({base})"),
            Sw(s, off, base) => write!(f, "sw {s}, {off}({base})"),
            Move(d, s) => write!(f, "move {d}, {s}"),
            Addu(d, a, b) => write!(f, "addu {d}, {a}, {b}"),
            Subu(d, a, b) => write!(f, "subu {d}, {a}, {b}"),
            Addi(d, a, imm) => write!(f, "addi {d}, {a}, {imm}"),
            Addiu(d, a, imm) => write!(f, "addiu {d}, {a}, {imm}"),
            Mul(d, a, b) => write!(f, "mul {d}, {a}, {b}"),
            Div(a, b) => write!(f, "div {a}, {b}"),
            Mflo(d) => write!(f, "mflo {d}"),
            Mfhi(d) => write!(f, "mfhi {d}"),
            Slt(d, a, b) => write!(f, "slt {d}, {a}, {b}"),
            Sltu(d, a, b) => write!(f, "sltu {d}, {a}, {b}"),
            Sltiu(d, a, imm) => write!(f, "sltiu {d}, {a}, {imm}"),
            Xor(d, a, b) => write!(f, "xor {d}, {a}, {b}"),
            Xori(d, a, imm) => write!(f, "xori {d}, {a}, {imm}"),
            And(d, a, b) => write!(f, "and {d}, {a}, {b}"),
            Or(d, a, b) => write!(f, "or {d}, {a}, {b}"),
            Sll(d, a, sh) => write!(f, "sll {d}, {a}, {sh}"),
            Beq(a, b, label) => write!(f, "beq {a}, {b}, {label}"),
            Bne(a, b, label) => write!(f, "bne {a}, {b}, {label}"),
            J(label) => write!(f, "j {label}"),
            Jal(label) => write!(f, "jal {label}"),
            Jr(r) => write!(f, "jr {r}"),
            Syscall => write!(f, "syscall"),
            Nop => write!(f, "nop"),
        }
    }
}
