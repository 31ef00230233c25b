/// A physical MIPS CPU register.
///
/// The MIPS registers are conventionally used as follows:
///
/// | register    | name         | preserved? | usage |
/// | ----------- | ------------ | --- | ------------ |
/// |`$0`         |`$zero`       | yes | always zero |
/// |`$1`         |`$at`         | no  | assembler temporary |
/// |`$2` - `$3`  |`$v0` - `$v1` | no  | function results |
/// |`$4` - `$7`  |`$a0` - `$a3` | no  | function arguments |
/// |`$8` - `$15` |`$t0` - `$t7` | no  | temporaries |
/// |`$16` - `$23`|`$s0` - `$s7` | yes | saved temporaries |
/// |`$24` - `$25`|`$t8` - `$t9` | no  | temporaries |
/// |`$26` - `$27`|`$k0` - `$k1` | no  | reserved for os kernel |
/// |`$28`        |`$gp`         | yes | global pointer |
/// |`$29`        |`$sp`         | yes | stack pointer |
/// |`$30`        |`$fp`         | yes | frame pointer |
/// |`$31`        |`$ra`         | yes | return address |
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    pub const ZERO: Self = Self(0);
    pub const AT: Self = Self(1);
    pub const V0: Self = Self(2);
    pub const V1: Self = Self(3);
    pub const A0: Self = Self(4);
    pub const A1: Self = Self(5);
    pub const A2: Self = Self(6);
    pub const A3: Self = Self(7);
    pub const T0: Self = Self(8);
    pub const T1: Self = Self(9);
    pub const T2: Self = Self(10);
    pub const T3: Self = Self(11);
    pub const T4: Self = Self(12);
    pub const T5: Self = Self(13);
    pub const T6: Self = Self(14);
    pub const T7: Self = Self(15);
    pub const S0: Self = Self(16);
    pub const S1: Self = Self(17);
    pub const S2: Self = Self(18);
    pub const S3: Self = Self(19);
    pub const S4: Self = Self(20);
    pub const S5: Self = Self(21);
    pub const S6: Self = Self(22);
    pub const S7: Self = Self(23);
    pub const T8: Self = Self(24);
    pub const T9: Self = Self(25);
    pub const K0: Self = Self(26);
    pub const K1: Self = Self(27);
    pub const GP: Self = Self(28);
    pub const SP: Self = Self(29);
    pub const FP: Self = Self(30);
    pub const RA: Self = Self(31);

    /// The argument register for argument `i` (0-based). Panics if `i >= 4`.
    pub fn arg(i: usize) -> Self {
        assert!(i < 4, "only four register arguments exist, got index {i}");
        Self(4 + i as u8)
    }

    /// The `i`th callee-saved register `$s0..$s7`. Panics if `i >= 8`.
    pub fn saved(i: usize) -> Self {
        assert!(i < 8, "only eight saved registers exist, got index {i}");
        Self(16 + i as u8)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Returns `true` if the register is by convention preserved across calls.
    pub fn is_saved(self) -> bool {
        matches!(self.0, 0 | 16..=23 | 28..=31)
    }

    pub fn name(self) -> &'static str {
        const NAMES: [&str; 32] = [
            "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3",
            "$t4", "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
            "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
        ];
        NAMES[self.0 as usize]
    }
}

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(Reg::ZERO.name(), "$zero");
        assert_eq!(Reg::T7.name(), "$t7");
        assert_eq!(Reg::T8.name(), "$t8");
        assert_eq!(Reg::arg(2).name(), "$a2");
        assert_eq!(Reg::saved(7).name(), "$s7");
    }

    #[test]
    fn saved_convention() {
        assert!(Reg::S0.is_saved());
        assert!(Reg::RA.is_saved());
        assert!(!Reg::T9.is_saved());
        assert!(!Reg::V0.is_saved());
    }
}
