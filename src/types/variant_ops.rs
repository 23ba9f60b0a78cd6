//! # Variant Arithmetic and Bitwise Operators
//!
//! Binary operators promote the left operand to the right operand's
//! representation, then widen small results the way C integer promotion
//! does:
//!
//! | right operand | result type |
//! |---------------|-------------|
//! | Int8 / UInt8 / Int16 / UInt16 | Int32 |
//! | Int32 | Int32 |
//! | UInt32 | UInt32 |
//! | Int64 | Int64 |
//! | UInt64 | UInt64 |
//! | Float | Float |
//! | Double | Double |
//!
//! Integer arithmetic wraps on overflow; integer division and remainder by
//! zero are errors; float division by zero yields the IEEE result. Shifts
//! mask the shift amount modulo the operand's bit width. `+` additionally
//! concatenates two strings.
//!
//! Operands outside the numeric family (or outside the integer family for
//! bitwise operators) raise a [`VariantTypeCastError`] naming both types.

use eyre::Result;

use crate::error::VariantTypeCastError;
use crate::types::Variant;

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy)]
enum BitOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Left operand statically cast to the right operand's primitive type.
/// Fails for non-numeric left operands.
macro_rules! cast_numeric {
    ($lhs:expr, $rhs:expr, $symbol:expr, $t:ty) => {
        match $lhs {
            Variant::Int8(v) => *v as $t,
            Variant::UInt8(v) => *v as $t,
            Variant::Int16(v) => *v as $t,
            Variant::UInt16(v) => *v as $t,
            Variant::Int32(v) => *v as $t,
            Variant::UInt32(v) => *v as $t,
            Variant::Int64(v) => *v as $t,
            Variant::UInt64(v) => *v as $t,
            Variant::Float(v) => *v as $t,
            Variant::Double(v) => *v as $t,
            _ => return Err(unsupported($lhs, $rhs, $symbol)),
        }
    };
}

/// Same as `cast_numeric` but floats are rejected too (bitwise operators).
macro_rules! cast_integer {
    ($lhs:expr, $rhs:expr, $symbol:expr, $t:ty) => {
        match $lhs {
            Variant::Int8(v) => *v as $t,
            Variant::UInt8(v) => *v as $t,
            Variant::Int16(v) => *v as $t,
            Variant::UInt16(v) => *v as $t,
            Variant::Int32(v) => *v as $t,
            Variant::UInt32(v) => *v as $t,
            Variant::Int64(v) => *v as $t,
            Variant::UInt64(v) => *v as $t,
            _ => return Err(unsupported($lhs, $rhs, $symbol)),
        }
    };
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $lhs:expr, $rhs:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => {
                if b == 0 {
                    return Err(division_by_zero($lhs, $rhs));
                }
                a.wrapping_div(b)
            }
            ArithOp::Rem => {
                if b == 0 {
                    return Err(division_by_zero($lhs, $rhs));
                }
                a.wrapping_rem(b)
            }
        }
    }};
}

macro_rules! float_arith {
    ($op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
        }
    }};
}

macro_rules! int_bits {
    ($op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BitOp::And => a & b,
            BitOp::Or => a | b,
            BitOp::Xor => a ^ b,
            BitOp::Shl => a.wrapping_shl(b as u32),
            BitOp::Shr => a.wrapping_shr(b as u32),
        }
    }};
}

impl Variant {
    /// Numeric addition, or string concatenation when both operands are
    /// strings.
    pub fn add(&self, rhs: &Variant) -> Result<Variant> {
        if let (Variant::String(a), Variant::String(b)) = (self, rhs) {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            return Ok(Variant::String(out));
        }
        self.arith(rhs, ArithOp::Add, "+")
    }

    pub fn subtract(&self, rhs: &Variant) -> Result<Variant> {
        self.arith(rhs, ArithOp::Sub, "-")
    }

    pub fn multiply(&self, rhs: &Variant) -> Result<Variant> {
        self.arith(rhs, ArithOp::Mul, "*")
    }

    pub fn divide(&self, rhs: &Variant) -> Result<Variant> {
        self.arith(rhs, ArithOp::Div, "/")
    }

    pub fn remainder(&self, rhs: &Variant) -> Result<Variant> {
        self.arith(rhs, ArithOp::Rem, "%")
    }

    pub fn bit_and(&self, rhs: &Variant) -> Result<Variant> {
        self.bitwise(rhs, BitOp::And, "&")
    }

    pub fn bit_or(&self, rhs: &Variant) -> Result<Variant> {
        self.bitwise(rhs, BitOp::Or, "|")
    }

    pub fn bit_xor(&self, rhs: &Variant) -> Result<Variant> {
        self.bitwise(rhs, BitOp::Xor, "^")
    }

    pub fn shift_left(&self, rhs: &Variant) -> Result<Variant> {
        self.bitwise(rhs, BitOp::Shl, "<<")
    }

    pub fn shift_right(&self, rhs: &Variant) -> Result<Variant> {
        self.bitwise(rhs, BitOp::Shr, ">>")
    }

    /// Unary negation. Small integers promote to Int32; 32/64-bit integers
    /// wrap in their own width.
    pub fn negate(&self) -> Result<Variant> {
        Ok(match self {
            Variant::Int8(v) => Variant::Int32(-(*v as i32)),
            Variant::UInt8(v) => Variant::Int32(-(*v as i32)),
            Variant::Int16(v) => Variant::Int32(-(*v as i32)),
            Variant::UInt16(v) => Variant::Int32(-(*v as i32)),
            Variant::Int32(v) => Variant::Int32(v.wrapping_neg()),
            Variant::UInt32(v) => Variant::UInt32(v.wrapping_neg()),
            Variant::Int64(v) => Variant::Int64(v.wrapping_neg()),
            Variant::UInt64(v) => Variant::UInt64(v.wrapping_neg()),
            Variant::Float(v) => Variant::Float(-v),
            Variant::Double(v) => Variant::Double(-v),
            _ => return Err(unary_unsupported(self, "-")),
        })
    }

    /// Unary bitwise complement. Small integers promote to Int32.
    pub fn bit_not(&self) -> Result<Variant> {
        Ok(match self {
            Variant::Int8(v) => Variant::Int32(!(*v as i32)),
            Variant::UInt8(v) => Variant::Int32(!(*v as i32)),
            Variant::Int16(v) => Variant::Int32(!(*v as i32)),
            Variant::UInt16(v) => Variant::Int32(!(*v as i32)),
            Variant::Int32(v) => Variant::Int32(!v),
            Variant::UInt32(v) => Variant::UInt32(!v),
            Variant::Int64(v) => Variant::Int64(!v),
            Variant::UInt64(v) => Variant::UInt64(!v),
            _ => return Err(unary_unsupported(self, "~")),
        })
    }

    fn arith(&self, rhs: &Variant, op: ArithOp, symbol: &str) -> Result<Variant> {
        Ok(match rhs {
            Variant::Int8(r) => {
                let l = cast_numeric!(self, rhs, symbol, i8);
                Variant::Int32(int_arith!(op, l as i32, *r as i32, self, rhs))
            }
            Variant::UInt8(r) => {
                let l = cast_numeric!(self, rhs, symbol, u8);
                Variant::Int32(int_arith!(op, l as i32, *r as i32, self, rhs))
            }
            Variant::Int16(r) => {
                let l = cast_numeric!(self, rhs, symbol, i16);
                Variant::Int32(int_arith!(op, l as i32, *r as i32, self, rhs))
            }
            Variant::UInt16(r) => {
                let l = cast_numeric!(self, rhs, symbol, u16);
                Variant::Int32(int_arith!(op, l as i32, *r as i32, self, rhs))
            }
            Variant::Int32(r) => {
                let l = cast_numeric!(self, rhs, symbol, i32);
                Variant::Int32(int_arith!(op, l, *r, self, rhs))
            }
            Variant::UInt32(r) => {
                let l = cast_numeric!(self, rhs, symbol, u32);
                Variant::UInt32(int_arith!(op, l, *r, self, rhs))
            }
            Variant::Int64(r) => {
                let l = cast_numeric!(self, rhs, symbol, i64);
                Variant::Int64(int_arith!(op, l, *r, self, rhs))
            }
            Variant::UInt64(r) => {
                let l = cast_numeric!(self, rhs, symbol, u64);
                Variant::UInt64(int_arith!(op, l, *r, self, rhs))
            }
            Variant::Float(r) => {
                let l = cast_numeric!(self, rhs, symbol, f32);
                Variant::Float(float_arith!(op, l, *r))
            }
            Variant::Double(r) => {
                let l = cast_numeric!(self, rhs, symbol, f64);
                Variant::Double(float_arith!(op, l, *r))
            }
            _ => return Err(unsupported(self, rhs, symbol)),
        })
    }

    fn bitwise(&self, rhs: &Variant, op: BitOp, symbol: &str) -> Result<Variant> {
        Ok(match rhs {
            Variant::Int8(r) => {
                let l = cast_integer!(self, rhs, symbol, i8);
                Variant::Int32(int_bits!(op, l as i32, *r as i32))
            }
            Variant::UInt8(r) => {
                let l = cast_integer!(self, rhs, symbol, u8);
                Variant::Int32(int_bits!(op, l as i32, *r as i32))
            }
            Variant::Int16(r) => {
                let l = cast_integer!(self, rhs, symbol, i16);
                Variant::Int32(int_bits!(op, l as i32, *r as i32))
            }
            Variant::UInt16(r) => {
                let l = cast_integer!(self, rhs, symbol, u16);
                Variant::Int32(int_bits!(op, l as i32, *r as i32))
            }
            Variant::Int32(r) => {
                let l = cast_integer!(self, rhs, symbol, i32);
                Variant::Int32(int_bits!(op, l, *r))
            }
            Variant::UInt32(r) => {
                let l = cast_integer!(self, rhs, symbol, u32);
                Variant::UInt32(int_bits!(op, l, *r))
            }
            Variant::Int64(r) => {
                let l = cast_integer!(self, rhs, symbol, i64);
                Variant::Int64(int_bits!(op, l, *r))
            }
            Variant::UInt64(r) => {
                let l = cast_integer!(self, rhs, symbol, u64);
                Variant::UInt64(int_bits!(op, l, *r))
            }
            _ => return Err(unsupported(self, rhs, symbol)),
        })
    }
}

fn unsupported(lhs: &Variant, rhs: &Variant, symbol: &str) -> eyre::Report {
    eyre::Report::new(VariantTypeCastError::with_reason(
        lhs.value_type(),
        rhs.value_type(),
        format!("unsupported operand types for '{}'", symbol),
    ))
}

fn unary_unsupported(operand: &Variant, symbol: &str) -> eyre::Report {
    eyre::Report::new(VariantTypeCastError::with_reason(
        operand.value_type(),
        operand.value_type(),
        format!("unsupported operand type for unary '{}'", symbol),
    ))
}

fn division_by_zero(lhs: &Variant, rhs: &Variant) -> eyre::Report {
    eyre::Report::new(VariantTypeCastError::with_reason(
        lhs.value_type(),
        rhs.value_type(),
        "integer division by zero",
    ))
}
