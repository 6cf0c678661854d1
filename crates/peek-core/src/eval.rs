//! Whitelisted evaluation of index sub-expressions against a locals snapshot.
//!
//! Only side-effect free forms are accepted: literals, names bound in the snapshot, arithmetic,
//! casts, subscripting, tuple fields and tuple/array literals. Calls, method calls, closures,
//! blocks and everything else are rejected with [`EvalError::Unsupported`].

use bytes::Bytes;
use syn::{BinOp, Expr, Lit, Member, Type, UnOp};

use crate::context::Locals;
use crate::error::EvalError;
use crate::value::{Style, Value};

type Result<T> = std::result::Result<T, EvalError>;

const MAX_DEPTH: usize = 32;

pub fn evaluate(text: &str, locals: &Locals) -> Result<Value> {
    let expr: Expr = syn::parse_str(text).map_err(|err| EvalError::Syntax(err.to_string()))?;
    Evaluator::new(locals).eval(&expr)
}

pub struct Evaluator<'a> {
    locals: &'a Locals,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(locals: &'a Locals) -> Self {
        Self { locals, depth: 0 }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        self.depth += 1;
        let value = self.eval_inner(expr);
        self.depth -= 1;
        value
    }

    fn eval_inner(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Lit(lit) => literal(&lit.lit),
            Expr::Path(path) => {
                if path.qself.is_some() {
                    return Err(EvalError::Unsupported("qualified path"));
                }
                let ident = path
                    .path
                    .get_ident()
                    .ok_or(EvalError::Unsupported("multi-segment path"))?;
                self.lookup(&ident.to_string())
            }
            Expr::Paren(paren) => self.eval(&paren.expr),
            Expr::Group(group) => self.eval(&group.expr),
            Expr::Reference(reference) => self.eval(&reference.expr),
            Expr::Unary(unary) => {
                let operand = self.eval(&unary.expr)?;
                unary_op(&unary.op, operand)
            }
            Expr::Binary(binary) => {
                let lhs = self.eval(&binary.left)?;
                let rhs = self.eval(&binary.right)?;
                binary_op(&binary.op, lhs, rhs)
            }
            Expr::Cast(cast) => {
                let value = self.eval(&cast.expr)?;
                cast_to(&cast.ty, value)
            }
            Expr::Index(index) => {
                let base = self.eval(&index.expr)?;
                let key = self.eval(&index.index)?;
                subscript(&base, &key)
            }
            Expr::Field(field) => {
                let base = self.eval(&field.base)?;
                match &field.member {
                    Member::Unnamed(index) => tuple_field(&base, index.index as usize),
                    Member::Named(_) => Err(EvalError::Unsupported("named field access")),
                }
            }
            Expr::Tuple(tuple) if tuple.elems.is_empty() => Ok(Value::Unit),
            Expr::Tuple(tuple) => Ok(Value::Tuple(self.eval_all(tuple.elems.iter())?)),
            Expr::Array(array) => Ok(Value::List(self.eval_all(array.elems.iter())?)),
            Expr::Call(_) | Expr::MethodCall(_) | Expr::Macro(_) => {
                Err(EvalError::Unsupported("calls"))
            }
            Expr::Assign(_) => Err(EvalError::Unsupported("assignment")),
            _ => Err(EvalError::Unsupported("expression form")),
        }
    }

    fn eval_all<'e>(&mut self, exprs: impl Iterator<Item = &'e Expr>) -> Result<Vec<Value>> {
        exprs.map(|expr| self.eval(expr)).collect()
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        match self.locals.get(name) {
            Some(value) => Ok(value.clone()),
            None if name == "None" => Ok(Value::None),
            None => Err(EvalError::UndefinedName(name.to_string())),
        }
    }
}

fn literal(lit: &Lit) -> Result<Value> {
    let syntax = |err: syn::Error| EvalError::Syntax(err.to_string());
    match lit {
        Lit::Int(int) => int.base10_parse::<i128>().map(Value::Int).map_err(syntax),
        Lit::Float(float) => float.base10_parse::<f64>().map(Value::Float).map_err(syntax),
        Lit::Str(s) => Ok(Value::Str(s.value())),
        Lit::ByteStr(bytes) => Ok(Value::Bytes(Bytes::from(bytes.value()))),
        Lit::Byte(byte) => Ok(Value::Int(byte.value().into())),
        Lit::Char(c) => Ok(Value::Char(c.value())),
        Lit::Bool(b) => Ok(Value::Bool(b.value)),
        _ => Err(EvalError::Unsupported("literal kind")),
    }
}

fn type_error(op: &str, lhs: &Value, rhs: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operands for '{}': {} and {}",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn unary_op(op: &UnOp, operand: Value) -> Result<Value> {
    match (op, operand) {
        (UnOp::Deref(_), value) => Ok(value),
        (UnOp::Neg(_), Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        (UnOp::Neg(_), Value::Float(f)) => Ok(Value::Float(-f)),
        (UnOp::Not(_), Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Not(_), Value::Int(i)) => Ok(Value::Int(!i)),
        (UnOp::Neg(_), other) | (UnOp::Not(_), other) => Err(EvalError::Type(format!(
            "bad operand type for unary operator: {}",
            other.type_name()
        ))),
        _ => Err(EvalError::Unsupported("unary operator")),
    }
}

fn binary_op(op: &BinOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinOp::Add(_) => binop_add(lhs, rhs),
        BinOp::Sub(_) => int_or_float("-", lhs, rhs, i128::checked_sub, |l, r| l - r),
        BinOp::Mul(_) => int_or_float("*", lhs, rhs, i128::checked_mul, |l, r| l * r),
        BinOp::Div(_) => {
            if rhs == Value::Int(0) {
                return Err(EvalError::DivisionByZero);
            }
            int_or_float("/", lhs, rhs, i128::checked_div, |l, r| l / r)
        }
        BinOp::Rem(_) => {
            if rhs == Value::Int(0) {
                return Err(EvalError::DivisionByZero);
            }
            int_or_float("%", lhs, rhs, i128::checked_rem, |l, r| l % r)
        }
        _ => Err(EvalError::Unsupported("binary operator")),
    }
}

fn binop_add(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Str(l), Value::Str(r)) => Ok(Value::Str(l + &r)),
        (lhs, rhs) => int_or_float("+", lhs, rhs, i128::checked_add, |l, r| l + r),
    }
}

fn int_or_float(
    op: &str,
    lhs: Value,
    rhs: Value,
    int: fn(i128, i128) -> Option<i128>,
    float: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Int(l), Value::Int(r)) => int(*l, *r).map(Value::Int).ok_or(EvalError::Overflow),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(float(*l, *r))),
        _ => Err(type_error(op, &lhs, &rhs)),
    }
}

macro_rules! cast_number {
    ($name:expr, $n:expr) => {
        cast_number!($name, $n, [i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize])
    };
    ($name:expr, $n:expr, [$($int:ident),*]) => {
        match $name {
            $(stringify!($int) => Some(Value::Int(($n as $int) as i128)),)*
            "f32" => Some(Value::Float(($n as f32) as f64)),
            "f64" => Some(Value::Float($n as f64)),
            _ => None,
        }
    };
}

/// `as` casts to primitive numeric types, with Rust's wrapping/saturating semantics.
fn cast_to(ty: &Type, value: Value) -> Result<Value> {
    let Type::Path(path) = ty else {
        return Err(EvalError::Unsupported("cast target"));
    };
    let name = path
        .path
        .get_ident()
        .map(|ident| ident.to_string())
        .ok_or(EvalError::Unsupported("cast target"))?;
    if name == "u128" {
        return match value {
            Value::Int(i) if i >= 0 => Ok(Value::Int(i)),
            Value::Int(_) => Err(EvalError::Overflow),
            other => Err(EvalError::Type(format!("cannot cast {} as u128", other.type_name()))),
        };
    }
    let cast = match &value {
        Value::Int(i) => cast_number!(name.as_str(), *i),
        Value::Float(f) => cast_number!(name.as_str(), *f),
        Value::Bool(_) | Value::Char(_) if name.starts_with('f') => None,
        Value::Bool(b) => cast_number!(name.as_str(), *b as i128),
        Value::Char(c) => cast_number!(name.as_str(), *c as u32 as i128),
        _ => None,
    };
    cast.ok_or_else(|| {
        EvalError::Type(format!("cannot cast {} as {}", value.type_name(), name))
    })
}

fn tuple_field(base: &Value, index: usize) -> Result<Value> {
    match base {
        Value::Tuple(items) => items.get(index).cloned().ok_or(EvalError::IndexOutOfRange {
            index: index as i128,
            len: items.len(),
        }),
        other => Err(EvalError::Type(format!(
            "{} has no field {}",
            other.type_name(),
            index
        ))),
    }
}

/// `base[key]`. Sequences accept negative positions counted from the end and, for nested
/// lists, a tuple or list of positions addressing one element per dimension.
pub fn subscript(base: &Value, key: &Value) -> Result<Value> {
    match (base, key) {
        (Value::Map(entries), key) => entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| EvalError::KeyNotFound(key.render(Style::Literal))),
        (Value::List(items) | Value::Tuple(items), Value::Int(index)) => {
            let position = position(*index, items.len())?;
            Ok(items[position].clone())
        }
        (Value::Bytes(bytes), Value::Int(index)) => {
            let position = position(*index, bytes.len())?;
            Ok(Value::Int(bytes[position].into()))
        }
        (Value::List(_), Value::Tuple(path) | Value::List(path)) if !path.is_empty() => {
            path.iter().try_fold(base.clone(), |value, index| subscript(&value, index))
        }
        (base @ (Value::List(_) | Value::Tuple(_) | Value::Bytes(_)), key) => {
            Err(EvalError::Type(format!(
                "{} indices must be integers, not {}",
                base.type_name(),
                key.type_name()
            )))
        }
        (base, _) => Err(EvalError::Type(format!(
            "{} is not subscriptable",
            base.type_name()
        ))),
    }
}

fn position(index: i128, len: usize) -> Result<usize> {
    let resolved = if index < 0 { index + len as i128 } else { index };
    if (0..len as i128).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(EvalError::IndexOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn locals() -> Locals {
        Locals::new()
            .with("i", Value::int(1))
            .with("j", Value::int(-1))
            .with("lst", Value::list([10, 20, 30].map(Value::int)))
            .with(
                "m",
                Value::list([
                    Value::list([1, 2].map(Value::int)),
                    Value::list([3, 4].map(Value::int)),
                ]),
            )
            .with(
                "d",
                Value::Map(vec![(Value::str("k"), Value::int(7))]),
            )
            .with("t", Value::tuple([Value::str("a"), Value::Bool(true)]))
    }

    fn eval(text: &str) -> Result<Value> {
        evaluate(text, &locals())
    }

    #[test]
    fn names_and_arithmetic() {
        assert_eq!(eval("i"), Ok(Value::int(1)));
        assert_eq!(eval("i + 1"), Ok(Value::int(2)));
        assert_eq!(eval("(i + 2) * 3 - 1"), Ok(Value::int(8)));
        assert_eq!(eval("7 / 2"), Ok(Value::int(3)));
        assert_eq!(eval("-7 % 3"), Ok(Value::int(-1)));
        assert_eq!(eval("1.5 * 2.0"), Ok(Value::Float(3.0)));
        assert_eq!(eval("\"a\" + \"b\""), Ok(Value::str("ab")));
        assert_eq!(eval("None"), Ok(Value::None));
    }

    #[test]
    fn subscripts() {
        assert_eq!(eval("lst[i]"), Ok(Value::int(20)));
        assert_eq!(eval("lst[j]"), Ok(Value::int(30)));
        assert_eq!(eval("m[i][0]"), Ok(Value::int(3)));
        assert_eq!(eval("m[(1, 1)]"), Ok(Value::int(4)));
        assert_eq!(eval("m[[0, 1]]"), Ok(Value::int(2)));
        assert_eq!(eval("d[\"k\"]"), Ok(Value::int(7)));
        assert_eq!(eval("t.0"), Ok(Value::str("a")));
        assert_eq!(eval("b\"xy\"[1]"), Ok(Value::int(121)));
        assert_eq!(eval("lst[i as usize]"), Ok(Value::int(20)));
    }

    #[test]
    fn casts_follow_rust_semantics() {
        assert_eq!(eval("300 as u8"), Ok(Value::int(44)));
        assert_eq!(eval("-1 as u16"), Ok(Value::int(65535)));
        assert_eq!(eval("2.9 as i32"), Ok(Value::int(2)));
        assert_eq!(eval("'a' as u32"), Ok(Value::int(97)));
        assert_eq!(eval("i as f64"), Ok(Value::Float(1.0)));
    }

    #[test]
    fn failures_are_typed() {
        assert_eq!(eval("k"), Err(EvalError::UndefinedName("k".to_string())));
        assert_eq!(eval("lst[7]"), Err(EvalError::IndexOutOfRange { index: 7, len: 3 }));
        assert_eq!(eval("i / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("d[\"z\"]"), Err(EvalError::KeyNotFound("'z'".to_string())));
        assert!(matches!(eval("i + 1.0"), Err(EvalError::Type(_))));
        assert!(matches!(eval("\"abc\"[0]"), Err(EvalError::Type(_))));
        assert!(matches!(eval("lst["), Err(EvalError::Syntax(_))));
        assert_eq!(eval("f(i)"), Err(EvalError::Unsupported("calls")));
        assert_eq!(eval("lst.len()"), Err(EvalError::Unsupported("calls")));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(eval(&deep), Err(EvalError::TooDeep));
    }
}
