//! Expression lowering
//!
//! Expressions are lowered in two modes. Value mode ([FunctionLowerer::emit_value]) computes a
//! result into a named location. Condition mode ([FunctionLowerer::emit_condition]) computes
//! nothing and instead transfers control to one of two labels, which gives `and`/`or` their
//! short-circuit behaviour. Each mode falls back on the other where it has no direct encoding.

use crate::ast::{BinaryOperation, Expression, ExpressionKind, Ident};
use crate::ir::{Arithmetic, Comparison, Instruction, Label, Name, ZeroTest};
use crate::Type;

use super::{FunctionLowerer, LoweringError, Result};

fn arithmetic(op: BinaryOperation) -> Option<Arithmetic> {
    match op {
        BinaryOperation::Add => Some(Arithmetic::Add),
        BinaryOperation::Sub => Some(Arithmetic::Sub),
        BinaryOperation::Mul => Some(Arithmetic::Mul),
        BinaryOperation::Div => Some(Arithmetic::Div),
        BinaryOperation::Mod => Some(Arithmetic::Mod),
        _ => None,
    }
}

/// Expressions that only have a condition mode encoding
fn is_condition(kind: &ExpressionKind<Type>) -> bool {
    match kind {
        ExpressionKind::Not { .. } => true,
        ExpressionKind::Binary { op, .. } => arithmetic(*op).is_none(),
        _ => false,
    }
}

impl FunctionLowerer<'_> {
    /// Compute the value of `expr` into `dst`
    pub(super) fn emit_value(&mut self, expr: Expression<Type>, dst: &Name) -> Result<()> {
        if is_condition(&expr.kind) {
            let flag = self.materialize(expr)?;
            self.emit(Instruction::Move {
                dst: dst.clone(),
                src: flag,
            });
            return Ok(());
        }

        let Expression { kind, span, typ } = expr;
        match kind {
            ExpressionKind::Int(value) => self.emit(Instruction::Set {
                dst: dst.clone(),
                value,
            }),
            ExpressionKind::Bool(value) => self.emit(Instruction::Set {
                dst: dst.clone(),
                value: i64::from(value),
            }),
            ExpressionKind::None => self.emit(Instruction::Set {
                dst: dst.clone(),
                value: 0,
            }),
            ExpressionKind::Str(text) => {
                let label = self.symbols.intern_string(&text);
                self.emit(Instruction::LoadString {
                    dst: dst.clone(),
                    label,
                });
            }
            ExpressionKind::Var(name) => self.emit(Instruction::Move {
                dst: dst.clone(),
                src: Name::from(name),
            }),
            ExpressionKind::Binary { op, lhs, rhs } => {
                let Some(op) = arithmetic(op) else {
                    return Err(LoweringError::UnexpectedType {
                        operation: "arithmetic",
                        typ,
                        span,
                    });
                };
                let lhs_temp = self.temporary(lhs.typ);
                self.emit_value(*lhs, &lhs_temp)?;
                let rhs_temp = self.temporary(rhs.typ);
                self.emit_value(*rhs, &rhs_temp)?;

                self.emit(Instruction::Arithmetic {
                    op,
                    dst: dst.clone(),
                    lhs: lhs_temp,
                    rhs: rhs_temp,
                });
            }
            ExpressionKind::Not { .. } => {
                return Err(LoweringError::UnexpectedType {
                    operation: "not",
                    typ,
                    span,
                })
            }
            ExpressionKind::Input { prompt } => {
                let temp = self.temporary(Type::Str);
                self.emit_value(*prompt, &temp)?;
                self.emit(Instruction::PrintString(temp));
                self.emit(Instruction::ReadInt(dst.clone()));
            }
            ExpressionKind::IntCast { inner } => match inner.typ {
                Type::Int | Type::Bool => self.emit_value(*inner, dst)?,
                Type::Str => {
                    let temp = self.temporary(Type::Str);
                    self.emit_value(*inner, &temp)?;
                    self.emit(Instruction::StrToInt {
                        dst: dst.clone(),
                        src: temp,
                    });
                }
                typ @ Type::None => {
                    return Err(LoweringError::UnexpectedType {
                        operation: "int()",
                        typ,
                        span,
                    })
                }
            },
            ExpressionKind::StrCast { inner } => match inner.typ {
                Type::Str => self.emit_value(*inner, dst)?,
                Type::Int => {
                    let temp = self.temporary(Type::Int);
                    self.emit_value(*inner, &temp)?;
                    self.emit(Instruction::IntToStr {
                        dst: dst.clone(),
                        src: temp,
                    });
                }
                Type::Bool => self.select_string(*inner, dst)?,
                typ @ Type::None => {
                    return Err(LoweringError::UnexpectedType {
                        operation: "str()",
                        typ,
                        span,
                    })
                }
            },
            ExpressionKind::Call { function, args } => {
                self.emit_call(function, args)?;
                self.emit(Instruction::ReturnValue { dst: dst.clone() });
            }
        }
        Ok(())
    }

    /// Jump to `if_true` if `expr` holds and to `if_false` otherwise
    pub(super) fn emit_condition(
        &mut self,
        expr: Expression<Type>,
        if_true: &Label,
        if_false: &Label,
    ) -> Result<()> {
        let Expression { kind, span, typ } = expr;
        match kind {
            ExpressionKind::Bool(value) => {
                let target = if value { if_true } else { if_false };
                self.emit(Instruction::Jump(target.clone()));
            }
            ExpressionKind::Var(name) => self.emit(Instruction::BranchZero {
                test: ZeroTest::NonZero,
                src: Name::from(name),
                if_true: if_true.clone(),
                if_false: if_false.clone(),
            }),
            ExpressionKind::Not { inner } => self.emit_condition(*inner, if_false, if_true)?,
            ExpressionKind::Binary {
                op: BinaryOperation::And,
                lhs,
                rhs,
            } => {
                let next = self.label("and");
                self.emit_condition(*lhs, &next, if_false)?;
                self.emit(Instruction::Label(next));
                self.emit_condition(*rhs, if_true, if_false)?;
            }
            ExpressionKind::Binary {
                op: BinaryOperation::Or,
                lhs,
                rhs,
            } => {
                let next = self.label("or");
                self.emit_condition(*lhs, if_true, &next)?;
                self.emit(Instruction::Label(next));
                self.emit_condition(*rhs, if_true, if_false)?;
            }
            ExpressionKind::Binary {
                op: BinaryOperation::Less,
                lhs,
                rhs,
            } => self.emit_compare(Comparison::Lt, *lhs, *rhs, if_true, if_false)?,
            ExpressionKind::Binary {
                op: BinaryOperation::LessEq,
                lhs,
                rhs,
            } => self.emit_compare(Comparison::Le, *lhs, *rhs, if_true, if_false)?,
            ExpressionKind::Binary {
                op: BinaryOperation::Equals,
                lhs,
                rhs,
            } => self.emit_compare(Comparison::Eq, *lhs, *rhs, if_true, if_false)?,
            kind => {
                let temp = self.temporary(typ);
                self.emit_value(Expression { kind, span, typ }, &temp)?;
                self.emit(Instruction::BranchZero {
                    test: ZeroTest::Zero,
                    src: temp,
                    if_true: if_false.clone(),
                    if_false: if_true.clone(),
                });
            }
        }
        Ok(())
    }

    fn emit_compare(
        &mut self,
        cmp: Comparison,
        lhs: Expression<Type>,
        rhs: Expression<Type>,
        if_true: &Label,
        if_false: &Label,
    ) -> Result<()> {
        let lhs_temp = self.temporary(lhs.typ);
        self.emit_value(lhs, &lhs_temp)?;
        let rhs_temp = self.temporary(rhs.typ);
        self.emit_value(rhs, &rhs_temp)?;

        self.emit(Instruction::BranchCompare {
            cmp,
            lhs: lhs_temp,
            rhs: rhs_temp,
            if_true: if_true.clone(),
            if_false: if_false.clone(),
        });
        Ok(())
    }

    /// Evaluate the arguments left to right, pass them and call `function`
    ///
    /// All arguments are computed before the first one is passed, so a call nested inside an
    /// argument cannot overwrite the argument slots of this one.
    pub(super) fn emit_call(&mut self, function: Ident, args: Vec<Expression<Type>>) -> Result<()> {
        let mut temps = Vec::with_capacity(args.len());
        for arg in args {
            let temp = self.temporary(arg.typ);
            self.emit_value(arg, &temp)?;
            temps.push(temp);
        }

        for (index, src) in temps.into_iter().enumerate() {
            self.emit(Instruction::SetArgument { index, src });
        }
        self.emit(Instruction::Call(function));
        Ok(())
    }

    /// Load the "True" or "False" string into `dst` depending on `condition`
    pub(super) fn select_string(&mut self, condition: Expression<Type>, dst: &Name) -> Result<()> {
        let on_true = Instruction::LoadString {
            dst: dst.clone(),
            label: self.constants.true_.clone(),
        };
        let on_false = Instruction::LoadString {
            dst: dst.clone(),
            label: self.constants.false_.clone(),
        };
        self.branch_join(condition, on_true, on_false)
    }

    /// Compute `condition` as 1 or 0 into a fresh temporary
    fn materialize(&mut self, condition: Expression<Type>) -> Result<Name> {
        let flag = self.temporary(Type::Bool);
        let on_true = Instruction::Set {
            dst: flag.clone(),
            value: 1,
        };
        let on_false = Instruction::Set {
            dst: flag.clone(),
            value: 0,
        };
        self.branch_join(condition, on_true, on_false)?;
        Ok(flag)
    }

    /// Branch on `condition` into one of two single instruction arms that meet again afterwards
    fn branch_join(
        &mut self,
        condition: Expression<Type>,
        on_true: Instruction,
        on_false: Instruction,
    ) -> Result<()> {
        let true_label = self.label("true");
        let false_label = self.label("false");
        let join_label = self.label("join");

        self.emit_condition(condition, &true_label, &false_label)?;
        self.emit(Instruction::Label(true_label));
        self.emit(on_true);
        self.emit(Instruction::Jump(join_label.clone()));
        self.emit(Instruction::Label(false_label));
        self.emit(on_false);
        self.emit(Instruction::Label(join_label));
        Ok(())
    }
}
