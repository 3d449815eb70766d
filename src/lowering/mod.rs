//! Lowering
//!
//! This module is responsible for lowering the type checked AST down to our intermediate
//! representation ([ir]). The main interface is the [lower] function.
//!
//! Every definition and the main script become one flat instruction list of the shape
//! `LABEL entry; ENTER; ...body...; LABEL exit; LEAVE`. Returns set the return value and jump to
//! the shared exit label. Expressions are lowered in one of two modes, see [expression].
//!
//! Lowering does no validation of its own. It relies on the checker having accepted the program,
//! so every [LoweringError] is an internal defect, not a problem with the source program.

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{Block, Definition, Expression, Statement, StatementKind};
use crate::ir::{self, Arithmetic, Instruction, Label, Name};
use crate::symbols::{ScopeId, SymbolTable};
use crate::{Span, Type, TypedProgram, ENTRY_POINT};

mod expression;

#[derive(Debug, Error, Diagnostic)]
pub enum LoweringError {
    #[error("No scope was recorded for '{owner}'")]
    #[diagnostic(help("the program has to be type checked before it is lowered"))]
    MissingScope { owner: String },

    #[error("The entry label '{label}' is already taken")]
    DuplicateEntry { label: String },

    #[error("Cannot lower {operation} on a value of type {typ}")]
    UnexpectedType {
        operation: &'static str,
        typ: Type,

        #[label("this expression")]
        span: Span,
    },
}

type Result<T> = std::result::Result<T, LoweringError>;

/// Turn the type checked AST into IR
pub fn lower(program: TypedProgram) -> Result<ir::Program> {
    let TypedProgram { ast, symbols } = program;
    let mut lowerer = Lowerer::new(symbols);

    let mut functions = Vec::with_capacity(ast.definitions.len());
    for def in ast.definitions {
        functions.push(lowerer.lower_definition(def)?);
    }
    let main = lowerer.lower_script(ast.main)?;

    Ok(ir::Program {
        functions,
        main,
        symbols: lowerer.symbols,
    })
}

/// Labels of the string constants every program may print
#[derive(Debug)]
struct Constants {
    newline: Label,
    space: Label,
    true_: Label,
    false_: Label,
    none: Label,
}

impl Constants {
    fn intern(symbols: &mut SymbolTable) -> Self {
        Self {
            newline: symbols.intern_string("\n"),
            space: symbols.intern_string(" "),
            true_: symbols.intern_string("True"),
            false_: symbols.intern_string("False"),
            none: symbols.intern_string("None"),
        }
    }
}

/// The state shared by all definitions during lowering
#[derive(Debug)]
struct Lowerer {
    symbols: SymbolTable,
    constants: Constants,
}

impl Lowerer {
    fn new(mut symbols: SymbolTable) -> Self {
        let constants = Constants::intern(&mut symbols);
        Self { symbols, constants }
    }

    fn lower_definition(&mut self, def: Definition<Type>) -> Result<ir::FunctionDefinition> {
        let scope = self.scope_of(&def.name)?;
        let entry = self.entry_label(&def.name)?;

        let code = self.lower_body(entry, scope, def.body)?;
        debug!(name = %def.name, instructions = code.len(), "lowered definition");

        let prototype = ir::FunctionPrototype {
            parameters: def
                .params
                .into_iter()
                .map(|(param, typ)| (Name::from(param), typ))
                .collect(),
            name: def.name,
            return_type: def.return_type,
            scope,
        };

        Ok(ir::FunctionDefinition { prototype, code })
    }

    fn lower_script(&mut self, main: Block<Type>) -> Result<ir::FunctionDefinition> {
        let scope = self.scope_of(ENTRY_POINT)?;
        let entry = self.entry_label(ENTRY_POINT)?;

        let code = self.lower_body(entry, scope, main)?;
        debug!(instructions = code.len(), "lowered main script");

        let prototype = ir::FunctionPrototype {
            name: ENTRY_POINT.to_string(),
            parameters: Vec::new(),
            return_type: Type::None,
            scope,
        };

        Ok(ir::FunctionDefinition { prototype, code })
    }

    fn lower_body(
        &mut self,
        entry: Label,
        scope: ScopeId,
        body: Block<Type>,
    ) -> Result<Vec<Instruction>> {
        let exit = self.symbols.fresh_label(scope, Some("done"));

        let mut function = FunctionLowerer {
            symbols: &mut self.symbols,
            constants: &self.constants,
            scope,
            exit: exit.clone(),
            code: Vec::new(),
        };

        function.emit(Instruction::Label(entry));
        function.emit(Instruction::Enter);
        function.lower_block(body)?;
        function.emit(Instruction::Label(exit));
        function.emit(Instruction::Leave);

        Ok(function.code)
    }

    fn scope_of(&self, owner: &str) -> Result<ScopeId> {
        self.symbols
            .scope_of(owner)
            .ok_or_else(|| LoweringError::MissingScope {
                owner: owner.to_string(),
            })
    }

    fn entry_label(&mut self, name: &str) -> Result<Label> {
        self.symbols
            .declare_label(ScopeId::GLOBAL, name)
            .map_err(|_| LoweringError::DuplicateEntry {
                label: name.to_string(),
            })
    }
}

/// Emits the code of a single definition or of the main script
struct FunctionLowerer<'a> {
    symbols: &'a mut SymbolTable,
    constants: &'a Constants,
    scope: ScopeId,
    /// Where every return jumps to
    exit: Label,
    code: Vec<Instruction>,
}

impl FunctionLowerer<'_> {
    fn emit(&mut self, inst: Instruction) {
        trace!(%inst, "emit");
        self.code.push(inst);
    }

    fn temporary(&mut self, typ: Type) -> Name {
        self.symbols.fresh_temporary(self.scope, typ)
    }

    fn label(&mut self, hint: &str) -> Label {
        self.symbols.fresh_label(self.scope, Some(hint))
    }

    fn lower_block(&mut self, block: Block<Type>) -> Result<()> {
        for stmt in block.statements {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, stmt: Statement<Type>) -> Result<()> {
        match stmt.kind {
            StatementKind::Introduce { name, init, .. } => self.emit_value(init, &Name::from(name)),
            StatementKind::Assign { name, value } => self.emit_value(value, &Name::from(name)),
            StatementKind::AddAssign { name, value } => {
                self.lower_update(Arithmetic::Add, Name::from(name), value)
            }
            StatementKind::SubAssign { name, value } => {
                self.lower_update(Arithmetic::Sub, Name::from(name), value)
            }
            StatementKind::Pass => {
                self.emit(Instruction::Nop);
                Ok(())
            }
            StatementKind::Print(args) => {
                for (i, arg) in args.into_iter().enumerate() {
                    if i > 0 {
                        let space = self.constants.space.clone();
                        self.print_constant(space);
                    }
                    self.lower_print(arg)?;
                }
                let newline = self.constants.newline.clone();
                self.print_constant(newline);
                Ok(())
            }
            StatementKind::Return(value) => {
                let temp = self.temporary(value.typ);
                self.emit_value(value, &temp)?;
                self.emit_return(temp);
                Ok(())
            }
            StatementKind::ReturnNone => {
                let temp = self.temporary(Type::None);
                self.emit(Instruction::Set {
                    dst: temp.clone(),
                    value: 0,
                });
                self.emit_return(temp);
                Ok(())
            }
            StatementKind::Call { function, args } => self.emit_call(function, args),
            StatementKind::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                let then_label = self.label("then");
                let else_label = self.label("else");
                let done_label = self.label("endif");

                self.emit_condition(condition, &then_label, &else_label)?;
                self.emit(Instruction::Label(then_label));
                self.lower_block(then_block)?;
                self.emit(Instruction::Jump(done_label.clone()));
                self.emit(Instruction::Label(else_label));
                self.lower_block(else_block)?;
                self.emit(Instruction::Label(done_label));
                Ok(())
            }
            StatementKind::While { condition, body } => {
                let loop_label = self.label("loop");
                let body_label = self.label("body");
                let done_label = self.label("endwhile");

                self.emit(Instruction::Label(loop_label.clone()));
                self.emit_condition(condition, &body_label, &done_label)?;
                self.emit(Instruction::Label(body_label));
                self.lower_block(body)?;
                self.emit(Instruction::Jump(loop_label));
                self.emit(Instruction::Label(done_label));
                Ok(())
            }
        }
    }

    /// `name += value` or `name -= value`
    fn lower_update(
        &mut self,
        op: Arithmetic,
        name: Name,
        value: Expression<Type>,
    ) -> Result<()> {
        let current = self.temporary(Type::Int);
        self.emit(Instruction::Move {
            dst: current.clone(),
            src: name.clone(),
        });

        let operand = self.temporary(value.typ);
        self.emit_value(value, &operand)?;

        self.emit(Instruction::Arithmetic {
            op,
            dst: name,
            lhs: current,
            rhs: operand,
        });
        Ok(())
    }

    fn lower_print(&mut self, arg: Expression<Type>) -> Result<()> {
        match arg.typ {
            Type::Int => {
                let temp = self.temporary(Type::Int);
                self.emit_value(arg, &temp)?;
                self.emit(Instruction::PrintInt(temp));
            }
            Type::Str => {
                let temp = self.temporary(Type::Str);
                self.emit_value(arg, &temp)?;
                self.emit(Instruction::PrintString(temp));
            }
            Type::Bool => {
                let temp = self.temporary(Type::Str);
                self.select_string(arg, &temp)?;
                self.emit(Instruction::PrintString(temp));
            }
            Type::None => {
                // evaluated for its side effects only
                let dummy = self.temporary(Type::None);
                self.emit_value(arg, &dummy)?;
                let none = self.constants.none.clone();
                self.print_constant(none);
            }
        }
        Ok(())
    }

    fn print_constant(&mut self, label: Label) {
        let temp = self.temporary(Type::Str);
        self.emit(Instruction::LoadString {
            dst: temp.clone(),
            label,
        });
        self.emit(Instruction::PrintString(temp));
    }

    fn emit_return(&mut self, value: Name) {
        self.emit(Instruction::Return { src: value });
        self.emit(Instruction::Jump(self.exit.clone()));
    }
}
