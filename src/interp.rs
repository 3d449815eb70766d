//! Reference interpreter for lowered programs
//!
//! Runs an [ir::Program] directly, one frame per call. Every slot of a frame holds either an
//! integer or a string; booleans and the none value are integers by the time they reach the IR.
//! Output is collected into a string and input is read from a queue of integers, which keeps runs
//! deterministic.

use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Write};

use miette::Diagnostic;
use thiserror::Error;
use tracing::trace;

use crate::ir::{
    self, Arithmetic, Comparison, FunctionDefinition, Instruction, Label, Name, ZeroTest,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum RuntimeError {
    #[error("Call of unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Jump to unknown label '{label}' in '{function}'")]
    UnknownLabel { label: Label, function: String },

    #[error("No string constant is stored under '{0}'")]
    UnknownString(Label),

    #[error("'{name}' is read before it is set in '{function}'")]
    Unset { name: Name, function: String },

    #[error("'{name}' holds {found} where an {expected} was expected")]
    TypeConfusion {
        name: Name,
        expected: &'static str,
        found: Value,
    },

    #[error("Cannot compare {lhs} with {rhs}")]
    Incomparable { lhs: Value, rhs: Value },

    #[error("Cannot convert {0:?} to an integer")]
    Conversion(String),

    #[error("Division by zero in '{function}'")]
    DivisionByZero { function: String },

    #[error("The input is exhausted")]
    #[diagnostic(help("provide more values with `Interpreter::with_input`"))]
    InputExhausted,

    #[error("Argument {index} of '{function}' was never passed")]
    MissingArgument { index: usize, function: String },

    #[error("RETURN_VALUE in '{function}' without a preceding call that returned")]
    NoReturnValue { function: String },

    #[error("Step limit of {0} exceeded")]
    StepLimit(usize),
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Observes an execution
pub trait Tracer {
    /// A function is entered with the given arguments
    fn call(&mut self, _function: &str, _args: &[Value]) {}

    /// An instruction of `function` is about to be executed
    fn step(&mut self, _function: &str, _inst: &Instruction) {}
}

impl Tracer for () {}

/// Records the name of every called function, in call order
#[derive(Debug, Default)]
pub struct CallLog(pub Vec<String>);

impl Tracer for CallLog {
    fn call(&mut self, function: &str, _args: &[Value]) {
        self.0.push(function.to_string());
    }
}

pub struct Interpreter<'p, T = ()> {
    program: &'p ir::Program,
    input: VecDeque<i64>,
    output: String,
    tracer: T,
    step_limit: Option<usize>,
    steps: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p ir::Program) -> Self {
        Self {
            program,
            input: VecDeque::new(),
            output: String::new(),
            tracer: (),
            step_limit: None,
            steps: 0,
        }
    }
}

impl<'p, T: Tracer> Interpreter<'p, T> {
    pub fn with_tracer<U: Tracer>(self, tracer: U) -> Interpreter<'p, U> {
        Interpreter {
            program: self.program,
            input: self.input,
            output: self.output,
            tracer,
            step_limit: self.step_limit,
            steps: self.steps,
        }
    }

    pub fn with_input(mut self, input: impl IntoIterator<Item = i64>) -> Self {
        self.input.extend(input);
        self
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Run the main script to completion and return everything it printed
    pub fn run(&mut self) -> Result<&str> {
        let program = self.program;
        self.execute(&program.main, Vec::new())?;
        Ok(&self.output)
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn into_tracer(self) -> T {
        self.tracer
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn execute(
        &mut self,
        function: &'p FunctionDefinition,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let name = function.prototype.name.as_str();
        trace!(function = name, args = args.len(), "call");
        self.tracer.call(name, &args);

        let mut frame = Frame::new(name);
        let parameters = &function.prototype.parameters;
        if args.len() < parameters.len() {
            return Err(RuntimeError::MissingArgument {
                index: args.len(),
                function: name.to_string(),
            });
        }
        for ((param, _), value) in parameters.iter().zip(args) {
            frame.slots.insert(param.clone(), value);
        }

        let labels: HashMap<&str, usize> = function
            .code
            .iter()
            .enumerate()
            .filter_map(|(i, inst)| match inst {
                Instruction::Label(label) => Some((label.as_str(), i)),
                _ => None,
            })
            .collect();
        let target = |label: &Label| {
            labels
                .get(label.as_str())
                .copied()
                .ok_or_else(|| RuntimeError::UnknownLabel {
                    label: label.clone(),
                    function: name.to_string(),
                })
        };

        let mut pc = 0;
        while let Some(inst) = function.code.get(pc) {
            pc += 1;
            self.count_step()?;
            self.tracer.step(name, inst);

            match inst {
                Instruction::Label(_) | Instruction::Enter | Instruction::Nop => {}
                Instruction::Leave => break,
                Instruction::Move { dst, src } => {
                    let value = frame.get(src)?.clone();
                    frame.set(dst, value);
                }
                Instruction::Set { dst, value } => frame.set(dst, Value::Int(*value)),
                Instruction::Arithmetic { op, dst, lhs, rhs } => {
                    let (a, b) = (frame.int(lhs)?, frame.int(rhs)?);
                    let result = match op {
                        Arithmetic::Add => a.wrapping_add(b),
                        Arithmetic::Sub => a.wrapping_sub(b),
                        Arithmetic::Mul => a.wrapping_mul(b),
                        Arithmetic::Div | Arithmetic::Mod if b == 0 => {
                            return Err(RuntimeError::DivisionByZero {
                                function: name.to_string(),
                            })
                        }
                        Arithmetic::Div => floor_div(a, b),
                        Arithmetic::Mod => a.wrapping_sub(floor_div(a, b).wrapping_mul(b)),
                    };
                    frame.set(dst, Value::Int(result));
                }
                Instruction::Jump(label) => pc = target(label)?,
                Instruction::BranchCompare {
                    cmp,
                    lhs,
                    rhs,
                    if_true,
                    if_false,
                } => {
                    let (lhs, rhs) = (frame.get(lhs)?, frame.get(rhs)?);
                    let ordering = match (lhs, rhs) {
                        (Value::Int(a), Value::Int(b)) => a.cmp(b),
                        (Value::Str(a), Value::Str(b)) => a.cmp(b),
                        _ => {
                            return Err(RuntimeError::Incomparable {
                                lhs: lhs.clone(),
                                rhs: rhs.clone(),
                            })
                        }
                    };
                    let holds = match cmp {
                        Comparison::Lt => ordering.is_lt(),
                        Comparison::Le => ordering.is_le(),
                        Comparison::Eq => ordering.is_eq(),
                    };
                    pc = target(if holds { if_true } else { if_false })?;
                }
                Instruction::BranchZero {
                    test,
                    src,
                    if_true,
                    if_false,
                } => {
                    let zero = frame.int(src)? == 0;
                    let holds = match test {
                        ZeroTest::Zero => zero,
                        ZeroTest::NonZero => !zero,
                    };
                    pc = target(if holds { if_true } else { if_false })?;
                }
                Instruction::SetArgument { index, src } => {
                    let value = frame.get(src)?.clone();
                    if frame.arguments.len() <= *index {
                        frame.arguments.resize(*index + 1, None);
                    }
                    frame.arguments[*index] = Some(value);
                }
                Instruction::Call(callee) => {
                    let program = self.program;
                    let callee = program
                        .function(callee)
                        .ok_or_else(|| RuntimeError::UnknownFunction(callee.clone()))?;
                    let args = std::mem::take(&mut frame.arguments)
                        .into_iter()
                        .enumerate()
                        .map(|(index, arg)| {
                            arg.ok_or_else(|| RuntimeError::MissingArgument {
                                index,
                                function: callee.prototype.name.clone(),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    frame.last_result = self.execute(callee, args)?;
                }
                Instruction::ReturnValue { dst } => {
                    let value = frame
                        .last_result
                        .take()
                        .ok_or_else(|| RuntimeError::NoReturnValue {
                            function: name.to_string(),
                        })?;
                    frame.set(dst, value);
                }
                Instruction::Return { src } => frame.returned = Some(frame.get(src)?.clone()),
                Instruction::LoadString { dst, label } => {
                    let text = self
                        .program
                        .symbols
                        .string_constant(label)
                        .ok_or_else(|| RuntimeError::UnknownString(label.clone()))?;
                    frame.set(dst, Value::Str(text.to_string()));
                }
                Instruction::PrintInt(src) => {
                    let n = frame.int(src)?;
                    // writing into a String cannot fail
                    let _ = write!(self.output, "{n}");
                }
                Instruction::PrintString(src) => {
                    let text = frame.str(src)?;
                    self.output.push_str(text);
                }
                Instruction::ReadInt(dst) => {
                    let n = self.input.pop_front().ok_or(RuntimeError::InputExhausted)?;
                    frame.set(dst, Value::Int(n));
                }
                Instruction::IntToStr { dst, src } => {
                    let text = frame.int(src)?.to_string();
                    frame.set(dst, Value::Str(text));
                }
                Instruction::StrToInt { dst, src } => {
                    let text = frame.str(src)?;
                    let n = text
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| RuntimeError::Conversion(text.to_string()))?;
                    frame.set(dst, Value::Int(n));
                }
            }
        }

        Ok(frame.returned)
    }

    fn count_step(&mut self) -> Result<()> {
        self.steps += 1;
        match self.step_limit {
            Some(limit) if self.steps > limit => Err(RuntimeError::StepLimit(limit)),
            _ => Ok(()),
        }
    }
}

/// Integer division rounding towards negative infinity
fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

struct Frame<'f> {
    function: &'f str,
    slots: HashMap<Name, Value>,
    /// Outgoing arguments for the next call
    arguments: Vec<Option<Value>>,
    /// Set by RETURN
    returned: Option<Value>,
    /// What the most recent callee returned
    last_result: Option<Value>,
}

impl<'f> Frame<'f> {
    fn new(function: &'f str) -> Self {
        Self {
            function,
            slots: HashMap::new(),
            arguments: Vec::new(),
            returned: None,
            last_result: None,
        }
    }

    fn get(&self, name: &Name) -> Result<&Value> {
        self.slots.get(name).ok_or_else(|| RuntimeError::Unset {
            name: name.clone(),
            function: self.function.to_string(),
        })
    }

    fn set(&mut self, name: &Name, value: Value) {
        self.slots.insert(name.clone(), value);
    }

    fn int(&self, name: &Name) -> Result<i64> {
        match self.get(name)? {
            Value::Int(n) => Ok(*n),
            found => Err(RuntimeError::TypeConfusion {
                name: name.clone(),
                expected: "int",
                found: found.clone(),
            }),
        }
    }

    fn str(&self, name: &Name) -> Result<&str> {
        match self.get(name)? {
            Value::Str(s) => Ok(s.as_str()),
            found => Err(RuntimeError::TypeConfusion {
                name: name.clone(),
                expected: "str",
                found: found.clone(),
            }),
        }
    }
}
